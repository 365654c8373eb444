//! Shared fixtures for unit tests.

use std::sync::Arc;

use dws_core::{DeviceDescriptor, DeviceIdentity, Roster, StateName};
use dws_transport::{MessageTransport, RecordingPeerClient, TransportConfig};
use parking_lot::Mutex;

use crate::device::InMemoryDevice;
use crate::events::EventBus;
use crate::heartbeat::HeartbeatMonitor;
use crate::machine::Services;
use crate::panel::PanelModel;
use crate::request::{Origin, StateRequester};

pub(crate) fn state(name: &str) -> StateName {
    StateName::new(name).unwrap()
}

pub(crate) fn roster() -> Roster {
    Roster::new(vec![
        DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA").unwrap(),
        DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB").unwrap(),
    ])
    .unwrap()
}

/// A transport for the device with `identity`, recording what it posts.
pub(crate) fn pair(identity: &str) -> (MessageTransport, Arc<RecordingPeerClient>) {
    let resolved = roster()
        .resolve(&DeviceIdentity::new(identity).unwrap())
        .unwrap();
    let recorder = Arc::new(RecordingPeerClient::new());
    let transport = MessageTransport::new(
        &resolved,
        "divisibleWorkspaces",
        recorder.clone(),
        TransportConfig::default(),
    );
    (transport, recorder)
}

/// Records state requests instead of applying them.
#[derive(Clone, Default)]
pub(crate) struct Requests {
    log: Arc<Mutex<Vec<(StateName, Origin)>>>,
}

impl Requests {
    pub(crate) fn requester(&self) -> StateRequester {
        let log = Arc::clone(&self.log);
        StateRequester::new(move |state, origin| log.lock().push((state, origin)))
    }

    pub(crate) fn take(&self) -> Vec<(StateName, Origin)> {
        std::mem::take(&mut *self.log.lock())
    }
}

/// Every collaborator an entry action can reach, with handles for assertions.
pub(crate) struct Fixture {
    pub(crate) services: Services,
    pub(crate) recorder: Arc<RecordingPeerClient>,
    pub(crate) device: Arc<InMemoryDevice>,
    pub(crate) panel: Arc<PanelModel>,
    pub(crate) requests: Requests,
}

pub(crate) fn fixture(identity: &str) -> Fixture {
    let (transport, recorder) = pair(identity);
    let requests = Requests::default();
    let events = EventBus::new();
    let device = Arc::new(InMemoryDevice::new());
    let panel = Arc::new(PanelModel::new(events.clone()));
    let services = Services {
        heartbeat: HeartbeatMonitor::new(transport.clone(), requests.requester()),
        transport,
        events,
        device: device.clone(),
        panel: panel.clone(),
        requester: requests.requester(),
    };
    Fixture {
        services,
        recorder,
        device,
        panel,
        requests,
    }
}
