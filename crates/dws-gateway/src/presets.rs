//! The standard two-room pairing.
//!
//! A Primary and a Secondary device each define `Combined` and `Divided`.
//! While combined the devices exchange heartbeats, the Secondary hands control
//! to the Primary's panel and the Primary relays its audio and standby
//! changes. Dividing undoes all of it.

use std::sync::Arc;

use dws_control::{local_topic, remote_topic, LockPrompt, StateContext, StateTable};
use dws_core::{Event, Role, StateName};

use crate::config::HeartbeatConfig;

/// Name of the joined state.
pub const COMBINED: &str = "Combined";
/// Name of the independent state.
pub const DIVIDED: &str = "Divided";

const PRIMARY: &str = "Primary";
const SECONDARY: &str = "Secondary";

/// Stream name of the Secondary room's microphone as seen by the Primary.
const SECONDARY_MIC_STREAM: &str = "tcc2-pri2";

/// Local events the Primary relays to the Secondary while combined, with the
/// device status each one reports.
const RELAYED_EVENTS: [(&str, &str); 3] = [
    ("standby", "Standby.State"),
    ("volumeChange", "Audio.Volume"),
    ("volumeMute", "Audio.VolumeMute"),
];

/// The device status reported by a relayed event kind.
#[must_use]
pub fn status_path(kind: &str) -> Option<&'static str> {
    RELAYED_EVENTS
        .iter()
        .find(|(relayed, _)| *relayed == kind)
        .map(|(_, path)| *path)
}

/// Build the Primary and Secondary state table.
///
/// # Errors
///
/// Returns `CoreError::InvalidId` if the fallback state in `heartbeat` is not
/// a valid state name.
pub fn standard_pairing(
    heartbeat: &HeartbeatConfig,
    lock_prompt: &LockPrompt,
) -> dws_core::Result<StateTable> {
    let primary = Role::new(PRIMARY)?;
    let secondary = Role::new(SECONDARY)?;
    let combined = StateName::new(COMBINED)?;
    let divided = StateName::new(DIVIDED)?;
    let pairing = Arc::new(Pairing {
        heartbeat: heartbeat.enabled.then(|| heartbeat.clone()),
        fallback: heartbeat.fallback()?,
        lock_prompt: lock_prompt.clone(),
        primary: primary.clone(),
        secondary: secondary.clone(),
    });

    let table = StateTable::new()
        .define(&primary, &divided, {
            let pairing = Arc::clone(&pairing);
            move |ctx| pairing.primary_divided(ctx)
        })
        .define(&primary, &combined, {
            let pairing = Arc::clone(&pairing);
            move |ctx| pairing.primary_combined(ctx)
        })
        .define(&secondary, &divided, {
            let pairing = Arc::clone(&pairing);
            move |ctx| pairing.secondary_divided(ctx)
        })
        .define(&secondary, &combined, move |ctx| {
            pairing.secondary_combined(ctx)
        });

    Ok(table)
}

struct Pairing {
    heartbeat: Option<HeartbeatConfig>,
    fallback: StateName,
    lock_prompt: LockPrompt,
    primary: Role,
    secondary: Role,
}

impl Pairing {
    fn join(&self, ctx: &StateContext<'_>, peer: &Role) {
        let Some(heartbeat) = &self.heartbeat else {
            return;
        };
        ctx.heartbeat().start_sending(peer, heartbeat.period());
        ctx.heartbeat()
            .start_listening(peer, self.fallback.clone(), heartbeat.timeout());
    }

    fn primary_divided(&self, ctx: &mut StateContext<'_>) -> dws_control::Result<()> {
        ctx.heartbeat().stop_sending(&self.secondary);
        ctx.heartbeat().stop_listening(&self.secondary);
        set_ethernet_mic(ctx, SECONDARY_MIC_STREAM, "Off")?;

        ctx.subscribe(local_topic("volumeMute"), |event| {
            tracing::info!(args = ?event.args, "Primary volume mute changed");
        });

        ctx.device().configure("Audio.Output.HDMI.3.Mode", "Off")
    }

    fn primary_combined(&self, ctx: &mut StateContext<'_>) -> dws_control::Result<()> {
        self.join(ctx, &self.secondary);
        set_ethernet_mic(ctx, SECONDARY_MIC_STREAM, "On")?;

        for (kind, path) in RELAYED_EVENTS {
            ctx.forward(kind, &self.secondary);
            send_current_status(ctx, kind, path, &self.secondary);
        }
        Ok(())
    }

    fn secondary_divided(&self, ctx: &mut StateContext<'_>) -> dws_control::Result<()> {
        ctx.heartbeat().stop_all();
        ctx.panel().unlock()?;

        let device = ctx.device();
        device.configure("Standby.Control", "On")?;
        device.configure("Standby.Halfwake.Mode", "Auto")?;
        device.configure("Audio.Ultrasound.MaxVolume", "70")?;
        device.execute("Conference.DoNotDisturb.Deactivate")
    }

    fn secondary_combined(&self, ctx: &mut StateContext<'_>) -> dws_control::Result<()> {
        self.join(ctx, &self.primary);
        ctx.panel().lock(&self.lock_prompt)?;

        let device = ctx.device();
        device.execute("Conference.DoNotDisturb.Activate")?;
        device.configure("Standby.Control", "Off")?;
        device.configure("Standby.Halfwake.Mode", "Auto")?;
        device.configure("Audio.Ultrasound.MaxVolume", "0")?;

        for (kind, _) in RELAYED_EVENTS {
            ctx.subscribe(remote_topic(kind), |event| {
                tracing::info!(topic = %event.topic, args = ?event.args, "Primary relayed event");
            });
        }
        Ok(())
    }
}

/// Tell `peer` the current value of `path` as a `kind` event, so it starts in
/// sync instead of waiting for the next change.
fn send_current_status(ctx: &StateContext<'_>, kind: &str, path: &str, peer: &Role) {
    let value = match ctx.device().status(path) {
        Ok(Some(value)) => value,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(path, error = %e, "Unable to read device status");
            return;
        }
    };
    // Values travel as wire tokens.
    if StateName::new(value.as_str()).is_err() {
        tracing::warn!(path, value = %value, "Device status cannot be sent");
        return;
    }
    ctx.transport().notify(
        peer,
        Event::Notify {
            kind: kind.to_string(),
            args: vec![value],
        },
    );
}

/// Switch every channel of the ethernet microphone streaming as `stream`.
fn set_ethernet_mic(ctx: &StateContext<'_>, stream: &str, mode: &str) -> dws_control::Result<()> {
    tracing::debug!(stream, mode, "Setting ethernet mic");
    for channel in 1..=8 {
        ctx.device().configure(
            &format!("Audio.Input.Ethernet.{stream}.Channel.{channel}.Mode"),
            mode,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dws_control::{EventBus, InMemoryDevice, Node, NodeParts, PanelDefinition, PanelModel};
    use dws_core::{DeviceDescriptor, DeviceIdentity, Roster};
    use dws_store::MemoryStore;
    use dws_transport::{RecordingPeerClient, TransportConfig};

    use super::*;

    struct Room {
        node: Arc<Node>,
        device: Arc<InMemoryDevice>,
        panel: Arc<PanelModel>,
        recorder: Arc<RecordingPeerClient>,
        events: EventBus,
    }

    fn room(identity: &str, heartbeat: &HeartbeatConfig) -> Room {
        let roster = Roster::new(vec![
            DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA").unwrap(),
            DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB").unwrap(),
        ])
        .unwrap();
        let events = EventBus::new();
        let device = Arc::new(InMemoryDevice::new());
        let panel = Arc::new(PanelModel::new(events.clone()));
        let recorder = Arc::new(RecordingPeerClient::new());
        let node = Node::new(NodeParts {
            resolved: roster.resolve(&DeviceIdentity::new(identity).unwrap()).unwrap(),
            namespace: "divisibleWorkspaces".into(),
            states: standard_pairing(heartbeat, &LockPrompt::default()).unwrap(),
            store: Arc::new(MemoryStore::new()),
            client: recorder.clone(),
            transport: TransportConfig::default(),
            device: device.clone(),
            panel: panel.clone(),
            panel_definition: PanelDefinition::default(),
            events: events.clone(),
        })
        .unwrap();

        let node = Arc::new(node);
        let runner = Arc::clone(&node);
        tokio::spawn(async move { runner.run().await });

        Room {
            node,
            device,
            panel,
            recorder,
            events,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn state(name: &str) -> StateName {
        StateName::new(name).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_combined_hands_over_control() {
        let room = room("BBBBBBBBBBBB", &HeartbeatConfig::default());
        room.node.start(state(COMBINED)).unwrap();
        settle().await;

        let primary = Role::new(PRIMARY).unwrap();
        let heartbeat = room.node.services().heartbeat.clone();
        assert_eq!(heartbeat.sending_period(&primary), Some(Duration::from_secs(60)));
        assert_eq!(
            heartbeat.listening(&primary),
            Some((state(DIVIDED), Duration::from_secs(600)))
        );

        let view = room.panel.view();
        assert_eq!(view.locked, Some(LockPrompt::default()));
        assert_eq!(room.device.setting("Standby.Control").as_deref(), Some("Off"));
        assert_eq!(
            room.device.setting("Audio.Ultrasound.MaxVolume").as_deref(),
            Some("0")
        );
        assert_eq!(
            room.device.commands(),
            vec!["Conference.DoNotDisturb.Activate".to_string()]
        );

        room.node
            .request_state(state(DIVIDED), dws_control::Origin::Local)
            .unwrap();
        settle().await;

        assert_eq!(heartbeat.sending_period(&primary), None);
        assert_eq!(heartbeat.listening(&primary), None);
        assert_eq!(room.panel.view().locked, None);
        assert_eq!(room.device.setting("Standby.Control").as_deref(), Some("On"));
        assert_eq!(
            room.device.setting("Audio.Ultrasound.MaxVolume").as_deref(),
            Some("70")
        );
        room.node.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn primary_combined_relays_local_events() {
        let room = room("AAAAAAAAAAAA", &HeartbeatConfig::default());
        room.node.start(state(COMBINED)).unwrap();
        settle().await;

        assert_eq!(
            room.device
                .setting("Audio.Input.Ethernet.tcc2-pri2.Channel.8.Mode")
                .as_deref(),
            Some("On")
        );

        room.events
            .publish(&local_topic("volumeChange"), vec!["45".into()]);
        room.events
            .publish(&local_topic("standby"), vec!["Halfwake".into()]);
        tokio::time::sleep(Duration::from_millis(400)).await;

        let payloads = room.recorder.payloads();
        assert!(payloads.contains(&"divisibleWorkspaces-Primary-volumeChange-45".to_string()));
        assert!(payloads.contains(&"divisibleWorkspaces-Primary-standby-Halfwake".to_string()));

        room.node
            .request_state(state(DIVIDED), dws_control::Origin::Local)
            .unwrap();
        settle().await;
        room.recorder.clear();

        room.events
            .publish(&local_topic("volumeChange"), vec!["50".into()]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(room
            .recorder
            .payloads()
            .iter()
            .all(|p| !p.contains("volumeChange")));
        assert_eq!(
            room.device.setting("Audio.Output.HDMI.3.Mode").as_deref(),
            Some("Off")
        );
        assert_eq!(
            room.device
                .setting("Audio.Input.Ethernet.tcc2-pri2.Channel.1.Mode")
                .as_deref(),
            Some("Off")
        );
        room.node.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn primary_combined_sends_current_status() {
        let room = room("AAAAAAAAAAAA", &HeartbeatConfig::default());
        room.device.set_status("Standby.State", "Off");
        room.device.set_status("Audio.Volume", "60");
        room.device.set_status("Audio.VolumeMute", "bad value");

        room.node.start(state(COMBINED)).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let payloads = room.recorder.payloads();
        assert!(payloads.contains(&"divisibleWorkspaces-Primary-standby-Off".to_string()));
        assert!(payloads.contains(&"divisibleWorkspaces-Primary-volumeChange-60".to_string()));
        assert!(payloads.iter().all(|p| !p.contains("volumeMute")));
        room.node.shutdown().unwrap();
    }

    #[test]
    fn relayed_kinds_map_to_status() {
        assert_eq!(status_path("volumeChange"), Some("Audio.Volume"));
        assert_eq!(status_path("standby"), Some("Standby.State"));
        assert_eq!(status_path("heartbeat"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_can_be_disabled() {
        let heartbeat = HeartbeatConfig {
            enabled: false,
            ..HeartbeatConfig::default()
        };
        let room = room("BBBBBBBBBBBB", &heartbeat);
        room.node.start(state(COMBINED)).unwrap();
        settle().await;

        let primary = Role::new(PRIMARY).unwrap();
        assert_eq!(room.node.services().heartbeat.sending_period(&primary), None);
        assert_eq!(room.node.services().heartbeat.listening(&primary), None);
        assert!(room.panel.view().locked.is_some());
        room.node.shutdown().unwrap();
    }

    #[test]
    fn both_roles_define_both_states() {
        let table = standard_pairing(&HeartbeatConfig::default(), &LockPrompt::default()).unwrap();
        for role in [PRIMARY, SECONDARY] {
            let states = table.for_role(&Role::new(role).unwrap()).unwrap();
            assert_eq!(states.names(), vec![state(DIVIDED), state(COMBINED)]);
        }
    }
}
