//! Debounced, per-peer batching of outgoing messages.
//!
//! Every payload sent to a peer joins that peer's buffer. The first payload
//! into an empty buffer arms a debounce timer; when it fires the buffer is
//! detached and posted as one [`Envelope`]. Payloads sent while a batch is in
//! flight start a new buffer with its own timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dws_core::{DeviceDescriptor, Event, Message, Resolved, Role, StateName, TimerHandle};
use parking_lot::Mutex;

use crate::client::PeerClient;
use crate::config::TransportConfig;
use crate::correlation::{PendingGuard, PendingRequests};
use crate::dispatch::{Dispatched, InboundHandler};
use crate::envelope::Envelope;
use crate::error::{Result, TransportError};

struct PeerBuffer {
    peer: DeviceDescriptor,
    payloads: Vec<String>,
    generation: u64,
    timer: TimerHandle,
}

struct Inner {
    namespace: String,
    local: DeviceDescriptor,
    peers: Vec<DeviceDescriptor>,
    client: Arc<dyn PeerClient>,
    config: TransportConfig,
    buffers: Mutex<HashMap<String, PeerBuffer>>,
    generation: AtomicU64,
    pending: PendingRequests,
}

/// Outgoing and inbound messaging for one device.
///
/// Cheap to clone; clones share buffers and pending requests.
#[derive(Clone)]
pub struct MessageTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MessageTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTransport")
            .field("namespace", &self.inner.namespace)
            .field("local", &self.inner.local.role)
            .field("peers", &self.inner.peers.len())
            .finish_non_exhaustive()
    }
}

impl MessageTransport {
    /// Create a transport for the resolved local device.
    #[must_use]
    pub fn new(
        resolved: &Resolved,
        namespace: impl Into<String>,
        client: Arc<dyn PeerClient>,
        config: TransportConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                local: resolved.local().clone(),
                peers: resolved.peers().to_vec(),
                client,
                config,
                buffers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                pending: PendingRequests::default(),
            }),
        }
    }

    /// The namespace every message is sent and accepted under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// The local device's role.
    #[must_use]
    pub fn local_role(&self) -> &Role {
        &self.inner.local.role
    }

    /// Enqueue `payload` for `peer`.
    ///
    /// Arms the debounce timer if the peer's buffer was empty. Must be called
    /// from within a `tokio` runtime.
    pub fn send(&self, peer: &DeviceDescriptor, payload: impl Into<String>) {
        let payload = payload.into();
        let mut buffers = self.inner.buffers.lock();

        if let Some(buffer) = buffers.get_mut(&peer.address) {
            buffer.payloads.push(payload);
            return;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let transport = self.clone();
        let address = peer.address.clone();
        let timer = TimerHandle::after(self.inner.config.debounce(), async move {
            transport.flush_due(&address, generation).await;
        });

        buffers.insert(
            peer.address.clone(),
            PeerBuffer {
                peer: peer.clone(),
                payloads: vec![payload],
                generation,
                timer,
            },
        );
    }

    /// Encode `event` and send it to every peer holding `role`.
    ///
    /// Returns the number of peers addressed.
    pub fn notify(&self, role: &Role, event: Event) -> usize {
        let payload =
            Message::new(self.inner.local.role.clone(), event).encode(&self.inner.namespace);

        let mut sent = 0;
        for peer in self.inner.peers.iter().filter(|p| &p.role == role) {
            self.send(peer, payload.clone());
            sent += 1;
        }

        if sent == 0 {
            tracing::warn!(%role, "No peer with role, message not sent");
        }
        sent
    }

    /// Post the buffer for `address` now, cancelling its pending timer.
    ///
    /// Does nothing if the buffer is empty.
    pub async fn flush(&self, address: &str) {
        let taken = self.inner.buffers.lock().remove(address);
        if let Some(buffer) = taken {
            let PeerBuffer {
                peer,
                payloads,
                timer,
                ..
            } = buffer;
            drop(timer);
            self.post(peer, payloads).await;
        }
    }

    /// Post every non-empty buffer now.
    pub async fn flush_all(&self) {
        let taken: Vec<PeerBuffer> = self.inner.buffers.lock().drain().map(|(_, b)| b).collect();
        let posts = taken.into_iter().map(|buffer| {
            let PeerBuffer {
                peer,
                payloads,
                timer,
                ..
            } = buffer;
            drop(timer);
            self.post(peer, payloads)
        });
        futures::future::join_all(posts).await;
    }

    /// Number of payloads waiting for `address`.
    #[must_use]
    pub fn buffered(&self, address: &str) -> usize {
        self.inner
            .buffers
            .lock()
            .get(address)
            .map_or(0, |b| b.payloads.len())
    }

    /// Ask every peer holding `role` for its current state.
    ///
    /// Resolves with the first status reply from that role. The listener is
    /// removed on completion, on timeout and if the returned future is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::NoPeer` if no peer holds `role` and
    /// `TransportError::Timeout` if no reply arrives in time.
    pub async fn request_status(&self, role: &Role) -> Result<StateName> {
        let (id, reply) = self.inner.pending.register(role.clone());
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id,
        };

        if self.notify(role, Event::StatusRequest) == 0 {
            return Err(TransportError::NoPeer(role.clone()));
        }

        let waited = self.inner.config.status_timeout();
        match tokio::time::timeout(waited, reply).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(%role, ?waited, "Status request timed out");
                Err(TransportError::Timeout {
                    role: role.clone(),
                    waited,
                })
            }
        }
    }

    /// Number of status requests still waiting for a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Decode one inbound payload and route it.
    ///
    /// Payloads from another namespace or with a malformed shape are logged
    /// and discarded.
    pub fn dispatch(&self, payload: &str, handler: &dyn InboundHandler) -> Dispatched {
        let message = match Message::decode(&self.inner.namespace, payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, payload, "Discarding inbound payload");
                return Dispatched::Discarded;
            }
        };

        let Message { sender, event } = message;
        tracing::debug!(%sender, kind = event.kind(), "Inbound message");

        match event {
            Event::Status(state) => {
                Dispatched::StatusReply(self.inner.pending.resolve(&sender, &state))
            }
            Event::ChangeState(state) => {
                handler.on_change_state(&sender, state);
                Dispatched::Routed
            }
            Event::Heartbeat => {
                handler.on_heartbeat(&sender);
                Dispatched::Routed
            }
            Event::StatusRequest => {
                handler.on_status_request(&sender);
                Dispatched::Routed
            }
            Event::Notify { kind, args } => {
                handler.on_notify(&sender, &kind, &args);
                Dispatched::Routed
            }
        }
    }

    async fn flush_due(&self, address: &str, generation: u64) {
        let taken = {
            let mut buffers = self.inner.buffers.lock();
            match buffers.get(address) {
                Some(buffer) if buffer.generation == generation => buffers.remove(address),
                _ => None,
            }
        };

        if let Some(buffer) = taken {
            let PeerBuffer {
                peer,
                payloads,
                timer,
                ..
            } = buffer;
            // Running inside this timer's own task.
            timer.disarm();
            self.post(peer, payloads).await;
        }
    }

    async fn post(&self, peer: DeviceDescriptor, payloads: Vec<String>) {
        if payloads.is_empty() {
            return;
        }

        let count = payloads.len();
        let envelope = Envelope {
            app: self.inner.namespace.clone(),
            source: self.inner.local.address.clone(),
            messages: payloads,
        };

        if let Err(e) = self.inner.client.post_batch(&peer, &envelope).await {
            tracing::warn!(
                peer = %peer.role,
                address = %peer.address,
                count,
                error = %e,
                "Dropping undelivered batch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dws_core::{DeviceIdentity, Roster};

    use super::*;
    use crate::client::RecordingPeerClient;

    fn resolved(identity: &str) -> Resolved {
        Roster::new(vec![
            DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA").unwrap(),
            DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB").unwrap(),
        ])
        .unwrap()
        .resolve(&DeviceIdentity::new(identity).unwrap())
        .unwrap()
    }

    fn primary() -> (MessageTransport, Arc<RecordingPeerClient>) {
        let recorder = Arc::new(RecordingPeerClient::new());
        let transport = MessageTransport::new(
            &resolved("AAAAAAAAAAAA"),
            "divisibleWorkspaces",
            recorder.clone(),
            TransportConfig::default(),
        );
        (transport, recorder)
    }

    fn secondary_peer(transport: &MessageTransport) -> DeviceDescriptor {
        transport.inner.peers[0].clone()
    }

    #[derive(Default)]
    struct Recorded {
        calls: Mutex<Vec<String>>,
    }

    impl InboundHandler for Recorded {
        fn on_change_state(&self, sender: &Role, state: StateName) {
            self.calls.lock().push(format!("change {sender} {state}"));
        }

        fn on_heartbeat(&self, sender: &Role) {
            self.calls.lock().push(format!("heartbeat {sender}"));
        }

        fn on_status_request(&self, sender: &Role) {
            self.calls.lock().push(format!("status? {sender}"));
        }

        fn on_notify(&self, sender: &Role, kind: &str, args: &[String]) {
            self.calls
                .lock()
                .push(format!("{kind} {sender} {}", args.join(",")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sends_within_window_form_one_batch() {
        let (transport, recorder) = primary();
        let peer = secondary_peer(&transport);

        for i in 0..5 {
            transport.send(&peer, format!("m{i}"));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(recorder.batches().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let batches = recorder.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.messages, vec!["m0", "m1", "m2", "m3", "m4"]);
        assert_eq!(batches[0].1.source, "10.0.0.1");
        assert_eq!(batches[0].0.address, "10.0.0.2");
    }

    #[tokio::test(start_paused = true)]
    async fn send_after_flush_starts_new_buffer() {
        let (transport, recorder) = primary();
        let peer = secondary_peer(&transport);

        transport.send(&peer, "first");
        tokio::time::sleep(Duration::from_millis(301)).await;
        transport.send(&peer, "second");
        assert_eq!(transport.buffered("10.0.0.2"), 1);

        tokio::time::sleep(Duration::from_millis(301)).await;
        let batches = recorder.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].1.messages, vec!["second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_flush_cancels_timer() {
        let (transport, recorder) = primary();
        let peer = secondary_peer(&transport);

        transport.send(&peer, "now");
        transport.flush("10.0.0.2").await;
        assert_eq!(recorder.batches().len(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.batches().len(), 1);

        transport.flush("10.0.0.2").await;
        assert_eq!(recorder.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_post_is_dropped() {
        let (transport, recorder) = primary();
        let peer = secondary_peer(&transport);
        recorder.set_failing(true);

        transport.send(&peer, "lost");
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(transport.buffered("10.0.0.2"), 0);

        recorder.set_failing(false);
        transport.send(&peer, "kept");
        transport.flush_all().await;
        assert_eq!(recorder.payloads(), vec!["lost", "kept"]);
    }

    #[tokio::test(start_paused = true)]
    async fn notify_addresses_role() {
        let (transport, recorder) = primary();

        assert_eq!(transport.notify(&Role::new("Secondary").unwrap(), Event::Heartbeat), 1);
        assert_eq!(transport.notify(&Role::new("Tertiary").unwrap(), Event::Heartbeat), 0);
        transport.flush_all().await;

        assert_eq!(
            recorder.payloads(),
            vec!["divisibleWorkspaces-Primary-heartbeat"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn request_status_resolves_on_reply() {
        let (transport, recorder) = primary();
        let handler = Recorded::default();

        let waiter = tokio::spawn({
            let transport = transport.clone();
            async move {
                transport
                    .request_status(&Role::new("Secondary").unwrap())
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            recorder.payloads(),
            vec!["divisibleWorkspaces-Primary-statusRequest"]
        );

        let outcome =
            transport.dispatch("divisibleWorkspaces-Secondary-status-Combined", &handler);
        assert_eq!(outcome, Dispatched::StatusReply(1));

        let state = waiter.await.unwrap().unwrap();
        assert_eq!(state.as_str(), "Combined");
        assert_eq!(transport.pending_requests(), 0);

        let late = transport.dispatch("divisibleWorkspaces-Secondary-status-Divided", &handler);
        assert_eq!(late, Dispatched::StatusReply(0));
        assert!(handler.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn request_status_times_out() {
        let (transport, _recorder) = primary();

        let err = transport
            .request_status(&Role::new("Secondary").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout { .. }));
        assert_eq!(transport.pending_requests(), 0);
    }

    #[tokio::test]
    async fn request_status_without_peer() {
        let (transport, _recorder) = primary();
        let err = transport
            .request_status(&Role::new("Tertiary").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoPeer(_)));
        assert_eq!(transport.pending_requests(), 0);
    }

    #[tokio::test]
    async fn dispatch_routes_events() {
        let (transport, _recorder) = primary();
        let handler = Recorded::default();

        for payload in [
            "divisibleWorkspaces-Secondary-heartbeat",
            "divisibleWorkspaces-Secondary-changeState-Divided",
            "divisibleWorkspaces-Secondary-statusRequest",
            "divisibleWorkspaces-Secondary-standby-Off",
        ] {
            assert_eq!(transport.dispatch(payload, &handler), Dispatched::Routed);
        }

        assert_eq!(
            *handler.calls.lock(),
            vec![
                "heartbeat Secondary",
                "change Secondary Divided",
                "status? Secondary",
                "standby Secondary Off",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_discarded() {
        let (transport, recorder) = primary();
        let handler = Recorded::default();
        let peer = secondary_peer(&transport);

        transport.send(&peer, "queued");
        for payload in ["otherApp-Secondary-heartbeat", "garbage", "divisibleWorkspaces-Secondary"] {
            assert_eq!(transport.dispatch(payload, &handler), Dispatched::Discarded);
        }
        assert!(handler.calls.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(recorder.payloads(), vec!["queued"]);
    }
}
