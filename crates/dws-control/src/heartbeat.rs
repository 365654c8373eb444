//! Heartbeat send and listen entries.
//!
//! A send entry emits `heartbeat` to a role on a fixed period. A listen entry
//! is a sliding deadline for heartbeats from a role; when it expires without
//! one, the entry is removed and its fallback state is requested once.
//!
//! Both maps hold at most one entry per role. Starting again replaces the old
//! entry, and the replaced timer is cancelled when its handle drops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dws_core::{Event, Role, StateName, TimerHandle};
use dws_transport::MessageTransport;
use parking_lot::Mutex;

use crate::request::{Origin, StateRequester};

struct SendEntry {
    period: Duration,
    _timer: TimerHandle,
}

struct ListenEntry {
    fallback: StateName,
    timeout: Duration,
    generation: u64,
    timer: TimerHandle,
}

struct MonitorInner {
    transport: MessageTransport,
    requester: StateRequester,
    sends: Mutex<HashMap<Role, SendEntry>>,
    listens: Mutex<HashMap<Role, ListenEntry>>,
    generation: AtomicU64,
}

/// Tracks heartbeat timers per peer role.
///
/// Cheap to clone; clones share entries.
#[derive(Clone)]
pub struct HeartbeatMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("sending", &self.inner.sends.lock().len())
            .field("listening", &self.inner.listens.lock().len())
            .finish()
    }
}

impl HeartbeatMonitor {
    /// Create a monitor that sends through `transport` and reports expired
    /// deadlines to `requester`.
    #[must_use]
    pub fn new(transport: MessageTransport, requester: StateRequester) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                transport,
                requester,
                sends: Mutex::new(HashMap::new()),
                listens: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Send a heartbeat to `role` every `period`, replacing any existing
    /// send entry for it. The first heartbeat goes out one period from now.
    pub fn start_sending(&self, role: &Role, period: Duration) {
        let transport = self.inner.transport.clone();
        let target = role.clone();
        let timer = TimerHandle::every(period, move || {
            transport.notify(&target, Event::Heartbeat);
            std::future::ready(())
        });

        tracing::info!(%role, ?period, "Sending heartbeats");
        self.inner.sends.lock().insert(
            role.clone(),
            SendEntry {
                period,
                _timer: timer,
            },
        );
    }

    /// Stop sending heartbeats to `role`. No-op if not sending.
    pub fn stop_sending(&self, role: &Role) {
        if self.inner.sends.lock().remove(role).is_some() {
            tracing::info!(%role, "Stopped sending heartbeats");
        }
    }

    /// Expect a heartbeat from `role` at least every `timeout`; otherwise
    /// request `fallback` once. Replaces any existing listen entry for the
    /// role with the new fallback and timeout.
    pub fn start_listening(&self, role: &Role, fallback: StateName, timeout: Duration) {
        tracing::info!(%role, %fallback, ?timeout, "Listening for heartbeats");
        self.arm(role, fallback, timeout);
    }

    /// Stop listening for `role`. No-op if not listening.
    pub fn stop_listening(&self, role: &Role) {
        if self.inner.listens.lock().remove(role).is_some() {
            tracing::info!(%role, "Stopped listening for heartbeats");
        }
    }

    /// Cancel every send and listen entry.
    pub fn stop_all(&self) {
        let sends = std::mem::take(&mut *self.inner.sends.lock());
        let listens = std::mem::take(&mut *self.inner.listens.lock());
        if !sends.is_empty() || !listens.is_empty() {
            tracing::info!(
                sending = sends.len(),
                listening = listens.len(),
                "Stopped all heartbeats"
            );
        }
    }

    /// Record a heartbeat from `role`.
    ///
    /// Re-arms the listen deadline for the role with its current fallback and
    /// timeout. Returns false, and does nothing, if not listening for it.
    pub fn on_heartbeat(&self, role: &Role) -> bool {
        let replaced = {
            let mut listens = self.inner.listens.lock();
            listens.get_mut(role).map(|entry| {
                let generation = self.inner.next_generation();
                let timer = self.deadline(role, generation, entry.timeout);
                entry.generation = generation;
                std::mem::replace(&mut entry.timer, timer)
            })
        };

        match replaced {
            Some(_) => {
                tracing::debug!(%role, "Heartbeat received, resetting deadline");
                true
            }
            None => {
                tracing::debug!(%role, "Heartbeat from role not being listened for");
                false
            }
        }
    }

    /// Returns the period if sending to `role`.
    #[must_use]
    pub fn sending_period(&self, role: &Role) -> Option<Duration> {
        self.inner.sends.lock().get(role).map(|entry| entry.period)
    }

    /// Returns the fallback state and timeout if listening for `role`.
    #[must_use]
    pub fn listening(&self, role: &Role) -> Option<(StateName, Duration)> {
        self.inner
            .listens
            .lock()
            .get(role)
            .map(|entry| (entry.fallback.clone(), entry.timeout))
    }

    fn arm(&self, role: &Role, fallback: StateName, timeout: Duration) {
        let generation = self.inner.next_generation();
        let timer = self.deadline(role, generation, timeout);

        // The replaced entry's timer is cancelled when it drops here.
        self.inner.listens.lock().insert(
            role.clone(),
            ListenEntry {
                fallback,
                timeout,
                generation,
                timer,
            },
        );
    }

    fn deadline(&self, role: &Role, generation: u64, timeout: Duration) -> TimerHandle {
        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let target = role.clone();
        TimerHandle::after(timeout, async move {
            if let Some(inner) = weak.upgrade() {
                inner.expire(&target, generation);
            }
        })
    }
}

impl MonitorInner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    fn expire(&self, role: &Role, generation: u64) {
        let expired = {
            let mut listens = self.listens.lock();
            match listens.get(role) {
                Some(entry) if entry.generation == generation => listens.remove(role),
                _ => None,
            }
        };

        if let Some(entry) = expired {
            let ListenEntry {
                fallback,
                timeout,
                timer,
                ..
            } = entry;
            // Running inside this timer's own task.
            timer.disarm();
            tracing::warn!(
                %role,
                %fallback,
                ?timeout,
                "No heartbeat from peer, falling back"
            );
            self.requester
                .request(fallback, Origin::Fallback(role.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pair, state, Requests};

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn steady_heartbeats_never_fire() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_listening(&primary, state("Divided"), 10 * MINUTE);
        for _ in 0..30 {
            tokio::time::sleep(9 * MINUTE).await;
            assert!(monitor.on_heartbeat(&primary));
        }

        assert!(requests.take().is_empty());
        assert!(monitor.listening(&primary).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_fires_fallback_once() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_listening(&primary, state("Divided"), 10 * MINUTE);
        tokio::time::sleep(10 * MINUTE - Duration::from_secs(1)).await;
        assert!(requests.take().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            requests.take(),
            vec![(state("Divided"), Origin::Fallback(primary.clone()))]
        );
        assert!(monitor.listening(&primary).is_none());

        tokio::time::sleep(60 * MINUTE).await;
        assert!(requests.take().is_empty());
        assert!(!monitor.on_heartbeat(&primary));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_listening_replaces_entry() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_listening(&primary, state("Divided"), MINUTE);
        monitor.start_listening(&primary, state("Standalone"), 5 * MINUTE);
        assert_eq!(
            monitor.listening(&primary),
            Some((state("Standalone"), 5 * MINUTE))
        );

        tokio::time::sleep(2 * MINUTE).await;
        assert!(requests.take().is_empty());

        tokio::time::sleep(4 * MINUTE).await;
        assert_eq!(requests.take().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_listening_cancels_deadline() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_listening(&primary, state("Divided"), MINUTE);
        monitor.stop_listening(&primary);
        monitor.stop_listening(&primary);

        tokio::time::sleep(5 * MINUTE).await;
        assert!(requests.take().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn heartbeat_racing_stop_never_revives_entry() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        for _ in 0..2000 {
            monitor.start_listening(&primary, state("Divided"), 10 * MINUTE);

            let beating = monitor.clone();
            let role = primary.clone();
            let beat = tokio::spawn(async move { beating.on_heartbeat(&role) });
            let stopping = monitor.clone();
            let role = primary.clone();
            let stop = tokio::spawn(async move { stopping.stop_listening(&role) });

            beat.await.unwrap();
            stop.await.unwrap();
            assert!(monitor.listening(&primary).is_none());
        }
        assert!(requests.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_after_fallback_is_ignored() {
        let (transport, _) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_listening(&primary, state("Divided"), MINUTE);
        tokio::time::sleep(MINUTE + Duration::from_secs(1)).await;
        assert_eq!(requests.take().len(), 1);

        assert!(!monitor.on_heartbeat(&primary));
        assert!(monitor.listening(&primary).is_none());
        tokio::time::sleep(10 * MINUTE).await;
        assert!(requests.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sends_one_heartbeat_per_period() {
        let (transport, recorder) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_sending(&primary, MINUTE);
        monitor.start_sending(&primary, MINUTE);
        assert_eq!(monitor.sending_period(&primary), Some(MINUTE));

        tokio::time::sleep(3 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(
            recorder.payloads(),
            vec!["divisibleWorkspaces-Secondary-heartbeat"; 3]
        );

        monitor.stop_sending(&primary);
        tokio::time::sleep(3 * MINUTE).await;
        assert_eq!(recorder.payloads().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_cancels_everything() {
        let (transport, recorder) = pair("BBBBBBBBBBBB");
        let requests = Requests::default();
        let monitor = HeartbeatMonitor::new(transport, requests.requester());
        let primary = Role::new("Primary").unwrap();

        monitor.start_sending(&primary, MINUTE);
        monitor.start_listening(&primary, state("Divided"), 10 * MINUTE);
        monitor.stop_all();

        tokio::time::sleep(20 * MINUTE).await;
        assert!(recorder.payloads().is_empty());
        assert!(requests.take().is_empty());
        assert!(monitor.sending_period(&primary).is_none());
        assert!(monitor.listening(&primary).is_none());
    }
}
