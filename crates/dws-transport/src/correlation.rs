//! Pending status requests awaiting a reply.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dws_core::{Role, StateName};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Status requests in flight, keyed by a request id.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<u64, (Role, oneshot::Sender<StateName>)>>,
}

impl PendingRequests {
    /// Register a listener for the next status reply from `role`.
    pub(crate) fn register(&self, role: Role) -> (u64, oneshot::Receiver<StateName>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().insert(id, (role, tx));
        (id, rx)
    }

    /// Remove a listener. Missing ids are ignored.
    pub(crate) fn remove(&self, id: u64) {
        self.waiting.lock().remove(&id);
    }

    /// Deliver `state` to every listener waiting on `role`.
    ///
    /// Returns the number of listeners resolved. Each listener is removed
    /// before it is resolved, so a second reply cannot reach it.
    pub(crate) fn resolve(&self, role: &Role, state: &StateName) -> usize {
        let resolved: Vec<oneshot::Sender<StateName>> = {
            let mut waiting = self.waiting.lock();
            let ids: Vec<u64> = waiting
                .iter()
                .filter(|(_, (r, _))| r == role)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| waiting.remove(&id).map(|(_, tx)| tx))
                .collect()
        };

        resolved
            .into_iter()
            .filter_map(|tx| tx.send(state.clone()).ok())
            .count()
    }

    /// Number of listeners currently registered.
    pub(crate) fn len(&self) -> usize {
        self.waiting.lock().len()
    }
}

/// Removes its listener when dropped, whichever way the request ends.
pub(crate) struct PendingGuard<'a> {
    pub(crate) pending: &'a PendingRequests,
    pub(crate) id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role {
        Role::new(name).unwrap()
    }

    fn state(name: &str) -> StateName {
        StateName::new(name).unwrap()
    }

    #[tokio::test]
    async fn resolves_only_matching_role() {
        let pending = PendingRequests::default();
        let (_, primary) = pending.register(role("Primary"));
        let (_, _secondary) = pending.register(role("Secondary"));

        assert_eq!(pending.resolve(&role("Primary"), &state("Combined")), 1);
        assert_eq!(primary.await.unwrap(), state("Combined"));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn second_reply_finds_nothing() {
        let pending = PendingRequests::default();
        let (_, _rx) = pending.register(role("Primary"));

        assert_eq!(pending.resolve(&role("Primary"), &state("Combined")), 1);
        assert_eq!(pending.resolve(&role("Primary"), &state("Divided")), 0);
    }

    #[test]
    fn abandoned_listener_is_not_counted() {
        let pending = PendingRequests::default();
        let (_, rx) = pending.register(role("Primary"));
        let (_, _kept) = pending.register(role("Primary"));
        drop(rx);

        assert_eq!(pending.resolve(&role("Primary"), &state("Divided")), 1);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn guard_removes_listener() {
        let pending = PendingRequests::default();
        let (id, _rx) = pending.register(role("Primary"));
        {
            let _guard = PendingGuard {
                pending: &pending,
                id,
            };
        }
        assert_eq!(pending.len(), 0);
    }
}
