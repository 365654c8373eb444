//! A small in-process event bus with releasable subscriptions.
//!
//! Local device events (`local.*`), peer notifications (`remote.*`) and panel
//! presses (`panel.press`) are all published here. Entry actions subscribe
//! through their [`StateContext`](crate::StateContext) so the subscriptions
//! are released when the next state is applied.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Topic published by the panel surface when a state button is pressed.
pub const PANEL_PRESS: &str = "panel.press";

/// Topic prefix for events forwarded from peers.
pub const REMOTE_PREFIX: &str = "remote.";

/// Topic prefix for events raised by the local device.
pub const LOCAL_PREFIX: &str = "local.";

/// Topic under which a peer notification of `kind` is published.
#[must_use]
pub fn remote_topic(kind: &str) -> String {
    format!("{REMOTE_PREFIX}{kind}")
}

/// Topic under which a local device event of `kind` is published.
#[must_use]
pub fn local_topic(kind: &str) -> String {
    format!("{LOCAL_PREFIX}{kind}")
}

/// One published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    /// The topic it was published under.
    pub topic: String,
    /// Event arguments.
    pub args: Vec<String>,
}

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    topics: HashMap<String, Vec<(u64, Handler)>>,
}

/// Topic-addressed publish/subscribe.
///
/// Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("topics", &inner.topics.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// released or dropped.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .topics
                .entry(topic.clone())
                .or_default()
                .push((id, Arc::new(handler)));
            id
        };

        let bus = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(bus) = bus.upgrade() {
                let mut inner = bus.lock();
                if let Some(handlers) = inner.topics.get_mut(&topic) {
                    handlers.retain(|(h, _)| *h != id);
                    if handlers.is_empty() {
                        inner.topics.remove(&topic);
                    }
                }
            }
        })
    }

    /// Deliver an event to every handler of `topic`.
    ///
    /// Returns the number of handlers called. Handlers run outside the bus
    /// lock, so they may subscribe or publish themselves.
    pub fn publish(&self, topic: &str, args: Vec<String>) -> usize {
        let handlers: Vec<Handler> = self
            .inner
            .lock()
            .topics
            .get(topic)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!(topic, "No subscribers for event");
            return 0;
        }

        let event = BusEvent {
            topic: topic.to_string(),
            args,
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    /// Number of handlers registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.lock().topics.get(topic).map_or(0, Vec::len)
    }
}

/// A handle to one registration. Releasing it is idempotent.
#[must_use = "dropping a subscription releases it"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a release callback.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Returns true once the subscription has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// The subscriptions registered by one active state.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    handles: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a subscription.
    pub fn push(&mut self, subscription: Subscription) {
        self.handles.push(subscription);
    }

    /// Release and forget every tracked subscription.
    ///
    /// Returns how many were released.
    pub fn clear(&mut self) -> usize {
        let count = self.handles.len();
        for mut handle in self.handles.drain(..) {
            handle.release();
        }
        count
    }

    /// Number of tracked subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
