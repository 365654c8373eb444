//! Owned timer handles.
//!
//! Every timer in the system (heartbeat intervals, listen deadlines, flush
//! debounces) is a spawned `tokio` task owned through a [`TimerHandle`].
//! Cancelling is idempotent and dropping a handle cancels its timer, so a
//! handle replaced in a map can never leave a timer running behind it.

use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};

/// A cancellable, owned timer.
#[derive(Debug)]
pub struct TimerHandle {
    handle: Option<AbortHandle>,
}

impl TimerHandle {
    /// Run `work` once after `delay`.
    ///
    /// Must be called from within a `tokio` runtime.
    pub fn after<F>(delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        Self {
            handle: Some(task.abort_handle()),
        }
    }

    /// Run `tick` every `period`, starting one period from now.
    ///
    /// A period too long to schedule never ticks. Must be called from within
    /// a `tokio` runtime.
    ///
    /// # Panics
    ///
    /// The spawned task panics if `period` is zero.
    pub fn every<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        Self {
            handle: Some(task.abort_handle()),
        }
    }

    /// Cancel the timer. Calling this more than once is a no-op.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Returns true if the timer has been cancelled or has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, AbortHandle::is_finished)
    }

    /// Release ownership without cancelling.
    ///
    /// Used by a timer's own task when it tears down the entry that owns it.
    pub fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn after_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let _timer = TimerHandle::after(Duration::from_millis(300), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let mut timer = TimerHandle::after(Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.cancel();
        timer.cancel();
        assert!(timer.is_finished());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = TimerHandle::every(Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        drop(timer);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unschedulable_period_stays_armed() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = TimerHandle::every(Duration::MAX, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_keeps_running() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = TimerHandle::after(Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.disarm();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
