//! Interrupt flag shared between the signal handler and the polling loop.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

/// Single-writer, single-reader cancellation token.
///
/// The signal side calls [`InterruptFlag::raise`]; the engine checks it at
/// every poll point with [`InterruptFlag::take`] and may park on
/// [`InterruptFlag::raised`] to wake up as soon as it is set.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    inner: Arc<Inner>,
}

impl InterruptFlag {
    /// Create a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an interrupt.
    pub fn raise(&self) {
        self.inner.requested.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Whether an interrupt is pending.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Consume a pending interrupt, returning whether one was set.
    pub fn take(&self) -> bool {
        self.inner.requested.swap(false, Ordering::AcqRel)
    }

    /// Lower the flag without observing it.
    pub fn clear(&self) {
        self.inner.requested.store(false, Ordering::Release);
    }

    /// Resolve once the flag is raised.
    pub async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_take_consumes() {
        let flag = InterruptFlag::new();
        assert!(!flag.take());
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = InterruptFlag::new();
        let signal_side = flag.clone();
        signal_side.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!signal_side.is_raised());
    }

    #[tokio::test]
    async fn test_raised_wakes_waiter() {
        let flag = InterruptFlag::new();
        let signal_side = flag.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal_side.raise();
        });

        tokio::time::timeout(Duration::from_secs(1), flag.raised())
            .await
            .unwrap();
        assert!(flag.is_raised());
    }

    #[tokio::test]
    async fn test_raised_returns_immediately_when_set() {
        let flag = InterruptFlag::new();
        flag.raise();
        tokio_test::assert_ready!(tokio_test::task::spawn(flag.raised()).poll());
    }
}
