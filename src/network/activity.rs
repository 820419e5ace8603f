use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::watch;

/// Count of backend requests currently in flight, observable as a signal.
///
/// `begin` increments and the returned guard decrements when dropped, so a
/// request that fails, times out or is abandoned still settles the count.
#[derive(Debug)]
pub struct NetworkActivity {
    active: watch::Sender<usize>,
}

impl NetworkActivity {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self { active }
    }

    pub fn begin(&self) -> ActivityGuard<'_> {
        self.active.send_modify(|n| *n += 1);
        ActivityGuard { activity: self }
    }

    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.active() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.active.subscribe()
    }

    fn settle(&self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use = "dropping the guard immediately settles the request"]
pub struct ActivityGuard<'a> {
    activity: &'a NetworkActivity,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.activity.settle();
    }
}

// Process-wide counter shared by every client that does not bring its own
pub static NETWORK_ACTIVITY: Lazy<Arc<NetworkActivity>> = Lazy::new(|| Arc::new(NetworkActivity::new()));

pub fn network_activity() -> Arc<NetworkActivity> {
    NETWORK_ACTIVITY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_overlapping_requests() {
        let activity = NetworkActivity::new();
        let first = activity.begin();
        let second = activity.begin();
        assert_eq!(activity.active(), 2);

        drop(first);
        assert!(activity.is_busy());
        drop(second);
        assert!(!activity.is_busy());
    }

    #[tokio::test]
    async fn subscribers_see_busy_and_idle() {
        let activity = NetworkActivity::new();
        let mut rx = activity.subscribe();

        let guard = activity.begin();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        drop(guard);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 0);
    }
}
