//! Cooperative cancellation for deferred widget work.
//!
//! Delayed mounts and tooltip timers hold an `AbortHandle`; unmounting
//! signals it so pending timers finish as no-ops instead of touching a
//! container that is gone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// One-shot cancellation flag shared by every timer of a mounted widget.
/// Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Idempotent.
    pub fn abort(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once `abort()` has been called, immediately if it already was.
    pub async fn wait_for_abort(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `task` unless the handle fires first; `None` when aborted.
pub async fn unless_aborted<T, F>(task: F, abort_handle: &AbortHandle) -> Option<T>
where
    F: Future<Output = T>,
{
    if abort_handle.is_aborted() {
        return None;
    }
    tokio::select! {
        result = task => Some(result),
        _ = abort_handle.wait_for_abort() => None,
    }
}

/// Sleep for `delay`; `false` if aborted before or during the wait.
pub async fn sleep_unless_aborted(delay: Duration, abort_handle: &AbortHandle) -> bool {
    unless_aborted(tokio::time::sleep(delay), abort_handle)
        .await
        .is_some()
        && !abort_handle.is_aborted()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn abort_wakes_waiters() {
        let handle = AbortHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle.wait_for_abort().await;
                true
            })
        };

        tokio::task::yield_now().await;
        handle.abort();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn task_completes_when_not_aborted() {
        let handle = AbortHandle::new();
        assert_eq!(unless_aborted(async { 7 }, &handle).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_sleep_is_cut_short() {
        let handle = AbortHandle::new();
        let sleeper = {
            let handle = handle.clone();
            tokio::spawn(async move { sleep_unless_aborted(Duration::from_secs(3600), &handle).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_after_abort_returns_immediately() {
        let handle = AbortHandle::new();
        handle.abort();
        assert!(!sleep_unless_aborted(Duration::from_secs(1), &handle).await);
    }

    #[tokio::test]
    async fn abort_is_shared_by_clones_and_idempotent() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_aborted());

        handle.abort();
        handle.abort();
        assert!(clone.is_aborted());
        clone.wait_for_abort().await;
        assert_eq!(unless_aborted(async { 7 }, &clone).await, None);
    }
}
