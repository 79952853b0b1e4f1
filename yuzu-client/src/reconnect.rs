//! Reconnection scheduling.
//!
//! §4.5 / §9: a dead connection schedules exactly one reconnect timer at a
//! fixed interval (`reconnectTimeout`, default 3000ms) unless the close
//! was user-initiated (`disconnect`/`reconnect`). There is no exponential
//! backoff — this is a documented policy choice the port preserves
//! unchanged, not an oversight.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Default `reconnectTimeout` (§6).
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_millis(3000);

/// A single pending reconnect timer.
///
/// At most one exists per client at a time (§3: "at most one pending
/// reconnect timer"). Cancelling it (via `disconnect`/`reconnect`) drops
/// the `cancel` sender, which makes the scheduled task return early
/// without firing `on_fire`.
pub struct PendingReconnect {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PendingReconnect {
    /// Schedule `on_fire` to run after `delay`, unless cancelled first.
    pub fn schedule<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel, mut cancelled) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => on_fire(),
                _ = &mut cancelled => {}
            }
        });
        PendingReconnect { cancel, handle }
    }

    /// Cancel this timer. The one-shot design ensures no orphan timer
    /// survives a successful reconnect or an explicit `disconnect`.
    pub fn cancel(self) {
        let _ = self.cancel.send(());
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_after_the_configured_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let _timer = PendingReconnect::schedule(Duration::from_millis(10), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let timer = PendingReconnect::schedule(Duration::from_millis(30), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
