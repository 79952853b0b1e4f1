//! Connection state tracking.
//!
//! §4.5 / §6: `isConnected` flips to `true` the moment the transport opens
//! (before the `complete` handshake reply even arrives) and back to
//! `false` on close. `connected$` is exposed as a `tokio::sync::watch`
//! receiver so callers can await transitions instead of polling.
//!
//! In external transport mode the connected/disconnected lifecycle is the
//! host's concern (§4.6): the manager still exists, but nothing in this
//! crate flips it, so it stays `false`.

use tokio::sync::watch;

/// Tracks whether the client currently has an open transport and
/// publishes transitions to any number of observers.
pub struct ConnectionManager {
    tx: watch::Sender<bool>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        ConnectionManager { tx }
    }

    /// Current connection status (`isConnected`).
    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// A live view of connection status (`connected$`).
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn set_connected(&self, connected: bool) {
        let _ = self.tx.send(connected);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let manager = ConnectionManager::new();
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn observers_see_transitions() {
        let manager = ConnectionManager::new();
        let mut rx = manager.subscribe();

        manager.set_connected(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        manager.set_connected(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}
