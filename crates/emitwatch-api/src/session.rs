//! Session-expiry signal shared by every request path.
//!
//! When any call detects that the bearer token is no longer accepted, the
//! transport layer raises [`SessionEvent::Expired`] on this channel. Any
//! collaborator (a login prompt, a router, a CLI) can subscribe; the
//! stream client itself only suppresses its own error reporting.

use tokio::sync::broadcast;

const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Events published on a [`SessionSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server rejected the credentials (HTTP 401 or `J403`).
    Expired,
}

/// Cloneable handle to the session-expiry broadcast channel.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Announce that the session has expired.
    pub fn expire(&self) {
        tracing::info!("session expired, notifying subscribers");
        // No subscribers is fine: nobody cares about expiry right now.
        let _ = self.tx.send(SessionEvent::Expired);
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}
