//! Session lifecycle: close handshake and failure states.

use crate::message::CloseFrame;

/// Connection lifecycle state.
///
/// The engine starts at `Open` (the upgrade handshake happens externally).
/// `Closing` means we sent a close frame and are draining the peer's frames
/// until its close arrives. `Closed` is a completed close handshake;
/// `Failed` is entered after a protocol violation. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Data flows in both directions.
    #[default]
    Open,
    /// A close frame was sent; waiting for the peer's close.
    Closing,
    /// Close handshake complete.
    Closed,
    /// Connection failed due to a protocol violation.
    Failed,
}

impl ConnectionState {
    /// Check if the connection is fully open.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if data messages can still be sent.
    #[inline]
    #[must_use]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if frames can still be received.
    ///
    /// Reads continue while `Closing`: the peer's close frame has not
    /// arrived yet.
    #[inline]
    #[must_use]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Check if the connection has terminated.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
            ConnectionState::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

/// Shared close-handshake bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub status: ConnectionState,
    /// We have written a close frame (application close, echo, or failure).
    pub close_sent: bool,
    /// The peer's close frame has arrived.
    pub close_received: bool,
    /// The peer's decoded close frame, if it carried a status.
    pub peer_close: Option<CloseFrame>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
