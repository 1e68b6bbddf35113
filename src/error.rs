//! Error types for the WebSocket protocol engine.
//!
//! Every protocol violation has its own variant so callers can match on the
//! exact failure, and [`Error::close_code`] maps each violation class to the
//! RFC 6455 close code sent when the connection is failed.

use thiserror::Error;

use crate::message::{CloseCode, CloseFrame};

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Incomplete frame header.
    ///
    /// Internal to the read engine: more bytes must arrive from the
    /// transport before the header can be decoded.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Reserved opcode used (0x3-0x7, 0xB-0xF).
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without a negotiated extension covering them.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Control frame with FIN=0 (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked frame received by a server (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked frame received by a client (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Continuation frame with no message in progress.
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,

    /// New data frame while a fragmented message is in progress.
    #[error("Expected continuation frame")]
    ExpectedContinuation,

    /// Close frame carried a reserved or out-of-range status code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Invalid UTF-8 in a text message or close reason.
    #[error("Invalid UTF-8 payload")]
    InvalidUtf8,

    /// Message size exceeds the configured maximum.
    ///
    /// For compressed messages the limit applies to the inflated size.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The synthetic empty deflate block at end of message produced output.
    #[error("Partial deflate block at message end")]
    PartialDeflateBlock,

    /// Decompression or compression engine failure.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid permessage-deflate parameter (window bits, level).
    #[error("Invalid deflate parameter: {0}")]
    InvalidDeflateParameter(String),

    /// The peer closed the connection.
    ///
    /// Carries the peer's close frame when a clean close handshake was
    /// observed, `None` when the transport ended without one.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<CloseFrame>),

    /// Operation aborted: the session is already closed or failed.
    #[error("Operation aborted")]
    Aborted,

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// The close code sent to the peer when this error fails the connection.
    ///
    /// Returns `None` for errors that are outcomes rather than protocol
    /// violations (I/O failures, clean closes, aborted operations).
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::ReservedOpcode(_)
            | Error::ReservedBitsSet
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::UnexpectedContinuation
            | Error::ExpectedContinuation
            | Error::InvalidCloseCode(_) => Some(CloseCode::ProtocolError),
            Error::InvalidUtf8 | Error::PartialDeflateBlock | Error::Compression(_) => {
                Some(CloseCode::InvalidPayload)
            }
            Error::MessageTooLarge { .. } => Some(CloseCode::MessageTooBig),
            _ => None,
        }
    }

    /// Whether this error is a protocol violation that fails the connection.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        self.close_code().is_some()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
