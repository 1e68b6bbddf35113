//! Message kinds, close codes, and the close-frame payload codec (RFC 6455).

use crate::error::{Error, Result};

/// Kind of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    /// Text message (UTF-8 validated).
    Text,
    /// Binary message (arbitrary bytes).
    #[default]
    Binary,
}

impl MessageKind {
    /// Returns `true` for text messages.
    #[inline]
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, MessageKind::Text)
    }
}

/// Kind of a control frame, as reported to the control observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Ping frame.
    Ping,
    /// Pong frame.
    Pong,
    /// Close frame.
    Close,
}

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away.
    GoingAway,
    /// Protocol error (1002). Malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Data type the endpoint cannot handle.
    UnsupportedData,
    /// Invalid payload (1007). E.g. non-UTF-8 in a text message.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code (1012-1014 registered, 3000-4999 application).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may appear in a close frame per RFC 6455
    /// Section 7.4.1.
    ///
    /// Valid: 1000-1003, 1007-1014, and 3000-4999. Reserved codes
    /// (1004-1006, 1015), unregistered codes below 3000, and codes of 5000
    /// and above are invalid on the wire.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this close code is reserved and MUST NOT be sent.
    ///
    /// 1004 (reserved), 1005 (no status received), 1006 (abnormal closure),
    /// 1015 (TLS handshake).
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close-frame payload.
    ///
    /// Returns `None` for an empty payload (close without status). A 1-byte
    /// payload or an invalid/reserved status code is
    /// [`Error::InvalidCloseCode`]; a non-UTF-8 reason is
    /// [`Error::InvalidUtf8`].
    pub fn decode(payload: &[u8]) -> Result<Option<Self>> {
        if payload.is_empty() {
            return Ok(None);
        }
        if payload.len() == 1 {
            return Err(Error::InvalidCloseCode(u16::from(payload[0])));
        }
        let raw = u16::from_be_bytes([payload[0], payload[1]]);
        let code = CloseCode::from_u16(raw);
        if !code.is_valid() {
            return Err(Error::InvalidCloseCode(raw));
        }
        let reason = std::str::from_utf8(&payload[2..])?;
        Ok(Some(CloseFrame::new(code, reason)))
    }

    /// Encode this close frame into its wire payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = self.code.as_u16().to_be_bytes().to_vec();
        payload.extend_from_slice(self.reason.as_bytes());
        payload
    }
}
