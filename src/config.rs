//! Session options and limits.

use crate::message::MessageKind;

/// Per-session options controlling message framing and limits.
///
/// All options can be changed between messages; the write engine snapshots
/// the relevant ones when a message starts, so a change mid-message takes
/// effect from the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Maximum size of a complete message in bytes.
    ///
    /// Applies to the total reassembled size; for compressed messages the
    /// limit is enforced on the decompressed output.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Write buffer size (in bytes).
    ///
    /// With [`auto_fragment`](Self::auto_fragment) enabled, outgoing
    /// messages are split into frames of roughly this size.
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,

    /// Automatically fragment outgoing messages.
    ///
    /// When enabled, `write` emits non-final frames whenever the staged
    /// output exceeds `write_buffer_size` instead of one frame per message.
    ///
    /// Default: false
    pub auto_fragment: bool,

    /// Kind used for messages sent with `write` (text or binary).
    ///
    /// Default: [`MessageKind::Binary`]
    pub message_kind: MessageKind,

    /// Compress outgoing messages when permessage-deflate was negotiated.
    ///
    /// Has no effect without a negotiated deflate extension.
    ///
    /// Default: true
    pub compress: bool,

    /// Accept unmasked frames from clients (server only).
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// violates the RFC but may be useful for testing.
    ///
    /// Default: false
    pub accept_unmasked: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024, // 64 MB
            write_buffer_size: 8192,
            auto_fragment: false,
            message_kind: MessageKind::Binary,
            compress: true,
            accept_unmasked: false,
        }
    }
}

impl Options {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Enable or disable automatic fragmentation of outgoing messages.
    #[must_use]
    pub const fn with_auto_fragment(mut self, enabled: bool) -> Self {
        self.auto_fragment = enabled;
        self
    }

    /// Set the kind for messages sent with `write`.
    #[must_use]
    pub const fn with_message_kind(mut self, kind: MessageKind) -> Self {
        self.message_kind = kind;
        self
    }

    /// Enable or disable outgoing compression.
    #[must_use]
    pub const fn with_compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Accept unmasked client frames (server only, testing).
    #[must_use]
    pub const fn with_accept_unmasked(mut self, enabled: bool) -> Self {
        self.accept_unmasked = enabled;
        self
    }
}
