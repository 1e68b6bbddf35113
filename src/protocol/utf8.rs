//! Incremental UTF-8 validation for WebSocket text messages (RFC 6455).
//!
//! Text payloads arrive in arbitrary chunks that can split multi-byte
//! sequences anywhere; the validator carries the incomplete tail across
//! chunks so the verdict matches one-shot validation of the concatenation.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
///
/// Feed payload chunks as they arrive; call [`finish`](Self::finish) when
/// the message is complete to reject a trailing incomplete sequence.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Buffer for an incomplete multi-byte sequence (at most 3 bytes).
    incomplete: [u8; 4],
    /// Number of bytes in the incomplete buffer.
    incomplete_len: usize,
}

impl Utf8Validator {
    /// Create a new UTF-8 validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next chunk of a text message.
    ///
    /// An incomplete multi-byte sequence at the end of the chunk is saved
    /// and completed by the next chunk.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on the first chunk that cannot be a
    /// prefix of valid UTF-8.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        // Prepend any incomplete bytes from the previous chunk
        let check_data = if self.incomplete_len > 0 {
            let mut combined = Vec::with_capacity(self.incomplete_len + data.len());
            combined.extend_from_slice(&self.incomplete[..self.incomplete_len]);
            combined.extend_from_slice(data);
            combined
        } else {
            data.to_vec()
        };
        self.incomplete_len = 0;

        match std::str::from_utf8(&check_data) {
            Ok(_) => Ok(()),
            Err(e) => {
                // error_len() is None only for a truncated sequence at the
                // end, which the next chunk may complete.
                if e.error_len().is_none() {
                    let remaining = &check_data[e.valid_up_to()..];
                    if remaining.len() < 4 {
                        self.incomplete[..remaining.len()].copy_from_slice(remaining);
                        self.incomplete_len = remaining.len();
                        return Ok(());
                    }
                }
                Err(Error::InvalidUtf8)
            }
        }
    }

    /// Complete the message.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the message ended mid-sequence.
    pub fn finish(&mut self) -> Result<()> {
        if self.incomplete_len > 0 {
            self.incomplete_len = 0;
            return Err(Error::InvalidUtf8);
        }
        Ok(())
    }

    /// Reset the validator state, discarding any incomplete sequence.
    pub fn reset(&mut self) {
        self.incomplete_len = 0;
    }

    /// Check if there are pending incomplete bytes.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.incomplete_len > 0
    }
}
