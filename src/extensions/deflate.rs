//! Permessage-deflate WebSocket compression extension (RFC 7692).
//!
//! Streaming adapters over raw-deflate contexts. Each direction owns an
//! independent context: the outbound [`Deflater`] ends every message with a
//! sync flush and strips the `00 00 FF FF` trailer; the inbound [`Inflater`]
//! re-synthesizes the trailer at end of message. Contexts persist across
//! messages unless no-context-takeover was negotiated for that direction.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

use crate::connection::Role;
use crate::error::{Error, Result};

const MIN_WINDOW_BITS: u8 = 8;
const MAX_WINDOW_BITS: u8 = 15;
const DEFAULT_WINDOW_BITS: u8 = 15;
const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Output reservation granularity for the streaming loops.
const OUT_CHUNK: usize = 4096;

/// Negotiated permessage-deflate parameters.
///
/// Produced by the handshake layer; the engine consumes it as-is.
#[derive(Debug, Clone)]
pub struct DeflateConfig {
    pub server_no_context_takeover: bool,
    pub client_no_context_takeover: bool,
    pub server_max_window_bits: u8,
    pub client_max_window_bits: u8,
    pub compression_level: u32,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self {
            server_no_context_takeover: false,
            client_no_context_takeover: false,
            server_max_window_bits: DEFAULT_WINDOW_BITS,
            client_max_window_bits: DEFAULT_WINDOW_BITS,
            compression_level: 6,
        }
    }
}

impl DeflateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn server_no_context_takeover(mut self, value: bool) -> Self {
        self.server_no_context_takeover = value;
        self
    }

    #[must_use]
    pub fn client_no_context_takeover(mut self, value: bool) -> Self {
        self.client_no_context_takeover = value;
        self
    }

    /// Set the server-to-client window size.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeflateParameter` outside 8-15.
    pub fn server_max_window_bits(mut self, bits: u8) -> Result<Self> {
        Self::check_window_bits(bits)?;
        self.server_max_window_bits = bits;
        Ok(self)
    }

    /// Set the client-to-server window size.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeflateParameter` outside 8-15.
    pub fn client_max_window_bits(mut self, bits: u8) -> Result<Self> {
        Self::check_window_bits(bits)?;
        self.client_max_window_bits = bits;
        Ok(self)
    }

    /// Set the compression level for outgoing messages.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeflateParameter` outside 0-9.
    pub fn compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidDeflateParameter(format!(
                "compression_level must be 0-9, got {level}"
            )));
        }
        self.compression_level = level;
        Ok(self)
    }

    fn check_window_bits(bits: u8) -> Result<()> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
            return Err(Error::InvalidDeflateParameter(format!(
                "window bits must be {MIN_WINDOW_BITS}-{MAX_WINDOW_BITS}, got {bits}"
            )));
        }
        Ok(())
    }

    /// Window bits for the direction this peer sends on.
    fn outbound_window_bits(&self, role: Role) -> u8 {
        match role {
            Role::Client => self.client_max_window_bits,
            Role::Server => self.server_max_window_bits,
        }
    }

    /// Whether the outbound context resets after each message.
    fn outbound_resets(&self, role: Role) -> bool {
        match role {
            Role::Client => self.client_no_context_takeover,
            Role::Server => self.server_no_context_takeover,
        }
    }
}

/// zlib cannot produce raw-deflate streams with an 8-bit window; a
/// negotiated value of 8 is used as 9 on the wire, which remains a valid
/// subset of what the peer accepts.
fn effective_window_bits(bits: u8) -> u8 {
    bits.max(9)
}

/// Streaming compressor for the outbound direction.
pub struct Deflater {
    compress: Compress,
    reset_context: bool,
}

impl std::fmt::Debug for Deflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deflater")
            .field("reset_context", &self.reset_context)
            .finish_non_exhaustive()
    }
}

impl Deflater {
    /// Create a compressor for the direction `role` sends on.
    #[must_use]
    pub fn for_role(role: Role, config: &DeflateConfig) -> Self {
        let bits = effective_window_bits(config.outbound_window_bits(role));
        Self {
            compress: Compress::new_with_window_bits(
                Compression::new(config.compression_level),
                false,
                bits,
            ),
            reset_context: config.outbound_resets(role),
        }
    }

    /// Compress the next chunk of a message, appending output to `out`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Compression` on an engine failure.
    pub fn deflate(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        while !input.is_empty() {
            let before = self.compress.total_in();
            out.reserve(OUT_CHUNK);
            self.compress
                .compress_vec(input, out, FlushCompress::None)
                .map_err(|e| Error::Compression(e.to_string()))?;
            let consumed = (self.compress.total_in() - before) as usize;
            input = &input[consumed..];
        }
        Ok(())
    }

    /// End the message: sync-flush pending output into `out` and strip the
    /// `00 00 FF FF` trailer. Resets the context if no-context-takeover was
    /// negotiated for this direction.
    ///
    /// # Errors
    ///
    /// Returns `Error::Compression` on an engine failure.
    pub fn finish_message(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            out.reserve(OUT_CHUNK);
            let spare = out.capacity() - out.len();
            let before = out.len();
            self.compress
                .compress_vec(&[], out, FlushCompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;
            // Flush is complete once the output stops filling the space we gave it
            if out.len() - before < spare {
                break;
            }
        }

        if out.len() >= DEFLATE_TRAILER.len() && out[out.len() - 4..] == DEFLATE_TRAILER {
            out.truncate(out.len() - 4);
        }

        if self.reset_context {
            self.compress.reset();
        }
        Ok(())
    }
}

/// Streaming decompressor for the inbound direction.
pub struct Inflater {
    decompress: Decompress,
    reset_context: bool,
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("reset_context", &self.reset_context)
            .finish_non_exhaustive()
    }
}

impl Inflater {
    /// Create a decompressor for the direction `role` receives on.
    #[must_use]
    pub fn for_role(role: Role, config: &DeflateConfig) -> Self {
        // Inbound traffic was compressed by the peer, so use the peer's
        // direction parameters.
        let peer = match role {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        };
        let bits = effective_window_bits(config.outbound_window_bits(peer));
        Self {
            decompress: Decompress::new_with_window_bits(false, bits),
            reset_context: config.outbound_resets(peer),
        }
    }

    /// Decompress the next chunk of a message, appending at most `limit`
    /// bytes of output to `out`.
    ///
    /// Returns the number of input bytes consumed. Consumption stops once
    /// the output cap is reached; hand the unconsumed tail back on the next
    /// call. An empty `input` flushes output the decompressor still holds
    /// from a capped earlier call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Compression` if the stream is corrupt.
    pub fn inflate(&mut self, input: &[u8], out: &mut Vec<u8>, limit: usize) -> Result<usize> {
        let start = out.len();
        let mut consumed = 0;
        loop {
            let produced = out.len() - start;
            if produced >= limit {
                break;
            }
            let mut window = [0u8; OUT_CHUNK];
            let want = (limit - produced).min(OUT_CHUNK);
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            self.decompress
                .decompress(&input[consumed..], &mut window[..want], FlushDecompress::None)
                .map_err(|e| Error::Compression(e.to_string()))?;
            let in_used = (self.decompress.total_in() - before_in) as usize;
            let out_used = (self.decompress.total_out() - before_out) as usize;
            out.extend_from_slice(&window[..out_used]);
            consumed += in_used;
            if in_used == 0 && out_used == 0 {
                if consumed < input.len() {
                    return Err(Error::Compression("inflate made no progress".into()));
                }
                break;
            }
        }
        Ok(consumed)
    }

    /// End the message by feeding the synthetic `00 00 FF FF` trailer.
    ///
    /// The trailer completes the sync-flush block the peer stripped; it must
    /// decode to nothing. Resets the context if no-context-takeover was
    /// negotiated for this direction.
    ///
    /// # Errors
    ///
    /// Returns `Error::PartialDeflateBlock` if the flush produces output,
    /// meaning the message ended inside a deflate block.
    pub fn finish_message(&mut self) -> Result<()> {
        let mut probe = Vec::new();
        let mut input: &[u8] = &DEFLATE_TRAILER;
        while !input.is_empty() {
            let before = self.decompress.total_in();
            probe.reserve(64);
            self.decompress
                .decompress_vec(input, &mut probe, FlushDecompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;
            if !probe.is_empty() {
                return Err(Error::PartialDeflateBlock);
            }
            let consumed = (self.decompress.total_in() - before) as usize;
            if consumed == 0 {
                break;
            }
            input = &input[consumed..];
        }

        if self.reset_context {
            self.decompress.reset(false);
        }
        Ok(())
    }
}
