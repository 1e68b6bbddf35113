//! WebSocket frame header codec (RFC 6455).
//!
//! Header-only: payload bytes never pass through this module. The read
//! engine decodes a header, then streams the payload through the masking,
//! decompression, and validation stages as chunks arrive.

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Maximum encoded header size: 2 base bytes, 8 extended-length bytes,
/// 4 masking-key bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// A decoded WebSocket frame header.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bit 1. Compressed-message flag under permessage-deflate.
    pub rsv1: bool,
    /// Reserved bit 2. Must be 0.
    pub rsv2: bool,
    /// Reserved bit 3. Must be 0.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present on client-to-server frames.
    pub mask: Option<[u8; 4]>,
    /// Payload length in bytes.
    pub payload_len: u64,
}

impl FrameHeader {
    /// Create a header for an outgoing frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload_len: u64) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload_len,
        }
    }

    /// Decode a frame header from a buffer.
    ///
    /// Returns the header and the number of bytes it occupies. Payload bytes
    /// follow immediately and are not touched here.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available yet
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        // Need at least 2 bytes for the base header
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & 0x80) != 0;
        let rsv1 = (byte0 & 0x40) != 0;
        let rsv2 = (byte0 & 0x20) != 0;
        let rsv3 = (byte0 & 0x10) != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;

        let masked = (byte1 & 0x80) != 0;
        let payload_len_initial = byte1 & 0x7F;

        let (payload_len, len_end) = match payload_len_initial {
            0..=125 => (u64::from(payload_len_initial), 2),
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            127 => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let len = u64::from_be_bytes([
                    buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
                ]);
                (len, 10)
            }
            _ => unreachable!(),
        };

        let header_len = if masked { len_end + 4 } else { len_end };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = if masked {
            Some([buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]])
        } else {
            None
        };

        Ok((
            Self {
                fin,
                rsv1,
                rsv2,
                rsv3,
                opcode,
                mask,
                payload_len,
            },
            header_len,
        ))
    }

    /// Encode this header into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8; MAX_HEADER_LEN]) -> usize {
        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        buf[0] = byte0;

        let mut offset = 2;
        let mut byte1 = if self.mask.is_some() { 0x80 } else { 0x00 };
        if self.payload_len <= 125 {
            byte1 |= self.payload_len as u8;
        } else if self.payload_len <= u64::from(u16::MAX) {
            byte1 |= 126;
            buf[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
            offset = 4;
        } else {
            byte1 |= 127;
            buf[2..10].copy_from_slice(&self.payload_len.to_be_bytes());
            offset = 10;
        }
        buf[1] = byte1;

        if let Some(key) = self.mask {
            buf[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }
        offset
    }

    /// Validate an incoming header against RFC 6455 and the negotiated
    /// extension state.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV2/RSV3 are set, or RSV1 is set
    ///   without negotiated compression or on a control/continuation frame
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    /// - `Error::UnmaskedClientFrame` / `Error::MaskedServerFrame` on
    ///   masking violations for the given role
    pub fn validate(
        &self,
        role: Role,
        deflate_negotiated: bool,
        accept_unmasked: bool,
    ) -> Result<()> {
        if self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        // RSV1 marks a compressed message; only valid on the first data
        // frame of a message and only when the extension was negotiated.
        if self.rsv1
            && (!deflate_negotiated
                || self.opcode.is_control()
                || self.opcode == OpCode::Continuation)
        {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload_len > MAX_CONTROL_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(self.payload_len as usize));
            }
        }

        if role.expects_masked() {
            if self.mask.is_none() && !accept_unmasked {
                return Err(Error::UnmaskedClientFrame);
            }
        } else if self.mask.is_some() {
            return Err(Error::MaskedServerFrame);
        }

        Ok(())
    }
}
