//! Wire-level protocol building blocks: frame header codec, opcodes,
//! masking, and incremental UTF-8 validation.

pub mod frame;
pub mod mask;
pub mod opcode;
pub mod utf8;

pub use frame::{FrameHeader, MAX_CONTROL_PAYLOAD, MAX_HEADER_LEN};
pub use mask::{MaskGenerator, apply_mask, apply_mask_offset};
pub use opcode::OpCode;
pub use utf8::Utf8Validator;
