//! Property-based tests for the wire-level building blocks.
//!
//! These tests use proptest to fuzz the header codec, masking, and UTF-8
//! validation logic and find edge cases.

use proptest::prelude::*;

use wscore::protocol::{FrameHeader, MAX_HEADER_LEN, Utf8Validator, apply_mask, apply_mask_offset};
use wscore::{CloseCode, OpCode};

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
    ]
}

/// Lengths covering all three header length encodings.
fn payload_len_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..=125,
        126u64..=65535,
        65536u64..=(1 << 40),
    ]
}

proptest! {
    // =========================================================================
    // Property 1: Header roundtrip - decode(encode(header)) == header
    // =========================================================================
    #[test]
    fn test_header_roundtrip(
        fin in any::<bool>(),
        rsv1 in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload_len in payload_len_strategy(),
        mask in prop::option::of(any::<[u8; 4]>())
    ) {
        let mut header = FrameHeader::new(fin, opcode, payload_len);
        header.rsv1 = rsv1;
        header.mask = mask;

        let mut buf = [0u8; MAX_HEADER_LEN];
        let written = header.encode(&mut buf);

        let parsed = FrameHeader::decode(&buf[..written]);
        prop_assert!(parsed.is_ok(), "decode failed: {:?}", parsed);
        let (parsed, consumed) = parsed.unwrap();

        prop_assert_eq!(consumed, written);
        prop_assert_eq!(parsed, header);
    }

    // =========================================================================
    // Property 2: Truncated headers always report how many bytes are missing
    // =========================================================================
    #[test]
    fn test_truncated_header_reports_needed(
        payload_len in payload_len_strategy(),
        mask in prop::option::of(any::<[u8; 4]>())
    ) {
        let mut header = FrameHeader::new(true, OpCode::Binary, payload_len);
        header.mask = mask;

        let mut buf = [0u8; MAX_HEADER_LEN];
        let written = header.encode(&mut buf);

        for cut in 0..written {
            match FrameHeader::decode(&buf[..cut]) {
                Err(wscore::Error::IncompleteFrame { needed }) => {
                    prop_assert!(needed > 0);
                    prop_assert!(cut + needed <= written);
                }
                other => prop_assert!(false, "cut={} gave {:?}", cut, other),
            }
        }
    }

    // =========================================================================
    // Property 3: Masking is reversible (XOR is self-inverse)
    // =========================================================================
    #[test]
    fn test_mask_reversible(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        mask in any::<[u8; 4]>()
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, mask);
        apply_mask(&mut masked, mask);
        prop_assert_eq!(data, masked);
    }

    // =========================================================================
    // Property 4: Masking a payload in two resumed parts equals masking it
    // in one pass
    // =========================================================================
    #[test]
    fn test_mask_offset_split_consistent(
        data in prop::collection::vec(any::<u8>(), 1..500),
        mask in any::<[u8; 4]>(),
        split_seed in any::<usize>()
    ) {
        let split = split_seed % data.len();

        let mut whole = data.clone();
        apply_mask(&mut whole, mask);

        let mut parts = data.clone();
        let (head, tail) = parts.split_at_mut(split);
        apply_mask_offset(head, mask, 0);
        apply_mask_offset(tail, mask, split);

        prop_assert_eq!(whole, parts);
    }

    // =========================================================================
    // Property 5: UTF-8 validation is chunking-invariant for valid input
    // =========================================================================
    #[test]
    fn test_utf8_chunking_invariance(
        text in "\\PC{0,200}",
        split_seed in any::<usize>()
    ) {
        let bytes = text.as_bytes();

        let mut whole = Utf8Validator::new();
        whole.feed(bytes).unwrap();
        whole.finish().unwrap();

        let split = if bytes.is_empty() { 0 } else { split_seed % bytes.len() };
        let mut chunked = Utf8Validator::new();
        chunked.feed(&bytes[..split]).unwrap();
        chunked.feed(&bytes[split..]).unwrap();
        prop_assert!(chunked.finish().is_ok());
    }

    // =========================================================================
    // Property 6: Close code classification partitions the u16 space
    // =========================================================================
    #[test]
    fn test_close_code_roundtrip(code in 1000u16..5000) {
        let close_code = CloseCode::from_u16(code);
        prop_assert_eq!(close_code.as_u16(), code);
        // A code is never both usable and reserved
        prop_assert!(!(close_code.is_valid() && close_code.is_reserved()));
    }
}
