//! Payload masking: rolling XOR and masking-key generation.

/// XOR `data` with the 4-byte masking key, starting at key index 0.
///
/// Masking is its own inverse: applying the same key twice restores the
/// original bytes.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_offset(data, mask, 0);
}

/// XOR `data` with the masking key, starting at key index `offset % 4`.
///
/// The offset form resumes masking mid-frame: pass the number of payload
/// bytes of the current frame already processed. Chunked application is
/// equivalent to one pass over the whole payload.
#[inline]
pub fn apply_mask_offset(data: &mut [u8], mask: [u8; 4], offset: usize) {
    let shift = offset % 4;
    if shift == 0 {
        return apply_mask_aligned(data, mask);
    }
    // Mask the head byte-by-byte until the key index realigns, then take
    // the word-at-a-time path for the rest.
    let head = (4 - shift).min(data.len());
    for (i, byte) in data[..head].iter_mut().enumerate() {
        *byte ^= mask[(shift + i) % 4];
    }
    apply_mask_aligned(&mut data[head..], mask);
}

/// Scalar implementation processing 4 bytes at a time using u32 operations.
#[inline]
fn apply_mask_aligned(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        // Fallback to system time
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x12345678)
    }
}

/// Masking-key generator producing one fresh key per outgoing client frame.
///
/// A splitmix-style mixer over a randomly seeded counter. Masking keys need
/// to be unpredictable to intermediaries, not cryptographically strong.
#[derive(Debug)]
pub struct MaskGenerator {
    counter: u32,
}

impl MaskGenerator {
    /// Create a generator seeded from the OS entropy source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: random_mask_seed(),
        }
    }

    /// Produce the next masking key.
    pub fn next_key(&mut self) -> [u8; 4] {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let mut data: Vec<u8> = vec![];
        apply_mask(&mut data, mask);
        assert_eq!(data, Vec::<u8>::new());
    }

    #[test]
    fn test_masking_offset_matches_whole() {
        let mask = [0xab, 0xcd, 0xef, 0x12];
        let original: Vec<u8> = (0..100u8).collect();

        let mut whole = original.clone();
        apply_mask(&mut whole, mask);

        // Apply in chunks of every split point; verdict must match.
        for split in 0..original.len() {
            let mut chunked = original.clone();
            let (head, tail) = chunked.split_at_mut(split);
            apply_mask_offset(head, mask, 0);
            apply_mask_offset(tail, mask, split);
            assert_eq!(chunked, whole, "mismatch at split {split}");
        }
    }

    #[test]
    fn test_masking_offset_short_tail() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut data = vec![0x00, 0x00];
        apply_mask_offset(&mut data, mask, 3);
        assert_eq!(data, vec![0x44, 0x11]);
    }

    #[test]
    fn test_mask_generator_distinct_keys() {
        let mut generator = MaskGenerator::new();
        let a = generator.next_key();
        let b = generator.next_key();
        let c = generator.next_key();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }
}
