//! Bit-level operations over byte buffers.
//!
//! Keys are addressed bit by bit, most significant bit first within each
//! byte, so bit 0 of `[0b1000_0000]` is 1. Every function takes the number
//! of valid bits alongside the buffer; the buffer itself is always
//! `valid_bits.div_ceil(8)` bytes long.

pub(crate) const BITS_PER_BYTE: usize = 8;

/// Bit value (0 or 1) at `index` within a key of `valid_bits` bits.
///
/// Panics if `index` is out of range; callers are expected to have sliced
/// their keys down to the remaining valid range already.
pub(crate) fn bit_at(key: &[u8], valid_bits: usize, index: usize) -> u8 {
    assert!(index < valid_bits, "bit index {index} out of {valid_bits}");
    let byte = key[index / BITS_PER_BYTE];
    let shift = BITS_PER_BYTE - 1 - index % BITS_PER_BYTE;
    (byte >> shift) & 1
}

/// Compare two keys bit by bit up to the shorter valid length.
///
/// Returns the number of equal bits seen before either a mismatch or the
/// shorter key running out, and whether a mismatch was actually found (as
/// opposed to simply exhausting the shorter key).
pub(crate) fn compare(a: &[u8], a_bits: usize, b: &[u8], b_bits: usize) -> (usize, bool) {
    let limit = a_bits.min(b_bits);
    let mut pos = 0;
    while pos < limit {
        let byte = pos / BITS_PER_BYTE;
        let diff = a[byte] ^ b[byte];
        if diff == 0 {
            pos = limit.min((byte + 1) * BITS_PER_BYTE);
            continue;
        }
        let first = byte * BITS_PER_BYTE + diff.leading_zeros() as usize;
        if first < limit {
            return (first, true);
        }
        return (limit, false);
    }
    (limit, false)
}

/// Copy `dest_bits` bits of `src` starting at `start_bit` into a fresh
/// buffer, assembling each output byte from two adjacent source bytes.
///
/// The copy works in whole bytes: bits of the last output byte beyond
/// `dest_bits` carry whatever followed in the source. Comparisons never
/// look past the valid bit count, so the slack is harmless, but it is
/// visible when a prefix is rendered as text.
pub(crate) fn slice(src: &[u8], src_bits: usize, start_bit: usize, dest_bits: usize) -> Vec<u8> {
    assert!(start_bit + dest_bits <= src_bits);
    let dest_bytes = dest_bits.div_ceil(BITS_PER_BYTE);
    let mut dest = vec![0u8; dest_bytes];
    let shift = start_bit % BITS_PER_BYTE;
    let mut byte = start_bit / BITS_PER_BYTE;
    for out in dest.iter_mut() {
        let hi = src.get(byte).copied().unwrap_or(0);
        *out = if shift == 0 {
            hi
        } else {
            let lo = src.get(byte + 1).copied().unwrap_or(0);
            (hi << shift) | (lo >> (BITS_PER_BYTE - shift))
        };
        byte += 1;
    }
    dest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_at_is_msb_first() {
        let key = [0b1010_0000u8, 0b0000_0001];
        assert_eq!(bit_at(&key, 16, 0), 1);
        assert_eq!(bit_at(&key, 16, 1), 0);
        assert_eq!(bit_at(&key, 16, 2), 1);
        assert_eq!(bit_at(&key, 16, 14), 0);
        assert_eq!(bit_at(&key, 16, 15), 1);
    }

    #[test]
    #[should_panic]
    fn bit_at_rejects_out_of_range_index() {
        bit_at(&[0xFF], 5, 5);
    }

    #[test]
    fn compare_equal_keys_exhausts_shorter() {
        let (matched, diverged) = compare(b"cat", 24, b"ca", 16);
        assert_eq!(matched, 16);
        assert!(!diverged);
    }

    #[test]
    fn compare_reports_first_differing_bit() {
        // 'c' = 01100011, 'd' = 01100100: first difference at bit 5.
        let (matched, diverged) = compare(b"cat", 24, b"dog", 24);
        assert_eq!(matched, 5);
        assert!(diverged);
    }

    #[test]
    fn compare_ignores_difference_past_valid_bits() {
        // Bytes differ only in the low bit, which sits outside 7 valid bits.
        let (matched, diverged) = compare(&[0b1111_0000], 7, &[0b1111_0001], 7);
        assert_eq!(matched, 7);
        assert!(!diverged);
    }

    #[test]
    fn compare_zero_bits_is_empty_match() {
        let (matched, diverged) = compare(&[], 0, b"x", 8);
        assert_eq!(matched, 0);
        assert!(!diverged);
    }

    #[test]
    fn slice_from_byte_boundary_is_plain_copy() {
        assert_eq!(slice(b"cat", 24, 8, 16), b"at".to_vec());
    }

    #[test]
    fn slice_shifts_across_byte_boundaries() {
        let src = [0b1100_1010u8, 0b0101_1111];
        // 8 bits starting at bit 4: low nibble of byte 0, high nibble of byte 1.
        assert_eq!(slice(&src, 16, 4, 8), vec![0b1010_0101]);
    }

    #[test]
    fn slice_partial_last_byte_keeps_source_slack() {
        // 5 bits from bit 0 of 'c': the whole byte is copied.
        assert_eq!(slice(b"c", 8, 0, 5), vec![b'c']);
    }

    #[test]
    #[should_panic]
    fn slice_rejects_overlong_range() {
        slice(b"c", 8, 4, 5);
    }
}
