//! Long-array codec: bit-packs/unpacks integer arrays used for chunk
//! block-state palettes and heightmaps, in either the "dense" (contiguous
//! bit stream) or "padded" (word-aligned, no straddling) layout.
//!
//! Shaped like the pack/unpack loops behind
//! `PalettedContainer::to_palette_and_packed_data` /
//! `from_palette_and_packed_data`, generalized from that fixed
//! indirect-palette use case to arbitrary `N`, `bits_per_entry` in `1..=64`,
//! and both layouts.

use crate::error::{VoxelError, VoxelResult};

/// The decoded output, typed by the smallest unsigned width that can hold
/// `bits_per_entry` bits, as required by the decode contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedArray {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl DecodedArray {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen every entry to `u64`, discarding the narrow typing.
    pub fn to_u64_vec(&self) -> Vec<u64> {
        match self {
            Self::U8(v) => v.iter().map(|&x| x as u64).collect(),
            Self::U16(v) => v.iter().map(|&x| x as u64).collect(),
            Self::U32(v) => v.iter().map(|&x| x as u64).collect(),
            Self::U64(v) => v.clone(),
        }
    }
}

#[inline]
fn mask_for(bits: u8) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Smallest unsigned width (in bits) that can hold a value needing `bits`
/// bits of storage: `u8` for 1-8, `u16` for 9-16, `u32` for 17-32, `u64`
/// otherwise.
fn narrowest_width(bits: u8) -> u8 {
    match bits {
        1..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        _ => 64,
    }
}

/// Number of bits needed to represent `value` (at least 1, per the encode
/// contract's `B >= 1` floor).
fn bits_needed(value: u64) -> u8 {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros()) as u8
    }
}

fn validate_bits(bits: u8) -> VoxelResult<()> {
    if bits == 0 || bits > 64 {
        return Err(VoxelError::InvalidArgument(format!(
            "bits_per_entry must be in 1..=64, got {bits}"
        )));
    }
    Ok(())
}

/// Number of `u64` words required to hold `size` entries of `bits_per_entry`
/// bits under the given layout.
pub fn word_count(size: usize, bits_per_entry: u8, dense: bool) -> VoxelResult<usize> {
    validate_bits(bits_per_entry)?;
    if size == 0 {
        return Ok(0);
    }
    if dense {
        Ok((size * bits_per_entry as usize).div_ceil(64))
    } else {
        let epw = entries_per_word(bits_per_entry);
        Ok(size.div_ceil(epw))
    }
}

fn entries_per_word(bits_per_entry: u8) -> usize {
    64 / bits_per_entry as usize
}

/// Encode `input` (already widened to `u64`) into packed words.
///
/// If `bits_per_entry` is `None`, the width is chosen as
/// `max(min_bits_per_entry, bits_needed(max(input)))`, floored at 1.
pub fn encode(
    input: &[u64],
    bits_per_entry: Option<u8>,
    dense: bool,
    min_bits_per_entry: u8,
) -> VoxelResult<Vec<u64>> {
    let bits = match bits_per_entry {
        Some(b) => {
            validate_bits(b)?;
            b
        }
        None => {
            let max_value = input.iter().copied().max().unwrap_or(0);
            bits_needed(max_value).max(min_bits_per_entry.max(1))
        }
    };

    let limit = mask_for(bits);
    for &value in input {
        if value > limit {
            return Err(VoxelError::InvalidArgument(format!(
                "value {value} exceeds 2^{bits} - 1"
            )));
        }
    }

    if dense {
        Ok(encode_dense(input, bits))
    } else {
        Ok(encode_padded(input, bits))
    }
}

fn encode_dense(input: &[u64], bits: u8) -> Vec<u64> {
    let mut words = vec![0u64; word_count_dense_len(input.len(), bits)];
    let bits = bits as usize;

    let mut bit_cursor = 0usize;
    for &value in input {
        let word_index = bit_cursor / 64;
        let bit_offset = bit_cursor % 64;

        words[word_index] |= value << bit_offset;
        let bits_written_in_word = 64 - bit_offset;
        if bits_written_in_word < bits {
            // spills into the next word; low-order bits already written above
            words[word_index + 1] |= value >> bits_written_in_word;
        }

        bit_cursor += bits;
    }

    words
}

fn word_count_dense_len(size: usize, bits: u8) -> usize {
    if size == 0 {
        0
    } else {
        (size * bits as usize).div_ceil(64)
    }
}

fn encode_padded(input: &[u64], bits: u8) -> Vec<u64> {
    let epw = entries_per_word(bits);
    let total_words = input.len().div_ceil(epw.max(1));
    let mut words = vec![0u64; total_words];

    for (i, &value) in input.iter().enumerate() {
        let word_index = i / epw;
        let slot = i % epw;
        words[word_index] |= value << (slot * bits as usize);
    }

    words
}

/// Decode `words` into `size` entries of `bits_per_entry` bits, returned as
/// the canonical `u64` widening.
pub fn decode(words: &[u64], size: usize, bits_per_entry: u8, dense: bool) -> VoxelResult<Vec<u64>> {
    validate_bits(bits_per_entry)?;
    if size == 0 {
        return Ok(Vec::new());
    }

    let expected_words = word_count(size, bits_per_entry, dense)?;
    if words.len() < expected_words {
        return Err(VoxelError::InvalidArgument(format!(
            "expected at least {expected_words} words for {size} entries at {bits_per_entry} bits, got {}",
            words.len()
        )));
    }

    let mask = mask_for(bits_per_entry);
    let mut out = Vec::with_capacity(size);

    if dense {
        let bits = bits_per_entry as usize;
        let mut bit_cursor = 0usize;
        for _ in 0..size {
            let word_index = bit_cursor / 64;
            let bit_offset = bit_cursor % 64;

            let mut value = words[word_index] >> bit_offset;
            let bits_read_in_word = 64 - bit_offset;
            if bits_read_in_word < bits {
                let next = *words.get(word_index + 1).ok_or_else(|| {
                    VoxelError::InvalidArgument("long array truncated mid-entry".to_string())
                })?;
                value |= next << bits_read_in_word;
            }

            out.push(value & mask);
            bit_cursor += bits;
        }
    } else {
        let epw = entries_per_word(bits_per_entry);
        for i in 0..size {
            let word_index = i / epw;
            let slot = i % epw;
            let word = *words
                .get(word_index)
                .ok_or_else(|| VoxelError::InvalidArgument("long array truncated".to_string()))?;
            let value = (word >> (slot * bits_per_entry as usize)) & mask;
            out.push(value);
        }
    }

    Ok(out)
}

/// Decode and narrow to the smallest unsigned width covering `bits_per_entry`.
pub fn decode_typed(
    words: &[u64],
    size: usize,
    bits_per_entry: u8,
    dense: bool,
) -> VoxelResult<DecodedArray> {
    let raw = decode(words, size, bits_per_entry, dense)?;
    Ok(match narrowest_width(bits_per_entry) {
        8 => DecodedArray::U8(raw.into_iter().map(|v| v as u8).collect()),
        16 => DecodedArray::U16(raw.into_iter().map(|v| v as u16).collect()),
        32 => DecodedArray::U32(raw.into_iter().map(|v| v as u32).collect()),
        _ => DecodedArray::U64(raw),
    })
}

/// Bundles `bits_per_entry`/`dense`/`size` for repeated encode/decode calls
/// against the same shape, e.g. one block section's palette across several
/// edits. Thin wrapper over the free functions above; holds no state beyond
/// its own parameters.
#[derive(Debug, Clone, Copy)]
pub struct LongArrayCodec {
    pub size: usize,
    pub bits_per_entry: u8,
    pub dense: bool,
}

impl LongArrayCodec {
    pub fn new(size: usize, bits_per_entry: u8, dense: bool) -> VoxelResult<Self> {
        validate_bits(bits_per_entry)?;
        Ok(Self {
            size,
            bits_per_entry,
            dense,
        })
    }

    pub fn word_count(&self) -> usize {
        word_count(self.size, self.bits_per_entry, self.dense).expect("bits validated at construction")
    }

    pub fn encode(&self, input: &[u64]) -> VoxelResult<Vec<u64>> {
        encode(input, Some(self.bits_per_entry), self.dense, 1)
    }

    pub fn decode(&self, words: &[u64]) -> VoxelResult<Vec<u64>> {
        decode(words, self.size, self.bits_per_entry, self.dense)
    }

    pub fn decode_typed(&self, words: &[u64]) -> VoxelResult<DecodedArray> {
        decode_typed(words, self.size, self.bits_per_entry, self.dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_decode_known_pattern() {
        let words = [0x0123456789ABCDEFu64];
        let decoded = decode(&words, 16, 4, true).unwrap();
        let expected: Vec<u64> = vec![
            0xF, 0xE, 0xD, 0xC, 0xB, 0xA, 0x9, 0x8, 0x7, 0x6, 0x5, 0x4, 0x3, 0x2, 0x1, 0x0,
        ];
        assert_eq!(decoded, expected);
    }

    #[test]
    fn padded_decode_known_pattern() {
        let words = [0x0000_0000_0000_007Fu64];
        let decoded = decode(&words, 7, 9, false).unwrap();
        assert_eq!(decoded, vec![127, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn round_trip_dense_varied_widths() {
        for bits in [1u8, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 31, 32, 33, 63, 64] {
            let limit = mask_for(bits);
            let input: Vec<u64> = (0..37).map(|i| (i as u64 * 2654435761) & limit).collect();
            let words = encode(&input, Some(bits), true, 1).unwrap();
            let decoded = decode(&words, input.len(), bits, true).unwrap();
            assert_eq!(decoded, input, "dense round trip failed at {bits} bits");
        }
    }

    #[test]
    fn round_trip_padded_varied_widths() {
        for bits in [1u8, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 31, 32, 33, 63, 64] {
            let limit = mask_for(bits);
            let input: Vec<u64> = (0..37).map(|i| (i as u64 * 2654435761) & limit).collect();
            let words = encode(&input, Some(bits), false, 1).unwrap();
            let decoded = decode(&words, input.len(), bits, false).unwrap();
            assert_eq!(decoded, input, "padded round trip failed at {bits} bits");
        }
    }

    #[test]
    fn round_trip_empty_array() {
        let words = encode(&[], Some(4), true, 1).unwrap();
        assert!(words.is_empty());
        let decoded = decode(&words, 0, 4, true).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn encode_size_matches_contract_dense() {
        let input: Vec<u64> = (0..100).map(|i| i % 16).collect();
        let words = encode(&input, Some(5), true, 1).unwrap();
        assert_eq!(words.len(), (100usize * 5).div_ceil(64));
    }

    #[test]
    fn encode_size_matches_contract_padded() {
        let input: Vec<u64> = (0..100).map(|i| i % 16).collect();
        let words = encode(&input, Some(9), false, 1).unwrap();
        let epw = 64 / 9;
        assert_eq!(words.len(), 100usize.div_ceil(epw));
    }

    #[test]
    fn encode_rejects_out_of_range_bits() {
        assert!(matches!(
            encode(&[1], Some(0), true, 1),
            Err(VoxelError::InvalidArgument(_))
        ));
        assert!(matches!(
            encode(&[1], Some(65), true, 1),
            Err(VoxelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn encode_rejects_value_exceeding_width() {
        assert!(matches!(
            encode(&[16], Some(4), true, 1),
            Err(VoxelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn decode_fails_on_truncated_input() {
        assert!(decode(&[0], 100, 4, true).is_err());
    }

    #[test]
    fn encode_chooses_minimal_width_when_unspecified() {
        let input = vec![0u64, 1, 2, 3, 4];
        let words = encode(&input, None, true, 1).unwrap();
        // max is 4 -> needs 3 bits
        assert_eq!(words.len(), (5 * 3usize).div_ceil(64));
        let decoded = decode(&words, 5, 3, true).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn decode_typed_narrows_width() {
        let words = encode(&[1, 2, 3], Some(4), true, 1).unwrap();
        assert!(matches!(
            decode_typed(&words, 3, 4, true).unwrap(),
            DecodedArray::U8(_)
        ));
        let words = encode(&[1, 2, 3], Some(20), true, 1).unwrap();
        assert!(matches!(
            decode_typed(&words, 3, 20, true).unwrap(),
            DecodedArray::U32(_)
        ));
    }

    #[test]
    fn facade_round_trips_like_the_free_functions() {
        let shape = LongArrayCodec::new(20, 5, false).unwrap();
        let input: Vec<u64> = (0..20).collect();
        let words = shape.encode(&input).unwrap();
        assert_eq!(words.len(), shape.word_count());
        assert_eq!(shape.decode(&words).unwrap(), input);
    }

    #[test]
    fn facade_rejects_invalid_bits_at_construction() {
        assert!(LongArrayCodec::new(1, 0, true).is_err());
        assert!(LongArrayCodec::new(1, 65, true).is_err());
    }
}
