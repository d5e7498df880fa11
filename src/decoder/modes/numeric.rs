//! Numeric mode decoder (Mode 0001)
//! Groups of 3 digits = 10 bits, 2 digits = 7 bits, 1 digit = 4 bits

use crate::decoder::bitstream::BitReader;

/// Numeric segment reader
pub struct NumericDecoder;

impl NumericDecoder {
    /// Decode `character_count` digits as ASCII bytes
    pub fn decode(reader: &mut BitReader<'_>, character_count: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(character_count);
        let mut chars_remaining = character_count;

        while chars_remaining > 0 {
            let group_size = chars_remaining.min(3);
            let (bits_needed, limit) = match group_size {
                3 => (10, 1000),
                2 => (7, 100),
                _ => (4, 10),
            };
            let value = reader.read_bits(bits_needed)?;
            if value >= limit {
                return None;
            }

            let digits = format!("{value:0width$}", width = group_size);
            out.extend_from_slice(digits.as_bytes());
            chars_remaining -= group_size;
        }

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_decode() {
        // "01234567": 012 -> 0000001100, 345 -> 0101011001, 67 -> 1000011
        let bytes = [0b0000_0011, 0b0001_0101, 0b1001_1000, 0b0110_0000];
        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            NumericDecoder::decode(&mut reader, 8).as_deref(),
            Some(&b"01234567"[..])
        );
    }

    #[test]
    fn test_numeric_rejects_out_of_range_group() {
        // 1017 does not fit three digits
        let bytes = [0b1111_1110, 0b0100_0000];
        let mut reader = BitReader::new(&bytes);
        assert!(NumericDecoder::decode(&mut reader, 3).is_none());
    }
}
