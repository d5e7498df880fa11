//! Kanji mode decoder (Mode 1000)
//! Each character is 13 bits, expanded back to a two-byte Shift JIS code.

use crate::decoder::bitstream::BitReader;

/// Kanji segment reader
pub struct KanjiDecoder;

impl KanjiDecoder {
    /// Decode `character_count` characters to raw Shift JIS bytes
    pub fn decode(reader: &mut BitReader<'_>, character_count: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(character_count * 2);
        for _ in 0..character_count {
            let value = reader.read_bits(13)?;
            let mut code = ((value / 0xC0) << 8) | (value % 0xC0);
            code += if code < 0x1F00 { 0x8140 } else { 0xC140 };
            out.push((code >> 8) as u8);
            out.push(code as u8);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kanji_decode() {
        // 0x935F -> 0x0D9F; 0xE4AA -> 0x1AAA (examples from the QR standard)
        let value_a: u16 = 0x0D9F;
        let value_b: u16 = 0x1AAA;
        let packed: u32 = ((value_a as u32) << 13 | value_b as u32) << 6;
        let bytes = packed.to_be_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            KanjiDecoder::decode(&mut reader, 2),
            Some(vec![0x93, 0x5F, 0xE4, 0xAA])
        );
    }
}
