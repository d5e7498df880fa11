//! Alphanumeric mode decoder (Mode 0010)
//! Alphanumeric character set: 0-9, A-Z, space, $%*+-./:

use crate::decoder::bitstream::BitReader;

const ALPHANUMERIC_TABLE: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Pairs = 11 bits, single = 6 bits
pub struct AlphanumericDecoder;

impl AlphanumericDecoder {
    /// Decode `character_count` characters as ASCII bytes
    pub fn decode(reader: &mut BitReader<'_>, character_count: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(character_count);
        let mut chars_remaining = character_count;

        while chars_remaining >= 2 {
            let value = reader.read_bits(11)? as usize;
            out.push(*ALPHANUMERIC_TABLE.get(value / 45)?);
            out.push(ALPHANUMERIC_TABLE[value % 45]);
            chars_remaining -= 2;
        }
        if chars_remaining == 1 {
            let value = reader.read_bits(6)? as usize;
            out.push(*ALPHANUMERIC_TABLE.get(value)?);
        }

        Some(out)
    }
}
