//! Marker synthesis
//!
//! Byte-mode QR encoding used to produce test scenes and demo markers:
//! version selection, Reed-Solomon blocks, function patterns, and mask
//! choice by penalty score. Rendering lives in [`render`].

mod penalty;
/// Rasterisation of symbols
pub mod render;

pub use render::{projected_corners, render_marker, render_projected, rotated_layout};

use crate::decoder::bitstream::placement_order;
use crate::decoder::format::{FormatInfo, encode_version, format_positions, version_positions};
use crate::decoder::function_mask::{FunctionMask, alignment_pattern_centers};
use crate::decoder::reed_solomon::ReedSolomonEncoder;
use crate::decoder::tables::{char_count_bits, ec_block_info};
use crate::error::EncodeError;
use crate::models::symbol::symbol_size;
use crate::models::{BitMatrix, EcLevel, MaskPattern};

const MODE_BYTE: u8 = 0b0100;
const PAD_BYTES: [u8; 2] = [0xEC, 0x11];

/// An encoded symbol: the module grid plus the parameters it was built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Module grid, true = dark
    pub modules: BitMatrix,
    /// Version (1-40)
    pub version: u8,
    /// Error correction level
    pub ec_level: EcLevel,
    /// Mask applied to the data modules
    pub mask: MaskPattern,
}

impl Symbol {
    /// Side length in modules
    pub fn size(&self) -> usize {
        self.modules.width()
    }
}

/// Encode `text` as a single byte-mode segment in the smallest version that
/// holds it at level `ec_level`.
pub fn encode_text(text: &str, ec_level: EcLevel) -> Result<Symbol, EncodeError> {
    let data = text.as_bytes();
    let too_long = EncodeError::DataTooLong {
        len: data.len(),
        ec: ec_level,
    };

    let (version, capacity_bits) = (1..=40u8)
        .find_map(|version| {
            let capacity = ec_block_info(version, ec_level)?.data_codewords() * 8;
            let count_bits = char_count_bits(MODE_BYTE, version)?;
            let needed = 4 + count_bits + data.len() * 8;
            (data.len() < (1 << count_bits) && needed <= capacity).then_some((version, capacity))
        })
        .ok_or(too_long)?;

    let mut bits = BitBuffer::default();
    bits.append(MODE_BYTE as u32, 4);
    let count_bits = char_count_bits(MODE_BYTE, version).unwrap_or(8);
    bits.append(data.len() as u32, count_bits);
    for &b in data {
        bits.append(b as u32, 8);
    }
    let terminator = (capacity_bits - bits.len()).min(4);
    bits.append(0, terminator);
    let to_byte = (8 - bits.len() % 8) % 8;
    bits.append(0, to_byte);
    let mut codewords = bits.into_bytes();
    for pad in PAD_BYTES.iter().cycle() {
        if codewords.len() * 8 >= capacity_bits {
            break;
        }
        codewords.push(*pad);
    }

    let interleaved = add_ecc_and_interleave(&codewords, version, ec_level);
    Ok(build_symbol(&interleaved, version, ec_level))
}

fn add_ecc_and_interleave(data: &[u8], version: u8, ec_level: EcLevel) -> Vec<u8> {
    let Some(info) = ec_block_info(version, ec_level) else {
        return Vec::new();
    };
    let rs = ReedSolomonEncoder::new(info.ecc_per_block);

    let mut blocks: Vec<(&[u8], Vec<u8>)> = Vec::with_capacity(info.num_blocks);
    let mut offset = 0;
    for b in 0..info.num_blocks {
        let len = info.block_data_len(b);
        let chunk = &data[offset..offset + len];
        offset += len;
        blocks.push((chunk, rs.encode(chunk)));
    }

    let mut out = Vec::with_capacity(info.total_codewords);
    for i in 0..=info.short_block_data_len() {
        for (chunk, _) in &blocks {
            if let Some(&c) = chunk.get(i) {
                out.push(c);
            }
        }
    }
    for i in 0..info.ecc_per_block {
        for (_, ecc) in &blocks {
            out.push(ecc[i]);
        }
    }
    out
}

fn build_symbol(codewords: &[u8], version: u8, ec_level: EcLevel) -> Symbol {
    let func = FunctionMask::new(version);
    let mut base = draw_function_patterns(version);

    let order = placement_order(&func);
    for (i, &(x, y)) in order.iter().enumerate() {
        let bit = codewords
            .get(i / 8)
            .is_some_and(|&c| (c >> (7 - i % 8)) & 1 != 0);
        base.set(x, y, bit);
    }

    let mut best = Symbol {
        modules: base.clone(),
        version,
        ec_level,
        mask: MaskPattern::default(),
    };
    let mut best_score = usize::MAX;
    for mask in MaskPattern::all() {
        let mut modules = base.clone();
        for &(x, y) in &order {
            if mask.applies(x, y) {
                modules.toggle(x, y);
            }
        }
        draw_format(&mut modules, FormatInfo { ec_level, mask });

        let score = penalty::penalty_score(&modules);
        if score < best_score {
            best_score = score;
            best = Symbol {
                modules,
                version,
                ec_level,
                mask,
            };
        }
    }
    best
}

/// Finder, timing, alignment, dark module and version blocks
fn draw_function_patterns(version: u8) -> BitMatrix {
    let size = symbol_size(version);
    let mut m = BitMatrix::square(size);

    for i in 0..size {
        m.set(6, i, i % 2 == 0);
        m.set(i, 6, i % 2 == 0);
    }

    for (cx, cy) in [(3, 3), (size - 4, 3), (3, size - 4)] {
        for dy in -4isize..=4 {
            for dx in -4isize..=4 {
                let (x, y) = (cx as isize + dx, cy as isize + dy);
                if x < 0 || y < 0 || x >= size as isize || y >= size as isize {
                    continue;
                }
                let dist = dx.abs().max(dy.abs());
                m.set(x as usize, y as usize, dist != 2 && dist != 4);
            }
        }
    }

    for (cx, cy) in alignment_pattern_centers(version) {
        for dy in -2isize..=2 {
            for dx in -2isize..=2 {
                let dist = dx.abs().max(dy.abs());
                m.set((cx as isize + dx) as usize, (cy as isize + dy) as usize, dist != 1);
            }
        }
    }

    m.set(8, size - 8, true);

    if version >= 7 {
        let word = encode_version(version);
        for (i, &(a, b)) in version_positions(size).iter().enumerate() {
            let bit = (word >> i) & 1 != 0;
            m.set(a.0, a.1, bit);
            m.set(b.0, b.1, bit);
        }
    }
    m
}

fn draw_format(modules: &mut BitMatrix, info: FormatInfo) {
    let word = info.encode();
    let (first, second) = format_positions(modules.width());
    for i in 0..15 {
        let bit = (word >> i) & 1 != 0;
        modules.set(first[i].0, first[i].1, bit);
        modules.set(second[i].0, second[i].1, bit);
    }
}

/// Append-only big-endian bit buffer
#[derive(Default)]
struct BitBuffer {
    bits: Vec<bool>,
}

impl BitBuffer {
    fn append(&mut self, value: u32, count: usize) {
        for i in (0..count).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    fn len(&self) -> usize {
        self.bits.len()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::bitstream::read_codewords;
    use crate::decoder::payload::{deinterleave_and_correct, parse_segments};
    use crate::decoder::unmask;

    /// Read a symbol straight from its module grid
    fn read_grid(symbol: &Symbol) -> Vec<u8> {
        let info = FormatInfo::read(&symbol.modules).expect("format");
        assert_eq!(info.ec_level, symbol.ec_level);
        assert_eq!(info.mask, symbol.mask);
        let func = FunctionMask::new(symbol.version);
        let mut grid = symbol.modules.clone();
        unmask(&mut grid, &func, info.mask);
        let codewords = read_codewords(&grid, &func);
        let (data, corrected) =
            deinterleave_and_correct(&codewords, symbol.version, info.ec_level).expect("rs");
        assert_eq!(corrected, 0);
        parse_segments(&data, symbol.version).expect("segments")
    }

    #[test]
    fn test_demo_fits_version_one() {
        let symbol = encode_text("demo", EcLevel::M).unwrap();
        assert_eq!(symbol.version, 1);
        assert_eq!(symbol.size(), 21);
        assert_eq!(read_grid(&symbol), b"demo");
        // Finder corners and the dark module
        assert!(symbol.modules.get(0, 0));
        assert!(symbol.modules.get(20, 0));
        assert!(symbol.modules.get(0, 20));
        assert!(symbol.modules.get(8, 13));
        assert!(!symbol.modules.get(7, 7));
    }

    #[test]
    fn test_larger_payloads_pick_bigger_versions() {
        let text = "https://example.com/anchor?id=".repeat(4);
        let symbol = encode_text(&text, EcLevel::Q).unwrap();
        assert!(symbol.version >= 7, "version {}", symbol.version);
        assert_eq!(read_grid(&symbol), text.as_bytes());
        assert_eq!(
            crate::decoder::format::read_version(&symbol.modules),
            Some(symbol.version)
        );
    }

    #[test]
    fn test_utf8_payload() {
        let symbol = encode_text("größe ✓", EcLevel::H).unwrap();
        assert_eq!(read_grid(&symbol), "größe ✓".as_bytes());
    }

    #[test]
    fn test_data_too_long() {
        let text = "x".repeat(3000);
        assert!(matches!(
            encode_text(&text, EcLevel::H),
            Err(EncodeError::DataTooLong { len: 3000, .. })
        ));
    }
}
