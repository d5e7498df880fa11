//! Format and version information: BCH encoding, module positions, and
//! nearest-codeword decoding.

use crate::models::{BitMatrix, EcLevel, MaskPattern};

const FORMAT_GENERATOR: u32 = 0x537;
const FORMAT_XOR_MASK: u32 = 0x5412;
const VERSION_GENERATOR: u32 = 0x1F25;

/// Codewords farther than this from every valid one are rejected
const MAX_CORRECTABLE_BITS: u32 = 3;

/// Remainder of `data << degree` divided by `generator` over GF(2)
fn bch_remainder(data: u32, generator: u32, degree: u32) -> u32 {
    let mut rem = data << degree;
    for bit in (degree..degree + 16).rev() {
        if rem & (1 << bit) != 0 {
            rem ^= generator << (bit - degree);
        }
    }
    rem
}

/// Mask pattern and EC level read from the 15-bit format field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Error correction level
    pub ec_level: EcLevel,
    /// Data mask
    pub mask: MaskPattern,
}

impl FormatInfo {
    /// 15 masked bits as placed in the symbol
    pub fn encode(&self) -> u16 {
        let data = ((self.ec_level.format_bits() as u32) << 3) | self.mask.reference() as u32;
        (((data << 10) | bch_remainder(data, FORMAT_GENERATOR, 10)) ^ FORMAT_XOR_MASK) as u16
    }

    /// Nearest valid format word to `bits` and its Hamming distance
    fn nearest(bits: u16) -> Option<(Self, u32)> {
        EcLevel::ALL
            .iter()
            .flat_map(|&ec_level| MaskPattern::all().map(move |mask| Self { ec_level, mask }))
            .map(|candidate| (candidate, (candidate.encode() ^ bits).count_ones()))
            .min_by_key(|&(_, distance)| distance)
    }

    /// Read both copies from a sampled grid and keep the closer decode.
    pub fn read(grid: &BitMatrix) -> Option<Self> {
        let size = grid.width();
        let (first, second) = format_positions(size);
        let read = |positions: &[(usize, usize); 15]| {
            positions
                .iter()
                .enumerate()
                .fold(0u16, |acc, (i, &(x, y))| acc | ((grid.get(x, y) as u16) << i))
        };

        let a = Self::nearest(read(&first))?;
        let b = Self::nearest(read(&second))?;
        let (info, distance) = if b.1 < a.1 { b } else { a };
        (distance <= MAX_CORRECTABLE_BITS).then_some(info)
    }
}

/// Module coordinates `(x, y)` of format bit `i` (bit 0 is least significant)
/// for both copies.
pub fn format_positions(size: usize) -> ([(usize, usize); 15], [(usize, usize); 15]) {
    let mut first = [(0usize, 0usize); 15];
    let mut second = [(0usize, 0usize); 15];
    for (i, slot) in first.iter_mut().enumerate() {
        *slot = match i {
            0..=5 => (8, i),
            6 => (8, 7),
            7 => (8, 8),
            8 => (7, 8),
            _ => (14 - i, 8),
        };
    }
    for (i, slot) in second.iter_mut().enumerate() {
        *slot = if i < 8 {
            (size - 1 - i, 8)
        } else {
            (8, size - 15 + i)
        };
    }
    (first, second)
}

/// 18-bit version word for versions 7 and up
pub fn encode_version(version: u8) -> u32 {
    let v = version as u32;
    (v << 12) | bch_remainder(v, VERSION_GENERATOR, 12)
}

/// Module coordinates of version bit `i` in the top-right and bottom-left
/// blocks
pub fn version_positions(size: usize) -> [((usize, usize), (usize, usize)); 18] {
    let mut out = [((0, 0), (0, 0)); 18];
    for (i, slot) in out.iter_mut().enumerate() {
        let a = size - 11 + i % 3;
        let b = i / 3;
        *slot = ((a, b), (b, a));
    }
    out
}

/// Decode the version blocks of a grid, accepting up to three bit errors.
pub fn read_version(grid: &BitMatrix) -> Option<u8> {
    let positions = version_positions(grid.width());
    let mut top_right = 0u32;
    let mut bottom_left = 0u32;
    for (i, &(tr, bl)) in positions.iter().enumerate() {
        top_right |= (grid.get(tr.0, tr.1) as u32) << i;
        bottom_left |= (grid.get(bl.0, bl.1) as u32) << i;
    }

    let mut best: Option<(u8, u32)> = None;
    for version in 7..=40u8 {
        let code = encode_version(version);
        let distance = (code ^ top_right).count_ones().min((code ^ bottom_left).count_ones());
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((version, distance));
        }
    }
    best.filter(|&(_, d)| d <= MAX_CORRECTABLE_BITS).map(|(v, _)| v)
}
