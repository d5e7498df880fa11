use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Point;

/// Error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcLevel {
    /// Low (~7% recovery capacity)
    L,
    /// Medium (~15% recovery capacity)
    M,
    /// Quartile (~25% recovery capacity)
    Q,
    /// High (~30% recovery capacity)
    H,
}

impl EcLevel {
    /// All levels, lowest redundancy first
    pub const ALL: [EcLevel; 4] = [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H];

    /// Two-bit indicator stored in the format information (L=01, M=00, Q=11, H=10)
    pub fn format_bits(self) -> u8 {
        match self {
            EcLevel::L => 0b01,
            EcLevel::M => 0b00,
            EcLevel::Q => 0b11,
            EcLevel::H => 0b10,
        }
    }

    /// Inverse of [`EcLevel::format_bits`]
    pub fn from_format_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => EcLevel::L,
            0b00 => EcLevel::M,
            0b11 => EcLevel::Q,
            _ => EcLevel::H,
        }
    }

    /// Row index into the block tables
    pub(crate) fn table_index(self) -> usize {
        match self {
            EcLevel::L => 0,
            EcLevel::M => 1,
            EcLevel::Q => 2,
            EcLevel::H => 3,
        }
    }
}

impl fmt::Display for EcLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EcLevel::L => "L",
            EcLevel::M => "M",
            EcLevel::Q => "Q",
            EcLevel::H => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for EcLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(EcLevel::L),
            "M" => Ok(EcLevel::M),
            "Q" => Ok(EcLevel::Q),
            "H" => Ok(EcLevel::H),
            other => Err(format!("unknown error correction level '{other}'")),
        }
    }
}

/// Data mask pattern (0-7)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    /// Mask from its 3-bit reference; `None` above 7
    pub fn new(reference: u8) -> Option<Self> {
        (reference < 8).then_some(Self(reference))
    }

    /// The 3-bit reference stored in the format information
    pub fn reference(self) -> u8 {
        self.0
    }

    /// All eight masks
    pub fn all() -> impl Iterator<Item = MaskPattern> {
        (0..8).map(MaskPattern)
    }

    /// Whether the module at column `x`, row `y` is inverted by this mask
    pub fn applies(self, x: usize, y: usize) -> bool {
        match self.0 {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (x / 3 + y / 2) % 2 == 0,
            5 => (x * y) % 2 + (x * y) % 3 == 0,
            6 => ((x * y) % 2 + (x * y) % 3) % 2 == 0,
            _ => ((x + y) % 2 + (x * y) % 3) % 2 == 0,
        }
    }
}

/// A symbol read back from an image
#[derive(Debug, Clone)]
pub struct DecodedSymbol {
    /// Concatenated raw segment bytes
    pub bytes: Vec<u8>,
    /// Payload text (invalid UTF-8 replaced)
    pub text: String,
    /// Symbol version (1-40)
    pub version: u8,
    /// Error correction level
    pub ec_level: EcLevel,
    /// Mask pattern used
    pub mask: MaskPattern,
    /// Outer symbol corners that lie inside the image, in symbol order
    /// top-left, top-right, bottom-right, bottom-left
    pub boundary: Vec<Point>,
    /// Reed-Solomon corrections applied across all blocks
    pub corrected_errors: usize,
}

/// Side length in modules for a version
pub fn symbol_size(version: u8) -> usize {
    17 + 4 * version as usize
}
