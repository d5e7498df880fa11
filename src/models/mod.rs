//! Core value types shared by the detector, decoder and encoder.

/// Packed bit grid
pub mod matrix;
/// Continuous pixel coordinates
pub mod point;
/// Symbol metadata (EC level, mask, decoded result)
pub mod symbol;

pub use matrix::BitMatrix;
pub use point::Point;
pub use symbol::{DecodedSymbol, EcLevel, MaskPattern};
