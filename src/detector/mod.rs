//! Finder pattern detection
//!
//! - Run-length scanning with cross checks (`scanline` feature)
//! - Nested connected components (contour hierarchy)
//! - Grouping of finder patterns into symbol-shaped triples

use crate::models::Point;

/// Connected-component labeling with per-component statistics
pub mod connected_components;
/// Finder patterns as a dark ring enclosing a dark core
pub mod contour;
/// Finder pattern detection using 1:1:3:1:1 ratio scanning
#[cfg(feature = "scanline")]
pub mod finder;
/// Triples of finder patterns that can form one symbol
pub mod grouping;

/// Center and module size of one finder pattern, in continuous pixel
/// coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    /// Pattern center
    pub center: Point,
    /// Estimated module size in pixels
    pub module_size: f32,
    /// Backend-specific support for the candidate, higher is stronger:
    /// confirming scan rows for run-length scanning, dark pixels for
    /// contours, each discounted by how far the shape is from an ideal
    /// finder.
    pub strength: f32,
}

impl FinderPattern {
    /// Create a pattern at (`x`, `y`) with unit strength
    pub fn new(x: f32, y: f32, module_size: f32) -> Self {
        Self {
            center: Point::new(x, y),
            module_size,
            strength: 1.0,
        }
    }

    /// Same pattern with `strength` attached
    pub fn with_strength(self, strength: f32) -> Self {
        Self { strength, ..self }
    }
}

/// Sort candidates strongest first; ties keep their detection order
pub fn rank_by_strength(patterns: &mut [FinderPattern]) {
    patterns.sort_by(|a, b| b.strength.total_cmp(&a.strength));
}
