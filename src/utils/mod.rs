//! Image and geometry helpers
//!
//! - Binarization (Otsu's method and fixed threshold)
//! - Geometry (homographies, convex hull, minimum-area rectangle)

/// Grayscale to bit matrix
pub mod binarization;
/// Homographies and planar geometry
pub mod geometry;
