//! Planar pose of a located marker
//!
//! The pose is the perspective transform taking the four detected corners
//! onto the unit square, plus the in-plane angle of the minimum-area
//! rectangle around them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::LocatorConfig;
use crate::locator::{MarkerDetection, MarkerLocator};
use crate::models::Point;
use crate::utils::geometry::{Homography, min_area_rect};

/// Destination of the corner mapping: (0,0), (1,0), (1,1), (0,1)
pub const UNIT_SQUARE: [Point; 4] = [
    Point { x: 0.0, y: 0.0 },
    Point { x: 1.0, y: 0.0 },
    Point { x: 1.0, y: 1.0 },
    Point { x: 0.0, y: 1.0 },
];

/// Homography and rectangle angle for one set of corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Maps `corners[i]` to `UNIT_SQUARE[i]`
    pub homography: Homography,
    /// Minimum-area rectangle angle in degrees, in `[0, 90)`
    pub angle: f64,
}

/// Estimate the pose of four corners.
///
/// Pure function of its input. Degenerate corners (three collinear, or
/// coincident points) are not rejected: a singular system yields a matrix
/// of NaN, a nearly singular one very large coefficients.
pub fn estimate(corners: &[Point; 4]) -> PoseEstimate {
    let rect = min_area_rect(corners);
    let homography =
        Homography::from_quad(corners, &UNIT_SQUARE).unwrap_or_else(Homography::non_finite);
    PoseEstimate {
        homography,
        angle: rect.angle as f64,
    }
}

/// Detection and pose as one serializable record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseResult {
    /// Decoded payload
    pub data: String,
    /// Corners in image pixels, `[x, y]`
    pub corners: [[f32; 2]; 4],
    /// Row-major homography from image pixels to the unit square
    pub matrix: [[f64; 3]; 3],
    /// Rectangle angle in degrees
    pub angle: f64,
}

impl PoseResult {
    /// Estimate the pose of a detection
    pub fn from_detection(detection: &MarkerDetection) -> Self {
        let pose = estimate(&detection.corners);
        Self {
            data: detection.payload.clone(),
            corners: detection.corners.map(|p| p.to_array()),
            matrix: pose.homography.to_rows(),
            angle: pose.angle,
        }
    }

    /// The matrix as a [`Homography`]
    pub fn homography(&self) -> Homography {
        Homography::from_rows(&self.matrix)
    }

    /// The corners as points
    pub fn corner_points(&self) -> [Point; 4] {
        self.corners.map(Point::from)
    }
}

/// Locate a marker in the image at `path` and estimate its pose with the
/// default configuration. `None` when no marker is found.
pub fn detect_pose(path: impl AsRef<Path>) -> Option<PoseResult> {
    MarkerLocator::new(LocatorConfig::default())
        .locate_path(path)
        .map(|detection| PoseResult::from_detection(&detection))
}

/// [`detect_pose`] for an encoded image in memory
pub fn detect_pose_from_bytes(bytes: &[u8]) -> Option<PoseResult> {
    MarkerLocator::new(LocatorConfig::default())
        .locate_bytes(bytes)
        .map(|detection| PoseResult::from_detection(&detection))
}
