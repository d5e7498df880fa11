//! Scene placement
//!
//! The renderer shows the photograph on a square plane of side
//! `plane_size`, centred at the origin with x to the right and y up, and
//! stretched to fill it. The marker's image position, orientation and size
//! on that plane give the world matrix of an object modelled with one
//! marker edge as its unit length, local +x along the marker's top edge and
//! local +y toward the marker's top.

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::PlacementConfig;
use crate::error::PlacementError;
use crate::pose::PoseResult;

/// Row-major 4x4 object-to-world matrix: `T(center, lift) * Rz(theta) * S(s)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTransform {
    /// Matrix rows
    pub matrix: [[f64; 4]; 4],
}

impl WorldTransform {
    /// Place an object on the marker of `pose` in an image of
    /// `image_size` pixels.
    pub fn from_pose(
        pose: &PoseResult,
        image_size: (u32, u32),
        config: &PlacementConfig,
    ) -> Result<Self, PlacementError> {
        let homography = pose.homography();
        if !homography.is_finite() || image_size.0 == 0 || image_size.1 == 0 {
            return Err(PlacementError::DegenerateHomography);
        }
        let to_image = homography
            .inverse()
            .filter(|h| h.is_finite())
            .ok_or(PlacementError::DegenerateHomography)?;

        let plane = ImagePlane {
            width: image_size.0 as f64,
            height: image_size.1 as f64,
            size: config.plane_size,
        };
        let at = |u: f64, v: f64| {
            let (x, y) = to_image.map_f64(u, v);
            plane.project(x, y)
        };

        let center = at(0.5, 0.5);
        let x_axis = sub(at(1.0, 0.5), at(0.0, 0.5));
        let y_axis = sub(at(0.5, 1.0), at(0.5, 0.0));
        let edge_x = x_axis.0.hypot(x_axis.1);
        let edge_y = y_axis.0.hypot(y_axis.1);
        let scale = (edge_x * edge_y).sqrt();
        let theta = x_axis.1.atan2(x_axis.0);

        let matrix = Matrix4::new_translation(&Vector3::new(center.0, center.1, config.lift))
            * Rotation3::from_axis_angle(&Vector3::z_axis(), theta).to_homogeneous()
            * Matrix4::new_scaling(scale);

        if !matrix.iter().all(|v| v.is_finite()) || scale <= 0.0 {
            return Err(PlacementError::DegenerateHomography);
        }
        Ok(Self {
            matrix: std::array::from_fn(|r| std::array::from_fn(|c| matrix[(r, c)])),
        })
    }

    /// Translation column
    pub fn translation(&self) -> [f64; 3] {
        [self.matrix[0][3], self.matrix[1][3], self.matrix[2][3]]
    }

    /// Uniform scale factor
    pub fn scale(&self) -> f64 {
        self.matrix[0][0].hypot(self.matrix[1][0])
    }

    /// Rotation about the plane normal, in degrees counter-clockwise
    pub fn rotation_degrees(&self) -> f64 {
        self.matrix[1][0].atan2(self.matrix[0][0]).to_degrees()
    }

    /// Transform an object-space point
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        std::array::from_fn(|r| m[r][0] * p[0] + m[r][1] * p[1] + m[r][2] * p[2] + m[r][3])
    }
}

struct ImagePlane {
    width: f64,
    height: f64,
    size: f64,
}

impl ImagePlane {
    /// Image pixel to plane coordinates (y flipped)
    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x / self.width - 0.5) * self.size,
            (0.5 - y / self.height) * self.size,
        )
    }
}

fn sub(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{BackendKind, MarkerDetection};
    use crate::models::Point;
    use approx::assert_abs_diff_eq;

    fn pose_for(corners: [Point; 4]) -> PoseResult {
        PoseResult::from_detection(&MarkerDetection {
            payload: "demo".into(),
            corners,
            backend: BackendKind::Contour,
            image_size: (400, 400),
        })
    }

    #[test]
    fn test_centered_marker() {
        // 100 px marker in the middle of a 400 px image, plane side 2
        let pose = pose_for([
            Point::new(150.0, 150.0),
            Point::new(250.0, 150.0),
            Point::new(250.0, 250.0),
            Point::new(150.0, 250.0),
        ]);
        let t = WorldTransform::from_pose(&pose, (400, 400), &PlacementConfig::default()).unwrap();
        let [x, y, z] = t.translation();
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.scale(), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(t.rotation_degrees(), 0.0, epsilon = 1e-6);
        assert_eq!(t.matrix[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_offset_rotated_and_lifted() {
        // Marker in the top-right quadrant, turned 90 degrees clockwise on screen
        let pose = pose_for([
            Point::new(350.0, 50.0),
            Point::new(350.0, 150.0),
            Point::new(250.0, 150.0),
            Point::new(250.0, 50.0),
        ]);
        let config = PlacementConfig {
            plane_size: 4.0,
            lift: 0.25,
        };
        let t = WorldTransform::from_pose(&pose, (400, 400), &config).unwrap();
        let [x, y, z] = t.translation();
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(t.scale(), 1.0, epsilon = 1e-6);
        // Clockwise on screen is clockwise on the y-up plane
        assert_abs_diff_eq!(t.rotation_degrees(), -90.0, epsilon = 1e-6);

        // The marker's local +x edge points down the image, i.e. -y on the plane
        let [px, py, _] = t.apply([0.5, 0.0, 0.0]);
        assert_abs_diff_eq!(px, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(py, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_pose_is_rejected() {
        let pose = pose_for([Point::default(); 4]);
        assert!(matches!(
            WorldTransform::from_pose(&pose, (400, 400), &PlacementConfig::default()),
            Err(PlacementError::DegenerateHomography)
        ));
    }

    #[test]
    fn test_matrix_serializes_as_rows() {
        let pose = pose_for([
            Point::new(150.0, 150.0),
            Point::new(250.0, 150.0),
            Point::new(250.0, 250.0),
            Point::new(150.0, 250.0),
        ]);
        let t = WorldTransform::from_pose(&pose, (400, 400), &PlacementConfig::default()).unwrap();
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["matrix"].as_array().unwrap().len(), 4);
        assert_eq!(json["matrix"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
    }
}
