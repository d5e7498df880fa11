//! qr_pose - QR marker localisation and planar pose estimation
//!
//! Finds a QR code in a photograph, reads its payload and outer corners,
//! and estimates the perspective transform and in-plane angle of the
//! marker. The pose can be turned into a scene transform and handed to an
//! external renderer that anchors a 3D object on the marker.
//!
//! ```no_run
//! use qr_pose::detect_pose;
//!
//! if let Some(pose) = detect_pose("photo.png") {
//!     println!("{} at {:.1} degrees", pose.data, pose.angle);
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Scene composition through an external renderer
pub mod compositor;
/// Locator and placement settings
pub mod config;
/// QR symbol decoding (sampling, format, error correction, data modes)
pub mod decoder;
/// Finder pattern detection (scanline and contour backends)
pub mod detector;
/// QR symbol synthesis and rasterisation
pub mod encoder;
/// Error types
pub mod error;
/// Marker location with backend selection
pub mod locator;
/// Core data structures (BitMatrix, Point, symbol metadata)
pub mod models;
/// End-to-end detect, place and compose
pub mod pipeline;
/// Object placement on the background plane
pub mod placement;
/// Homography and angle estimation
pub mod pose;
/// Utility functions (binarization, geometry)
pub mod utils;

pub use compositor::{BlenderCompositor, SceneCompositor, SceneRequest};
pub use config::{BackendPreference, CornerOrder, LocatorConfig, PlacementConfig, Settings};
pub use error::{Error, LocateFailure, Result};
pub use locator::{BackendKind, MarkerDetection, MarkerLocator};
pub use models::{BitMatrix, EcLevel, MaskPattern, Point};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use placement::WorldTransform;
pub use pose::{PoseEstimate, PoseResult, detect_pose, detect_pose_from_bytes, estimate};
pub use utils::geometry::Homography;
