//! Error types.
//!
//! Expected locator failures are values (`LocateFailure`) that the plain
//! `locate_*` calls collapse to `None`. The outer layers (encoding,
//! placement, composition) report through their own enums, gathered into
//! [`Error`] for the pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::EcLevel;

/// Why a locate call produced no detection
#[derive(Debug, Error)]
pub enum LocateFailure {
    /// The input could not be read or decoded as an image
    #[error("image could not be loaded: {0}")]
    ImageLoad(#[from] image::ImageError),
    /// No decodable marker in the image
    #[error("no marker found")]
    MarkerNotFound,
    /// A marker decoded but its boundary did not resolve to four points
    #[error("marker boundary has {points} recoverable corners, expected 4")]
    MalformedBoundary {
        /// Corners that could be recovered
        points: usize,
    },
}

/// Marker synthesis errors
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Payload exceeds version 40 capacity at the requested level
    #[error("{len} bytes do not fit in any version at level {ec}")]
    DataTooLong {
        /// Payload length in bytes
        len: usize,
        /// Requested error correction level
        ec: EcLevel,
    },
}

/// Pose to scene-transform conversion errors
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The homography is non-finite or cannot be inverted
    #[error("homography is degenerate and cannot be placed")]
    DegenerateHomography,
}

/// Scene compositor errors
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The render executable is not on the system
    #[error("render executable not found: {}", executable.display())]
    NotInstalled {
        /// Executable that was looked up
        executable: PathBuf,
    },
    /// Spawning or waiting on the render process failed
    #[error("render process I/O failed")]
    Io(#[from] std::io::Error),
    /// The transform could not be serialized for the render process
    #[error("transform serialization failed")]
    Serialize(#[from] serde_json::Error),
    /// Render process exited unsuccessfully
    #[error("render process failed (exit code {code:?}): {stderr}")]
    Failed {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },
    /// Render process exceeded its time limit and was killed
    #[error("render process timed out after {0:?}")]
    TimedOut(Duration),
}

/// Settings file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read settings {}", path.display())]
    Read {
        /// Settings path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// File is not valid settings JSON
    #[error("failed to parse settings {}", path.display())]
    Parse {
        /// Settings path
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Crate-level error for the end-to-end pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// No usable marker in the input; composition was not attempted
    #[error("no marker detected in {}", path.display())]
    MarkerNotDetected {
        /// Input image
        path: PathBuf,
        /// Locator failure
        #[source]
        reason: LocateFailure,
    },
    /// Marker synthesis failed
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Placement failed
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// Composition failed
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_failure_messages() {
        assert_eq!(LocateFailure::MarkerNotFound.to_string(), "no marker found");
        assert_eq!(
            LocateFailure::MalformedBoundary { points: 1 }.to_string(),
            "marker boundary has 1 recoverable corners, expected 4"
        );
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = PlacementError::DegenerateHomography.into();
        assert!(matches!(err, Error::Placement(_)));
        let err: Error = EncodeError::DataTooLong {
            len: 5000,
            ec: EcLevel::H,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "5000 bytes do not fit in any version at level H"
        );
    }
}
