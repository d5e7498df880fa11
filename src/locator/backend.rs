//! Finder pattern backends.
//!
//! Both backends turn a binarized image into finder pattern candidates;
//! grouping and symbol decoding are shared.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BackendPreference;
use crate::detector::FinderPattern;
use crate::detector::contour::ContourDetector;
use crate::models::BitMatrix;

/// Backend that produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 1:1:3:1:1 run-length scanning
    Scanline,
    /// Nested connected components
    Contour,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scanline => "scanline",
            Self::Contour => "contour",
        })
    }
}

/// Source of finder pattern candidates
pub trait MarkerBackend: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Finder pattern candidates in `binary`, strongest first
    fn find_patterns(&self, binary: &BitMatrix) -> Vec<FinderPattern>;
}

/// Run-length scanning backend
#[cfg(feature = "scanline")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanlineBackend;

#[cfg(feature = "scanline")]
impl MarkerBackend for ScanlineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Scanline
    }

    fn find_patterns(&self, binary: &BitMatrix) -> Vec<FinderPattern> {
        crate::detector::finder::FinderDetector::detect(binary)
    }
}

/// Contour hierarchy backend, always available
#[derive(Debug, Default, Clone, Copy)]
pub struct ContourBackend;

impl MarkerBackend for ContourBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Contour
    }

    fn find_patterns(&self, binary: &BitMatrix) -> Vec<FinderPattern> {
        ContourDetector::detect(binary)
    }
}

/// Whether the scanline backend is compiled in
pub const fn scanline_available() -> bool {
    cfg!(feature = "scanline")
}

/// Pick the backend for `preference`. `Auto` takes the scanline backend
/// when compiled in; an explicit `Scanline` request without the feature
/// falls back to contours with a warning.
pub fn resolve_backend(preference: BackendPreference) -> Box<dyn MarkerBackend> {
    match preference {
        BackendPreference::Contour => Box::new(ContourBackend),
        BackendPreference::Auto | BackendPreference::Scanline => primary_or_fallback(preference),
    }
}

#[cfg(feature = "scanline")]
fn primary_or_fallback(_preference: BackendPreference) -> Box<dyn MarkerBackend> {
    Box::new(ScanlineBackend)
}

#[cfg(not(feature = "scanline"))]
fn primary_or_fallback(preference: BackendPreference) -> Box<dyn MarkerBackend> {
    if preference == BackendPreference::Scanline {
        tracing::warn!("scanline backend not compiled in, using contour backend");
    }
    Box::new(ContourBackend)
}
