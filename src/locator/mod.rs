//! Marker location
//!
//! Turns an image into the decoded payload and the four outer corners of
//! the first readable QR symbol:
//! 1. Luma conversion (and optional downscale)
//! 2. Binarization, Otsu or adaptive, whichever suits the frame size first
//! 3. Finder patterns from the configured backend
//! 4. Triple grouping, then symbol decoding in score order
//! 5. The other binarization when nothing decoded
//! 6. Boundary recovery and corner ordering

/// Finder pattern backends and their selection
pub mod backend;

use image::DynamicImage;
use image::GrayImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub use backend::{BackendKind, ContourBackend, MarkerBackend, resolve_backend};
#[cfg(feature = "scanline")]
pub use backend::ScanlineBackend;

use crate::config::{CornerOrder, LocatorConfig};
use crate::decoder::SymbolDecoder;
use crate::detector::grouping::group_finder_patterns;
use crate::error::LocateFailure;
use crate::models::{BitMatrix, Point};
use crate::utils::binarization::{adaptive_binarize, otsu_binarize};
use crate::utils::geometry::order_clockwise_from_origin;

/// A located marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    /// Decoded payload, invalid UTF-8 replaced
    pub payload: String,
    /// Outer symbol corners in original image pixels
    pub corners: [Point; 4],
    /// Backend that found the finder patterns
    pub backend: BackendKind,
    /// Width and height of the input image
    pub image_size: (u32, u32),
}

/// Finds and decodes markers with one backend chosen at construction
pub struct MarkerLocator {
    config: LocatorConfig,
    backend: Box<dyn MarkerBackend>,
}

impl Default for MarkerLocator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

impl MarkerLocator {
    /// Build a locator, resolving the backend preference once
    pub fn new(config: LocatorConfig) -> Self {
        let backend = resolve_backend(config.backend);
        debug!(backend = %backend.kind(), "marker locator ready");
        Self { config, backend }
    }

    /// Build a locator around an explicit backend
    pub fn with_backend(config: LocatorConfig, backend: Box<dyn MarkerBackend>) -> Self {
        Self { config, backend }
    }

    /// Backend in use
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Active configuration
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Locate a marker in the image file at `path`
    pub fn locate_path(&self, path: impl AsRef<Path>) -> Option<MarkerDetection> {
        self.try_locate_path(path).ok()
    }

    /// Locate a marker in an encoded image (PNG, JPEG, ...)
    pub fn locate_bytes(&self, bytes: &[u8]) -> Option<MarkerDetection> {
        self.try_locate_bytes(bytes).ok()
    }

    /// Locate a marker in a decoded image
    pub fn locate_image(&self, image: &DynamicImage) -> Option<MarkerDetection> {
        self.try_locate_image(image).ok()
    }

    /// [`MarkerLocator::locate_path`] with the failure reason
    pub fn try_locate_path(&self, path: impl AsRef<Path>) -> Result<MarkerDetection, LocateFailure> {
        let path = path.as_ref();
        let image = image::open(path).inspect_err(|e| {
            debug!(path = %path.display(), error = %e, "image load failed");
        })?;
        self.try_locate_image(&image)
    }

    /// [`MarkerLocator::locate_bytes`] with the failure reason
    pub fn try_locate_bytes(&self, bytes: &[u8]) -> Result<MarkerDetection, LocateFailure> {
        let image = image::load_from_memory(bytes)?;
        self.try_locate_image(&image)
    }

    /// [`MarkerLocator::locate_image`] with the failure reason
    pub fn try_locate_image(&self, image: &DynamicImage) -> Result<MarkerDetection, LocateFailure> {
        let gray = image.to_luma8();
        let image_size = gray.dimensions();
        let (work, scale_x, scale_y) = match self.downscaled(&gray) {
            Some((small, sx, sy)) => (small, sx, sy),
            None => (gray, 1.0, 1.0),
        };

        let boundary = self.decode_boundary(&work)?;
        if boundary.len() != 4 {
            debug!(points = boundary.len(), "boundary not fully recoverable");
            return Err(LocateFailure::MalformedBoundary {
                points: boundary.len(),
            });
        }
        let (payload, corners) = boundary.into_corners(|p| Point::new(p.x * scale_x, p.y * scale_y));

        let corners = match self.config.corner_order {
            CornerOrder::AsDetected => corners,
            CornerOrder::Canonical => order_clockwise_from_origin(&corners),
        };
        info!(backend = %self.backend.kind(), payload = %payload, "marker located");

        Ok(MarkerDetection {
            payload,
            corners,
            backend: self.backend.kind(),
            image_size,
        })
    }

    /// Locate markers in many files in parallel; results keep input order
    pub fn locate_many<P>(&self, paths: &[P]) -> Vec<Option<MarkerDetection>>
    where
        P: AsRef<Path> + Sync,
    {
        paths.par_iter().map(|p| self.locate_path(p)).collect()
    }

    fn downscaled(&self, gray: &GrayImage) -> Option<(GrayImage, f32, f32)> {
        let max_dim = self.config.max_dim?;
        let (w, h) = gray.dimensions();
        let longest = w.max(h);
        if max_dim == 0 || longest <= max_dim {
            return None;
        }
        let factor = max_dim as f32 / longest as f32;
        let nw = ((w as f32 * factor).round() as u32).max(1);
        let nh = ((h as f32 * factor).round() as u32).max(1);
        debug!(from = ?(w, h), to = ?(nw, nh), "downscaling input");
        let small = imageops::resize(gray, nw, nh, FilterType::Triangle);
        Some((small, w as f32 / nw as f32, h as f32 / nh as f32))
    }

    /// First symbol decoded under either binarization. A decoded symbol
    /// ends the search even when its boundary is incomplete.
    fn decode_boundary(&self, gray: &GrayImage) -> Result<Boundary, LocateFailure> {
        let (w, h) = gray.dimensions();
        for method in Binarization::order_for(w, h) {
            let binary = method.apply(gray);
            let patterns = self.backend.find_patterns(&binary);
            debug!(?method, count = patterns.len(), "finder candidates");
            if patterns.len() < 3 {
                continue;
            }

            let decoder = SymbolDecoder::new(&binary);
            let decoded = group_finder_patterns(&patterns)
                .iter()
                .find_map(|triple| decoder.decode(triple));
            match decoded {
                Some(symbol) => {
                    return Ok(Boundary {
                        payload: symbol.text,
                        points: symbol.boundary,
                    });
                }
                None => debug!(?method, "no decodable triple"),
            }
        }
        Err(LocateFailure::MarkerNotFound)
    }
}

/// Frames at least this wide or tall try adaptive thresholding first
const ADAPTIVE_FIRST_DIM: u32 = 800;
/// Smallest adaptive window; larger frames scale it with their short side
const ADAPTIVE_WINDOW: u32 = 31;

/// Thresholding strategy for one locate pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binarization {
    /// Global Otsu threshold
    Otsu,
    /// Local mean over a square window of the given side
    Adaptive(u32),
}

impl Binarization {
    /// Both strategies, adaptive first on large frames, where uneven
    /// lighting is likelier, and Otsu first otherwise
    fn order_for(width: u32, height: u32) -> [Self; 2] {
        let window = (width.min(height) / 8).max(ADAPTIVE_WINDOW) | 1;
        if width >= ADAPTIVE_FIRST_DIM || height >= ADAPTIVE_FIRST_DIM {
            [Self::Adaptive(window), Self::Otsu]
        } else {
            [Self::Otsu, Self::Adaptive(window)]
        }
    }

    fn apply(self, gray: &GrayImage) -> BitMatrix {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        match self {
            Self::Otsu => otsu_binarize(gray.as_raw(), w, h),
            Self::Adaptive(window) => adaptive_binarize(gray.as_raw(), w, h, window as usize),
        }
    }
}

struct Boundary {
    payload: String,
    points: Vec<Point>,
}

impl Boundary {
    fn len(&self) -> usize {
        self.points.len()
    }

    /// Caller has checked there are exactly four points
    fn into_corners(self, rescale: impl Fn(&Point) -> Point) -> (String, [Point; 4]) {
        let mut corners = [Point::default(); 4];
        for (slot, p) in corners.iter_mut().zip(&self.points) {
            *slot = rescale(p);
        }
        (self.payload, corners)
    }
}
