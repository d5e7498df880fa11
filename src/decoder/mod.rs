//! QR symbol decoding
//!
//! Everything after finder detection:
//! - Module size and version estimation
//! - Finder outline measurement and perspective grid sampling
//! - Format and version information (BCH)
//! - Unmasking and zigzag codeword extraction
//! - Block deinterleaving and Reed-Solomon correction
//! - Segment parsing (numeric, alphanumeric, byte, kanji, ECI)

/// Codeword placement order and bit reading
pub mod bitstream;
/// Format and version information
pub mod format;
/// Function module mask builder (finder/timing/format/alignment/version)
pub mod function_mask;
/// Data mode decoders (numeric, alphanumeric, kanji)
pub mod modes;
/// Finder ring and core corners measured from the image
pub mod outline;
/// Block deinterleaving and segment parsing
pub mod payload;
/// Reed-Solomon error correction
pub mod reed_solomon;
/// Module sampling through a perspective transform
pub mod sampler;
/// QR specification tables (ECC codewords/blocks)
pub mod tables;

use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::detector::grouping::FinderTriple;
use crate::models::symbol::symbol_size;
use crate::models::{BitMatrix, DecodedSymbol, MaskPattern, Point};
use crate::utils::geometry::Homography;
use bitstream::read_codewords;
use format::{FormatInfo, read_version};
use function_mask::FunctionMask;
use outline::TripleOutline;
use payload::{deinterleave_and_correct, parse_segments};
use sampler::module_size_along;

/// Decodes symbols from one binarized image
pub struct SymbolDecoder<'a> {
    binary: &'a BitMatrix,
}

impl<'a> SymbolDecoder<'a> {
    /// Decoder over a binarized image, true = dark
    pub fn new(binary: &'a BitMatrix) -> Self {
        Self { binary }
    }

    /// Try to read the symbol framed by `triple`.
    ///
    /// The version estimated from finder spacing is tried first, then its
    /// neighbours; a version field that disagrees redirects to the version
    /// it names. Each version is sampled through the transforms from
    /// [`SymbolDecoder::candidate_transforms`] until one decodes.
    pub fn decode(&self, triple: &FinderTriple) -> Option<DecodedSymbol> {
        let tl = triple.top_left.center;
        let tr = triple.top_right.center;
        let bl = triple.bottom_left.center;
        let guess = triple.module_size();

        let module_x = average(
            module_size_along(self.binary, tl, tr, guess),
            module_size_along(self.binary, tr, tl, guess),
        )
        .unwrap_or(guess);
        let module_y = average(
            module_size_along(self.binary, tl, bl, guess),
            module_size_along(self.binary, bl, tl, guess),
        )
        .unwrap_or(guess);

        let dim_x = tl.distance(&tr) / module_x + 7.0;
        let dim_y = tl.distance(&bl) / module_y + 7.0;
        let estimated = (((dim_x + dim_y) / 2.0 - 17.0) / 4.0).round() as i32;
        trace!(dim_x, dim_y, estimated, "version estimate");

        let module_px = (module_x + module_y) / 2.0;
        let outline = TripleOutline::measure(self.binary, tl, tr, bl, module_px);
        if outline.is_none() {
            trace!("finder outlines not measurable, sampling from centers only");
        }

        let mut candidates: VecDeque<u8> = [0, -1, 1, -2, 2]
            .iter()
            .map(|d| estimated + d)
            .filter(|v| (1..=40).contains(v))
            .map(|v| v as u8)
            .collect();

        let mut tried = Vec::new();
        while let Some(version) = candidates.pop_front() {
            if tried.contains(&version) {
                continue;
            }
            tried.push(version);

            match self.decode_version(tl, tr, bl, outline.as_ref(), version, module_px) {
                Attempt::Decoded(symbol) => return Some(symbol),
                Attempt::VersionMismatch(named) => candidates.push_front(named),
                Attempt::Failed => {}
            }
        }
        None
    }

    fn decode_version(
        &self,
        tl: Point,
        tr: Point,
        bl: Point,
        outline: Option<&TripleOutline>,
        version: u8,
        module_px: f32,
    ) -> Attempt {
        for (i, transform) in self
            .candidate_transforms(tl, tr, bl, outline, version)
            .iter()
            .enumerate()
        {
            match self.read_symbol(transform, version, module_px) {
                Attempt::Failed => trace!(version, transform = i, "no symbol through this transform"),
                done => return done,
            }
        }
        Attempt::Failed
    }

    /// Module-to-image transforms for `version`, most precise first:
    /// 1. Fitted to the measured finder outlines
    /// 2. That fit refined with the bottom-right alignment pattern (v2+)
    /// 3. Finder centers plus a parallelogram fourth corner, refined with
    ///    the alignment pattern when one is found
    pub fn candidate_transforms(
        &self,
        tl: Point,
        tr: Point,
        bl: Point,
        outline: Option<&TripleOutline>,
        version: u8,
    ) -> Vec<Homography> {
        let dimension = symbol_size(version);
        let mut transforms = Vec::with_capacity(3);

        if let Some(outline) = outline {
            let (modules, pixels) = outline.correspondences(dimension);
            if let Some(fitted) = Homography::fit(&modules, &pixels) {
                let refit = (version >= 2)
                    .then(|| sampler::refit_with_alignment(self.binary, &fitted, version, &modules, &pixels))
                    .flatten();
                transforms.push(fitted);
                transforms.extend(refit);
            }
        }

        let br = Point::new(tr.x + bl.x - tl.x, tr.y + bl.y - tl.y);
        if let Some(mut transform) = sampler::build_transform(tl, tr, bl, br, dimension) {
            if version >= 2 {
                if let Some(refined) =
                    sampler::refine_with_alignment(self.binary, &transform, version, tl, tr, bl)
                {
                    transform = refined;
                }
            }
            transforms.push(transform);
        }
        transforms
    }

    fn read_symbol(&self, transform: &Homography, version: u8, module_px: f32) -> Attempt {
        let dimension = symbol_size(version);
        let mut grid = sampler::sample_grid(self.binary, transform, dimension, module_px);

        if version >= 7 {
            match read_version(&grid) {
                Some(named) if named != version => {
                    debug!(version, named, "version field disagrees with finder spacing");
                    return Attempt::VersionMismatch(named);
                }
                _ => {}
            }
        }

        let Some(format) = FormatInfo::read(&grid) else {
            trace!(version, "format information unreadable");
            return Attempt::Failed;
        };

        let func = FunctionMask::new(version);
        unmask(&mut grid, &func, format.mask);
        let codewords = read_codewords(&grid, &func);

        let Some((data, corrected)) = deinterleave_and_correct(&codewords, version, format.ec_level)
        else {
            trace!(version, ec = %format.ec_level, "reed-solomon failed");
            return Attempt::Failed;
        };
        let Some(bytes) = parse_segments(&data, version) else {
            return Attempt::Failed;
        };

        debug!(version, ec = %format.ec_level, corrected, "symbol decoded");
        Attempt::Decoded(DecodedSymbol {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            bytes,
            version,
            ec_level: format.ec_level,
            mask: format.mask,
            boundary: sampler::boundary_corners(
                transform,
                dimension,
                self.binary.width(),
                self.binary.height(),
            ),
            corrected_errors: corrected,
        })
    }
}

enum Attempt {
    Decoded(DecodedSymbol),
    VersionMismatch(u8),
    Failed,
}

/// Toggle every data module the mask pattern covers
pub fn unmask(grid: &mut BitMatrix, func: &FunctionMask, mask: MaskPattern) {
    let size = func.size();
    for y in 0..size {
        for x in 0..size {
            if !func.is_function(x, y) && mask.applies(x, y) {
                grid.toggle(x, y);
            }
        }
    }
}

fn average(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::contour::ContourDetector;
    use crate::detector::grouping::group_finder_patterns;
    use crate::encoder::{encode_text, render_projected};
    use crate::models::EcLevel;
    use crate::utils::binarization::otsu_binarize;

    /// "demo" drawn so its outer corners land on `quad`
    fn demo_on(quad: [Point; 4], side: u32) -> BitMatrix {
        let symbol = encode_text("demo", EcLevel::M).unwrap();
        let n = symbol.size() as f32;
        let square = [
            Point::new(0.0, 0.0),
            Point::new(n, 0.0),
            Point::new(n, n),
            Point::new(0.0, n),
        ];
        let h = Homography::from_quad(&square, &quad).unwrap();
        let image = render_projected(&symbol, side, side, &h);
        otsu_binarize(image.as_raw(), side as usize, side as usize)
    }

    #[test]
    fn test_keystone_boundary_uses_measured_fourth_corner() {
        let quad = [
            Point::new(32.0, 32.0),
            Point::new(200.0, 52.0),
            Point::new(200.0, 180.0),
            Point::new(32.0, 200.0),
        ];
        let binary = demo_on(quad, 232);
        let decoder = SymbolDecoder::new(&binary);
        let symbol = group_finder_patterns(&ContourDetector::detect(&binary))
            .iter()
            .find_map(|t| decoder.decode(t))
            .unwrap();
        assert_eq!(symbol.text, "demo");
        assert_eq!(symbol.boundary.len(), 4);
        for (found, expected) in symbol.boundary.iter().zip(quad) {
            assert!(found.distance(&expected) < 1.5, "{found:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_outline_fit_is_tried_before_centers() {
        let quad = [
            Point::new(32.0, 32.0),
            Point::new(200.0, 44.0),
            Point::new(200.0, 188.0),
            Point::new(32.0, 200.0),
        ];
        let binary = demo_on(quad, 232);
        let triple = group_finder_patterns(&ContourDetector::detect(&binary))[0];
        let (tl, tr, bl) = (
            triple.top_left.center,
            triple.top_right.center,
            triple.bottom_left.center,
        );
        let decoder = SymbolDecoder::new(&binary);

        let centers_only = decoder.candidate_transforms(tl, tr, bl, None, 1);
        assert_eq!(centers_only.len(), 1);

        let outline = TripleOutline::measure(&binary, tl, tr, bl, triple.module_size()).unwrap();
        let transforms = decoder.candidate_transforms(tl, tr, bl, Some(&outline), 1);
        assert_eq!(transforms.len(), 2);
        let measured = transforms[0].map(&Point::new(21.0, 21.0));
        let extrapolated = transforms[1].map(&Point::new(21.0, 21.0));
        assert!(measured.distance(&quad[2]) < extrapolated.distance(&quad[2]));
    }
}
