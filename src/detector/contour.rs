use super::{FinderPattern, rank_by_strength};
use super::connected_components::{Component, find_dark_components};
use crate::models::BitMatrix;

/// Dark modules in a finder pattern: 24 in the ring, 9 in the core
const RING_MODULES: f32 = 24.0;
const CORE_MODULES: f32 = 9.0;

/// Finder detection from the component hierarchy: a dark ring whose hole
/// holds a dark core, with the areas of a 7x7 ring around a 3x3 square.
pub struct ContourDetector;

impl ContourDetector {
    /// Detect finder patterns as ring/core component pairs, largest and
    /// best shaped first.
    ///
    /// Areas and centroids are rotation invariant, so this works at any
    /// in-plane angle where the ring stays connected.
    pub fn detect(matrix: &BitMatrix) -> Vec<FinderPattern> {
        let components: Vec<Component> = find_dark_components(matrix)
            .into_iter()
            .filter(|c| c.area >= 4)
            .collect();

        let mut patterns = Vec::new();
        for core in &components {
            let Some(ring) = components
                .iter()
                .filter(|ring| is_ring_around(ring, core))
                .min_by_key(|ring| ring.area)
            else {
                continue;
            };

            let dark = (ring.area + core.area) as f32;
            let module_size = (dark / (RING_MODULES + CORE_MODULES)).sqrt();
            let center = ring.centroid();
            let core_center = core.centroid();
            let pattern = FinderPattern::new(
                (center.x + core_center.x) / 2.0,
                (center.y + core_center.y) / 2.0,
                module_size,
            );
            patterns.push(pattern.with_strength(dark / (1.0 + shape_error(ring, core))));
        }
        rank_by_strength(&mut patterns);
        patterns
    }
}

/// Relative deviation of the area and span ratios from a 7x7 ring around a
/// 3x3 core, plus the centroid offset in modules
fn shape_error(ring: &Component, core: &Component) -> f32 {
    let ideal_area = RING_MODULES / CORE_MODULES;
    let ideal_span = 7.0 / 3.0;
    let area_ratio = ring.area as f32 / core.area as f32;
    let module = (ring.area as f32 / RING_MODULES).sqrt();
    (area_ratio - ideal_area).abs() / ideal_area
        + (span_ratio(ring, core) - ideal_span).abs() / ideal_span
        + ring.centroid().distance(&core.centroid()) / module
}

fn span_ratio(ring: &Component, core: &Component) -> f32 {
    ring.width().max(ring.height()) as f32 / core.width().max(core.height()) as f32
}

fn is_ring_around(ring: &Component, core: &Component) -> bool {
    if !ring.encloses(core) {
        return false;
    }

    let area_ratio = ring.area as f32 / core.area as f32;
    if !(1.6..=4.2).contains(&area_ratio) {
        return false;
    }

    // 7 modules across the ring, 3 across the core, whatever the rotation
    if !(1.7..=3.4).contains(&span_ratio(ring, core)) {
        return false;
    }

    let module = (ring.area as f32 / RING_MODULES).sqrt();
    ring.centroid().distance(&core.centroid()) <= module
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder_matrix(unit: usize, offset: usize, size: usize) -> BitMatrix {
        BitMatrix::from_fn(size, size, |x, y| {
            if x < offset || y < offset {
                return false;
            }
            let (mx, my) = ((x - offset) / unit, (y - offset) / unit);
            if mx > 6 || my > 6 {
                return false;
            }
            let ring = mx == 0 || mx == 6 || my == 0 || my == 6;
            let core = (2..=4).contains(&mx) && (2..=4).contains(&my);
            ring || core
        })
    }

    #[test]
    fn test_detects_ring_and_core() {
        let matrix = finder_matrix(5, 10, 60);
        let patterns = ContourDetector::detect(&matrix);
        assert_eq!(patterns.len(), 1);
        let p = patterns[0];
        assert!((p.center.x - 27.5).abs() < 0.01, "x = {}", p.center.x);
        assert!((p.center.y - 27.5).abs() < 0.01);
        assert!((p.module_size - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_larger_pattern_ranks_first() {
        let matrix = BitMatrix::from_fn(150, 150, |x, y| {
            let finder_at = |x0: usize, y0: usize, unit: usize| {
                if x < x0 || y < y0 {
                    return false;
                }
                let (mx, my) = ((x - x0) / unit, (y - y0) / unit);
                if mx > 6 || my > 6 {
                    return false;
                }
                mx == 0 || mx == 6 || my == 0 || my == 6 || ((2..=4).contains(&mx) && (2..=4).contains(&my))
            };
            finder_at(5, 5, 3) || finder_at(40, 60, 10)
        });
        let patterns = ContourDetector::detect(&matrix);
        assert_eq!(patterns.len(), 2);
        assert!((patterns[0].module_size - 10.0).abs() < 0.01);
        assert!(patterns[0].strength > patterns[1].strength);
    }

    #[test]
    fn test_solid_square_is_not_a_finder() {
        let matrix = BitMatrix::from_fn(40, 40, |x, y| (5..30).contains(&x) && (5..30).contains(&y));
        assert!(ContourDetector::detect(&matrix).is_empty());
    }

    #[test]
    fn test_ring_with_wrong_core_rejected() {
        // Core a single module wide: area ratio far above a finder's
        let matrix = BitMatrix::from_fn(40, 40, |x, y| {
            let (mx, my) = (x / 4, y / 4);
            let ring = ((mx == 1 || mx == 7) && (1..=7).contains(&my))
                || ((my == 1 || my == 7) && (1..=7).contains(&mx));
            ring || (mx == 4 && my == 4)
        });
        assert!(ContourDetector::detect(&matrix).is_empty());
    }
}
