//! Finder pattern detection by 1:1:3:1:1 run-length scanning with cross checks

use super::{FinderPattern, rank_by_strength};
use crate::models::BitMatrix;

/// Run-length scanner for the three corner finder patterns
pub struct FinderDetector;

#[derive(Debug, Clone, Copy)]
struct Run {
    start: usize,
    len: usize,
    dark: bool,
}

impl FinderDetector {
    /// Scan every row, cross-check each hit vertically and horizontally, and
    /// return the clustered pattern centers, best supported first.
    pub fn detect(matrix: &BitMatrix) -> Vec<FinderPattern> {
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut runs: Vec<Run> = Vec::new();

        for y in 0..matrix.height() {
            row_runs(matrix, y, &mut runs);
            if runs.len() < 5 {
                continue;
            }
            for window in runs.windows(5) {
                if !window[0].dark {
                    continue;
                }
                let lengths = [
                    window[0].len,
                    window[1].len,
                    window[2].len,
                    window[3].len,
                    window[4].len,
                ];
                if !Self::quick_ratio_check(&lengths) || !ratio_matches(&lengths) {
                    continue;
                }
                let center_x = window[2].start as f32 + window[2].len as f32 / 2.0;
                let row_unit = lengths.iter().sum::<usize>() as f32 / 7.0;
                if let Some((pattern, error)) = Self::cross_check(matrix, center_x, y, row_unit) {
                    add_to_clusters(&mut clusters, pattern, error + ratio_error(&lengths));
                }
            }
        }

        let mut patterns: Vec<FinderPattern> = clusters
            .into_iter()
            .filter(|c| c.count >= 2)
            .map(|c| c.pattern().with_strength(c.strength()))
            .collect();
        rank_by_strength(&mut patterns);
        patterns
    }

    /// Integer pre-filter before the floating-point ratio test
    fn quick_ratio_check(lengths: &[usize; 5]) -> bool {
        let total: usize = lengths.iter().sum();
        if total < 7 {
            return false;
        }
        let outer_min = lengths[0].min(lengths[4]);
        lengths[2] >= outer_min * 2 && lengths[2] <= outer_min * 5 + 2
    }

    /// Confirm a row hit along its column, then re-center along the row
    /// through the refined center. Also returns the summed ratio error of
    /// both cross lines.
    fn cross_check(
        matrix: &BitMatrix,
        center_x: f32,
        row: usize,
        row_unit: f32,
    ) -> Option<(FinderPattern, f32)> {
        let col = center_x as usize;
        let (center_y, col_counts) = cross_check_line(matrix.height(), row, |i| matrix.get(col, i))?;
        let col_unit = unit_of(&col_counts);
        if !similar_units(row_unit, col_unit) {
            return None;
        }

        let refined_row = center_y as usize;
        let (refined_x, row_counts) =
            cross_check_line(matrix.width(), col, |i| matrix.get(i, refined_row))?;
        let refined_unit = unit_of(&row_counts);
        if !similar_units(row_unit, refined_unit) {
            return None;
        }

        let pattern = FinderPattern::new(
            refined_x,
            center_y,
            (row_unit + col_unit + refined_unit) / 3.0,
        );
        Some((pattern, ratio_error(&col_counts) + ratio_error(&row_counts)))
    }
}

/// Runs of equal color along row `y`, including the run that touches the
/// right edge.
fn row_runs(matrix: &BitMatrix, y: usize, runs: &mut Vec<Run>) {
    runs.clear();
    let width = matrix.width();
    if width == 0 {
        return;
    }
    let mut start = 0;
    let mut dark = matrix.get(0, y);
    for x in 1..width {
        let color = matrix.get(x, y);
        if color != dark {
            runs.push(Run {
                start,
                len: x - start,
                dark,
            });
            start = x;
            dark = color;
        }
    }
    runs.push(Run {
        start,
        len: width - start,
        dark,
    });
}

/// Walk outward from `at` along one line and measure the five runs around
/// it. Returns the continuous center coordinate of the middle run and the
/// run lengths when they match 1:1:3:1:1.
fn cross_check_line(len: usize, at: usize, get: impl Fn(usize) -> bool) -> Option<(f32, [usize; 5])> {
    if at >= len || !get(at) {
        return None;
    }
    let mut counts = [0usize; 5];

    let mut i = at as isize;
    for (slot, dark) in [(2, true), (1, false), (0, true)] {
        while i >= 0 && get(i as usize) == dark {
            counts[slot] += 1;
            i -= 1;
        }
        if counts[slot] == 0 {
            return None;
        }
    }

    let mut j = at + 1;
    for (slot, dark) in [(2, true), (3, false), (4, true)] {
        while j < len && get(j) == dark {
            counts[slot] += 1;
            j += 1;
        }
        if counts[slot] == 0 {
            return None;
        }
    }

    if !ratio_matches(&counts) {
        return None;
    }
    let center = j as f32 - counts[4] as f32 - counts[3] as f32 - counts[2] as f32 / 2.0;
    Some((center, counts))
}

fn unit_of(counts: &[usize; 5]) -> f32 {
    counts.iter().sum::<usize>() as f32 / 7.0
}

/// Mean absolute deviation from 1:1:3:1:1, in modules per run
fn ratio_error(counts: &[usize; 5]) -> f32 {
    let unit = unit_of(counts);
    if unit <= 0.0 {
        return f32::INFINITY;
    }
    counts
        .iter()
        .zip([1.0f32, 1.0, 3.0, 1.0, 1.0])
        .map(|(&c, expected)| (c as f32 / unit - expected).abs())
        .sum::<f32>()
        / 5.0
}

/// Each outer run within half a module of 1, the middle run within 1.5 of 3
fn ratio_matches(counts: &[usize; 5]) -> bool {
    let total: usize = counts.iter().sum();
    if total < 7 {
        return false;
    }
    let unit = total as f32 / 7.0;
    let max_variance = unit / 2.0;
    [0, 1, 3, 4]
        .iter()
        .all(|&i| (unit - counts[i] as f32).abs() < max_variance)
        && (3.0 * unit - counts[2] as f32).abs() < 3.0 * max_variance
}

fn similar_units(a: f32, b: f32) -> bool {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    hi <= lo * 1.6 + 0.5
}

struct Cluster {
    sum_x: f32,
    sum_y: f32,
    sum_unit: f32,
    sum_error: f32,
    count: usize,
}

impl Cluster {
    fn pattern(&self) -> FinderPattern {
        let n = self.count as f32;
        FinderPattern::new(self.sum_x / n, self.sum_y / n, self.sum_unit / n)
    }

    /// Confirming rows, discounted by the mean ratio error of the hits
    fn strength(&self) -> f32 {
        let n = self.count as f32;
        n / (1.0 + self.sum_error / n)
    }
}

fn add_to_clusters(clusters: &mut Vec<Cluster>, pattern: FinderPattern, error: f32) {
    for cluster in clusters.iter_mut() {
        let current = cluster.pattern();
        let reach = current.module_size.max(pattern.module_size) * 2.0;
        if current.center.distance(&pattern.center) <= reach
            && similar_units(current.module_size, pattern.module_size)
        {
            cluster.sum_x += pattern.center.x;
            cluster.sum_y += pattern.center.y;
            cluster.sum_unit += pattern.module_size;
            cluster.sum_error += error;
            cluster.count += 1;
            return;
        }
    }
    clusters.push(Cluster {
        sum_x: pattern.center.x,
        sum_y: pattern.center.y,
        sum_unit: pattern.module_size,
        sum_error: error,
        count: 1,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Draw a finder pattern whose top-left module is at (`x0`, `y0`)
    fn draw_finder(matrix: &mut BitMatrix, x0: usize, y0: usize, unit: usize) {
        for my in 0..7 {
            for mx in 0..7 {
                let ring = mx == 0 || mx == 6 || my == 0 || my == 6;
                let core = (2..=4).contains(&mx) && (2..=4).contains(&my);
                if ring || core {
                    for dy in 0..unit {
                        for dx in 0..unit {
                            matrix.set(x0 + mx * unit + dx, y0 + my * unit + dy, true);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_detects_single_finder() {
        let mut matrix = BitMatrix::new(60, 60);
        draw_finder(&mut matrix, 10, 12, 4);

        let patterns = FinderDetector::detect(&matrix);
        assert_eq!(patterns.len(), 1, "got {patterns:?}");
        let p = &patterns[0];
        assert!((p.center.x - 24.0).abs() < 1.0, "x = {}", p.center.x);
        assert!((p.center.y - 26.0).abs() < 1.0, "y = {}", p.center.y);
        assert!((p.module_size - 4.0).abs() < 0.5);
    }

    #[test]
    fn test_finder_touching_right_edge() {
        // The last dark run ends at the image edge and must still count
        let mut matrix = BitMatrix::new(31, 40);
        draw_finder(&mut matrix, 3, 5, 4);
        let patterns = FinderDetector::detect(&matrix);
        assert_eq!(patterns.len(), 1);
        assert!((patterns[0].center.x - 17.0).abs() < 1.0);
    }

    #[test]
    fn test_quick_ratio_check() {
        assert!(FinderDetector::quick_ratio_check(&[3, 3, 9, 3, 3]));
        assert!(!FinderDetector::quick_ratio_check(&[1, 1, 3, 0, 1]));
        assert!(!FinderDetector::quick_ratio_check(&[3, 3, 4, 3, 3]));
    }

    #[test]
    fn test_ratio_matches() {
        assert!(ratio_matches(&[4, 4, 12, 4, 4]));
        assert!(ratio_matches(&[4, 5, 11, 4, 4]));
        assert!(!ratio_matches(&[4, 4, 4, 4, 4]));
        assert!(!ratio_matches(&[8, 4, 12, 4, 4]));
    }

    #[test]
    fn test_larger_pattern_ranks_first() {
        // Small pattern above, larger one below: raster order would list the
        // small one first
        let mut matrix = BitMatrix::new(120, 140);
        draw_finder(&mut matrix, 10, 5, 3);
        draw_finder(&mut matrix, 30, 50, 8);
        let patterns = FinderDetector::detect(&matrix);
        assert_eq!(patterns.len(), 2, "got {patterns:?}");
        assert!((patterns[0].module_size - 8.0).abs() < 0.5);
        assert!(patterns[0].strength > patterns[1].strength);
    }

    #[test]
    fn test_ratio_error_is_zero_for_ideal_runs() {
        assert_eq!(ratio_error(&[4, 4, 12, 4, 4]), 0.0);
        assert!(ratio_error(&[4, 5, 11, 4, 4]) > 0.0);
    }

    #[test]
    fn test_plain_stripes_are_rejected() {
        let matrix = BitMatrix::from_fn(60, 60, |x, _| (x / 4) % 2 == 0);
        assert!(FinderDetector::detect(&matrix).is_empty());
    }
}
