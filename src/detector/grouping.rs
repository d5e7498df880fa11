use super::FinderPattern;
use crate::models::point::cross;

/// Upper bound on triples handed to the decoder
const MAX_GROUPS: usize = 1024;
/// Strongest patterns considered when forming triples
const MAX_PATTERNS: usize = 64;

/// Three finder patterns arranged as the corners of one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderTriple {
    /// Pattern at the right angle
    pub top_left: FinderPattern,
    /// Pattern one symbol edge clockwise (on screen) from `top_left`
    pub top_right: FinderPattern,
    /// Remaining pattern
    pub bottom_left: FinderPattern,
    /// Geometric mismatch, lower is better
    pub score: f32,
}

impl FinderTriple {
    /// Mean module size of the three patterns
    pub fn module_size(&self) -> f32 {
        (self.top_left.module_size + self.top_right.module_size + self.bottom_left.module_size) / 3.0
    }

    fn weakest(&self) -> f32 {
        self.top_left
            .strength
            .min(self.top_right.strength)
            .min(self.bottom_left.strength)
    }
}

/// Every plausible triple, best geometry first, capped at a fixed count.
///
/// Only the strongest patterns take part; equal scores prefer the triple
/// whose weakest member is stronger.
pub fn group_finder_patterns(patterns: &[FinderPattern]) -> Vec<FinderTriple> {
    let mut ranked = patterns.to_vec();
    super::rank_by_strength(&mut ranked);
    ranked.truncate(MAX_PATTERNS);
    let patterns = ranked.as_slice();
    let mut groups = Vec::new();

    for i in 0..patterns.len() {
        for j in (i + 1)..patterns.len() {
            for k in (j + 1)..patterns.len() {
                if let Some(triple) = order_triple(&patterns[i], &patterns[j], &patterns[k]) {
                    groups.push(triple);
                }
            }
        }
    }

    groups.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(b.weakest().total_cmp(&a.weakest()))
    });
    groups.truncate(MAX_GROUPS);
    groups
}

/// Pick the right-angle corner as top-left and orient the other two by the
/// sign of the cross product.
fn order_triple(a: &FinderPattern, b: &FinderPattern, c: &FinderPattern) -> Option<FinderTriple> {
    let patterns = [a, b, c];

    let sizes = [a.module_size, b.module_size, c.module_size];
    let min_size = sizes.iter().copied().fold(f32::INFINITY, f32::min);
    let max_size = sizes.iter().copied().fold(0.0f32, f32::max);
    if min_size <= 0.0 || max_size / min_size > 1.5 {
        return None;
    }

    let mut best_idx = 0usize;
    let mut best_cos = f32::INFINITY;
    for i in 0..3 {
        let p = patterns[i].center;
        let v1 = p.to(&patterns[(i + 1) % 3].center);
        let v2 = p.to(&patterns[(i + 2) % 3].center);
        let denom = (v1.x * v1.x + v1.y * v1.y).sqrt() * (v2.x * v2.x + v2.y * v2.y).sqrt();
        if denom == 0.0 {
            continue;
        }
        let cos = ((v1.x * v2.x + v1.y * v2.y) / denom).abs();
        if cos < best_cos {
            best_cos = cos;
            best_idx = i;
        }
    }
    if best_cos > 0.3 {
        return None;
    }

    let tl = patterns[best_idx];
    let p1 = patterns[(best_idx + 1) % 3];
    let p2 = patterns[(best_idx + 2) % 3];
    let (tr, bl) = if cross(&tl.center, &p1.center, &p2.center) > 0.0 {
        (p1, p2)
    } else {
        (p2, p1)
    };

    let avg_module = (min_size + max_size) / 2.0;
    let d_tr = tl.center.distance(&tr.center);
    let d_bl = tl.center.distance(&bl.center);
    // Finder centers are at least 14 modules apart (version 1); diagonal
    // run lengths overstate the module size by up to sqrt(2)
    if d_tr.min(d_bl) < avg_module * 7.0 {
        return None;
    }
    let leg_mismatch = (d_tr - d_bl).abs() / d_tr.max(d_bl);
    if leg_mismatch > 0.4 {
        return None;
    }

    Some(FinderTriple {
        top_left: *tl,
        top_right: *tr,
        bottom_left: *bl,
        score: best_cos + leg_mismatch + (max_size / min_size - 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    #[test]
    fn test_orders_upright_triple() {
        let patterns = [
            FinderPattern::new(150.0, 30.0, 5.0),
            FinderPattern::new(30.0, 150.0, 5.0),
            FinderPattern::new(30.0, 30.0, 5.0),
        ];
        let groups = group_finder_patterns(&patterns);
        assert_eq!(groups.len(), 1);
        let g = groups[0];
        assert_eq!(g.top_left.center.x, 30.0);
        assert_eq!(g.top_right.center.x, 150.0);
        assert_eq!(g.bottom_left.center.y, 150.0);
    }

    #[test]
    fn test_orders_rotated_triple() {
        // Symbol rotated 90 degrees clockwise on screen
        let patterns = [
            FinderPattern::new(150.0, 30.0, 5.0),
            FinderPattern::new(150.0, 150.0, 5.0),
            FinderPattern::new(30.0, 30.0, 5.0),
        ];
        let g = group_finder_patterns(&patterns)[0];
        assert_eq!((g.top_left.center.x, g.top_left.center.y), (150.0, 30.0));
        assert_eq!((g.top_right.center.x, g.top_right.center.y), (150.0, 150.0));
        assert_eq!((g.bottom_left.center.x, g.bottom_left.center.y), (30.0, 30.0));
    }

    #[test]
    fn test_rejects_collinear_and_mismatched() {
        let collinear = [
            FinderPattern::new(0.0, 0.0, 5.0),
            FinderPattern::new(100.0, 0.0, 5.0),
            FinderPattern::new(200.0, 0.0, 5.0),
        ];
        assert!(group_finder_patterns(&collinear).is_empty());

        let sizes = [
            FinderPattern::new(30.0, 30.0, 2.0),
            FinderPattern::new(150.0, 30.0, 5.0),
            FinderPattern::new(30.0, 150.0, 5.0),
        ];
        assert!(group_finder_patterns(&sizes).is_empty());
    }

    #[test]
    fn test_marker_survives_a_field_of_small_decoys() {
        // 32 small bullseyes listed before the marker's finders
        let mut patterns: Vec<FinderPattern> = (0..32)
            .map(|i| FinderPattern::new(30.0 + 40.0 * (i % 8) as f32, 20.0 + 40.0 * (i / 8) as f32, 3.0).with_strength(9.0))
            .collect();
        patterns.extend([
            FinderPattern::new(60.0, 220.0, 8.0).with_strength(24.0),
            FinderPattern::new(228.0, 220.0, 8.0).with_strength(24.0),
            FinderPattern::new(60.0, 388.0, 8.0).with_strength(24.0),
        ]);
        let groups = group_finder_patterns(&patterns);
        assert!(groups.len() > 40);
        assert!(groups
            .iter()
            .any(|g| g.top_left.center == Point::new(60.0, 220.0) && g.module_size() == 8.0));
    }

    #[test]
    fn test_best_triple_first() {
        let patterns = [
            FinderPattern::new(30.0, 30.0, 5.0),
            FinderPattern::new(150.0, 30.0, 5.0),
            FinderPattern::new(30.0, 150.0, 5.0),
            FinderPattern::new(160.0, 175.0, 5.0),
        ];
        let groups = group_finder_patterns(&patterns);
        assert!(!groups.is_empty());
        assert_eq!(groups[0].top_left.center, patterns[0].center);
    }
}
