//! Connected components of dark pixels with per-component statistics

use crate::models::{BitMatrix, Point};

/// Union-find over provisional labels
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x != root_y {
            // Keep the smaller label as root so labels stay in scan order
            let (lo, hi) = if root_x < root_y {
                (root_x, root_y)
            } else {
                (root_y, root_x)
            };
            self.parent[hi as usize] = lo;
        }
    }
}

/// One 8-connected dark region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    /// Inclusive bounding box: min x, min y, max x, max y
    pub bbox: (usize, usize, usize, usize),
    /// Pixel count
    pub area: usize,
    sum_x: u64,
    sum_y: u64,
}

impl Component {
    fn seed(x: usize, y: usize) -> Self {
        Self {
            bbox: (x, y, x, y),
            area: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: usize, y: usize) {
        self.bbox.0 = self.bbox.0.min(x);
        self.bbox.1 = self.bbox.1.min(y);
        self.bbox.2 = self.bbox.2.max(x);
        self.bbox.3 = self.bbox.3.max(y);
        self.area += 1;
        self.sum_x += x as u64;
        self.sum_y += y as u64;
    }

    /// Centroid in continuous pixel coordinates
    pub fn centroid(&self) -> Point {
        let n = self.area.max(1) as f64;
        Point::new(
            (self.sum_x as f64 / n + 0.5) as f32,
            (self.sum_y as f64 / n + 0.5) as f32,
        )
    }

    /// Bounding box width in pixels
    pub fn width(&self) -> usize {
        self.bbox.2 - self.bbox.0 + 1
    }

    /// Bounding box height in pixels
    pub fn height(&self) -> usize {
        self.bbox.3 - self.bbox.1 + 1
    }

    /// Whether `other`'s bounding box lies strictly inside this one
    pub fn encloses(&self, other: &Component) -> bool {
        self.bbox.0 < other.bbox.0
            && self.bbox.1 < other.bbox.1
            && self.bbox.2 > other.bbox.2
            && self.bbox.3 > other.bbox.3
    }
}

/// Label 8-connected dark regions in two passes and collect their statistics,
/// in order of each region's first pixel in raster order.
pub fn find_dark_components(matrix: &BitMatrix) -> Vec<Component> {
    let width = matrix.width();
    let height = matrix.height();

    let mut labels = vec![0u32; width * height];
    // Label 0 marks background
    let mut uf = UnionFind::new(1);
    let mut next_label = 1u32;

    for y in 0..height {
        for x in 0..width {
            if !matrix.get(x, y) {
                continue;
            }
            let mut neighbors = [0u32; 4];
            if x > 0 {
                neighbors[0] = labels[y * width + x - 1];
            }
            if y > 0 {
                neighbors[1] = labels[(y - 1) * width + x];
                if x > 0 {
                    neighbors[2] = labels[(y - 1) * width + x - 1];
                }
                if x + 1 < width {
                    neighbors[3] = labels[(y - 1) * width + x + 1];
                }
            }

            let min_label = neighbors.iter().copied().filter(|&l| l != 0).min();
            let label = match min_label {
                Some(l) => l,
                None => {
                    let l = next_label;
                    next_label += 1;
                    uf.parent.push(l);
                    l
                }
            };
            labels[y * width + x] = label;
            for &l in &neighbors {
                if l != 0 && l != label {
                    uf.union(label, l);
                }
            }
        }
    }

    let mut slots: Vec<Option<usize>> = vec![None; next_label as usize];
    let mut components: Vec<Component> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let label = labels[y * width + x];
            if label == 0 {
                continue;
            }
            let root = uf.find(label) as usize;
            let slot = match slots[root] {
                Some(s) => s,
                None => {
                    components.push(Component::seed(x, y));
                    slots[root] = Some(components.len() - 1);
                    components.len() - 1
                }
            };
            components[slot].add(x, y);
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_square() {
        let mut matrix = BitMatrix::new(10, 10);
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            matrix.set(x, y, true);
        }

        let regions = find_dark_components(&matrix);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, (2, 2, 3, 3));
        assert_eq!(regions[0].area, 4);
        assert_eq!(regions[0].centroid(), Point::new(3.0, 3.0));
    }

    #[test]
    fn test_diagonal_pixels_connect() {
        let matrix = BitMatrix::from_fn(6, 6, |x, y| x == y);
        let regions = find_dark_components(&matrix);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 6);
    }

    #[test]
    fn test_u_shape_merges_labels() {
        // Two arms meet only at the bottom row
        let matrix = BitMatrix::from_fn(7, 5, |x, y| x == 1 || x == 5 || (y == 4 && (1..=5).contains(&x)));
        let regions = find_dark_components(&matrix);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, (1, 0, 5, 4));
    }

    #[test]
    fn test_ring_encloses_core() {
        let matrix = BitMatrix::from_fn(9, 9, |x, y| {
            let ring = x == 0 || y == 0 || x == 8 || y == 8;
            let core = (3..=5).contains(&x) && (3..=5).contains(&y);
            ring || core
        });
        let regions = find_dark_components(&matrix);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].encloses(&regions[1]));
        assert!(!regions[1].encloses(&regions[0]));
        assert_eq!(regions[0].area, 32);
        assert_eq!(regions[1].area, 9);
    }
}
