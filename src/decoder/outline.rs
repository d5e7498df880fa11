//! Finder outlines measured from the binarized image.
//!
//! The outer ring and the core of each finder are flood filled. Their
//! corners start as the extreme pixels along the symbol diagonals and are
//! then sharpened by fitting a line to every boundary edge of each side.
//! Twelve corners per symbol corner region pin down a perspective transform
//! without assuming the fourth symbol corner completes a parallelogram.

use crate::models::{BitMatrix, Point};
use crate::utils::geometry::Line;

/// Ring fill window half-size, in modules
const RING_REACH: f32 = 8.0;
/// Core fill window half-size, in modules
const CORE_REACH: f32 = 4.0;

/// Module-space corners of the outer ring and core of the finder whose
/// top-left module is at the origin, in symbol order
const OUTER_MODULES: [(f32, f32); 4] = [(0.0, 0.0), (7.0, 0.0), (7.0, 7.0), (0.0, 7.0)];
const CORE_MODULES: [(f32, f32); 4] = [(2.0, 2.0), (5.0, 2.0), (5.0, 5.0), (2.0, 5.0)];

/// Corners of one finder in image pixels, symbol order: top-left,
/// top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderOutline {
    /// Outer edge of the 7x7 ring
    pub outer: [Point; 4],
    /// Edge of the 3x3 core
    pub core: [Point; 4],
}

/// Outlines of the three finders framing one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripleOutline {
    /// Finder at the symbol's top-left corner
    pub top_left: FinderOutline,
    /// Finder at the top-right corner
    pub top_right: FinderOutline,
    /// Finder at the bottom-left corner
    pub bottom_left: FinderOutline,
}

impl TripleOutline {
    /// Measure all three finders. `None` when any of them is clipped by the
    /// image border, merges with its surroundings, or has no separate core.
    pub fn measure(binary: &BitMatrix, tl: Point, tr: Point, bl: Point, module: f32) -> Option<Self> {
        let u = unit(tl, tr)?;
        let v = unit(tl, bl)?;
        if module <= 0.0 {
            return None;
        }
        Some(Self {
            top_left: measure_finder(binary, tl, u, v, module)?,
            top_right: measure_finder(binary, tr, u, v, module)?,
            bottom_left: measure_finder(binary, bl, u, v, module)?,
        })
    }

    /// Module-space points and their measured image positions for a symbol
    /// `dimension` modules wide
    pub fn correspondences(&self, dimension: usize) -> (Vec<Point>, Vec<Point>) {
        let far = dimension as f32 - 7.0;
        let mut modules = Vec::with_capacity(24);
        let mut pixels = Vec::with_capacity(24);
        for (outline, (ox, oy)) in [
            (&self.top_left, (0.0, 0.0)),
            (&self.top_right, (far, 0.0)),
            (&self.bottom_left, (0.0, far)),
        ] {
            for (corners, offsets) in [(&outline.outer, OUTER_MODULES), (&outline.core, CORE_MODULES)] {
                for (p, (mx, my)) in corners.iter().zip(offsets) {
                    modules.push(Point::new(ox + mx, oy + my));
                    pixels.push(*p);
                }
            }
        }
        (modules, pixels)
    }
}

fn unit(from: Point, to: Point) -> Option<Point> {
    let d = from.to(&to);
    let len = (d.x * d.x + d.y * d.y).sqrt();
    (len > f32::EPSILON).then(|| Point::new(d.x / len, d.y / len))
}

/// Outline of the finder centered near `center`, with `u` and `v` the image
/// directions of the symbol's x and y axes
pub fn measure_finder(binary: &BitMatrix, center: Point, u: Point, v: Point, module: f32) -> Option<FinderOutline> {
    let seed = [u, u.scale(-1.0), v, v.scale(-1.0)]
        .iter()
        .find_map(|d| ring_seed(binary, center, *d, module * 6.0))?;
    let ring = Region::flood(binary, seed, center, module * RING_REACH)?;

    let core_seed = (center.x.floor() as isize, center.y.floor() as isize);
    if ring.contains(core_seed.0, core_seed.1) {
        return None;
    }
    let core = Region::flood(binary, core_seed, center, module * CORE_REACH)?;

    Some(FinderOutline {
        outer: ring.sharpen(ring.extremes(u, v), module),
        core: core.sharpen(core.extremes(u, v), module),
    })
}

/// First ring pixel outward from the core along `dir`: dark, light, dark
fn ring_seed(binary: &BitMatrix, from: Point, dir: Point, limit: f32) -> Option<(isize, isize)> {
    const STEP: f32 = 0.5;
    let mut expect_dark = true;
    let mut transitions = 0;
    let mut t = 0.0;
    while t <= limit {
        let x = (from.x + dir.x * t).floor() as isize;
        let y = (from.y + dir.y * t).floor() as isize;
        if binary.get_signed(x, y) != expect_dark {
            transitions += 1;
            if transitions == 2 {
                return Some((x, y));
            }
            expect_dark = !expect_dark;
        }
        t += STEP;
    }
    None
}

/// 8-connected dark pixels inside a square window
struct Region {
    x0: isize,
    y0: isize,
    side: usize,
    mask: Vec<bool>,
    pixels: Vec<(isize, isize)>,
}

impl Region {
    /// Fill from `seed` within `reach` pixels of `center`. Fails when the
    /// fill touches the window edge or the image border.
    fn flood(binary: &BitMatrix, seed: (isize, isize), center: Point, reach: f32) -> Option<Self> {
        let x0 = (center.x - reach).floor() as isize;
        let y0 = (center.y - reach).floor() as isize;
        let side = (2.0 * reach).ceil() as usize + 2;
        let mut region = Self {
            x0,
            y0,
            side,
            mask: vec![false; side * side],
            pixels: Vec::new(),
        };
        if !binary.get_signed(seed.0, seed.1) {
            return None;
        }
        let seed_index = region.index(seed.0, seed.1)?;
        region.mask[seed_index] = true;

        let (w, h) = (binary.width() as isize, binary.height() as isize);
        let last = side as isize - 1;
        let mut stack = vec![seed];
        while let Some((x, y)) = stack.pop() {
            if x <= 0 || y <= 0 || x >= w - 1 || y >= h - 1 {
                return None;
            }
            if x == x0 || y == y0 || x == x0 + last || y == y0 + last {
                return None;
            }
            region.pixels.push((x, y));
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (x + dx, y + dy);
                    let Some(i) = region.index(nx, ny) else {
                        continue;
                    };
                    if !region.mask[i] && binary.get_signed(nx, ny) {
                        region.mask[i] = true;
                        stack.push((nx, ny));
                    }
                }
            }
        }
        Some(region)
    }

    fn index(&self, x: isize, y: isize) -> Option<usize> {
        let (lx, ly) = (x - self.x0, y - self.y0);
        let side = self.side as isize;
        ((0..side).contains(&lx) && (0..side).contains(&ly)).then(|| (ly * side + lx) as usize)
    }

    fn contains(&self, x: isize, y: isize) -> bool {
        self.index(x, y).is_some_and(|i| self.mask[i])
    }

    /// Pixel corners reaching furthest along -u-v, u-v, u+v and -u+v
    fn extremes(&self, u: Point, v: Point) -> [Point; 4] {
        [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(a, b)| {
            let d = Point::new(a * u.x + b * v.x, a * u.y + b * v.y);
            let (ox, oy) = (pixel_side(d.x), pixel_side(d.y));
            self.pixels
                .iter()
                .map(|&(x, y)| Point::new(x as f32 + ox, y as f32 + oy))
                .max_by(|p, q| (p.x * d.x + p.y * d.y).total_cmp(&(q.x * d.x + q.y * d.y)))
                .unwrap_or_default()
        })
    }

    /// Midpoints of the pixel edges between the region and the outside
    fn boundary(&self) -> Vec<Point> {
        let mut edges = Vec::new();
        for &(x, y) in &self.pixels {
            for (dx, dy) in [(1isize, 0isize), (-1, 0), (0, 1), (0, -1)] {
                if !self.contains(x + dx, y + dy) {
                    edges.push(Point::new(
                        x as f32 + 0.5 + dx as f32 * 0.5,
                        y as f32 + 0.5 + dy as f32 * 0.5,
                    ));
                }
            }
        }
        edges
    }

    /// Refit each side to the boundary edges near it, away from the rounded
    /// corners, and intersect neighbouring sides. Falls back to `rough`
    /// when a side has too few edges or a corner moves more than a module.
    fn sharpen(&self, rough: [Point; 4], module: f32) -> [Point; 4] {
        let edges = self.boundary();
        let margin = module * 0.5;

        let mut sides = Vec::with_capacity(4);
        for i in 0..4 {
            let (a, b) = (rough[i], rough[(i + 1) % 4]);
            let Some(side) = Line::through(a, b) else {
                return rough;
            };
            let length = a.distance(&b);
            let near: Vec<Point> = edges
                .iter()
                .copied()
                .filter(|p| side.distance(p) <= 1.0 && (margin..=length - margin).contains(&side.along(p)))
                .collect();
            match Line::fit(&near) {
                Some(line) if near.len() >= 3 => sides.push(line),
                _ => return rough,
            }
        }

        let mut sharp = rough;
        for i in 0..4 {
            match sides[(i + 3) % 4].intersection(&sides[i]) {
                Some(p) if p.distance(&rough[i]) <= module => sharp[i] = p,
                _ => return rough,
            }
        }
        sharp
    }
}

/// Offset of the pixel corner lying furthest along a direction component
fn pixel_side(component: f32) -> f32 {
    if component > 0.0 {
        1.0
    } else if component < 0.0 {
        0.0
    } else {
        0.5
    }
}
