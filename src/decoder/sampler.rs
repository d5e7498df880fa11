use crate::decoder::function_mask::alignment_pattern_positions;
use crate::models::{BitMatrix, Point};
use crate::utils::geometry::Homography;

/// Finder center distance from the symbol edge, in modules
const FINDER_CENTER: f32 = 3.5;

/// Width of the finder pattern centered at `center`, measured along
/// `toward - center` through both outer edges, divided by its 7 modules.
///
/// Measuring along the symbol axes keeps the estimate independent of the
/// in-plane rotation, unlike horizontal run lengths.
pub fn module_size_along(
    binary: &BitMatrix,
    center: Point,
    toward: Point,
    guess: f32,
) -> Option<f32> {
    let dir = center.to(&toward);
    let len = (dir.x * dir.x + dir.y * dir.y).sqrt();
    if len < f32::EPSILON || guess <= 0.0 {
        return None;
    }
    let (ux, uy) = (dir.x / len, dir.y / len);
    let limit = guess * 6.0;

    let mut extent = 0.0;
    for sign in [1.0f32, -1.0] {
        extent += edge_distance(binary, center, ux * sign, uy * sign, limit)?;
    }
    Some(extent / 7.0)
}

/// Distance from the core to the outer edge of the ring: dark, light, dark,
/// then the first light sample.
fn edge_distance(binary: &BitMatrix, from: Point, ux: f32, uy: f32, limit: f32) -> Option<f32> {
    const STEP: f32 = 0.5;
    let mut expect_dark = true;
    let mut transitions = 0;
    let mut t = 0.0;
    while t <= limit {
        let x = (from.x + ux * t).floor() as isize;
        let y = (from.y + uy * t).floor() as isize;
        if binary.get_signed(x, y) != expect_dark {
            transitions += 1;
            if transitions == 3 {
                return Some(t);
            }
            expect_dark = !expect_dark;
        }
        t += STEP;
    }
    None
}

/// Map module space onto the image from the three finder centers and a
/// fourth corner, typically extrapolated as a parallelogram when the finder
/// outlines could not be measured.
pub fn build_transform(
    top_left: Point,
    top_right: Point,
    bottom_left: Point,
    bottom_right: Point,
    dimension: usize,
) -> Option<Homography> {
    let far = dimension as f32 - FINDER_CENTER;
    let src = [
        Point::new(FINDER_CENTER, FINDER_CENTER),
        Point::new(far, FINDER_CENTER),
        Point::new(far, far),
        Point::new(FINDER_CENTER, far),
    ];
    let dst = [top_left, top_right, bottom_right, bottom_left];
    Homography::from_quad(&src, &dst).filter(Homography::is_finite)
}

/// Replace the extrapolated fourth corner with the bottom-right alignment
/// pattern when one is found near its predicted position.
pub fn refine_with_alignment(
    binary: &BitMatrix,
    transform: &Homography,
    version: u8,
    top_left: Point,
    top_right: Point,
    bottom_left: Point,
) -> Option<Homography> {
    let align_src = last_alignment_module(version)?;
    let found = find_alignment_center(binary, transform, align_src)?;

    let dimension = crate::models::symbol::symbol_size(version) as f32;
    let far = dimension - FINDER_CENTER;
    let src = [
        Point::new(FINDER_CENTER, FINDER_CENTER),
        Point::new(far, FINDER_CENTER),
        align_src,
        Point::new(FINDER_CENTER, far),
    ];
    let dst = [top_left, top_right, found, bottom_left];
    Homography::from_quad(&src, &dst).filter(Homography::is_finite)
}

/// Add the bottom-right alignment pattern, searched for where `transform`
/// predicts it, to measured correspondences and refit. The alignment center
/// counts four times so it outweighs any single measured corner.
pub fn refit_with_alignment(
    binary: &BitMatrix,
    transform: &Homography,
    version: u8,
    modules: &[Point],
    pixels: &[Point],
) -> Option<Homography> {
    let align_src = last_alignment_module(version)?;
    let found = find_alignment_center(binary, transform, align_src)?;

    let mut modules = modules.to_vec();
    let mut pixels = pixels.to_vec();
    modules.extend([align_src; 4]);
    pixels.extend([found; 4]);
    Homography::fit(&modules, &pixels)
}

/// Center of the bottom-right alignment pattern in module space
fn last_alignment_module(version: u8) -> Option<Point> {
    let last = *alignment_pattern_positions(version).last()? as f32 + 0.5;
    Some(Point::new(last, last))
}

/// Image-space steps of one module along the symbol x and y axes at `at`
fn module_axes(transform: &Homography, at: Point) -> (Point, Point) {
    let origin = transform.map(&at);
    let ux = origin.to(&transform.map(&at.translate(1.0, 0.0)));
    let uy = origin.to(&transform.map(&at.translate(0.0, 1.0)));
    (ux, uy)
}

fn find_alignment_center(binary: &BitMatrix, transform: &Homography, module: Point) -> Option<Point> {
    let predicted = transform.map(&module);
    if !predicted.is_finite() {
        return None;
    }
    let (ux, uy) = module_axes(transform, module);
    let module_px = ((ux.x * ux.x + ux.y * ux.y).sqrt() + (uy.x * uy.x + uy.y * uy.y).sqrt()) / 2.0;
    if !(1.0..=500.0).contains(&module_px) {
        return None;
    }

    let radius = (module_px * 3.0).ceil() as isize;
    let (px, py) = (predicted.x.floor() as isize, predicted.y.floor() as isize);

    let mut best: Option<(Point, usize, isize)> = None;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let center = Point::new((px + dx) as f32 + 0.5, (py + dy) as f32 + 0.5);
            let mismatch = alignment_mismatch(binary, center, ux, uy);
            let dist = dx * dx + dy * dy;
            let better = match best {
                None => true,
                Some((_, m, d)) => mismatch < m || (mismatch == m && dist < d),
            };
            if better {
                best = Some((center, mismatch, dist));
            }
        }
    }

    match best {
        Some((center, mismatch, _)) if mismatch <= 3 => Some(center),
        _ => None,
    }
}

/// Modules of the 5x5 alignment pattern (dark ring, light ring, dark
/// center) that disagree with the image
fn alignment_mismatch(binary: &BitMatrix, center: Point, ux: Point, uy: Point) -> usize {
    let mut mismatches = 0;
    for my in -2i32..=2 {
        for mx in -2i32..=2 {
            let expected = mx.abs() == 2 || my.abs() == 2 || (mx == 0 && my == 0);
            let x = center.x + ux.x * mx as f32 + uy.x * my as f32;
            let y = center.y + ux.y * mx as f32 + uy.y * my as f32;
            if binary.get_signed(x.floor() as isize, y.floor() as isize) != expected {
                mismatches += 1;
            }
        }
    }
    mismatches
}

/// Sample every module center through `transform`. Modules of three pixels
/// or more take a 3x3 majority vote.
pub fn sample_grid(binary: &BitMatrix, transform: &Homography, dimension: usize, module_px: f32) -> BitMatrix {
    let window: isize = if module_px >= 3.0 { 1 } else { 0 };
    let mut grid = BitMatrix::square(dimension);
    for y in 0..dimension {
        for x in 0..dimension {
            let p = transform.map(&Point::new(x as f32 + 0.5, y as f32 + 0.5));
            if !p.is_finite() {
                continue;
            }
            let (ix, iy) = (p.x.floor() as isize, p.y.floor() as isize);
            let mut dark = 0;
            let mut total = 0;
            for dy in -window..=window {
                for dx in -window..=window {
                    total += 1;
                    if binary.get_signed(ix + dx, iy + dy) {
                        dark += 1;
                    }
                }
            }
            grid.set(x, y, dark * 2 > total);
        }
    }
    grid
}

/// Outer symbol corners in symbol order (top-left, top-right,
/// bottom-right, bottom-left), dropping any that fall outside the image.
pub fn boundary_corners(transform: &Homography, dimension: usize, width: usize, height: usize) -> Vec<Point> {
    let n = dimension as f32;
    [
        Point::new(0.0, 0.0),
        Point::new(n, 0.0),
        Point::new(n, n),
        Point::new(0.0, n),
    ]
    .iter()
    .map(|p| transform.map(p))
    .filter(|p| {
        p.is_finite() && (0.0..=width as f32).contains(&p.x) && (0.0..=height as f32).contains(&p.y)
    })
    .collect()
}
