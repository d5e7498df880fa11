//! Planar geometry: homographies, fitted lines, convex hull, minimum-area
//! rectangle.

use nalgebra::{DMatrix, Matrix3, SMatrix, SVector, SymmetricEigen, Vector3};

use crate::models::Point;
use crate::models::point::cross;

/// 3x3 planar projective transform acting on homogeneous `(x, y, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    /// Exact transform taking `src[i]` to `dst[i]` for four correspondences.
    ///
    /// Solves the 8x8 direct linear system with `h33 = 1`. Returns `None`
    /// when the LU factorisation meets a zero pivot (e.g. three collinear or
    /// coincident points); nearly degenerate input is not rejected and can
    /// produce very large coefficients.
    pub fn from_quad(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let (sx, sy) = (src[i].x as f64, src[i].y as f64);
            let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);
            let r = 2 * i;

            a[(r, 0)] = sx;
            a[(r, 1)] = sy;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -dx * sx;
            a[(r, 7)] = -dx * sy;
            b[r] = dx;

            a[(r + 1, 3)] = sx;
            a[(r + 1, 4)] = sy;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -dy * sx;
            a[(r + 1, 7)] = -dy * sy;
            b[r + 1] = dy;
        }

        let h = a.lu().solve(&b)?;
        Some(Self(Matrix3::new(
            h[0], h[1], h[2], //
            h[3], h[4], h[5], //
            h[6], h[7], 1.0,
        )))
    }

    /// Least-squares transform taking each `src[i]` as close as possible to
    /// `dst[i]`, for four or more correspondences.
    ///
    /// Direct linear transform on Hartley-normalised points: the solution is
    /// the eigenvector of `AᵀA` with the smallest eigenvalue. `None` when the
    /// slices differ in length, hold fewer than four pairs, or all points of
    /// one side coincide.
    pub fn fit(src: &[Point], dst: &[Point]) -> Option<Self> {
        if src.len() < 4 || src.len() != dst.len() {
            return None;
        }
        let (t_src, src_n) = hartley_normalize(src)?;
        let (t_dst, dst_n) = hartley_normalize(dst)?;

        let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
        for (i, (&(sx, sy), &(dx, dy))) in src_n.iter().zip(&dst_n).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = sx;
            a[(r, 1)] = sy;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -dx * sx;
            a[(r, 7)] = -dx * sy;
            a[(r, 8)] = -dx;

            a[(r + 1, 3)] = sx;
            a[(r + 1, 4)] = sy;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -dy * sx;
            a[(r + 1, 7)] = -dy * sy;
            a[(r + 1, 8)] = -dy;
        }

        let eig = SymmetricEigen::new(a.transpose() * &a);
        let (smallest, _) = eig
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|(_, x), (_, y)| x.abs().total_cmp(&y.abs()))?;
        let h = eig.eigenvectors.column(smallest);
        let normalized = Matrix3::new(
            h[0], h[1], h[2], //
            h[3], h[4], h[5], //
            h[6], h[7], h[8],
        );

        let m = t_dst.try_inverse()? * normalized * t_src;
        let scale = m[(2, 2)];
        if scale.abs() < 1e-12 {
            return None;
        }
        Some(Self(m / scale)).filter(Self::is_finite)
    }

    /// A matrix with every coefficient NaN
    pub fn non_finite() -> Self {
        Self(Matrix3::from_element(f64::NAN))
    }

    /// Scaled rotation followed by a translation
    pub fn similarity(scale: f64, angle_rad: f64, tx: f64, ty: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();
        Self(Matrix3::new(
            scale * c,
            -scale * s,
            tx,
            scale * s,
            scale * c,
            ty,
            0.0,
            0.0,
            1.0,
        ))
    }

    /// Every coefficient is finite
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Inverse transform, if the matrix is invertible
    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Compose: apply `other` first, then `self`
    pub fn then_after(&self, other: &Homography) -> Self {
        Self(self.0 * other.0)
    }

    /// Map `(x, y)` through the transform with perspective division, in f64
    pub fn map_f64(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.0 * Vector3::new(x, y, 1.0);
        (v.x / v.z, v.y / v.z)
    }

    /// Map a point through the transform
    pub fn map(&self, p: &Point) -> Point {
        let (x, y) = self.map_f64(p.x as f64, p.y as f64);
        Point::new(x as f32, y as f32)
    }

    /// Row-major coefficients
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Inverse of [`Homography::to_rows`]
    pub fn from_rows(rows: &[[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|r, c| rows[r][c]))
    }
}

/// Translate the centroid to the origin and scale the mean distance from it
/// to sqrt(2)
fn hartley_normalize(points: &[Point]) -> Option<(Matrix3<f64>, Vec<(f64, f64)>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| (s * (p.x as f64 - cx), s * (p.y as f64 - cy)))
        .collect();
    Some((t, normalized))
}

/// Infinite line through `point` along the unit vector `direction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    /// A point on the line
    pub point: Point,
    /// Unit direction
    pub direction: Point,
}

impl Line {
    /// Total least-squares fit: the line through the centroid along the
    /// principal axis of the scatter. `None` for fewer than two distinct
    /// points.
    pub fn fit(points: &[Point]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
        let my = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
        for p in points {
            let (dx, dy) = (p.x as f64 - mx, p.y as f64 - my);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        if sxx + syy < 1e-12 {
            return None;
        }
        let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        Some(Self {
            point: Point::new(mx as f32, my as f32),
            direction: Point::new(theta.cos() as f32, theta.sin() as f32),
        })
    }

    /// Line through `a` and `b`, `None` when they coincide
    pub fn through(a: Point, b: Point) -> Option<Self> {
        let d = a.to(&b);
        let len = (d.x * d.x + d.y * d.y).sqrt();
        if len < f32::EPSILON {
            return None;
        }
        Some(Self {
            point: a,
            direction: Point::new(d.x / len, d.y / len),
        })
    }

    /// Position of the projection of `p` along the direction, from `point`
    pub fn along(&self, p: &Point) -> f32 {
        let d = self.point.to(p);
        d.x * self.direction.x + d.y * self.direction.y
    }

    /// Unsigned perpendicular distance from `p`
    pub fn distance(&self, p: &Point) -> f32 {
        let d = self.point.to(p);
        (d.y * self.direction.x - d.x * self.direction.y).abs()
    }

    /// Crossing point of two lines, `None` when (nearly) parallel
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let (d, e) = (self.direction, other.direction);
        let den = d.x * e.y - d.y * e.x;
        if den.abs() < 1e-6 {
            return None;
        }
        let q = self.point.to(&other.point);
        let t = (q.x * e.y - q.y * e.x) / den;
        Some(Point::new(self.point.x + t * d.x, self.point.y + t * d.y))
    }
}

/// Convex hull (Andrew's monotone chain), clockwise on screen, no collinear
/// points kept.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Point>> = if pass == 0 {
            Box::new(pts.iter())
        } else {
            Box::new(pts.iter().rev())
        };
        for p in iter {
            while hull.len() >= start + 2
                && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(*p);
        }
        hull.pop();
    }
    hull
}

/// Rotated rectangle of minimum area enclosing a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    /// Rectangle center
    pub center: Point,
    /// Extent along the rectangle's reference edge
    pub width: f32,
    /// Extent perpendicular to the reference edge
    pub height: f32,
    /// Direction of the reference edge in degrees, normalised to `[0, 90)`.
    /// Measured in image coordinates (x right, y down), so positive angles
    /// turn clockwise on screen.
    pub angle: f32,
}

/// Minimum-area enclosing rectangle by rotating calipers over the hull edges.
///
/// Fewer than three distinct points give an axis-aligned box with angle 0.
pub fn min_area_rect(points: &[Point]) -> MinAreaRect {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return axis_aligned_rect(&hull);
    }

    let n = hull.len();
    let mut best: Option<(f32, MinAreaRect)> = None;
    for i in 0..n {
        let origin = hull[i];
        let edge = origin.to(&hull[(i + 1) % n]);
        let len = (edge.x * edge.x + edge.y * edge.y).sqrt();
        if len < f32::EPSILON {
            continue;
        }
        let (ux, uy) = (edge.x / len, edge.y / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in &hull {
            let d = origin.to(p);
            let pu = d.x * ux + d.y * uy;
            let pv = d.x * vx + d.y * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_some_and(|(a, _)| area >= *a) {
            continue;
        }
        let cu = (min_u + max_u) / 2.0;
        let cv = (min_v + max_v) / 2.0;
        best = Some((
            area,
            MinAreaRect {
                center: Point::new(origin.x + cu * ux + cv * vx, origin.y + cu * uy + cv * vy),
                width: max_u - min_u,
                height: max_v - min_v,
                angle: uy.atan2(ux).to_degrees().rem_euclid(90.0) % 90.0,
            },
        ));
    }

    best.map(|(_, r)| r).unwrap_or_else(|| axis_aligned_rect(&hull))
}

fn axis_aligned_rect(points: &[Point]) -> MinAreaRect {
    if points.is_empty() {
        return MinAreaRect {
            center: Point::default(),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };
    }
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    MinAreaRect {
        center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
        width: max_x - min_x,
        height: max_y - min_y,
        angle: 0.0,
    }
}

/// Reorder four corners clockwise on screen around their centroid, starting
/// with the corner closest to the image origin.
pub fn order_clockwise_from_origin(corners: &[Point; 4]) -> [Point; 4] {
    let cx = corners.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = corners.iter().map(|p| p.y).sum::<f32>() / 4.0;

    let mut sorted = *corners;
    sorted.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });

    let start = sorted
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    sorted.rotate_left(start);
    sorted
}
