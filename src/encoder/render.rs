//! Rasterising symbols into grayscale images.
//!
//! Dark modules are 0, light modules and the quiet zone 255.

use image::{GrayImage, Luma};

use super::Symbol;
use crate::models::Point;
use crate::utils::geometry::Homography;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Axis-aligned rendering with `module_px` pixels per module and a quiet
/// zone of `quiet_zone` modules on every side.
pub fn render_marker(symbol: &Symbol, module_px: u32, quiet_zone: u32) -> GrayImage {
    let module_px = module_px.max(1);
    let size = symbol.size() as u32;
    let side = (size + 2 * quiet_zone) * module_px;

    GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / module_px) as i64 - quiet_zone as i64;
        let my = (y / module_px) as i64 - quiet_zone as i64;
        if mx < 0 || my < 0 || mx >= size as i64 || my >= size as i64 {
            return LIGHT;
        }
        if symbol.modules.get(mx as usize, my as usize) {
            DARK
        } else {
            LIGHT
        }
    })
}

/// Render under an arbitrary module-to-image transform. Each pixel center is
/// mapped back into module space; pixels outside the symbol are light.
pub fn render_projected(
    symbol: &Symbol,
    width: u32,
    height: u32,
    module_to_image: &Homography,
) -> GrayImage {
    let Some(image_to_module) = module_to_image.inverse() else {
        return GrayImage::from_pixel(width, height, LIGHT);
    };
    let size = symbol.size() as f64;

    GrayImage::from_fn(width, height, |x, y| {
        let (mx, my) = image_to_module.map_f64(x as f64 + 0.5, y as f64 + 0.5);
        if !(0.0..size).contains(&mx) || !(0.0..size).contains(&my) {
            return LIGHT;
        }
        if symbol.modules.get(mx as usize, my as usize) {
            DARK
        } else {
            LIGHT
        }
    })
}

/// Canvas size and transform for rendering `symbol` rotated by `degrees`
/// (clockwise on screen) about the canvas center. The canvas is large enough
/// to keep the rotated quiet zone inside it.
pub fn rotated_layout(
    symbol: &Symbol,
    module_px: f32,
    quiet_zone: usize,
    degrees: f64,
) -> (u32, u32, Homography) {
    let n = symbol.size() as f64;
    let scale = module_px.max(1.0) as f64;
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let outer = (n + 2.0 * quiet_zone as f64) * scale;
    let side = (outer * (sin.abs() + cos.abs())).ceil() as u32;
    let center = side as f64 / 2.0;

    // Module-space center lands on the canvas center
    let half = n / 2.0;
    let tx = center - scale * (cos * half - sin * half);
    let ty = center - scale * (sin * half + cos * half);
    (side, side, Homography::similarity(scale, theta, tx, ty))
}

/// Image positions of the symbol's outer corners under `module_to_image`,
/// top-left first, clockwise in symbol order
pub fn projected_corners(symbol: &Symbol, module_to_image: &Homography) -> [Point; 4] {
    let n = symbol.size() as f32;
    [
        Point::new(0.0, 0.0),
        Point::new(n, 0.0),
        Point::new(n, n),
        Point::new(0.0, n),
    ]
    .map(|p| module_to_image.map(&p))
}
