use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::DynamicImage;
use qr_pose::config::{BackendPreference, LocatorConfig};
use qr_pose::encoder::{encode_text, render_marker, render_projected, rotated_layout};
use qr_pose::utils::binarization::otsu_binarize;
use qr_pose::{EcLevel, MarkerLocator, Point, estimate};

fn demo_images() -> (DynamicImage, DynamicImage) {
    let symbol = encode_text("demo", EcLevel::M).expect("demo fits");
    let straight = render_marker(&symbol, 8, 4);
    let (w, h, transform) = rotated_layout(&symbol, 8.0, 4, 30.0);
    let rotated = render_projected(&symbol, w, h, &transform);
    (
        DynamicImage::ImageLuma8(straight),
        DynamicImage::ImageLuma8(rotated),
    )
}

fn bench_locate(c: &mut Criterion) {
    let (straight, rotated) = demo_images();
    let mut seen = Vec::new();
    for backend in [BackendPreference::Scanline, BackendPreference::Contour] {
        let locator = MarkerLocator::new(LocatorConfig {
            backend,
            ..LocatorConfig::default()
        });
        let kind = locator.backend_kind();
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        c.bench_function(&format!("locate_axis_aligned_{kind}"), |b| {
            b.iter(|| locator.locate_image(black_box(&straight)))
        });
        c.bench_function(&format!("locate_rotated_{kind}"), |b| {
            b.iter(|| locator.locate_image(black_box(&rotated)))
        });
    }
}

fn bench_blank(c: &mut Criterion) {
    let blank = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(640, 480, image::Luma([255])));
    let locator = MarkerLocator::default();
    c.bench_function("locate_blank_640x480", |b| {
        b.iter(|| locator.locate_image(black_box(&blank)))
    });
}

fn bench_binarize(c: &mut Criterion) {
    let (_, rotated) = demo_images();
    let gray = rotated.to_luma8();
    let (w, h) = gray.dimensions();
    c.bench_function("otsu_binarize_rotated_demo", |b| {
        b.iter(|| otsu_binarize(black_box(gray.as_raw()), w as usize, h as usize))
    });
}

fn bench_estimate(c: &mut Criterion) {
    let corners = [
        Point::new(120.0, 80.0),
        Point::new(410.0, 95.0),
        Point::new(380.0, 330.0),
        Point::new(90.0, 300.0),
    ];
    c.bench_function("estimate_pose", |b| b.iter(|| estimate(black_box(&corners))));
}

criterion_group!(
    benches,
    bench_locate,
    bench_blank,
    bench_binarize,
    bench_estimate
);
criterion_main!(benches);
