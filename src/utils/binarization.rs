use crate::models::BitMatrix;

/// Convert a grayscale image to binary using Otsu's threshold.
/// Returns a BitMatrix where true = dark, false = light.
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    threshold_binarize(gray, width, height, otsu_threshold(gray))
}

/// Otsu's optimal threshold; pixels strictly below it are dark.
///
/// When several thresholds reach the same between-class variance (a
/// histogram with empty gaps) the middle of that plateau is used. A
/// histogram with a single populated bin yields 128.
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as f64;
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut below_count = 0.0f64;
    let mut below_sum = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut plateau: Option<(usize, usize)> = None;

    for threshold in 1..256usize {
        let count = histogram[threshold - 1] as f64;
        below_count += count;
        below_sum += (threshold - 1) as f64 * count;

        let above_count = total - below_count;
        if below_count == 0.0 || above_count == 0.0 {
            continue;
        }

        let mean_below = below_sum / below_count;
        let mean_above = (total_sum - below_sum) / above_count;
        let variance = below_count * above_count * (mean_below - mean_above).powi(2);

        match plateau {
            Some((_, ref mut end)) if variance == best_variance => *end = threshold,
            _ if variance > best_variance => {
                best_variance = variance;
                plateau = Some((threshold, threshold));
            }
            _ => {}
        }
    }

    match plateau {
        Some((start, end)) => ((start + end) / 2) as u8,
        None => 128,
    }
}

/// Local-mean binarization: a pixel is dark when it sits more than
/// [`ADAPTIVE_OFFSET`] gray levels below the mean of the `window` x `window`
/// box around it (clipped at the image border). Uniform areas stay light.
///
/// Box sums come from a summed-area table, so the cost does not depend on
/// the window size.
pub fn adaptive_binarize(gray: &[u8], width: usize, height: usize, window: usize) -> BitMatrix {
    let radius = window.max(1) / 2;
    let integral = integral_image(gray, width, height);
    let stride = width + 1;

    BitMatrix::from_fn(width, height, |x, y| {
        let (x0, x1) = (x.saturating_sub(radius), (x + radius + 1).min(width));
        let (y0, y1) = (y.saturating_sub(radius), (y + radius + 1).min(height));
        let area = ((x1 - x0) * (y1 - y0)) as u64;
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        (gray[y * width + x] as u64 + ADAPTIVE_OFFSET) * area < sum
    })
}

/// Gray levels a pixel must fall below its local mean to count as dark
pub const ADAPTIVE_OFFSET: u64 = 7;

/// Summed-area table with a zero first row and column
fn integral_image(gray: &[u8], width: usize, height: usize) -> Vec<u64> {
    let stride = width + 1;
    let mut table = vec![0u64; stride * (height + 1)];
    for y in 0..height {
        let mut row = 0u64;
        for x in 0..width {
            row += gray[y * width + x] as u64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
        }
    }
    table
}

/// Simple global threshold binarization
pub fn threshold_binarize(gray: &[u8], width: usize, height: usize, threshold: u8) -> BitMatrix {
    BitMatrix::from_fn(width, height, |x, y| gray[y * width + x] < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarize() {
        let gray = vec![100, 150, 200, 50]; // 2x2 image
        let binary = threshold_binarize(&gray, 2, 2, 128);

        assert!(binary.get(0, 0)); // 100 < 128
        assert!(!binary.get(1, 0)); // 150 >= 128
        assert!(!binary.get(0, 1)); // 200 >= 128
        assert!(binary.get(1, 1)); // 50 < 128
    }

    #[test]
    fn test_otsu_binarize() {
        let mut gray = vec![50u8; 50];
        gray.extend(vec![200u8; 50]);

        let binary = otsu_binarize(&gray, 10, 10);

        assert!(binary.get(0, 0));
        assert!(!binary.get(0, 7));
    }

    #[test]
    fn test_otsu_two_level_plateau_is_centered() {
        let mut gray = vec![0u8; 10];
        gray.extend(vec![255u8; 10]);
        assert_eq!(otsu_threshold(&gray), 128);
    }

    /// Vertical stripes, 8 px dark then 8 px light, under a left-to-right
    /// ramp that lifts the dark stripes on the right above the light ones on
    /// the left
    fn shaded_stripes(width: usize, height: usize) -> Vec<u8> {
        let mut gray = Vec::with_capacity(width * height);
        for _ in 0..height {
            for x in 0..width {
                let base = if (x / 8) % 2 == 0 { 0.0 } else { 255.0 };
                let shade = 140.0 * x as f32 / (width - 1) as f32;
                gray.push((base * 115.0 / 255.0 + shade) as u8);
            }
        }
        gray
    }

    #[test]
    fn test_adaptive_follows_shading_that_defeats_otsu() {
        let (w, h) = (160, 40);
        let gray = shaded_stripes(w, h);
        let stripe_dark = |x: usize| (x / 8) % 2 == 0;

        let global = otsu_binarize(&gray, w, h);
        let global_wrong = (0..w).filter(|&x| global.get(x, 20) != stripe_dark(x)).count();
        assert!(global_wrong > 0);

        let local = adaptive_binarize(&gray, w, h, 31);
        for x in 0..w {
            assert_eq!(local.get(x, 20), stripe_dark(x), "column {x}");
        }
    }

    #[test]
    fn test_adaptive_leaves_uniform_image_light() {
        let gray = vec![90u8; 50 * 30];
        assert_eq!(adaptive_binarize(&gray, 50, 30, 31).count_ones(), 0);
    }

    #[test]
    fn test_integral_image_sums() {
        let gray = vec![1u8, 2, 3, 4, 5, 6];
        let table = integral_image(&gray, 3, 2);
        assert_eq!(table[2 * 4 + 3], 21);
        assert_eq!(table[1 * 4 + 2], 3);
    }

    #[test]
    fn test_otsu_uniform_image_marks_nothing_dark() {
        let gray = vec![255u8; 64];
        let binary = otsu_binarize(&gray, 8, 8);
        assert_eq!(binary.count_ones(), 0);
    }
}
