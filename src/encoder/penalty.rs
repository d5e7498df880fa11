//! Mask selection penalties (rules N1 to N4 of the QR standard)

use crate::models::BitMatrix;

const N1: usize = 3;
const N2: usize = 3;
const N3: usize = 40;
const N4: usize = 10;

/// Total penalty of a fully drawn symbol; lower is better.
pub fn penalty_score(grid: &BitMatrix) -> usize {
    let size = grid.width();
    let mut score = 0;

    for i in 0..size {
        score += line_penalty(size, |j| grid.get(j, i));
        score += line_penalty(size, |j| grid.get(i, j));
    }

    for y in 0..size.saturating_sub(1) {
        for x in 0..size.saturating_sub(1) {
            let c = grid.get(x, y);
            if c == grid.get(x + 1, y) && c == grid.get(x, y + 1) && c == grid.get(x + 1, y + 1) {
                score += N2;
            }
        }
    }

    let total = size * size;
    if total > 0 {
        let dark = grid.count_ones();
        let k = (((dark * 20).abs_diff(total * 10) + total - 1) / total).saturating_sub(1);
        score += k * N4;
    }
    score
}

/// Runs of five or more (N1) and finder-like sequences (N3) along one line
fn line_penalty(size: usize, get: impl Fn(usize) -> bool) -> usize {
    let mut score = 0;

    let mut run = 1;
    for j in 1..=size {
        if j < size && get(j) == get(j - 1) {
            run += 1;
            continue;
        }
        if run >= 5 {
            score += N1 + run - 5;
        }
        run = 1;
    }

    // Outside the symbol reads as light
    let at = |j: isize| j >= 0 && (j as usize) < size && get(j as usize);
    const FINDER: [bool; 7] = [true, false, true, true, true, false, true];
    for start in -4..size as isize {
        if !(0..7).all(|k| at(start + k) == FINDER[k as usize]) {
            continue;
        }
        let light_before = (1..=4).all(|k| !at(start - k));
        let light_after = (7..11).all(|k| !at(start + k));
        if light_before || light_after {
            score += N3;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_penalty() {
        // One dark run of 7 in an otherwise alternating row
        assert_eq!(line_penalty(7, |_| true), N1 + 2);
        assert_eq!(line_penalty(6, |j| j % 2 == 0), 0);
    }

    #[test]
    fn test_finder_like_penalty() {
        let pattern = [false, false, false, false, true, false, true, true, true, false, true];
        assert_eq!(line_penalty(pattern.len(), |j| pattern[j]), N3);
    }

    #[test]
    fn test_balance_penalty() {
        // Checkerboard: no runs, no blocks, exactly half dark
        let grid = BitMatrix::from_fn(10, 10, |x, y| (x + y) % 2 == 0);
        assert_eq!(penalty_score(&grid), 0);

        let dark = BitMatrix::from_fn(4, 4, |_, _| true);
        assert!(penalty_score(&dark) > penalty_score(&grid));
    }
}
