use crate::models::BitMatrix;
use crate::models::symbol::symbol_size;

/// Function module mask for a specific QR version.
/// true = function module (not data), false = data module.
pub struct FunctionMask {
    mask: BitMatrix,
}

impl FunctionMask {
    /// Mark finders, separators, timing, alignment, format and version areas
    pub fn new(version: u8) -> Self {
        let size = symbol_size(version);
        let mut mask = BitMatrix::square(size);

        // Finder patterns with their separators
        mark_rect(&mut mask, 0, 0, 8, 8);
        mark_rect(&mut mask, size - 8, 0, 8, 8);
        mark_rect(&mut mask, 0, size - 8, 8, 8);

        // Timing patterns (row 6 and column 6)
        for i in 0..size {
            mask.set(6, i, true);
            mask.set(i, 6, true);
        }

        for (cx, cy) in alignment_pattern_centers(version) {
            mark_rect(&mut mask, cx - 2, cy - 2, 5, 5);
        }

        // Format info areas, dark module included in the second copy
        mark_rect(&mut mask, 8, 0, 1, 9);
        mark_rect(&mut mask, 0, 8, 9, 1);
        mark_rect(&mut mask, size - 8, 8, 8, 1);
        mark_rect(&mut mask, 8, size - 8, 1, 8);

        if version >= 7 {
            mark_rect(&mut mask, size - 11, 0, 3, 6);
            mark_rect(&mut mask, 0, size - 11, 6, 3);
        }

        Self { mask }
    }

    /// Symbol side in modules
    pub fn size(&self) -> usize {
        self.mask.width()
    }

    /// Whether (`x`, `y`) belongs to a function pattern
    pub fn is_function(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y)
    }

    /// Modules available for codewords and remainder bits
    pub fn data_modules_count(&self) -> usize {
        self.size() * self.size() - self.mask.count_ones()
    }
}

fn mark_rect(mask: &mut BitMatrix, x: usize, y: usize, w: usize, h: usize) {
    for yy in y..y + h {
        for xx in x..x + w {
            mask.set(xx, yy, true);
        }
    }
}

/// Alignment pattern row/column coordinates for a given version.
pub fn alignment_pattern_positions(version: u8) -> Vec<usize> {
    if version <= 1 {
        return Vec::new();
    }
    let v = version as usize;
    let num_align = v / 7 + 2;
    let step = (v * 8 + num_align * 3 + 5) / (num_align * 4 - 4) * 2;

    let mut positions = vec![6usize; num_align];
    let mut pos = symbol_size(version) - 7;
    for slot in positions.iter_mut().skip(1).rev() {
        *slot = pos;
        pos = pos.saturating_sub(step);
    }
    positions
}

/// Alignment pattern centers, skipping the three that would overlap finders
pub fn alignment_pattern_centers(version: u8) -> Vec<(usize, usize)> {
    let positions = alignment_pattern_positions(version);
    let last = positions.len().saturating_sub(1);
    let mut centers = Vec::new();
    for (i, &cy) in positions.iter().enumerate() {
        for (j, &cx) in positions.iter().enumerate() {
            let on_finder = (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0);
            if !on_finder {
                centers.push((cx, cy));
            }
        }
    }
    centers
}
