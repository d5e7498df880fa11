/// Packed binary matrix, one bit per cell, row-major.
///
/// Used both for binarized images (true = dark pixel) and for symbol module
/// grids (true = dark module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    words_per_row: usize,
    words: Vec<u64>,
}

impl BitMatrix {
    /// Create an all-light matrix
    pub fn new(width: usize, height: usize) -> Self {
        let words_per_row = width.div_ceil(64);
        Self {
            width,
            height,
            words_per_row,
            words: vec![0; words_per_row * height],
        }
    }

    /// Square matrix, the shape of every symbol grid
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    /// Build a matrix from a predicate over `(x, y)`
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut m = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    m.set(x, y, true);
                }
            }
        }
        m
    }

    /// Matrix width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Matrix height
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn locate(&self, x: usize, y: usize) -> (usize, u64) {
        (y * self.words_per_row + x / 64, 1u64 << (x % 64))
    }

    /// Bit at (x, y); out of bounds reads as light
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (word, mask) = self.locate(x, y);
        self.words[word] & mask != 0
    }

    /// Bit at signed coordinates; anything outside reads as light
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && self.get(x as usize, y as usize)
    }

    /// Set bit at (x, y); out of bounds writes are ignored
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (word, mask) = self.locate(x, y);
        if value {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    /// Flip bit at (x, y)
    #[inline]
    pub fn toggle(&mut self, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (word, mask) = self.locate(x, y);
        self.words[word] ^= mask;
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}

impl Default for BitMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_matrix() {
        let mut matrix = BitMatrix::new(70, 3);
        assert_eq!(matrix.width(), 70);
        assert_eq!(matrix.height(), 3);

        matrix.set(65, 2, true);
        assert!(matrix.get(65, 2));
        assert!(!matrix.get(64, 2));
        assert!(!matrix.get(65, 1));

        matrix.toggle(65, 2);
        assert!(!matrix.get(65, 2));

        matrix.set(0, 0, true);
        matrix.set(69, 1, true);
        assert_eq!(matrix.count_ones(), 2);
        matrix.clear();
        assert_eq!(matrix.count_ones(), 0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut matrix = BitMatrix::square(8);
        matrix.set(10, 10, true);
        assert!(!matrix.get(10, 10));
        assert!(!matrix.get_signed(-1, 3));
        assert_eq!(matrix.count_ones(), 0);
    }

    #[test]
    fn test_from_fn() {
        let m = BitMatrix::from_fn(4, 4, |x, y| x == y);
        assert_eq!(m.count_ones(), 4);
        assert!(m.get(2, 2));
        assert!(!m.get(1, 2));
    }
}
