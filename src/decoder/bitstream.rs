//! Zigzag codeword placement shared by the decoder and the encoder, plus a
//! big-endian bit reader over the corrected data codewords.

use crate::decoder::function_mask::FunctionMask;
use crate::models::BitMatrix;

/// Data module coordinates `(x, y)` in placement order: two-column strips
/// from the right edge, alternating upward and downward, skipping the
/// vertical timing column.
pub fn placement_order(func: &FunctionMask) -> Vec<(usize, usize)> {
    let size = func.size();
    let mut order = Vec::with_capacity(func.data_modules_count());
    let mut right = size as isize - 1;

    while right >= 1 {
        if right == 6 {
            right = 5;
        }
        let upward = ((right + 1) & 2) == 0;
        for vert in 0..size {
            let y = if upward { size - 1 - vert } else { vert };
            for j in 0..2 {
                let x = (right - j) as usize;
                if !func.is_function(x, y) {
                    order.push((x, y));
                }
            }
        }
        right -= 2;
    }
    order
}

/// Read the codewords of an unmasked grid, most significant bit first.
/// Remainder bits that do not fill a whole codeword are dropped.
pub fn read_codewords(grid: &BitMatrix, func: &FunctionMask) -> Vec<u8> {
    let order = placement_order(func);
    order
        .chunks_exact(8)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u8, |acc, &(x, y)| (acc << 1) | grid.get(x, y) as u8)
        })
        .collect()
}

/// Big-endian bit reader
pub struct BitReader<'a> {
    bytes: &'a [u8],
    idx: usize,
}

impl<'a> BitReader<'a> {
    /// Reader positioned at the first bit of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, idx: 0 }
    }

    /// Unread bits
    pub fn remaining(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.idx)
    }

    /// Next `n` bits (at most 32) as an integer
    pub fn read_bits(&mut self, n: usize) -> Option<u32> {
        if n > 32 || n > self.remaining() {
            return None;
        }
        let mut val = 0u32;
        for _ in 0..n {
            let bit = (self.bytes[self.idx / 8] >> (7 - self.idx % 8)) & 1;
            val = (val << 1) | bit as u32;
            self.idx += 1;
        }
        Some(val)
    }
}
