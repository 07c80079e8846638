//! Ink mask construction.
//!
//! A pixel is ink when it is darker than the mean of its neighbourhood by at least
//! [`InkMaskParams::offset`]. Local thresholding keeps faint strokes on tinted or unevenly lit
//! backgrounds while rejecting flat regions of any brightness.

use crate::core::{PixelBuffer, PixelRect};

/// Binary mask with the same dimensions as the buffer it was derived from.
#[derive(Clone, PartialEq, Eq)]
pub struct InkMask {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl std::fmt::Debug for InkMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InkMask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("ink_pixels", &self.count())
            .finish()
    }
}

impl InkMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![0; (width as usize) * (height as usize)],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                bits.push(u8::from(f(x, y)));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y as usize) * (self.width as usize) + (x as usize)] != 0
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    /// `true` when no pixel is set.
    pub fn is_blank(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn any_in(&self, rect: PixelRect) -> bool {
        let rect = rect.clip(self.width, self.height);
        (rect.y0..rect.y1).any(|y| (rect.x0..rect.x1).any(|x| self.get(x, y)))
    }

    pub fn bounding_box(&self) -> Option<PixelRect> {
        let mut bounds: Option<PixelRect> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                let px = PixelRect::new(x, y, x + 1, y + 1);
                bounds = Some(bounds.map_or(px, |b| b.union(px)));
            }
        }
        bounds
    }

    /// Ink row indices of column `x`, top to bottom.
    pub fn column(&self, x: u32) -> impl Iterator<Item = u32> + '_ {
        (0..self.height).filter(move |&y| self.get(x, y))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InkMaskParams {
    /// Side of the square neighbourhood (odd).
    pub block_size: u32,
    /// How much darker than the local mean a pixel must be.
    pub offset: u8,
}

impl Default for InkMaskParams {
    fn default() -> Self {
        Self {
            block_size: 15,
            offset: 10,
        }
    }
}

/// Adaptive mean threshold over the luma of `buf`.
///
/// The neighbourhood window is clamped at the image border. A uniformly coloured buffer
/// always yields a blank mask.
pub fn build_ink_mask(buf: &PixelBuffer, params: InkMaskParams) -> InkMask {
    let (w, h) = buf.dimensions();
    if w == 0 || h == 0 {
        return InkMask::empty(w, h);
    }

    let luma: Vec<u8> = buf
        .data()
        .chunks_exact(3)
        .map(|px| crate::core::Rgb8([px[0], px[1], px[2]]).luma())
        .collect();

    // (w+1) x (h+1) summed-area table.
    let stride = (w as usize) + 1;
    let mut integral = vec![0u64; stride * ((h as usize) + 1)];
    for y in 0..h as usize {
        let mut row = 0u64;
        for x in 0..w as usize {
            row += u64::from(luma[y * (w as usize) + x]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let radius = (params.block_size.max(1) / 2) as i64;
    let offset = i64::from(params.offset);
    InkMask::from_fn(w, h, |x, y| {
        let x0 = (i64::from(x) - radius).max(0) as usize;
        let y0 = (i64::from(y) - radius).max(0) as usize;
        let x1 = ((i64::from(x) + radius + 1).min(i64::from(w))) as usize;
        let y1 = ((i64::from(y) + radius + 1).min(i64::from(h))) as usize;
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let count = ((x1 - x0) * (y1 - y0)) as i64;
        let gray = i64::from(luma[(y as usize) * (w as usize) + (x as usize)]);
        gray * count <= sum as i64 - offset * count
    })
}
