use crate::error::{InkError, InkResult};

pub use kurbo::{Point, Vec2};

/// 8-bit RGB color.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Rgb8(pub [u8; 3]);

impl Rgb8 {
    pub const WHITE: Self = Self([255, 255, 255]);
    pub const BLACK: Self = Self([0, 0, 0]);

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Integer BT.601 luma.
    pub fn luma(self) -> u8 {
        let [r, g, b] = self.0;
        ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000) as u8
    }

    /// Largest per-channel absolute difference.
    pub fn max_channel_diff(self, other: Self) -> u8 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0)
    }
}

/// Axis-aligned pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32, // exclusive
    pub y1: u32, // exclusive
}

impl PixelRect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(self, x: u32, y: u32) -> bool {
        self.x0 <= x && x < self.x1 && self.y0 <= y && y < self.y1
    }

    pub fn center(self) -> Point {
        Point::new(
            (f64::from(self.x0) + f64::from(self.x1)) / 2.0,
            (f64::from(self.y0) + f64::from(self.y1)) / 2.0,
        )
    }

    /// Clip to `[0, width) × [0, height)`.
    pub fn clip(self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.min(width),
            y0: self.y0.min(height),
            x1: self.x1.min(width),
            y1: self.y1.min(height),
        }
    }

    /// Smallest rectangle covering both; empty rectangles are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> InkResult<Self> {
        if den == 0 {
            return Err(InkError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(InkError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn integer(num: u32) -> InkResult<Self> {
        Self::new(num, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// `secs × fps`, rounded to the nearest whole frame.
    pub fn secs_to_frames(self, secs: f64) -> u64 {
        if !secs.is_finite() {
            return 0;
        }
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

/// Row-major 3-channel 8-bit color buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    pub fn filled(width: u32, height: u32, color: Rgb8) -> Self {
        let len = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(len * 3);
        for _ in 0..len {
            data.extend_from_slice(&color.0);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> InkResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| InkError::validation("pixel buffer size overflow"))?;
        if data.len() != expected {
            return Err(InkError::validation(format!(
                "pixel buffer expects {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn to_rgb_image(&self) -> InkResult<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| InkError::validation("pixel buffer does not match its dimensions"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn same_dimensions(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 3
    }

    pub fn get(&self, x: u32, y: u32) -> Rgb8 {
        let i = self.offset(x, y);
        Rgb8([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn put(&mut self, x: u32, y: u32, color: Rgb8) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&color.0);
    }

    pub fn fill(&mut self, color: Rgb8) {
        for px in self.data.chunks_exact_mut(3) {
            px.copy_from_slice(&color.0);
        }
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgb8) {
        let rect = rect.clip(self.width, self.height);
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                self.put(x, y, color);
            }
        }
    }

    /// Copy `rect` from `src` into the same location of `self`.
    ///
    /// Both buffers must share dimensions; the rectangle is clipped to them.
    pub fn copy_rect_from(&mut self, src: &PixelBuffer, rect: PixelRect) -> InkResult<()> {
        if !self.same_dimensions(src) {
            return Err(InkError::validation(format!(
                "copy_rect_from expects equal dimensions, got {}x{} and {}x{}",
                self.width, self.height, src.width, src.height
            )));
        }
        let rect = rect.clip(self.width, self.height);
        if rect.is_empty() {
            return Ok(());
        }
        for y in rect.y0..rect.y1 {
            let a = self.offset(rect.x0, y);
            let b = self.offset(rect.x1, y);
            self.data[a..b].copy_from_slice(&src.data[a..b]);
        }
        Ok(())
    }

    /// Nearest-neighbour resample to `width × height`.
    pub fn resized_nearest(&self, width: u32, height: u32) -> Self {
        let mut out = Self::filled(width, height, Rgb8::BLACK);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = ((u64::from(y) * u64::from(self.height)) / u64::from(height.max(1))) as u32;
            for x in 0..width {
                let sx = ((u64::from(x) * u64::from(self.width)) / u64::from(width.max(1))) as u32;
                out.put(x, y, self.get(sx.min(self.width - 1), sy.min(self.height - 1)));
            }
        }
        out
    }
}
