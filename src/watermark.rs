use std::path::Path;

use anyhow::Context as _;

use crate::{
    blend::mix,
    core::PixelBuffer,
    error::{InkError, InkResult},
};

/// Pure frame → frame transform applied right before a frame reaches the sink.
pub trait FrameHook: Send + Sync {
    fn apply(&self, frame: &mut PixelBuffer);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WatermarkSpec {
    pub path: String,
    #[serde(default)]
    pub corner: Corner,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_margin")]
    pub margin_px: u32,
}

fn default_opacity() -> f32 {
    0.5
}

fn default_margin() -> u32 {
    16
}

/// Image stamped into a corner of every frame at a fixed opacity.
#[derive(Clone, Debug)]
pub struct ImageWatermark {
    mark: PixelBuffer,
    alpha: Vec<u8>,
    corner: Corner,
    opacity: f32,
    margin: u32,
}

impl ImageWatermark {
    pub fn new(mark: &image::RgbaImage, corner: Corner, opacity: f32, margin: u32) -> Self {
        let (w, h) = mark.dimensions();
        let mut buf = PixelBuffer::filled(w, h, crate::core::Rgb8::BLACK);
        let mut alpha = Vec::with_capacity((w as usize) * (h as usize));
        for (x, y, px) in mark.enumerate_pixels() {
            buf.put(x, y, crate::core::Rgb8([px.0[0], px.0[1], px.0[2]]));
            alpha.push(px.0[3]);
        }
        Self {
            mark: buf,
            alpha,
            corner,
            opacity: opacity.clamp(0.0, 1.0),
            margin,
        }
    }

    pub fn load(spec: &WatermarkSpec, root: &Path) -> InkResult<Self> {
        let path = root.join(&spec.path);
        let img = image::open(&path)
            .with_context(|| format!("decode watermark '{}'", path.display()))
            .map_err(|e| InkError::asset(format!("{e:#}")))?;
        Ok(Self::new(
            &img.to_rgba8(),
            spec.corner,
            spec.opacity,
            spec.margin_px,
        ))
    }

    fn origin(&self, frame: &PixelBuffer) -> (i64, i64) {
        let (fw, fh) = (i64::from(frame.width()), i64::from(frame.height()));
        let (mw, mh) = (i64::from(self.mark.width()), i64::from(self.mark.height()));
        let m = i64::from(self.margin);
        match self.corner {
            Corner::TopLeft => (m, m),
            Corner::TopRight => (fw - mw - m, m),
            Corner::BottomLeft => (m, fh - mh - m),
            Corner::BottomRight => (fw - mw - m, fh - mh - m),
        }
    }
}

impl FrameHook for ImageWatermark {
    fn apply(&self, frame: &mut PixelBuffer) {
        let (ox, oy) = self.origin(frame);
        let (fw, fh) = (i64::from(frame.width()), i64::from(frame.height()));
        for y in 0..self.mark.height() {
            let fy = oy + i64::from(y);
            if fy < 0 || fy >= fh {
                continue;
            }
            for x in 0..self.mark.width() {
                let fx = ox + i64::from(x);
                if fx < 0 || fx >= fw {
                    continue;
                }
                let a = f32::from(self.alpha[(y * self.mark.width() + x) as usize]) / 255.0;
                let t = a * self.opacity;
                if t <= 0.0 {
                    continue;
                }
                let (fx, fy) = (fx as u32, fy as u32);
                frame.put(fx, fy, mix(frame.get(fx, fy), self.mark.get(x, y), t));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rgb8;

    #[test]
    fn stamps_only_the_chosen_corner() {
        let mark = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let wm = ImageWatermark::new(&mark, Corner::BottomRight, 1.0, 1);
        let mut frame = PixelBuffer::filled(6, 6, Rgb8::WHITE);
        wm.apply(&mut frame);
        assert_eq!(frame.get(3, 3), Rgb8::BLACK);
        assert_eq!(frame.get(4, 4), Rgb8::BLACK);
        assert_eq!(frame.get(5, 5), Rgb8::WHITE);
        assert_eq!(frame.get(0, 0), Rgb8::WHITE);
    }

    #[test]
    fn oversized_mark_is_clipped() {
        let mark = image::RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 0, 255]));
        let wm = ImageWatermark::new(&mark, Corner::TopRight, 0.5, 0);
        let mut frame = PixelBuffer::filled(4, 4, Rgb8::WHITE);
        wm.apply(&mut frame);
        assert_eq!(frame.get(0, 0), Rgb8::new(127, 127, 127));
    }

    #[test]
    fn spec_defaults_apply() {
        let spec: WatermarkSpec = serde_json::from_str(r#"{ "path": "logo.png" }"#).unwrap();
        assert_eq!(spec.corner, Corner::BottomRight);
        assert_eq!(spec.opacity, 0.5);
        assert_eq!(spec.margin_px, 16);
    }
}
