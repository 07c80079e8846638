use std::path::Path;

use anyhow::Context as _;

use crate::{
    blend::mul_div255,
    core::{PixelBuffer, Rgb8},
    error::{InkError, InkResult},
};

/// Decode `path`, flatten its alpha over `background`, then scale by `scale`.
pub fn load_image_layer(path: &Path, scale: f64, background: Rgb8) -> InkResult<PixelBuffer> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read layer image '{}'", path.display()))
        .map_err(|e| InkError::asset(format!("{e:#}")))?;
    let img = ::image::load_from_memory(&bytes)
        .with_context(|| format!("decode layer image '{}'", path.display()))
        .map_err(|e| InkError::asset(format!("{e:#}")))?;
    let flat = flatten_over(&img.to_rgba8(), background);
    scale_layer(&flat, scale)
}

/// Composite straight-alpha RGBA over an opaque background color.
pub fn flatten_over(img: &::image::RgbaImage, background: Rgb8) -> PixelBuffer {
    let (w, h) = img.dimensions();
    let mut out = PixelBuffer::filled(w, h, background);
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        if a == 0 {
            continue;
        }
        let a16 = u16::from(a);
        let inv = 255 - a16;
        let mut c = [0u8; 3];
        for (i, v) in [r, g, b].into_iter().enumerate() {
            c[i] = mul_div255(u16::from(v), a16)
                .saturating_add(mul_div255(u16::from(background.0[i]), inv));
        }
        out.put(x, y, Rgb8(c));
    }
    out
}

/// Nearest-neighbour rescale; a non-positive or non-finite factor is rejected.
pub fn scale_layer(buf: &PixelBuffer, scale: f64) -> InkResult<PixelBuffer> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(InkError::validation("layer scale must be finite and > 0"));
    }
    if (scale - 1.0).abs() < 1e-9 {
        return Ok(buf.clone());
    }
    let w = ((f64::from(buf.width()) * scale).round() as u32).max(1);
    let h = ((f64::from(buf.height()) * scale).round() as u32).max(1);
    Ok(buf.resized_nearest(w, h))
}
