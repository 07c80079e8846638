use crate::{
    core::{PixelBuffer, PixelRect, Rgb8},
    error::{InkError, InkResult},
    ink::InkMask,
};

/// Channel difference above which a pixel no longer counts as background.
pub const BG_TOLERANCE: u8 = 8;

pub fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn weight_u16(t: f32) -> u16 {
    ((t.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16
}

/// `a·(1-t) + b·t` with the same fixed-point rounding for every call site.
pub fn mix(a: Rgb8, b: Rgb8, t: f32) -> Rgb8 {
    let tt = weight_u16(t);
    let it = 255u16 - tt;
    let mut out = [0u8; 3];
    for i in 0..3 {
        let av = mul_div255(u16::from(a.0[i]), it);
        let bv = mul_div255(u16::from(b.0[i]), tt);
        out[i] = av.saturating_add(bv);
    }
    Rgb8(out)
}

/// Pixels that differ from `background` by more than [`BG_TOLERANCE`].
pub fn content_mask(buf: &PixelBuffer, background: Rgb8) -> InkMask {
    InkMask::from_fn(buf.width(), buf.height(), |x, y| {
        buf.get(x, y).max_channel_diff(background) > BG_TOLERANCE
    })
}

/// Tight box around non-background pixels, `None` for a blank buffer.
pub fn content_bounds(buf: &PixelBuffer, background: Rgb8) -> Option<PixelRect> {
    content_mask(buf, background).bounding_box()
}

/// Blend `src` into `dst` at `offset`, only where `mask` is set.
///
/// `opacity >= 1` copies verbatim, `opacity <= 0` leaves `dst` untouched, anything in between
/// is a weighted average. Pixels landing outside `dst` are dropped.
pub fn blend_masked(
    dst: &mut PixelBuffer,
    src: &PixelBuffer,
    mask: &InkMask,
    offset: (i64, i64),
    opacity: f32,
) -> InkResult<()> {
    if mask.width() != src.width() || mask.height() != src.height() {
        return Err(InkError::validation(
            "blend_masked expects a mask matching the source dimensions",
        ));
    }
    if opacity <= 0.0 || !opacity.is_finite() {
        return Ok(());
    }
    let verbatim = opacity >= 1.0;
    let (ox, oy) = offset;
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    for sy in 0..src.height() {
        let dy = i64::from(sy) + oy;
        if dy < 0 || dy >= dh {
            continue;
        }
        for sx in 0..src.width() {
            let dx = i64::from(sx) + ox;
            if dx < 0 || dx >= dw || !mask.get(sx, sy) {
                continue;
            }
            let (dx, dy) = (dx as u32, dy as u32);
            let s = src.get(sx, sy);
            let out = if verbatim {
                s
            } else {
                mix(dst.get(dx, dy), s, opacity)
            };
            dst.put(dx, dy, out);
        }
    }
    Ok(())
}

/// Linear cross-dissolve from `a` (t = 0) to `b` (t = 1).
pub fn crossfade(a: &PixelBuffer, b: &PixelBuffer, t: f32) -> InkResult<PixelBuffer> {
    if !a.same_dimensions(b) {
        return Err(InkError::validation(
            "crossfade expects equal-dimension buffers",
        ));
    }
    let tt = weight_u16(t);
    let it = 255u16 - tt;
    let mut out = a.clone();
    for (o, bv) in out.data_mut().iter_mut().zip(b.data().iter()) {
        *o = mul_div255(u16::from(*o), it).saturating_add(mul_div255(u16::from(*bv), tt));
    }
    Ok(out)
}

/// Every pixel moved toward `color` by `t`.
pub fn fade_toward(buf: &PixelBuffer, color: Rgb8, t: f32) -> PixelBuffer {
    let tt = weight_u16(t);
    let it = 255u16 - tt;
    let mut out = buf.clone();
    for px in out.data_mut().chunks_exact_mut(3) {
        for (c, target) in px.iter_mut().zip(color.0.iter()) {
            *c = mul_div255(u16::from(*c), it).saturating_add(mul_div255(u16::from(*target), tt));
        }
    }
    out
}

/// Shift the whole buffer by `(dx, dy)`; uncovered pixels become `background`.
pub fn translated(buf: &PixelBuffer, dx: i64, dy: i64, background: Rgb8) -> PixelBuffer {
    if dx == 0 && dy == 0 {
        return buf.clone();
    }
    let mut out = PixelBuffer::filled(buf.width(), buf.height(), background);
    let (w, h) = (i64::from(buf.width()), i64::from(buf.height()));
    for y in 0..h {
        let sy = y - dy;
        if sy < 0 || sy >= h {
            continue;
        }
        for x in 0..w {
            let sx = x - dx;
            if sx < 0 || sx >= w {
                continue;
            }
            out.put(x as u32, y as u32, buf.get(sx as u32, sy as u32));
        }
    }
    out
}

/// Resample `buf` by `factor` around its own center onto a same-sized canvas.
///
/// Factors above 1 magnify (the border is cropped), below 1 shrink toward the center with a
/// `background` margin.
pub fn scaled_about_center(buf: &PixelBuffer, factor: f64, background: Rgb8) -> PixelBuffer {
    let (w, h) = buf.dimensions();
    if !factor.is_finite() || factor <= 0.0 {
        return PixelBuffer::filled(w, h, background);
    }
    if (factor - 1.0).abs() < 1e-9 {
        return buf.clone();
    }
    let mut out = PixelBuffer::filled(w, h, background);
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;
    for y in 0..h {
        let sy = ((f64::from(y) + 0.5 - cy) / factor + cy).floor();
        if sy < 0.0 || sy >= f64::from(h) {
            continue;
        }
        for x in 0..w {
            let sx = ((f64::from(x) + 0.5 - cx) / factor + cx).floor();
            if sx < 0.0 || sx >= f64::from(w) {
                continue;
            }
            out.put(x, y, buf.get(sx as u32, sy as u32));
        }
    }
    out
}
