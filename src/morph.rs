//! Position-aware cross-dissolve between consecutive layers.

use crate::{
    blend::{content_bounds, crossfade, translated},
    core::{PixelBuffer, Rgb8},
    error::{InkError, InkResult},
};

/// Center distance at or below which the morph is a plain cross-dissolve.
pub const MORPH_ALIGN_PX: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MorphSpec {
    pub duration_secs: f64,
}

impl MorphSpec {
    pub fn validate(&self) -> InkResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(InkError::validation(
                "morph duration_secs must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// `n` frames dissolving `prev` into `next` at `t = i / n` for `i` in `0..n`.
///
/// When the content centers are more than [`MORPH_ALIGN_PX`] apart, both frames are shifted so
/// their content sits on the center interpolated at `t` before dissolving. Blank frames count as
/// centered on the canvas.
pub fn morph_frames(
    prev: &PixelBuffer,
    next: &PixelBuffer,
    n: u64,
    background: Rgb8,
) -> InkResult<Vec<PixelBuffer>> {
    if !prev.same_dimensions(next) {
        return Err(InkError::validation(
            "morph expects equal-dimension frames",
        ));
    }
    let center_of = |buf: &PixelBuffer| {
        content_bounds(buf, background)
            .unwrap_or_else(|| buf.bounds())
            .center()
    };
    let from = center_of(prev);
    let to = center_of(next);
    let aligned = (to - from).hypot() <= MORPH_ALIGN_PX;

    let mut frames = Vec::with_capacity(n as usize);
    for i in 0..n {
        let t = i as f64 / n as f64;
        let frame = if aligned {
            crossfade(prev, next, t as f32)?
        } else {
            let c = from.lerp(to, t);
            let a = translated(
                prev,
                (c.x - from.x).round() as i64,
                (c.y - from.y).round() as i64,
                background,
            );
            let b = translated(
                next,
                (c.x - to.x).round() as i64,
                (c.y - to.y).round() as i64,
                background,
            );
            crossfade(&a, &b, t as f32)?
        };
        frames.push(frame);
    }
    tracing::debug!(frames = n, aligned, "morph");
    Ok(frames)
}
