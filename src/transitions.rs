//! Entrance and exit animations around a layer's reveal.

use crate::{
    anim_ease::Ease,
    blend::{blend_masked, content_mask, fade_toward, scaled_about_center, translated},
    core::{PixelBuffer, Rgb8},
    error::{InkError, InkResult},
    ink::InkMask,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// To/from the background color.
    Fade,
    /// Motion toward the left edge: entrances come in from the right, exits leave to the left.
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    /// Grow from the layer center on entrance; scale up and fade out on exit.
    Zoom,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationSpec {
    pub kind: AnimationKind,
    pub duration_secs: f64,
    #[serde(default)]
    pub ease: Ease,
}

impl AnimationSpec {
    pub fn validate(&self) -> InkResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(InkError::validation(
                "animation duration_secs must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// Layer content plus where it sits on the slide.
#[derive(Clone, Copy, Debug)]
pub struct PlacedLayer<'a> {
    pub pixels: &'a PixelBuffer,
    pub mask: &'a InkMask,
    pub offset: (i64, i64),
    pub opacity: f32,
}

/// One entrance frame at eased progress `t`: the layer moves from its initial state toward its
/// final pixels and is blended into a copy of `master`.
pub fn entrance_frame(
    master: &PixelBuffer,
    layer: PlacedLayer<'_>,
    kind: AnimationKind,
    t: f64,
    background: Rgb8,
) -> InkResult<PixelBuffer> {
    let t = t.clamp(0.0, 1.0);
    let mut frame = master.clone();
    let (ox, oy) = layer.offset;
    let (lw, lh) = (
        i64::from(layer.pixels.width()),
        i64::from(layer.pixels.height()),
    );
    let (cw, ch) = (i64::from(master.width()), i64::from(master.height()));
    let remaining = 1.0 - t;
    let lerp = |from: i64| (from as f64 * remaining).round() as i64;

    match kind {
        AnimationKind::Fade => {
            let faded = fade_toward(layer.pixels, background, remaining as f32);
            blend_masked(&mut frame, &faded, layer.mask, layer.offset, layer.opacity)?;
        }
        AnimationKind::SlideLeft => {
            let at = (ox + lerp(cw - ox), oy);
            blend_masked(&mut frame, layer.pixels, layer.mask, at, layer.opacity)?;
        }
        AnimationKind::SlideRight => {
            let at = (ox + lerp(-(ox + lw)), oy);
            blend_masked(&mut frame, layer.pixels, layer.mask, at, layer.opacity)?;
        }
        AnimationKind::SlideUp => {
            let at = (ox, oy + lerp(ch - oy));
            blend_masked(&mut frame, layer.pixels, layer.mask, at, layer.opacity)?;
        }
        AnimationKind::SlideDown => {
            let at = (ox, oy + lerp(-(oy + lh)));
            blend_masked(&mut frame, layer.pixels, layer.mask, at, layer.opacity)?;
        }
        AnimationKind::Zoom => {
            let scaled = scaled_about_center(layer.pixels, t.max(0.01), background);
            let mask = content_mask(&scaled, background);
            blend_masked(&mut frame, &scaled, &mask, layer.offset, layer.opacity)?;
        }
    }
    Ok(frame)
}

/// One exit frame at eased progress `t`, transforming the composited slide toward empty.
pub fn exit_frame(
    master: &PixelBuffer,
    kind: AnimationKind,
    t: f64,
    background: Rgb8,
) -> PixelBuffer {
    let t = t.clamp(0.0, 1.0);
    let (w, h) = (f64::from(master.width()), f64::from(master.height()));
    let shift = |extent: f64| (extent * t).round() as i64;
    match kind {
        AnimationKind::Fade => fade_toward(master, background, t as f32),
        AnimationKind::SlideLeft => translated(master, -shift(w), 0, background),
        AnimationKind::SlideRight => translated(master, shift(w), 0, background),
        AnimationKind::SlideUp => translated(master, 0, -shift(h), background),
        AnimationKind::SlideDown => translated(master, 0, shift(h), background),
        AnimationKind::Zoom => {
            let grown = scaled_about_center(master, 1.0 + t, background);
            fade_toward(&grown, background, t as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelRect;

    fn layer() -> (PixelBuffer, InkMask) {
        let mut px = PixelBuffer::filled(4, 4, Rgb8::WHITE);
        px.fill_rect(PixelRect::new(0, 0, 4, 4), Rgb8::BLACK);
        let mask = content_mask(&px, Rgb8::WHITE);
        (px, mask)
    }

    #[test]
    fn entrance_ends_on_final_placement() {
        let (px, mask) = layer();
        let master = PixelBuffer::filled(12, 12, Rgb8::WHITE);
        let placed = PlacedLayer {
            pixels: &px,
            mask: &mask,
            offset: (4, 4),
            opacity: 1.0,
        };
        let mut expected = master.clone();
        blend_masked(&mut expected, &px, &mask, (4, 4), 1.0).unwrap();

        for kind in [
            AnimationKind::Fade,
            AnimationKind::SlideLeft,
            AnimationKind::SlideRight,
            AnimationKind::SlideUp,
            AnimationKind::SlideDown,
            AnimationKind::Zoom,
        ] {
            let end = entrance_frame(&master, placed, kind, 1.0, Rgb8::WHITE).unwrap();
            assert_eq!(end, expected, "{kind:?}");
        }
    }

    #[test]
    fn slide_entrance_starts_off_canvas() {
        let (px, mask) = layer();
        let master = PixelBuffer::filled(12, 12, Rgb8::WHITE);
        let placed = PlacedLayer {
            pixels: &px,
            mask: &mask,
            offset: (4, 4),
            opacity: 1.0,
        };
        for kind in [
            AnimationKind::SlideLeft,
            AnimationKind::SlideRight,
            AnimationKind::SlideUp,
            AnimationKind::SlideDown,
        ] {
            let start = entrance_frame(&master, placed, kind, 0.0, Rgb8::WHITE).unwrap();
            assert_eq!(start, master, "{kind:?}");
        }
    }

    #[test]
    fn exit_ends_blank() {
        let mut master = PixelBuffer::filled(8, 8, Rgb8::WHITE);
        master.fill_rect(PixelRect::new(2, 2, 6, 6), Rgb8::BLACK);
        let blank = PixelBuffer::filled(8, 8, Rgb8::WHITE);
        for kind in [
            AnimationKind::Fade,
            AnimationKind::SlideLeft,
            AnimationKind::SlideRight,
            AnimationKind::SlideUp,
            AnimationKind::SlideDown,
            AnimationKind::Zoom,
        ] {
            assert_eq!(exit_frame(&master, kind, 1.0, Rgb8::WHITE), blank, "{kind:?}");
            assert_eq!(exit_frame(&master, kind, 0.0, Rgb8::WHITE), master, "{kind:?}");
        }
    }

    #[test]
    fn negative_duration_is_invalid() {
        let spec = AnimationSpec {
            kind: AnimationKind::Fade,
            duration_secs: -1.0,
            ease: Ease::Linear,
        };
        assert!(spec.validate().is_err());
    }
}
