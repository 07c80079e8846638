use crate::{
    core::{PixelBuffer, Point, Rgb8},
    error::{InkError, InkResult},
    schedule::{RevealSchedule, RevealUnit},
    sink::FrameWriter,
    sprite::{Sprite, with_sprite},
};

/// How a layer's schedule touches its canvas.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// Start blank, copy source pixels in.
    #[default]
    Draw,
    /// Start fully revealed, return pixels to background.
    Eraser,
    /// Show the whole layer at once, no schedule and no sprite.
    Static,
}

/// Receives the layer canvas each time the emitter decides a frame is due.
pub trait RevealTarget {
    /// `anchor` is the sprite position in layer coordinates, `None` when no sprite is shown.
    fn present(&mut self, canvas: &PixelBuffer, anchor: Option<Point>) -> InkResult<()>;
}

/// Writes the canvas (with the sprite on a copy) straight to a frame writer.
pub struct DirectTarget<'w, 'a> {
    pub writer: &'w mut FrameWriter<'a>,
    pub sprite: Option<&'w Sprite>,
}

impl RevealTarget for DirectTarget<'_, '_> {
    fn present(&mut self, canvas: &PixelBuffer, anchor: Option<Point>) -> InkResult<()> {
        match (self.sprite, anchor) {
            (Some(sprite), Some(at)) => self.writer.write(&with_sprite(canvas, sprite, at)),
            _ => self.writer.write(canvas),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RevealPass<'a> {
    /// Color truth for revealed pixels.
    pub source: &'a PixelBuffer,
    pub mode: RevealMode,
    /// Drawable units processed per emitted frame.
    pub skip_rate: u32,
    pub background: Rgb8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub units: u64,
    pub frames: u64,
}

/// Initial canvas for a reveal: blank for drawing, the full layer otherwise.
pub fn seed_canvas(source: &PixelBuffer, mode: RevealMode, background: Rgb8) -> PixelBuffer {
    match mode {
        RevealMode::Draw => PixelBuffer::filled(source.width(), source.height(), background),
        RevealMode::Eraser | RevealMode::Static => source.clone(),
    }
}

/// Consume `schedule`, mutating `canvas` and presenting frames to `target`.
///
/// A frame is presented after every `skip_rate`-th drawable unit and always after the last
/// one. Pauses present their frame count unconditionally. An empty schedule presents nothing.
/// Static passes ignore the schedule and present the full layer exactly once.
pub fn emit_reveal(
    pass: &RevealPass<'_>,
    schedule: RevealSchedule,
    canvas: &mut PixelBuffer,
    target: &mut dyn RevealTarget,
) -> InkResult<EmitStats> {
    if pass.skip_rate == 0 {
        return Err(InkError::validation("skip_rate must be >= 1"));
    }
    if !canvas.same_dimensions(pass.source) {
        return Err(InkError::validation(
            "reveal canvas must match the layer source dimensions",
        ));
    }

    let mut stats = EmitStats::default();
    if pass.mode == RevealMode::Static {
        canvas.copy_rect_from(pass.source, pass.source.bounds())?;
        target.present(canvas, None)?;
        stats.frames = 1;
        return Ok(stats);
    }

    let drawable = schedule.drawable_len() as u64;
    let skip = u64::from(pass.skip_rate);
    let mut anchor = None;
    for unit in schedule {
        if let RevealUnit::Pause(n) = unit {
            for _ in 0..n {
                target.present(canvas, anchor)?;
                stats.frames += 1;
            }
            continue;
        }

        if let Some(region) = unit.region() {
            match pass.mode {
                RevealMode::Eraser => canvas.fill_rect(region, pass.background),
                _ => canvas.copy_rect_from(pass.source, region)?,
            }
        }
        anchor = unit.anchor();
        stats.units += 1;

        if stats.units.is_multiple_of(skip) || stats.units == drawable {
            target.present(canvas, anchor)?;
            stats.frames += 1;
        }
    }
    Ok(stats)
}
