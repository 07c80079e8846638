//! Layer compositor: drives each layer through entrance, reveal, blend, camera and exit, and
//! reconciles the slide's frame count with its requested duration.

use crate::{
    assets::{LayerKind, LoadedLayer},
    blend::{BG_TOLERANCE, blend_masked, content_mask},
    camera::CameraView,
    core::{Fps, PixelBuffer, PixelRect, Point, Rgb8},
    emit::{RevealMode, RevealPass, RevealTarget, emit_reveal, seed_canvas},
    error::{InkError, InkResult},
    ink::{InkMask, InkMaskParams, build_ink_mask},
    model::LayerDescriptor,
    morph::morph_frames,
    schedule::{
        RevealSchedule, ScheduleStrategy, schedule_strokes, schedule_text, schedule_tiles,
    },
    sink::FrameWriter,
    sprite::{Sprite, composite_sprite},
    transitions::{PlacedLayer, entrance_frame, exit_frame},
};

/// A layer whose source has been loaded and is ready to render.
#[derive(Clone, Debug)]
pub struct PreparedLayer<'a> {
    pub descriptor: &'a LayerDescriptor,
    pub loaded: LoadedLayer,
}

impl<'a> PreparedLayer<'a> {
    pub fn new(descriptor: &'a LayerDescriptor, loaded: LoadedLayer) -> Self {
        Self { descriptor, loaded }
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.loaded.pixels
    }

    /// Scheduler for this layer; `None` for static layers, which have no schedule.
    pub fn strategy(&self) -> Option<ScheduleStrategy> {
        if self.descriptor.mode == RevealMode::Static {
            return None;
        }
        Some(match &self.loaded.kind {
            LayerKind::Image => ScheduleStrategy::Tiles {
                size: self.descriptor.tile_size,
            },
            LayerKind::Text {
                contours: Some(_),
                stroke_order: Some(params),
            } => ScheduleStrategy::Strokes(*params),
            LayerKind::Text { .. } => ScheduleStrategy::Columns,
        })
    }

    /// Reveal schedule for this layer. Stroke-order failures fall back to column order.
    pub fn schedule(&self) -> InkResult<RevealSchedule> {
        let Some(strategy) = self.strategy() else {
            return Ok(RevealSchedule::default());
        };
        let ink = build_ink_mask(self.pixels(), InkMaskParams::default());
        let schedule = match strategy {
            ScheduleStrategy::Tiles { size } => schedule_tiles(&ink, size)?,
            ScheduleStrategy::Columns => schedule_text(&ink),
            ScheduleStrategy::Strokes(params) => {
                let contours = match &self.loaded.kind {
                    LayerKind::Text {
                        contours: Some(c), ..
                    } => c.clone(),
                    _ => Vec::new(),
                };
                let (w, h) = self.pixels().dimensions();
                match schedule_strokes(contours, w, h, params) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "stroke order unavailable, using column order");
                        schedule_text(&ink)
                    }
                }
            }
        };
        tracing::debug!(?strategy, units = schedule.len(), "reveal schedule");
        Ok(schedule)
    }
}

/// Reported when a slide's content runs longer than its configured duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationWarning {
    pub target_frames: u64,
    pub frames_written: u64,
}

impl std::fmt::Display for DurationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slide content needs {} frames but the duration allows {}; the clip runs long",
            self.frames_written, self.target_frames
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlideSummary {
    pub frames_written: u64,
    pub held_frames: u64,
    pub warning: Option<DurationWarning>,
}

#[derive(Clone, Copy, Debug)]
pub struct SlideSettings<'s> {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub background: Rgb8,
    pub hand: &'s Sprite,
    pub eraser: &'s Sprite,
}

/// Owns the master canvas of one slide and every frame written for it.
pub struct SlideCompositor<'a> {
    writer: FrameWriter<'a>,
    master: PixelBuffer,
    settings: SlideSettings<'a>,
    view: CameraView,
}

/// Reveal frames: the master with the partially revealed layer on top, plus the sprite.
struct MasterPreview<'p, 'a> {
    writer: &'p mut FrameWriter<'a>,
    master: &'p PixelBuffer,
    mask: &'p InkMask,
    offset: (i64, i64),
    opacity: f32,
    mode: RevealMode,
    background: Rgb8,
    sprite: Option<&'p Sprite>,
}

impl RevealTarget for MasterPreview<'_, '_> {
    fn present(&mut self, canvas: &PixelBuffer, anchor: Option<Point>) -> InkResult<()> {
        let shown = match self.mode {
            RevealMode::Draw => InkMask::from_fn(canvas.width(), canvas.height(), |x, y| {
                self.mask.get(x, y)
                    && canvas.get(x, y).max_channel_diff(self.background) > BG_TOLERANCE
            }),
            RevealMode::Eraser | RevealMode::Static => self.mask.clone(),
        };
        let mut frame = self.master.clone();
        blend_masked(&mut frame, canvas, &shown, self.offset, self.opacity)?;
        if let (Some(sprite), Some(at)) = (self.sprite, anchor) {
            composite_sprite(
                &mut frame,
                sprite,
                at.x.floor() as i64 + self.offset.0,
                at.y.floor() as i64 + self.offset.1,
            );
        }
        self.writer.write(&frame)
    }
}

impl<'a> SlideCompositor<'a> {
    pub fn new(writer: FrameWriter<'a>, settings: SlideSettings<'a>) -> Self {
        Self {
            writer,
            master: PixelBuffer::filled(settings.width, settings.height, settings.background),
            settings,
            view: CameraView::IDENTITY,
        }
    }

    pub fn master(&self) -> &PixelBuffer {
        &self.master
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    fn write_viewed(&mut self, frame: &PixelBuffer) -> InkResult<()> {
        if self.view.is_identity() {
            self.writer.write(frame)
        } else {
            self.writer.write(&self.view.apply(frame))
        }
    }

    /// Render one layer end to end, returning the number of frames it wrote.
    ///
    /// `has_next` tells whether another layer follows on this slide.
    #[tracing::instrument(
        skip_all,
        fields(z = layer.descriptor.z_index, mode = ?layer.descriptor.mode)
    )]
    pub fn render_layer(&mut self, layer: &PreparedLayer<'_>, has_next: bool) -> InkResult<u64> {
        let start = self.writer.frames_written();
        let desc = layer.descriptor;
        let bg = self.settings.background;
        let fps = self.settings.fps;
        let pixels = layer.pixels();
        let mask = content_mask(pixels, bg);
        let offset = desc.offset();
        self.view = CameraView::IDENTITY;

        if let Some(morph) = desc.morph {
            let n = fps.secs_to_frames(morph.duration_secs);
            let prev = self
                .writer
                .last_frame()
                .cloned()
                .unwrap_or_else(|| self.master.clone());
            let mut next = self.master.clone();
            blend_masked(&mut next, pixels, &mask, offset, desc.opacity)?;
            for frame in morph_frames(&prev, &next, n, bg)? {
                self.writer.write(&frame)?;
            }
        }

        if let Some(anim) = desc.entrance {
            let n = fps.secs_to_frames(anim.duration_secs);
            let placed = PlacedLayer {
                pixels,
                mask: &mask,
                offset,
                opacity: desc.opacity,
            };
            for i in 0..n {
                let t = anim.ease.progress(i, n);
                let frame = entrance_frame(&self.master, placed, anim.kind, t, bg)?;
                self.writer.write(&frame)?;
            }
        }

        let schedule = layer.schedule()?;
        let pass = RevealPass {
            source: pixels,
            mode: desc.mode,
            skip_rate: desc.skip_rate,
            background: bg,
        };
        let mut canvas = seed_canvas(pixels, desc.mode, bg);
        let sprite = match desc.mode {
            RevealMode::Draw => Some(self.settings.hand),
            RevealMode::Eraser => Some(self.settings.eraser),
            RevealMode::Static => None,
        };
        let mut preview = MasterPreview {
            writer: &mut self.writer,
            master: &self.master,
            mask: &mask,
            offset,
            opacity: desc.opacity,
            mode: desc.mode,
            background: bg,
            sprite,
        };
        let stats = emit_reveal(&pass, schedule, &mut canvas, &mut preview)?;

        match desc.mode {
            RevealMode::Draw | RevealMode::Static => {
                blend_masked(&mut self.master, pixels, &mask, offset, desc.opacity)?;
            }
            RevealMode::Eraser => {
                let blank = PixelBuffer::filled(pixels.width(), pixels.height(), bg);
                blend_masked(&mut self.master, &blank, &mask, offset, desc.opacity)?;
            }
        }

        if let Some(camera) = desc.camera {
            let n = fps.secs_to_frames(camera.duration_secs).max(1);
            for i in 0..n {
                self.view = camera.view_at((i + 1) as f64 / n as f64);
                let master = self.master.clone();
                self.write_viewed(&master)?;
            }
        }

        if let Some(anim) = desc.exit {
            let n = fps.secs_to_frames(anim.duration_secs);
            for i in 0..n {
                let t = anim.ease.progress(i, n);
                let frame = exit_frame(&self.master, anim.kind, t, bg);
                self.write_viewed(&frame)?;
            }
            // The exit ends on an empty slide.
            self.master.fill(bg);
            if has_next {
                self.view = CameraView::IDENTITY;
            }
        }

        let written = self.writer.frames_written() - start;
        tracing::debug!(
            reveal_units = stats.units,
            reveal_frames = stats.frames,
            frames = written,
            "layer rendered"
        );
        Ok(written)
    }

    /// Pad the slide to its requested duration with held frames, then close the sink.
    ///
    /// Content that already runs longer is never cut; a [`DurationWarning`] is returned instead.
    pub fn finalize_slide(mut self, target_secs: f64) -> InkResult<SlideSummary> {
        let target = self.settings.fps.secs_to_frames(target_secs);
        let written = self.writer.frames_written();
        let mut summary = SlideSummary {
            frames_written: written,
            held_frames: 0,
            warning: None,
        };

        if written < target {
            let hold = self.view.apply(&self.master);
            for _ in written..target {
                self.writer.write(&hold)?;
            }
            summary.held_frames = target - written;
        } else if written > target {
            let warning = DurationWarning {
                target_frames: target,
                frames_written: written,
            };
            tracing::warn!(%warning, "duration exceeded");
            summary.warning = Some(warning);
        }

        self.writer.close()?;
        summary.frames_written = self.writer.frames_written();
        Ok(summary)
    }
}

/// `rect` moved by `offset` and clipped to `width × height`; `None` when nothing is left.
fn placed_rect(rect: PixelRect, offset: (i64, i64), width: u32, height: u32) -> Option<PixelRect> {
    let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;
    let out = PixelRect::new(
        clamp(i64::from(rect.x0) + offset.0, width),
        clamp(i64::from(rect.y0) + offset.1, height),
        clamp(i64::from(rect.x1) + offset.0, width),
        clamp(i64::from(rect.y1) + offset.1, height),
    );
    (!out.is_empty()).then_some(out)
}

/// One still image of all layers blended in order, without animation.
///
/// With `intelligent_erase`, a full-opacity layer first clears the box its content will cover.
pub fn compose_static(
    layers: &[PreparedLayer<'_>],
    width: u32,
    height: u32,
    background: Rgb8,
    intelligent_erase: bool,
) -> InkResult<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(InkError::validation("still width/height must be > 0"));
    }
    let mut canvas = PixelBuffer::filled(width, height, background);
    for layer in layers {
        let desc = layer.descriptor;
        let pixels = layer.pixels();
        let mask = content_mask(pixels, background);
        if intelligent_erase
            && desc.opacity >= 1.0
            && let Some(bounds) = mask.bounding_box()
            && let Some(region) = placed_rect(bounds, desc.offset(), width, height)
        {
            canvas.fill_rect(region, background);
        }
        match desc.mode {
            RevealMode::Eraser => {
                let blank = PixelBuffer::filled(pixels.width(), pixels.height(), background);
                blend_masked(&mut canvas, &blank, &mask, desc.offset(), desc.opacity)?;
            }
            RevealMode::Draw | RevealMode::Static => {
                blend_masked(&mut canvas, pixels, &mask, desc.offset(), desc.opacity)?;
            }
        }
    }
    Ok(canvas)
}
