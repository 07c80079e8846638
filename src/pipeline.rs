use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    assets::{AssetLoader, FontBook},
    compositor::{PreparedLayer, SlideCompositor, SlideSettings, SlideSummary, compose_static},
    core::PixelBuffer,
    encode_ffmpeg::{EncodeConfig, FfmpegSink},
    error::{InkError, InkResult},
    model::{Project, Slide},
    sink::{FrameSink, FrameWriter},
    sprite::Sprite,
    watermark::{FrameHook, ImageWatermark},
};

/// Hand and eraser overlays shared by every slide of a project.
#[derive(Clone, Debug)]
pub struct SpriteSet {
    pub hand: Sprite,
    pub eraser: Sprite,
}

impl SpriteSet {
    pub fn builtin() -> Self {
        Self {
            hand: Sprite::default_pen(),
            eraser: Sprite::default_eraser(),
        }
    }

    /// Configured sprites, falling back to the built-in ones when missing or unreadable.
    pub fn load(project: &Project, root: &Path) -> Self {
        let resolve = |p: &Option<PathBuf>| p.as_ref().map(|p| root.join(p));
        Self {
            hand: Sprite::load_or(resolve(&project.hand_sprite).as_deref(), Sprite::default_pen),
            eraser: Sprite::load_or(
                resolve(&project.eraser_sprite).as_deref(),
                Sprite::default_eraser,
            ),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Directory for slide outputs; defaults to the project directory.
    pub out_dir: Option<PathBuf>,
    /// Worker count for `parallel_slides`; `None` lets rayon decide.
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideReport {
    pub name: String,
    pub layers_rendered: usize,
    pub layers_skipped: usize,
    pub summary: SlideSummary,
}

#[derive(Debug)]
pub struct SlideOutcome {
    pub name: String,
    pub output: PathBuf,
    pub result: InkResult<SlideReport>,
}

/// Load every layer of `slide` in z order; unloadable layers are skipped with a warning.
pub fn prepare_layers<'s>(
    project: &Project,
    slide: &'s Slide,
    loader: &mut AssetLoader,
) -> (Vec<PreparedLayer<'s>>, usize) {
    let mut layers = Vec::with_capacity(slide.layers.len());
    let mut skipped = 0;
    for desc in slide.ordered_layers() {
        match loader.load(desc, project.background) {
            Ok(loaded) => layers.push(PreparedLayer::new(desc, loaded)),
            Err(e) => {
                tracing::warn!(slide = %slide.name, z = desc.z_index, error = %e, "skipping layer");
                skipped += 1;
            }
        }
    }
    (layers, skipped)
}

/// Render all loadable layers of one slide into `sink` and pad it to the slide duration.
///
/// Only sink failures abort the slide; layers that fail to load or render are skipped.
#[tracing::instrument(skip_all, fields(slide = %slide.name))]
pub fn render_slide(
    project: &Project,
    slide: &Slide,
    loader: &mut AssetLoader,
    sprites: &SpriteSet,
    hook: Option<&dyn FrameHook>,
    sink: &mut dyn FrameSink,
) -> InkResult<SlideReport> {
    let (layers, mut skipped) = prepare_layers(project, slide, loader);
    let settings = SlideSettings {
        width: project.width,
        height: project.height,
        fps: project.fps,
        background: project.background,
        hand: &sprites.hand,
        eraser: &sprites.eraser,
    };
    // Only morphs read back the previous frame.
    let morphs = layers.iter().any(|l| l.descriptor.morph.is_some());
    let writer = FrameWriter::new(sink, hook).keep_last_frame(morphs);
    let mut comp = SlideCompositor::new(writer, settings);

    let mut rendered = 0;
    for (i, layer) in layers.iter().enumerate() {
        match comp.render_layer(layer, i + 1 < layers.len()) {
            Ok(_) => rendered += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(z = layer.descriptor.z_index, error = %e, "layer failed, skipping");
                skipped += 1;
            }
        }
    }

    let summary = comp.finalize_slide(slide.duration_secs)?;
    tracing::info!(
        frames = summary.frames_written,
        held = summary.held_frames,
        rendered,
        skipped,
        "slide done"
    );
    Ok(SlideReport {
        name: slide.name.clone(),
        layers_rendered: rendered,
        layers_skipped: skipped,
        summary,
    })
}

/// Output path of `slide`: its configured output, else `<name>.mp4`, under `dir`.
pub fn slide_output(slide: &Slide, dir: &Path) -> PathBuf {
    match &slide.output {
        Some(p) => dir.join(p),
        None => dir.join(format!("{}.mp4", slide.name)),
    }
}

fn build_thread_pool(threads: Option<usize>) -> InkResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(InkError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| InkError::validation(format!("failed to build rayon thread pool: {e}")))
}

fn load_watermark(project: &Project, root: &Path) -> Option<ImageWatermark> {
    let spec = project.watermark.as_ref()?;
    match ImageWatermark::load(spec, root) {
        Ok(wm) => Some(wm),
        Err(e) => {
            tracing::warn!(error = %e, "watermark unavailable, rendering without it");
            None
        }
    }
}

/// Render every slide of `project`, with sinks produced by `make_sink`.
///
/// Slides are independent: with `parallel_slides` each one runs as its own rayon task, never
/// splitting work inside a slide. A failing slide is reported in its outcome and does not stop
/// the others.
pub fn render_project_with<F>(
    project: &Project,
    root: &Path,
    fonts: &FontBook,
    opts: &RenderOptions,
    make_sink: F,
) -> InkResult<Vec<SlideOutcome>>
where
    F: Fn(&Slide, &Path) -> InkResult<Box<dyn FrameSink>> + Sync,
{
    project.validate()?;
    let sprites = SpriteSet::load(project, root);
    let watermark = load_watermark(project, root);
    let hook = watermark.as_ref().map(|w| w as &dyn FrameHook);
    let out_dir = opts.out_dir.clone().unwrap_or_else(|| root.to_path_buf());

    let run = |slide: &Slide| -> SlideOutcome {
        let output = slide_output(slide, &out_dir);
        let mut loader = AssetLoader::with_fonts(root, fonts.clone());
        let result = make_sink(slide, &output).and_then(|mut sink| {
            render_slide(project, slide, &mut loader, &sprites, hook, sink.as_mut())
        });
        if let Err(e) = &result {
            tracing::error!(slide = %slide.name, error = %e, "slide failed");
        }
        SlideOutcome {
            name: slide.name.clone(),
            output,
            result,
        }
    };

    if project.parallel_slides {
        let pool = build_thread_pool(opts.threads)?;
        Ok(pool.install(|| project.slides.par_iter().map(run).collect()))
    } else {
        Ok(project.slides.iter().map(run).collect())
    }
}

/// Render every slide to its own video file through `ffmpeg`.
pub fn render_project(
    project: &Project,
    root: &Path,
    opts: &RenderOptions,
) -> InkResult<Vec<SlideOutcome>> {
    let fonts = FontBook::with_system_fonts(root);
    render_project_with(project, root, &fonts, opts, |_, output| {
        let cfg = EncodeConfig::new(output, project.width, project.height, project.fps)
            .with_codec(project.codec);
        Ok(Box::new(FfmpegSink::spawn(cfg)?) as Box<dyn FrameSink>)
    })
}

/// Still image of a slide with every layer fully drawn.
pub fn compose_slide_still(
    project: &Project,
    slide: &Slide,
    loader: &mut AssetLoader,
) -> InkResult<PixelBuffer> {
    let (layers, _) = prepare_layers(project, slide, loader);
    compose_static(
        &layers,
        project.width,
        project.height,
        project.background,
        slide.intelligent_erase,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_to_slide_name() {
        let slide: Slide = serde_json::from_value(serde_json::json!({
            "name": "intro",
            "duration_secs": 1.0,
            "layers": []
        }))
        .unwrap();
        assert_eq!(
            slide_output(&slide, Path::new("/out")),
            PathBuf::from("/out/intro.mp4")
        );
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(build_thread_pool(Some(0)).is_err());
    }
}
