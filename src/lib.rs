#![forbid(unsafe_code)]

pub mod anim_ease;
pub mod assets;
pub mod blend;
pub mod camera;
pub mod compositor;
pub mod core;
pub mod emit;
pub mod encode_ffmpeg;
pub mod error;
pub mod ink;
pub mod model;
pub mod morph;
pub mod pipeline;
pub mod schedule;
pub mod sink;
pub mod sprite;
pub mod transitions;
pub mod watermark;

pub use anim_ease::Ease;
pub use assets::{AssetLoader, FontBook, LayerKind, LoadedLayer};
pub use compositor::{
    DurationWarning, PreparedLayer, SlideCompositor, SlideSettings, SlideSummary, compose_static,
};
pub use core::{Fps, PixelBuffer, PixelRect, Point, Rgb8};
pub use emit::{RevealMode, emit_reveal};
pub use encode_ffmpeg::{EncodeConfig, FfmpegSink};
pub use error::{InkError, InkResult};
pub use ink::{InkMask, InkMaskParams, build_ink_mask};
pub use model::{LayerDescriptor, LayerSource, Project, Slide, VideoCodec};
pub use pipeline::{
    RenderOptions, SlideOutcome, SlideReport, SpriteSet, render_project, render_project_with,
    render_slide,
};
pub use schedule::{RevealSchedule, RevealUnit, schedule_strokes, schedule_text, schedule_tiles};
pub use sink::{FrameSink, FrameWriter, InMemorySink};
pub use sprite::{Sprite, composite_sprite};
pub use watermark::{FrameHook, ImageWatermark};
