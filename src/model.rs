use std::path::PathBuf;

use crate::{
    camera::CameraSpec,
    core::{Fps, Rgb8},
    emit::RevealMode,
    error::{InkError, InkResult},
    morph::MorphSpec,
    schedule::StrokeParams,
    transitions::AnimationSpec,
    watermark::WatermarkSpec,
};

/// Stroke-order options for a text layer; presence opts the layer in.
pub type StrokeOrderSpec = StrokeParams;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    #[serde(default = "white")]
    pub background: Rgb8,
    #[serde(default)]
    pub codec: VideoCodec,
    #[serde(default)]
    pub hand_sprite: Option<PathBuf>,
    #[serde(default)]
    pub eraser_sprite: Option<PathBuf>,
    #[serde(default)]
    pub watermark: Option<WatermarkSpec>,
    /// Render independent slides on a thread pool.
    #[serde(default)]
    pub parallel_slides: bool,
    pub slides: Vec<Slide>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Slide {
    pub name: String,
    pub duration_secs: f64,
    /// Output file, defaults to `<name>.mp4` next to the project.
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub layers: Vec<LayerDescriptor>,
    /// Only honored by the still composer.
    #[serde(default)]
    pub intelligent_erase: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LayerDescriptor {
    #[serde(default)]
    pub z_index: i32,
    pub source: LayerSource,
    /// Top-left offset on the slide, in pixels.
    #[serde(default)]
    pub position: [i64; 2],
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default = "one_f32")]
    pub opacity: f32,
    #[serde(default)]
    pub mode: RevealMode,
    #[serde(default = "default_skip_rate")]
    pub skip_rate: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default)]
    pub entrance: Option<AnimationSpec>,
    #[serde(default)]
    pub exit: Option<AnimationSpec>,
    #[serde(default)]
    pub morph: Option<MorphSpec>,
    #[serde(default)]
    pub camera: Option<CameraSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSource {
    Image {
        path: PathBuf,
    },
    Text {
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        /// Font files or family names, tried in order.
        #[serde(default)]
        fonts: Vec<String>,
        #[serde(default = "black")]
        color: Rgb8,
        #[serde(default = "default_line_spacing")]
        line_spacing: f32,
        #[serde(default)]
        stroke_order: Option<StrokeOrderSpec>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    Mpeg4,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Mpeg4 => "mpeg4",
        }
    }
}

fn white() -> Rgb8 {
    Rgb8::WHITE
}

fn black() -> Rgb8 {
    Rgb8::BLACK
}

fn one() -> f64 {
    1.0
}

fn one_f32() -> f32 {
    1.0
}

fn default_skip_rate() -> u32 {
    8
}

fn default_tile_size() -> u32 {
    10
}

fn default_font_size() -> f32 {
    48.0
}

fn default_line_spacing() -> f32 {
    1.2
}

fn finite_non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl Project {
    pub fn validate(&self) -> InkResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(InkError::validation("project width/height must be > 0"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(InkError::validation(format!(
                "project dimensions must be even, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(InkError::validation("fps must have num>0 and den>0"));
        }
        if let Some(wm) = &self.watermark
            && !(0.0..=1.0).contains(&wm.opacity)
        {
            return Err(InkError::validation("watermark opacity must be in [0, 1]"));
        }
        for slide in &self.slides {
            slide.validate()?;
        }
        Ok(())
    }
}

impl Slide {
    pub fn validate(&self) -> InkResult<()> {
        if !finite_non_negative(self.duration_secs) {
            return Err(InkError::validation(format!(
                "slide '{}' duration_secs must be finite and >= 0",
                self.name
            )));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            layer.validate().map_err(|e| {
                InkError::validation(format!("slide '{}' layer {i}: {e}", self.name))
            })?;
        }
        Ok(())
    }

    /// Layers in render order: ascending `z_index`, ties kept in file order.
    pub fn ordered_layers(&self) -> Vec<&LayerDescriptor> {
        let mut layers: Vec<&LayerDescriptor> = self.layers.iter().collect();
        layers.sort_by_key(|l| l.z_index);
        layers
    }
}

impl LayerDescriptor {
    pub fn validate(&self) -> InkResult<()> {
        if self.skip_rate == 0 {
            return Err(InkError::validation("skip_rate must be >= 1"));
        }
        if self.tile_size == 0 {
            return Err(InkError::validation("tile_size must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(InkError::validation("opacity must be in [0, 1]"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(InkError::validation("scale must be finite and > 0"));
        }
        if let LayerSource::Text {
            font_size,
            line_spacing,
            stroke_order,
            ..
        } = &self.source
        {
            if !font_size.is_finite() || *font_size <= 0.0 {
                return Err(InkError::validation("font_size must be finite and > 0"));
            }
            if !line_spacing.is_finite() || *line_spacing <= 0.0 {
                return Err(InkError::validation(
                    "line_spacing must be finite and > 0",
                ));
            }
            if let Some(so) = stroke_order
                && (!so.step_px.is_finite() || so.step_px <= 0.0 || so.brush_px == 0)
            {
                return Err(InkError::validation(
                    "stroke_order step_px and brush_px must be > 0",
                ));
            }
        }
        for anim in [&self.entrance, &self.exit].into_iter().flatten() {
            anim.validate()?;
        }
        if let Some(m) = &self.morph {
            m.validate()?;
        }
        if let Some(c) = &self.camera {
            c.validate()?;
        }
        Ok(())
    }

    pub fn offset(&self) -> (i64, i64) {
        (self.position[0], self.position[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::AnimationKind;

    const PROJECT: &str = r#"{
        "width": 320,
        "height": 240,
        "fps": { "num": 30, "den": 1 },
        "codec": "mpeg4",
        "slides": [{
            "name": "intro",
            "duration_secs": 4.0,
            "layers": [
                { "z_index": 2, "source": { "type": "text", "text": "Hi\nYou" }, "mode": "eraser" },
                { "source": { "type": "image", "path": "a.png" }, "position": [10, 20],
                  "entrance": { "kind": "slide_left", "duration_secs": 0.5, "ease": "in_out_cubic" } },
                { "source": { "type": "image", "path": "b.png" } }
            ]
        }]
    }"#;

    fn project() -> Project {
        serde_json::from_str(PROJECT).unwrap()
    }

    #[test]
    fn parses_with_defaults() {
        let p = project();
        p.validate().unwrap();
        assert_eq!(p.background, Rgb8::WHITE);
        assert_eq!(p.codec, VideoCodec::Mpeg4);
        let layer = &p.slides[0].layers[1];
        assert_eq!(layer.skip_rate, 8);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.offset(), (10, 20));
        assert_eq!(
            layer.entrance.map(|a| a.kind),
            Some(AnimationKind::SlideLeft)
        );
        assert!(matches!(
            p.slides[0].layers[0].source,
            LayerSource::Text { font_size, .. } if font_size == 48.0
        ));
    }

    #[test]
    fn layers_sort_stably_by_z() {
        let p = project();
        let order: Vec<_> = p.slides[0]
            .ordered_layers()
            .into_iter()
            .map(|l| match &l.source {
                LayerSource::Image { path } => path.display().to_string(),
                LayerSource::Text { .. } => "text".to_string(),
            })
            .collect();
        assert_eq!(order, ["a.png", "b.png", "text"]);
    }

    #[test]
    fn validate_rejects_odd_dimensions() {
        let mut p = project();
        p.width = 321;
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_skip_rate() {
        let mut p = project();
        p.slides[0].layers[1].skip_rate = 0;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("skip_rate"));
    }

    #[test]
    fn validate_rejects_bad_opacity_and_zoom() {
        let mut p = project();
        p.slides[0].layers[2].opacity = 1.5;
        assert!(p.validate().is_err());

        let mut p = project();
        p.slides[0].layers[2].camera = Some(CameraSpec {
            zoom: 0.5,
            focus: [0.5, 0.5],
            duration_secs: 1.0,
        });
        assert!(p.validate().is_err());
    }

    #[test]
    fn codec_maps_to_encoder() {
        assert_eq!(VideoCodec::H264.encoder(), "libx264");
        assert_eq!(VideoCodec::Mpeg4.encoder(), "mpeg4");
    }
}
