//! Layer source loading: decoded image files and rasterized text blocks.

pub mod image;
pub mod text;

use std::path::{Path, PathBuf};

use crate::{
    core::{PixelBuffer, Rgb8},
    error::InkResult,
    model::{LayerDescriptor, LayerSource, StrokeOrderSpec},
    schedule::stroke::Contour,
};

pub use self::image::{flatten_over, load_image_layer};
pub use self::text::{FontBook, TextBlock, TextStyle};

/// What produced a layer's pixels; decides which reveal scheduler applies.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Image,
    Text {
        /// Glyph outlines in layer pixels, when stroke order was requested and extraction worked.
        contours: Option<Vec<Contour>>,
        stroke_order: Option<StrokeOrderSpec>,
    },
}

#[derive(Clone, Debug)]
pub struct LoadedLayer {
    pub kind: LayerKind,
    pub pixels: PixelBuffer,
}

/// Resolves layer sources relative to a project directory.
#[derive(Debug)]
pub struct AssetLoader {
    root: PathBuf,
    fonts: FontBook,
}

impl AssetLoader {
    /// Loader with system fonts plus any fonts under `<root>/fonts`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let fonts = FontBook::with_system_fonts(&root);
        Self { root, fonts }
    }

    pub fn with_fonts(root: impl Into<PathBuf>, fonts: FontBook) -> Self {
        Self {
            root: root.into(),
            fonts,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    pub fn load(&mut self, layer: &LayerDescriptor, background: Rgb8) -> InkResult<LoadedLayer> {
        match &layer.source {
            LayerSource::Image { path } => {
                let path = self.resolve(path);
                Ok(LoadedLayer {
                    kind: LayerKind::Image,
                    pixels: load_image_layer(&path, layer.scale, background)?,
                })
            }
            LayerSource::Text {
                text,
                font_size,
                fonts,
                color,
                line_spacing,
                stroke_order,
            } => {
                let style = TextStyle {
                    font_size: font_size * layer.scale as f32,
                    color: *color,
                    line_spacing: *line_spacing,
                    background,
                };
                let block = self.fonts.render(&self.root, text, fonts, &style)?;
                let contours = match stroke_order {
                    Some(_) => {
                        let c = block.contours;
                        if c.is_none() {
                            tracing::warn!("glyph outlines unavailable, using column order");
                        }
                        c
                    }
                    None => None,
                };
                Ok(LoadedLayer {
                    kind: LayerKind::Text {
                        contours,
                        stroke_order: *stroke_order,
                    },
                    pixels: block.pixels,
                })
            }
        }
    }
}
