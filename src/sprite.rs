use std::path::Path;

use anyhow::Context as _;

use crate::{
    blend::mul_div255,
    core::{PixelBuffer, Point, Rgb8},
    error::{InkError, InkResult},
};

/// Hand or eraser overlay.
///
/// `pixels` are premultiplied against black (zero where the sprite is transparent) and
/// `inverse_alpha` holds `255 - alpha` per pixel, so compositing is a multiply followed by a
/// saturating add.
#[derive(Clone, PartialEq, Eq)]
pub struct Sprite {
    pixels: PixelBuffer,
    inverse_alpha: Vec<u8>,
}

impl std::fmt::Debug for Sprite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sprite")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish()
    }
}

impl Sprite {
    /// Build from straight-alpha RGBA, cropped to the tight box of non-transparent pixels.
    pub fn from_rgba(img: &image::RgbaImage) -> InkResult<Self> {
        let (w, h) = img.dimensions();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, px) in img.enumerate_pixels() {
            if px.0[3] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x + 1, y + 1),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
            });
        }
        let Some((x0, y0, x1, y1)) = bounds else {
            return Err(InkError::asset(format!(
                "sprite image ({w}x{h}) is fully transparent"
            )));
        };

        let (cw, ch) = (x1 - x0, y1 - y0);
        let mut pixels = PixelBuffer::filled(cw, ch, Rgb8::BLACK);
        let mut inverse_alpha = Vec::with_capacity((cw as usize) * (ch as usize));
        for y in 0..ch {
            for x in 0..cw {
                let [r, g, b, a] = img.get_pixel(x0 + x, y0 + y).0;
                let a16 = u16::from(a);
                pixels.put(
                    x,
                    y,
                    Rgb8([
                        mul_div255(u16::from(r), a16),
                        mul_div255(u16::from(g), a16),
                        mul_div255(u16::from(b), a16),
                    ]),
                );
                inverse_alpha.push(255 - a);
            }
        }
        Ok(Self {
            pixels,
            inverse_alpha,
        })
    }

    /// Combine a color image with a separate grayscale mask (white = sprite).
    pub fn from_color_and_mask(color: &PixelBuffer, mask: &PixelBuffer) -> InkResult<Self> {
        if !color.same_dimensions(mask) {
            return Err(InkError::asset(
                "sprite color image and mask must have the same dimensions",
            ));
        }
        let img = image::RgbaImage::from_fn(color.width(), color.height(), |x, y| {
            let c = color.get(x, y).0;
            image::Rgba([c[0], c[1], c[2], mask.get(x, y).luma()])
        });
        Self::from_rgba(&img)
    }

    pub fn load(path: &Path) -> InkResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode sprite '{}'", path.display()))
            .map_err(|e| InkError::asset(format!("{e:#}")))?;
        Self::from_rgba(&img.to_rgba8())
    }

    /// Load `path`, or use `fallback` when it is absent or unreadable.
    pub fn load_or(path: Option<&Path>, fallback: fn() -> Self) -> Self {
        match path.map(Self::load) {
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "sprite unavailable, using built-in");
                fallback()
            }
            None => fallback(),
        }
    }

    /// Procedural pencil whose tip sits at the sprite's top-left corner.
    pub fn default_pen() -> Self {
        const SIZE: u32 = 48;
        let dir = kurbo::Vec2::new(1.0, 1.5).normalize();
        let img = image::RgbaImage::from_fn(SIZE, SIZE, |x, y| {
            let p = kurbo::Vec2::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let along = p.dot(dir);
            let across = p.cross(dir).abs();
            let half_width = (along * 0.5).min(4.0);
            if along > 52.0 || across > half_width {
                return image::Rgba([0, 0, 0, 0]);
            }
            if along < 9.0 {
                image::Rgba([60, 60, 60, 255])
            } else {
                image::Rgba([230, 180, 40, 255])
            }
        });
        Self::from_rgba(&img).unwrap_or_else(|_| Self {
            pixels: PixelBuffer::filled(1, 1, Rgb8::BLACK),
            inverse_alpha: vec![0],
        })
    }

    /// Rectangular eraser block, tip at the top-left corner.
    pub fn default_eraser() -> Self {
        let img = image::RgbaImage::from_fn(28, 18, |x, y| {
            if x < 2 || y < 2 || x >= 26 || y >= 16 {
                image::Rgba([70, 70, 90, 255])
            } else {
                image::Rgba([235, 120, 140, 255])
            }
        });
        Self::from_rgba(&img).unwrap_or_else(|_| Self::default_pen())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Overlay `sprite` with its top-left corner at `(x, y)`.
///
/// The sprite is cropped to whatever part overlaps the canvas; nothing outside
/// `[0, W) × [0, H)` is ever written. This mutates `canvas`: pass a copy when the un-sprited
/// state must survive.
pub fn composite_sprite(canvas: &mut PixelBuffer, sprite: &Sprite, x: i64, y: i64) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (sw, sh) = (i64::from(sprite.width()), i64::from(sprite.height()));

    let sx0 = (-x).max(0);
    let sy0 = (-y).max(0);
    let sx1 = sw.min(cw - x);
    let sy1 = sh.min(ch - y);
    if sx0 >= sx1 || sy0 >= sy1 {
        return;
    }

    for sy in sy0..sy1 {
        for sx in sx0..sx1 {
            let inv = u16::from(sprite.inverse_alpha[(sy * sw + sx) as usize]);
            let s = sprite.pixels.get(sx as u32, sy as u32).0;
            let (dx, dy) = ((x + sx) as u32, (y + sy) as u32);
            let d = canvas.get(dx, dy).0;
            let mut out = [0u8; 3];
            for c in 0..3 {
                out[c] = mul_div255(u16::from(d[c]), inv).saturating_add(s[c]);
            }
            canvas.put(dx, dy, Rgb8(out));
        }
    }
}

/// Copy of `canvas` with `sprite` anchored at `anchor` (rounded down to whole pixels).
pub fn with_sprite(canvas: &PixelBuffer, sprite: &Sprite, anchor: Point) -> PixelBuffer {
    let mut out = canvas.clone();
    composite_sprite(
        &mut out,
        sprite,
        anchor.x.floor() as i64,
        anchor.y.floor() as i64,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_block(w: u32, h: u32, color: [u8; 3]) -> Sprite {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([color[0], color[1], color[2], 255]));
        Sprite::from_rgba(&img).unwrap()
    }

    #[test]
    fn crops_to_tight_alpha_box() {
        let mut img = image::RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 0, 0]));
        img.put_pixel(3, 4, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(5, 7, image::Rgba([255, 0, 0, 128]));
        let s = Sprite::from_rgba(&img).unwrap();
        assert_eq!((s.width(), s.height()), (3, 4));
        assert_eq!(s.pixels.get(2, 3), Rgb8([128, 0, 0]));
        assert_eq!(s.inverse_alpha[3 * 3 + 2], 127);
    }

    #[test]
    fn transparent_sprite_is_rejected() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 0]));
        assert!(Sprite::from_rgba(&img).is_err());
    }

    #[test]
    fn writes_stay_in_bounds_at_every_edge() {
        let sprite = opaque_block(5, 5, [1, 2, 3]);
        let (w, h) = (12u32, 9u32);
        for (x, y) in [(0, 0), (11, 8), (11, 0), (0, 8), (9, 6), (-3, -2), (-10, 0), (20, 20)] {
            let mut canvas = PixelBuffer::filled(w, h, Rgb8::WHITE);
            composite_sprite(&mut canvas, &sprite, x, y);
            assert_eq!(canvas.dimensions(), (w, h));
            for cy in 0..h as i64 {
                for cx in 0..w as i64 {
                    let covered = cx >= x && cx < x + 5 && cy >= y && cy < y + 5;
                    let px = canvas.get(cx as u32, cy as u32);
                    if covered {
                        assert_eq!(px, Rgb8([1, 2, 3]), "anchor ({x},{y}) pixel ({cx},{cy})");
                    } else {
                        assert_eq!(px, Rgb8::WHITE, "anchor ({x},{y}) pixel ({cx},{cy})");
                    }
                }
            }
        }
    }

    #[test]
    fn with_sprite_leaves_source_untouched() {
        let canvas = PixelBuffer::filled(8, 8, Rgb8::WHITE);
        let out = with_sprite(&canvas, &opaque_block(2, 2, [0, 0, 0]), Point::new(3.7, 3.2));
        assert_eq!(canvas, PixelBuffer::filled(8, 8, Rgb8::WHITE));
        assert_eq!(out.get(3, 3), Rgb8::BLACK);
        assert_eq!(out.get(5, 5), Rgb8::WHITE);
    }

    #[test]
    fn built_in_sprites_are_non_empty() {
        assert!(Sprite::default_pen().width() > 1);
        assert!(Sprite::default_eraser().height() > 1);
    }

    #[test]
    fn mask_pairs_build_sprites() {
        let color = PixelBuffer::filled(3, 3, Rgb8::new(200, 10, 10));
        let mut mask = PixelBuffer::filled(3, 3, Rgb8::BLACK);
        mask.put(1, 1, Rgb8::WHITE);
        let s = Sprite::from_color_and_mask(&color, &mask).unwrap();
        assert_eq!((s.width(), s.height()), (1, 1));
    }
}
