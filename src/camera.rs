use crate::{
    core::{PixelBuffer, PixelRect, Point, Rgb8},
    error::{InkError, InkResult},
};

/// Zoom toward a point of the composited slide after a layer lands.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraSpec {
    /// Magnification, `>= 1`.
    pub zoom: f64,
    /// Normalized focus point, `[0.5, 0.5]` is the canvas center.
    #[serde(default = "center")]
    pub focus: [f64; 2],
    #[serde(default)]
    pub duration_secs: f64,
}

fn center() -> [f64; 2] {
    [0.5, 0.5]
}

impl CameraSpec {
    pub fn validate(&self) -> InkResult<()> {
        if !self.zoom.is_finite() || self.zoom < 1.0 {
            return Err(InkError::validation("camera zoom must be finite and >= 1"));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(InkError::validation(
                "camera duration_secs must be finite and >= 0",
            ));
        }
        if self.focus.iter().any(|v| !v.is_finite()) {
            return Err(InkError::validation("camera focus must be finite"));
        }
        Ok(())
    }

    /// View at progress `t`, interpolated from the identity view.
    pub fn view_at(&self, t: f64) -> CameraView {
        let t = t.clamp(0.0, 1.0);
        let target = Point::new(self.focus[0], self.focus[1]);
        CameraView {
            zoom: 1.0 + (self.zoom - 1.0) * t,
            focus: Point::new(0.5, 0.5).lerp(target, t),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub zoom: f64,
    pub focus: Point,
}

impl CameraView {
    pub const IDENTITY: Self = Self {
        zoom: 1.0,
        focus: Point::new(0.5, 0.5),
    };

    pub fn is_identity(&self) -> bool {
        (self.zoom - 1.0).abs() < 1e-9
    }

    /// Crop window for a `width × height` canvas, always inside the canvas.
    pub fn window(&self, width: u32, height: u32) -> PixelRect {
        let zoom = if self.zoom.is_finite() {
            self.zoom.max(1.0)
        } else {
            1.0
        };
        let (fw, fh) = (f64::from(width), f64::from(height));
        let cw = ((fw / zoom).round() as u32).clamp(1.min(width), width);
        let ch = ((fh / zoom).round() as u32).clamp(1.min(height), height);
        let cx = self.focus.x * fw;
        let cy = self.focus.y * fh;
        let max_x0 = f64::from(width - cw);
        let max_y0 = f64::from(height - ch);
        let x0 = (cx - f64::from(cw) / 2.0).round().clamp(0.0, max_x0) as u32;
        let y0 = (cy - f64::from(ch) / 2.0).round().clamp(0.0, max_y0) as u32;
        PixelRect::new(x0, y0, x0 + cw, y0 + ch)
    }

    /// Crop the window out of `canvas` and scale it back to full size.
    pub fn apply(&self, canvas: &PixelBuffer) -> PixelBuffer {
        if self.is_identity() {
            return canvas.clone();
        }
        let (w, h) = canvas.dimensions();
        let win = self.window(w, h);
        let mut crop = PixelBuffer::filled(win.width(), win.height(), Rgb8::BLACK);
        for y in 0..win.height() {
            for x in 0..win.width() {
                crop.put(x, y, canvas.get(win.x0 + x, win.y0 + y));
            }
        }
        crop.resized_nearest(w, h)
    }
}
