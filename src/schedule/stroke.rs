//! Opt-in stroke-order scheduling for text layers.
//!
//! Glyph outlines are traced contour by contour with a square brush, each character is then
//! filled in one step, and optional pauses separate characters and words.

use crate::{
    core::{PixelRect, Point},
    error::{InkError, InkResult},
};

use super::{
    RevealSchedule, RevealUnit, StrokeDab,
    text::{assign_line, cluster_lines},
};

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StrokeParams {
    /// Arc length between two brush dabs.
    pub step_px: f64,
    /// Side of the square brush.
    pub brush_px: u32,
    pub pause_after_char_frames: u32,
    pub pause_after_word_frames: u32,
}

impl Default for StrokeParams {
    fn default() -> Self {
        Self {
            step_px: 2.0,
            brush_px: 4,
            pause_after_char_frames: 1,
            pause_after_word_frames: 4,
        }
    }
}

/// One closed glyph outline, flattened to a polyline in layer pixel space.
pub type Contour = Vec<Point>;

/// Contours that belong to one visual character.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphCluster {
    pub contours: Vec<Contour>,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub line: usize,
    pub word_end: bool,
}

impl GlyphCluster {
    fn from_contour(contour: Contour, line: usize) -> Option<Self> {
        let first = contour.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &contour {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self {
            contours: vec![contour],
            x0,
            y0,
            x1,
            y1,
            line,
            word_end: false,
        })
    }

    fn absorb(&mut self, other: GlyphCluster) {
        self.x0 = self.x0.min(other.x0);
        self.y0 = self.y0.min(other.y0);
        self.x1 = self.x1.max(other.x1);
        self.y1 = self.y1.max(other.y1);
        self.contours.extend(other.contours);
    }

    fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn pixel_bounds(&self, width: u32, height: u32) -> PixelRect {
        PixelRect::new(
            self.x0.floor().max(0.0) as u32,
            self.y0.floor().max(0.0) as u32,
            self.x1.ceil().max(0.0) as u32 + 1,
            self.y1.ceil().max(0.0) as u32 + 1,
        )
        .clip(width, height)
    }
}

/// Group contours into characters (horizontally overlapping contours on one line) and mark
/// word ends. Output is ordered by line, then left edge.
pub fn group_characters(contours: Vec<Contour>) -> Vec<GlyphCluster> {
    let singles: Vec<GlyphCluster> = contours
        .into_iter()
        .filter_map(|c| GlyphCluster::from_contour(c, 0))
        .collect();
    let centers: Vec<f64> = singles.iter().map(GlyphCluster::center_y).collect();
    let lines = cluster_lines(&centers);

    let mut by_line: Vec<Vec<GlyphCluster>> = vec![Vec::new(); lines.len().max(1)];
    for mut g in singles {
        g.line = assign_line(&lines, g.center_y()).unwrap_or(0);
        by_line[g.line].push(g);
    }

    let mut out = Vec::new();
    for mut members in by_line {
        members.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        let mut chars: Vec<GlyphCluster> = Vec::new();
        for g in members {
            match chars.last_mut() {
                Some(cur) if g.x0 <= cur.x1 => cur.absorb(g),
                _ => chars.push(g),
            }
        }

        let mut heights: Vec<f64> = chars.iter().map(|c| c.y1 - c.y0).collect();
        heights.sort_by(f64::total_cmp);
        let median = heights.get(heights.len() / 2).copied().unwrap_or(0.0);
        let word_gap = (0.35 * median).max(4.0);

        let n = chars.len();
        for i in 0..n {
            chars[i].word_end = i + 1 == n || chars[i + 1].x0 - chars[i].x1 > word_gap;
        }
        out.extend(chars);
    }
    out
}

fn dab(at: Point, brush: u32, width: u32, height: u32) -> Option<StrokeDab> {
    let half = f64::from(brush.max(1)) / 2.0;
    let x0 = (at.x - half).floor().max(0.0) as u32;
    let y0 = (at.y - half).floor().max(0.0) as u32;
    let x1 = (at.x + half).ceil().max(0.0) as u32;
    let y1 = (at.y + half).ceil().max(0.0) as u32;
    let rect = PixelRect::new(x0, y0, x1, y1).clip(width, height);
    (!rect.is_empty()).then_some(StrokeDab { at, rect })
}

/// Points every `step` along the closed polyline, starting at its first vertex.
fn sample_contour(contour: &[Point], step: f64) -> Vec<Point> {
    let Some(&first) = contour.first() else {
        return Vec::new();
    };
    let mut out = vec![first];
    let mut carry = 0.0;
    let closing = [first];
    let mut prev = first;
    for &next in contour.iter().skip(1).chain(closing.iter()) {
        let seg = next - prev;
        let len = seg.hypot();
        if len > 0.0 {
            let mut d = step - carry;
            while d <= len {
                out.push(prev + seg * (d / len));
                d += step;
            }
            carry = len - (d - step);
        }
        prev = next;
    }
    out
}

/// Stroke-order schedule for glyph outlines laid out on a `width × height` layer.
///
/// Fails when there is nothing to trace so the caller can fall back to column scheduling.
pub fn schedule_strokes(
    contours: Vec<Contour>,
    width: u32,
    height: u32,
    params: StrokeParams,
) -> InkResult<RevealSchedule> {
    if !params.step_px.is_finite() || params.step_px <= 0.0 {
        return Err(InkError::schedule("stroke step_px must be > 0"));
    }
    let chars = group_characters(contours);
    if chars.is_empty() {
        return Err(InkError::schedule("no glyph outlines to trace"));
    }

    let mut units = Vec::new();
    for ch in &chars {
        for contour in &ch.contours {
            for p in sample_contour(contour, params.step_px) {
                if let Some(d) = dab(p, params.brush_px, width, height) {
                    units.push(RevealUnit::Stroke(d));
                }
            }
        }
        let bounds = ch.pixel_bounds(width, height);
        if !bounds.is_empty() {
            units.push(RevealUnit::Fill(bounds));
        }
        let pause = if ch.word_end {
            params.pause_after_word_frames
        } else {
            params.pause_after_char_frames
        };
        if pause > 0 {
            units.push(RevealUnit::Pause(pause));
        }
    }

    if units.iter().all(|u| matches!(u, RevealUnit::Pause(_))) {
        return Err(InkError::schedule("glyph outlines fall outside the layer"));
    }
    tracing::debug!(chars = chars.len(), units = units.len(), "stroke schedule");
    Ok(RevealSchedule::new(units))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, s: f64) -> Contour {
        vec![
            Point::new(x, y),
            Point::new(x + s, y),
            Point::new(x + s, y + s),
            Point::new(x, y + s),
        ]
    }

    #[test]
    fn sampling_walks_the_closed_outline() {
        let pts = sample_contour(&square(0.0, 0.0, 4.0), 2.0);
        // Perimeter 16 at step 2 → 8 steps plus the starting vertex.
        assert_eq!(pts.len(), 9);
        assert_eq!(pts[0], Point::new(0.0, 0.0));
        assert_eq!(pts[2], Point::new(4.0, 0.0));
        assert_eq!(pts[8], Point::new(0.0, 0.0));
    }

    #[test]
    fn overlapping_contours_form_one_character() {
        // An "i": dot above the stem, plus a separate glyph far to the right.
        let chars = group_characters(vec![
            square(60.0, 10.0, 10.0),
            square(10.0, 14.0, 4.0),
            square(10.0, 22.0, 4.0),
        ]);
        assert_eq!(chars.len(), 2);
        assert_eq!(chars[0].contours.len(), 2);
        assert_eq!(chars[0].x0, 10.0);
        assert!(chars[0].word_end);
        assert!(chars[1].word_end);
    }

    #[test]
    fn close_characters_share_a_word() {
        let chars = group_characters(vec![square(0.0, 0.0, 10.0), square(12.0, 0.0, 10.0)]);
        assert_eq!(chars.len(), 2);
        assert!(!chars[0].word_end);
        assert!(chars[1].word_end);
    }

    #[test]
    fn schedule_traces_fills_and_pauses() {
        let params = StrokeParams {
            step_px: 5.0,
            brush_px: 2,
            pause_after_char_frames: 1,
            pause_after_word_frames: 3,
        };
        let s = schedule_strokes(
            vec![square(2.0, 2.0, 10.0), square(14.0, 2.0, 10.0)],
            40,
            20,
            params,
        )
        .unwrap();
        let units = s.units();
        let fills: Vec<usize> = units
            .iter()
            .enumerate()
            .filter(|(_, u)| matches!(u, RevealUnit::Fill(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(fills.len(), 2);
        assert_eq!(units[fills[0] + 1], RevealUnit::Pause(1));
        assert_eq!(units[fills[1] + 1], RevealUnit::Pause(3));
        assert!(matches!(units[0], RevealUnit::Stroke(_)));
    }

    #[test]
    fn empty_outlines_fail_so_callers_can_fall_back() {
        assert!(schedule_strokes(Vec::new(), 10, 10, StrokeParams::default()).is_err());
        assert!(
            schedule_strokes(
                vec![square(500.0, 500.0, 4.0)],
                10,
                10,
                StrokeParams::default()
            )
            .is_err()
        );
    }
}
