//! Reveal scheduling: the order in which a layer's pixels appear.
//!
//! Every scheduler produces a [`RevealSchedule`], a finite sequence of [`RevealUnit`]s that the
//! frame emitter consumes exactly once, front to back.

pub mod stroke;
pub mod text;
pub mod tile;

use crate::core::{PixelRect, Point};

pub use stroke::{StrokeParams, schedule_strokes};
pub use text::{Segment, schedule_text};
pub use tile::{Tile, schedule_tiles};

/// A square brush dab placed while tracing a glyph outline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeDab {
    pub at: Point,
    pub rect: PixelRect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RevealUnit {
    Tile(Tile),
    Segment(Segment),
    Stroke(StrokeDab),
    /// Reveal a whole character box after its outline was traced.
    Fill(PixelRect),
    /// Hold the current state for this many frames.
    Pause(u32),
}

impl RevealUnit {
    /// Pixels this unit copies from (or clears in) the layer canvas.
    pub fn region(&self) -> Option<PixelRect> {
        match self {
            Self::Tile(t) => Some(t.rect),
            Self::Segment(s) => Some(s.rect()),
            Self::Stroke(d) => Some(d.rect),
            Self::Fill(r) => Some(*r),
            Self::Pause(_) => None,
        }
    }

    /// Where the hand (or eraser) sits after this unit.
    pub fn anchor(&self) -> Option<Point> {
        match self {
            Self::Tile(t) => Some(t.rect.center()),
            Self::Segment(s) => Some(Point::new(
                f64::from(s.x),
                (f64::from(s.y_start) + f64::from(s.y_end)) / 2.0,
            )),
            Self::Stroke(d) => Some(d.at),
            Self::Fill(r) => Some(Point::new(f64::from(r.x1), f64::from(r.y1))),
            Self::Pause(_) => None,
        }
    }
}

/// Which scheduler a layer uses, resolved once from its kind and configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScheduleStrategy {
    Tiles { size: u32 },
    Columns,
    Strokes(StrokeParams),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RevealSchedule {
    units: Vec<RevealUnit>,
}

impl RevealSchedule {
    pub fn new(units: Vec<RevealUnit>) -> Self {
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[RevealUnit] {
        &self.units
    }

    /// Units that reveal pixels, i.e. everything except pauses.
    pub fn drawable_len(&self) -> usize {
        self.units
            .iter()
            .filter(|u| !matches!(u, RevealUnit::Pause(_)))
            .count()
    }
}

impl IntoIterator for RevealSchedule {
    type Item = RevealUnit;
    type IntoIter = std::vec::IntoIter<RevealUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_follow_unit_kind() {
        let tile = RevealUnit::Tile(Tile {
            row: 0,
            col: 1,
            rect: PixelRect::new(10, 0, 20, 10),
        });
        assert_eq!(tile.anchor(), Some(Point::new(15.0, 5.0)));

        let seg = RevealUnit::Segment(Segment {
            x: 7,
            y_start: 2,
            y_end: 9,
            line: 0,
        });
        assert_eq!(seg.anchor(), Some(Point::new(7.0, 5.5)));
        assert_eq!(seg.region(), Some(PixelRect::new(7, 2, 8, 10)));

        assert_eq!(RevealUnit::Pause(3).anchor(), None);
        assert_eq!(RevealUnit::Pause(3).region(), None);
    }

    #[test]
    fn drawable_len_skips_pauses() {
        let s = RevealSchedule::new(vec![
            RevealUnit::Fill(PixelRect::new(0, 0, 1, 1)),
            RevealUnit::Pause(4),
            RevealUnit::Fill(PixelRect::new(1, 0, 2, 1)),
        ]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.drawable_len(), 2);
    }
}
