use crate::{core::PixelRect, ink::InkMask};

use super::{RevealSchedule, RevealUnit};

/// A step larger than this between consecutive ink rows starts a new segment.
pub const RUN_GAP_PX: u32 = 3;
/// Minimum vertical gap between two detected text lines.
pub const MIN_LINE_GAP_PX: f64 = 20.0;
/// A segment center within this distance of a line member matches that line.
pub const LINE_MATCH_PX: f64 = 5.0;

/// Vertical ink run `[y_start, y_end]` in column `x`, tagged with its text line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    pub x: u32,
    pub y_start: u32,
    pub y_end: u32, // inclusive
    pub line: usize,
}

impl Segment {
    pub fn center_y(&self) -> f64 {
        (f64::from(self.y_start) + f64::from(self.y_end)) / 2.0
    }

    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y_start, self.x + 1, self.y_end + 1)
    }
}

/// Split every ink column into runs; runs are tagged with line 0 until clustered.
pub fn column_segments(mask: &InkMask) -> Vec<Segment> {
    let mut out = Vec::new();
    for x in 0..mask.width() {
        let mut run: Option<(u32, u32)> = None;
        for y in mask.column(x) {
            run = match run {
                Some((start, prev)) if y - prev <= RUN_GAP_PX => Some((start, y)),
                Some((start, prev)) => {
                    out.push(Segment {
                        x,
                        y_start: start,
                        y_end: prev,
                        line: 0,
                    });
                    Some((y, y))
                }
                None => Some((y, y)),
            };
        }
        if let Some((start, end)) = run {
            out.push(Segment {
                x,
                y_start: start,
                y_end: end,
                line: 0,
            });
        }
    }
    out
}

/// A detected text line: the sorted vertical centers that belong to it.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub members: Vec<f64>,
}

impl TextLine {
    pub fn mean(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().sum::<f64>() / self.members.len() as f64
    }

    fn max(&self) -> f64 {
        self.members.last().copied().unwrap_or(f64::NEG_INFINITY)
    }
}

/// Group vertical centers into lines, top to bottom.
///
/// The split threshold is `max(20, 1.5 × average gap between unique centers)`; a new line
/// starts when a center lies more than that below the current line's lowest member.
pub fn cluster_lines(centers: &[f64]) -> Vec<TextLine> {
    let mut unique: Vec<f64> = centers.iter().copied().filter(|c| c.is_finite()).collect();
    unique.sort_by(f64::total_cmp);
    unique.dedup();
    if unique.is_empty() {
        return Vec::new();
    }

    let avg_gap = if unique.len() > 1 {
        (unique[unique.len() - 1] - unique[0]) / (unique.len() - 1) as f64
    } else {
        0.0
    };
    let threshold = MIN_LINE_GAP_PX.max(1.5 * avg_gap);

    let mut lines = Vec::new();
    let mut current = TextLine {
        members: vec![unique[0]],
    };
    for &c in &unique[1..] {
        if c - current.max() > threshold {
            lines.push(std::mem::replace(
                &mut current,
                TextLine { members: vec![c] },
            ));
        } else {
            current.members.push(c);
        }
    }
    lines.push(current);
    lines
}

/// Index of the line a center belongs to.
///
/// Exact members win, then a unique member within [`LINE_MATCH_PX`], then the line whose mean
/// is closest. Returns `None` only when there are no lines.
pub fn assign_line(lines: &[TextLine], center: f64) -> Option<usize> {
    if let Some(i) = lines.iter().position(|l| l.members.contains(&center)) {
        return Some(i);
    }
    let near: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            l.members
                .iter()
                .any(|m| (m - center).abs() <= LINE_MATCH_PX)
        })
        .map(|(i, _)| i)
        .collect();
    if let [only] = near.as_slice() {
        return Some(*only);
    }
    lines
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.mean() - center)
                .abs()
                .total_cmp(&(b.mean() - center).abs())
        })
        .map(|(i, _)| i)
}

/// Segments tagged with their line and sorted by `(line, x, y_start)`.
pub fn ordered_segments(mask: &InkMask) -> Vec<Segment> {
    let mut segments = column_segments(mask);
    let centers: Vec<f64> = segments.iter().map(Segment::center_y).collect();
    let lines = cluster_lines(&centers);
    for seg in &mut segments {
        seg.line = assign_line(&lines, seg.center_y()).unwrap_or(0);
    }
    segments.sort_by_key(|s| (s.line, s.x, s.y_start));
    tracing::debug!(
        segments = segments.len(),
        lines = lines.len(),
        "text schedule"
    );
    segments
}

/// Left-to-right, line-by-line reveal order for a text layer.
pub fn schedule_text(mask: &InkMask) -> RevealSchedule {
    RevealSchedule::new(
        ordered_segments(mask)
            .into_iter()
            .map(RevealUnit::Segment)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_split_on_gaps_larger_than_three() {
        // 1 -> 4 is a step of 3 and stays in the run; 5 -> 10 is a step of 5 and splits.
        let rows = [0u32, 1, 4, 5, 10];
        let mask = InkMask::from_fn(1, 12, |_, y| rows.contains(&y));
        let segs = column_segments(&mask);
        assert_eq!(segs.len(), 2);
        assert_eq!((segs[0].y_start, segs[0].y_end), (0, 5));
        assert_eq!((segs[1].y_start, segs[1].y_end), (10, 10));
    }

    #[test]
    fn segments_cover_every_ink_pixel_once() {
        let mask = InkMask::from_fn(9, 40, |x, y| (x * 7 + y * 3) % 5 == 0 || y % 11 == x);
        let segs = column_segments(&mask);
        for x in 0..mask.width() {
            let col: Vec<&Segment> = segs.iter().filter(|s| s.x == x).collect();
            for y in mask.column(x) {
                let hits = col
                    .iter()
                    .filter(|s| s.y_start <= y && y <= s.y_end)
                    .count();
                assert_eq!(hits, 1, "pixel ({x},{y})");
            }
            for pair in col.windows(2) {
                assert!(pair[0].y_end < pair[1].y_start);
            }
        }
    }

    #[test]
    fn clustering_uses_minimum_gap_of_twenty() {
        let lines = cluster_lines(&[10.0, 12.0, 14.0, 40.0]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].members, vec![40.0]);

        let lines = cluster_lines(&[10.0, 12.0, 14.0, 30.0]);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn assign_falls_back_to_nearest_line() {
        let lines = vec![
            TextLine {
                members: vec![10.0, 12.0],
            },
            TextLine {
                members: vec![60.0, 64.0],
            },
        ];
        assert_eq!(assign_line(&lines, 12.0), Some(0));
        assert_eq!(assign_line(&lines, 58.0), Some(1));
        assert_eq!(assign_line(&lines, 30.0), Some(0));
        assert_eq!(assign_line(&[], 30.0), None);
    }

    #[test]
    fn blank_mask_has_no_segments() {
        assert!(schedule_text(&InkMask::empty(20, 20)).is_empty());
    }
}
