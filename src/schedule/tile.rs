use crate::{
    core::PixelRect,
    error::{InkError, InkResult},
    ink::InkMask,
};

use super::{RevealSchedule, RevealUnit};

/// Grid cell of the image reveal grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub row: u32,
    pub col: u32,
    pub rect: PixelRect,
}

/// Row-major grid of `ceil(H/s) × ceil(W/s)` tiles; edge tiles are truncated.
pub fn tile_grid(width: u32, height: u32, size: u32) -> Vec<Tile> {
    if size == 0 {
        return Vec::new();
    }
    let rows = height.div_ceil(size);
    let cols = width.div_ceil(size);
    let mut out = Vec::with_capacity((rows as usize) * (cols as usize));
    for row in 0..rows {
        for col in 0..cols {
            let x0 = col * size;
            let y0 = row * size;
            out.push(Tile {
                row,
                col,
                rect: PixelRect::new(x0, y0, (x0 + size).min(width), (y0 + size).min(height)),
            });
        }
    }
    out
}

/// Tiles holding at least one ink pixel, in row-major discovery order.
pub fn active_tiles(mask: &InkMask, size: u32) -> Vec<Tile> {
    tile_grid(mask.width(), mask.height(), size)
        .into_iter()
        .filter(|t| mask.any_in(t.rect))
        .collect()
}

fn grid_dist2(a: &Tile, b: &Tile) -> i64 {
    let dr = i64::from(a.row) - i64::from(b.row);
    let dc = i64::from(a.col) - i64::from(b.col);
    dr * dr + dc * dc
}

/// Greedy nearest-neighbour walk over grid coordinates, starting at the first tile.
///
/// Ties go to the lowest remaining index.
pub fn nearest_neighbor_order(mut remaining: Vec<Tile>) -> Vec<Tile> {
    let mut out = Vec::with_capacity(remaining.len());
    let mut selected = 0usize;
    while !remaining.is_empty() {
        if selected >= remaining.len() {
            selected = 0;
        }
        let current = remaining.remove(selected);
        if !remaining.is_empty() {
            let mut best = 0usize;
            let mut best_d = i64::MAX;
            for (i, t) in remaining.iter().enumerate() {
                let d = grid_dist2(&current, t);
                if d < best_d {
                    best = i;
                    best_d = d;
                }
            }
            selected = best;
        }
        out.push(current);
    }
    out
}

pub fn schedule_tiles(mask: &InkMask, size: u32) -> InkResult<RevealSchedule> {
    if size == 0 {
        return Err(InkError::schedule("tile size must be > 0"));
    }
    let tiles = active_tiles(mask, size);
    tracing::debug!(active = tiles.len(), size, "tile schedule");
    Ok(RevealSchedule::new(
        nearest_neighbor_order(tiles)
            .into_iter()
            .map(RevealUnit::Tile)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn tiles_of(s: &RevealSchedule) -> Vec<Tile> {
        s.units()
            .iter()
            .map(|u| match u {
                RevealUnit::Tile(t) => *t,
                other => panic!("unexpected unit {other:?}"),
            })
            .collect()
    }

    #[test]
    fn grid_truncates_edge_tiles() {
        let grid = tile_grid(25, 12, 10);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[2].rect, PixelRect::new(20, 0, 25, 10));
        assert_eq!(grid[5].rect, PixelRect::new(20, 10, 25, 12));
        assert_eq!((grid[4].row, grid[4].col), (1, 1));
    }

    #[test]
    fn schedule_covers_each_active_tile_once() {
        // Scattered ink pixels, including in truncated edge tiles.
        let pts = [(0, 0), (33, 2), (7, 31), (34, 34), (18, 18), (19, 19), (25, 9)];
        let mask = InkMask::from_fn(35, 35, |x, y| pts.contains(&(x, y)));
        for size in [1, 3, 7, 10, 64] {
            let expected: HashSet<Tile> = active_tiles(&mask, size).into_iter().collect();
            let got = tiles_of(&schedule_tiles(&mask, size).unwrap());
            let got_set: HashSet<Tile> = got.iter().copied().collect();
            assert_eq!(got.len(), got_set.len(), "duplicates for size {size}");
            assert_eq!(got_set, expected, "coverage for size {size}");
        }
    }

    #[test]
    fn walk_prefers_closest_grid_neighbour() {
        let t = |row, col| Tile {
            row,
            col,
            rect: PixelRect::new(col, row, col + 1, row + 1),
        };
        let order = nearest_neighbor_order(vec![t(0, 0), t(0, 5), t(3, 0), t(0, 1)]);
        let coords: Vec<_> = order.iter().map(|t| (t.row, t.col)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (3, 0), (0, 5)]);
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let t = |row, col| Tile {
            row,
            col,
            rect: PixelRect::new(col, row, col + 1, row + 1),
        };
        let order = nearest_neighbor_order(vec![t(1, 1), t(0, 1), t(1, 0), t(2, 1)]);
        assert_eq!((order[1].row, order[1].col), (0, 1));
    }

    #[test]
    fn blank_mask_yields_empty_schedule() {
        let mask = InkMask::empty(40, 40);
        assert!(schedule_tiles(&mask, 10).unwrap().is_empty());
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(schedule_tiles(&InkMask::empty(4, 4), 0).is_err());
    }
}
