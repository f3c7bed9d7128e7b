use crate::prelude::{FilterError, FilterResult};
use serde::Serialize;

/// Half-open rectangle `[x0, x1) x [y0, y1)` of the spatial plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl Tile {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// Row-major partition of a `(height, width)` plane into tiles.
///
/// Every tile has the nominal size except those in the last band and last
/// column, which shrink to the remainder.
#[derive(Debug, Clone)]
pub struct TileGrid {
    plane: (usize, usize),
    columns: usize,
    tiles: Vec<Tile>,
}

fn spans(extent: usize, step: usize) -> Vec<(usize, usize)> {
    (0..extent)
        .step_by(step)
        .map(|start| (start, (start + step).min(extent)))
        .collect()
}

impl TileGrid {
    /// `plane` and `tile` are both `(rows, columns)`.
    pub fn new(plane: (usize, usize), tile: (usize, usize)) -> FilterResult<Self> {
        let (height, width) = plane;
        let (tile_height, tile_width) = tile;
        if tile_height == 0 || tile_width == 0 {
            return Err(FilterError::Configuration(format!(
                "tile dimensions must be positive, got {}x{}",
                tile_height, tile_width
            )));
        }
        if height == 0 || width == 0 {
            return Err(FilterError::Configuration(format!(
                "cannot tile an empty {}x{} plane",
                height, width
            )));
        }

        let rows = spans(height, tile_height);
        let cols = spans(width, tile_width);
        let mut tiles = Vec::with_capacity(rows.len() * cols.len());
        for &(y0, y1) in &rows {
            for &(x0, x1) in &cols {
                tiles.push(Tile { x0, x1, y0, y1 });
            }
        }

        Ok(Self {
            plane,
            columns: cols.len(),
            tiles,
        })
    }

    pub fn plane(&self) -> (usize, usize) {
        self.plane
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles grouped by horizontal band, top to bottom.
    pub fn bands(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.columns)
    }
}
