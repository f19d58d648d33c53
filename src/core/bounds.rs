use crate::core::constants::TILE_SIZE;
use crate::core::geo::{tile_coords_to_pixel_origin, tiles_per_side, PixelCoord, Point, TileCoord};
use serde::{Deserialize, Serialize};

/// Represents a bounding box in canvas pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Smallest bounds containing every point, `None` for an empty slice
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for point in rest {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Square bounds around a circle
    pub fn around(center: Point, radius: f64) -> Self {
        Self::from_coords(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    /// Pixel rectangle covered by a tile
    pub fn of_tile(tile: &TileCoord) -> Self {
        let origin = tile.pixel_origin().to_point();
        let size = TILE_SIZE as f64;
        Self::from_coords(origin.x, origin.y, origin.x + size, origin.y + size)
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Checks if the bounds intersect with another bounds
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y)
    }

    /// Gets the intersection of two bounds
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.intersects(other) {
            return None;
        }

        Some(Bounds::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &Point) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    /// Returns a new bounds expanded by the given amount on every side
    pub fn expanded(&self, amount: f64) -> Bounds {
        Bounds::from_coords(
            self.min.x - amount,
            self.min.y - amount,
            self.max.x + amount,
            self.max.y + amount,
        )
    }

    /// Tiles of `zoom` overlapping the bounds, clamped to the tile grid, in
    /// row-major order
    pub fn tile_range(&self, zoom: u8) -> Vec<TileCoord> {
        self.tile_span(zoom).map(|span| span.tiles()).unwrap_or_default()
    }

    /// Columns and rows of `zoom` overlapping the bounds, clamped to the grid.
    ///
    /// Edges are half-open: a bound ending exactly on a tile border does not
    /// reach into the next tile.
    pub fn tile_span(&self, zoom: u8) -> Option<TileSpan> {
        let size = TILE_SIZE as f64;
        let last = tiles_per_side(zoom) as f64 - 1.0;
        if !(self.min.x.is_finite() && self.min.y.is_finite())
            || !(self.max.x.is_finite() && self.max.y.is_finite())
        {
            return None;
        }
        if self.max.x < 0.0 || self.max.y < 0.0 {
            return None;
        }
        if self.min.x > (last + 1.0) * size || self.min.y > (last + 1.0) * size {
            return None;
        }

        let min_x = (self.min.x / size).floor().clamp(0.0, last) as u32;
        let min_y = (self.min.y / size).floor().clamp(0.0, last) as u32;
        Some(TileSpan {
            zoom,
            min_x,
            min_y,
            max_x: ((self.max.x / size).ceil() - 1.0).clamp(min_x as f64, last) as u32,
            max_y: ((self.max.y / size).ceil() - 1.0).clamp(min_y as f64, last) as u32,
        })
    }
}

/// Inclusive block of tile columns and rows at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpan {
    pub zoom: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileSpan {
    pub fn intersection(&self, other: &TileSpan) -> Option<TileSpan> {
        let span = TileSpan {
            zoom: self.zoom,
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (span.min_x <= span.max_x && span.min_y <= span.max_y).then_some(span)
    }

    pub fn contains(&self, tile: &TileCoord) -> bool {
        (self.min_x..=self.max_x).contains(&tile.x) && (self.min_y..=self.max_y).contains(&tile.y)
    }

    /// Canvas position of the top-left pixel
    pub fn pixel_origin(&self) -> PixelCoord {
        tile_coords_to_pixel_origin(self.min_x, self.min_y)
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1) * TILE_SIZE
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1) * TILE_SIZE
    }

    pub fn tiles(&self) -> Vec<TileCoord> {
        let mut tiles = Vec::new();
        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                tiles.push(TileCoord::new(x, y, self.zoom));
            }
        }
        tiles
    }
}
