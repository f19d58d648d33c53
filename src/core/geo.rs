use crate::core::constants::{EARTH_RADIUS, MAX_LATITUDE, MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL, TILE_SIZE};
use crate::MapError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Wraps longitude into the half-open window [-180, 180)
    pub fn wrap_lng(lng: f64) -> f64 {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Returns the coordinate with latitude clamped and longitude wrapped
    pub fn normalized(&self) -> Self {
        Self::new(Self::clamp_lat(self.lat), Self::wrap_lng(self.lng))
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A sub-pixel position in canvas space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// An integer pixel position in canvas space at some zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

impl PixelCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Centre of the pixel as a sub-pixel point
    pub fn center(&self) -> Point {
        Point::new(self.x as f64 + 0.5, self.y as f64 + 0.5)
    }

    pub fn to_point(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Represents a tile coordinate in the quadtree tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        let tiles = tiles_per_side(self.z);
        (self.x as u64) < tiles && (self.y as u64) < tiles
    }

    /// Top-left pixel of the tile in canvas space
    pub fn pixel_origin(&self) -> PixelCoord {
        tile_coords_to_pixel_origin(self.x, self.y)
    }

    pub fn quad_key(&self) -> QuadKey {
        tile_coords_to_quad_key(self.x, self.y, self.z)
    }
}

/// Quadtree address of a tile: one digit in `0..=3` per zoom level.
///
/// Construction through [`FromStr`] validates the charset and the length
/// against the supported zoom range, so a `QuadKey` value is always usable as
/// a tile address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuadKey(String);

impl QuadKey {
    /// Zoom level encoded by the key (its length)
    pub fn zoom(&self) -> u8 {
        self.0.len() as u8
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tile_coord(&self) -> TileCoord {
        quad_key_to_tile_coords(self)
    }
}

impl FromStr for QuadKey {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.len();
        if len < MIN_ZOOM_LEVEL as usize || len > MAX_ZOOM_LEVEL as usize {
            return Err(MapError::InvalidQuadKey(format!(
                "'{}' has length {}, expected {}..={}",
                s, len, MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL
            )));
        }
        if let Some(bad) = s.chars().find(|c| !matches!(c, '0'..='3')) {
            return Err(MapError::InvalidQuadKey(format!(
                "'{}' contains '{}', only digits 0-3 are allowed",
                s, bad
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for QuadKey {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuadKey> for String {
    fn from(key: QuadKey) -> Self {
        key.0
    }
}

impl AsRef<str> for QuadKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of tiles along one side of the grid at `zoom`
pub fn tiles_per_side(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Canvas side length in pixels at `zoom`
pub fn width_at_level(zoom: u8) -> u64 {
    TILE_SIZE as u64 * tiles_per_side(zoom)
}

/// Projects a geographic point onto the canvas at `zoom` with sub-pixel precision.
///
/// Latitude is clamped to the Mercator range and longitude wrapped into
/// [-180, 180) first, so the result always lies on the canvas.
pub fn latlon_to_canvas(zoom: u8, lat: f64, lon: f64) -> Point {
    let lat = LatLng::clamp_lat(lat);
    let lng = LatLng::wrap_lng(lon);
    let width = width_at_level(zoom) as f64;

    let x = (lng + 180.0) / 360.0;
    let sin_lat = lat.to_radians().sin();
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI);

    Point::new(x * width, y * width)
}

/// Projects a geographic point to the nearest canvas pixel at `zoom`
pub fn latlon_to_pixel(zoom: u8, lat: f64, lon: f64) -> PixelCoord {
    let point = latlon_to_canvas(zoom, lat, lon);
    let max = (width_at_level(zoom) - 1) as f64;
    PixelCoord::new(
        (point.x + 0.5).floor().clamp(0.0, max) as i64,
        (point.y + 0.5).floor().clamp(0.0, max) as i64,
    )
}

/// Inverse of [`latlon_to_canvas`]
pub fn pixel_to_latlon(zoom: u8, x: f64, y: f64) -> LatLng {
    let width = width_at_level(zoom) as f64;
    let x = x.clamp(0.0, width) / width - 0.5;
    let y = 0.5 - y.clamp(0.0, width) / width;

    let lat = 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI;
    LatLng::new(lat, 360.0 * x)
}

/// Tile grid coordinates containing a canvas pixel
pub fn pixel_to_tile_coords(x: i64, y: i64) -> (i64, i64) {
    let size = TILE_SIZE as i64;
    (x.div_euclid(size), y.div_euclid(size))
}

/// Top-left canvas pixel of a tile
pub fn tile_coords_to_pixel_origin(tile_x: u32, tile_y: u32) -> PixelCoord {
    let size = TILE_SIZE as i64;
    PixelCoord::new(tile_x as i64 * size, tile_y as i64 * size)
}

/// Encodes tile grid coordinates as a quad key of length `zoom`.
///
/// `zoom` must lie within the supported range; bits of the coordinates above
/// `zoom` are ignored.
pub fn tile_coords_to_quad_key(tile_x: u32, tile_y: u32, zoom: u8) -> QuadKey {
    debug_assert!((MIN_ZOOM_LEVEL..=MAX_ZOOM_LEVEL).contains(&zoom));

    let key = (0..zoom)
        .rev()
        .map(|bit| {
            let mask = 1u32 << bit;
            let mut digit = b'0';
            if tile_x & mask != 0 {
                digit += 1;
            }
            if tile_y & mask != 0 {
                digit += 2;
            }
            digit as char
        })
        .collect();
    QuadKey(key)
}

/// Decodes a quad key into tile grid coordinates; zoom is the key length
pub fn quad_key_to_tile_coords(key: &QuadKey) -> TileCoord {
    let zoom = key.zoom();
    let (mut x, mut y) = (0u32, 0u32);
    for (i, digit) in key.as_str().bytes().enumerate() {
        let mask = 1u32 << (zoom as usize - 1 - i);
        match digit {
            b'1' => x |= mask,
            b'2' => y |= mask,
            b'3' => {
                x |= mask;
                y |= mask;
            }
            _ => {}
        }
    }
    TileCoord::new(x, y, zoom)
}

/// Metres covered by one pixel at `lat` on the canvas of `zoom`
pub fn ground_resolution(zoom: u8, lat: f64) -> f64 {
    let lat = LatLng::clamp_lat(lat).to_radians();
    lat.cos() * 2.0 * PI * EARTH_RADIUS / width_at_level(zoom) as f64
}
