//! Prelude module for common maplayer types
//!
//! This module re-exports the most commonly used types and functions
//! for easy importing with `use maplayer::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, TileSpan},
    builder::MapLayerBuilder,
    config::{CombineMode, LayerConfig, LevelOptions, ZoomRange},
    constants::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL, TILE_SIZE},
    geo::{
        latlon_to_pixel, pixel_to_tile_coords, quad_key_to_tile_coords,
        tile_coords_to_pixel_origin, tile_coords_to_quad_key, width_at_level, LatLng, PixelCoord,
        Point, QuadKey, TileCoord,
    },
    map::MapLayer,
};

pub use crate::draw::{
    args::DrawArgs, filter::FilterKind, palette::Palette, Operation, Strategy,
};

pub use crate::layers::level::Level;

pub use crate::tiles::{cache::TileCache, tile::Tile, tile::TileOptions};

pub use crate::{MapError, Result};
