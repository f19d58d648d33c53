//! # maplayer
//!
//! Draws geographic primitives onto a pyramid of 256×256 PNG tiles addressed by
//! quad keys, one directory of tiles per layer.
//!
//! A [`MapLayer`] owns one [`Level`] per zoom level. Every drawing call is
//! projected to canvas pixels at each zoom, split across the tiles it touches
//! and rasterized with the configured combine mode. Tiles are materialized
//! lazily, loaded from disk when configured to, and saved back when they are
//! evicted or when the layer is closed.

pub mod core;
pub mod draw;
pub mod layers;
pub mod tiles;
pub mod prelude;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    builder::MapLayerBuilder,
    config::{CombineMode, LayerConfig, LevelOptions, ZoomRange},
    geo::{LatLng, PixelCoord, Point, QuadKey, TileCoord},
    map::MapLayer,
};

pub use draw::{args::DrawArgs, filter::FilterKind, palette::Palette, Operation};

pub use layers::level::Level;

pub use tiles::{cache::TileCache, tile::Tile, tile::TileOptions};

use std::path::PathBuf;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid configuration for `{field}`: {reason}")]
    Config { field: &'static str, reason: String },

    #[error("invalid quad key: {0}")]
    InvalidQuadKey(String),

    #[error("zoom level {zoom} is outside {min}..={max}")]
    InvalidZoom { zoom: u8, min: u8, max: u8 },

    #[error("failed to load tile {path}: {source}")]
    TileLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to save tile {path}: {source}")]
    TileSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid argument `{key}` for {op}: {reason}")]
    InvalidArgument {
        op: &'static str,
        key: &'static str,
        reason: String,
    },

    #[error("font error: {0}")]
    Font(String),
}

impl MapError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn argument(op: &'static str, key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            key,
            reason: reason.into(),
        }
    }

    /// Whether the error was raised while validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidQuadKey(_) | Self::InvalidZoom { .. }
        )
    }
}

/// Error type alias for convenience
pub type Error = MapError;
