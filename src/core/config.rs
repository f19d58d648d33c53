//! Configuration for map layers and the levels they own
//!
//! [`LayerConfig`] is the user-facing, serde-friendly description of a layer.
//! It is validated once, then split into the explicit option structs each
//! component takes in its constructor ([`LevelOptions`] for levels,
//! [`TileOptions`] for tiles).

use crate::core::constants::{DEFAULT_CENTROID, MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL};
use crate::core::geo::LatLng;
use crate::tiles::tile::TileOptions;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tiny_skia::BlendMode;

/// How newly drawn pixels are composited with the pixels already in a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    /// Source over destination
    Normal,
    /// Replace destination pixels, alpha included
    None,
    Multiply,
    Add,
    Diff,
    Lighten,
    #[default]
    Darken,
    Screen,
    Overlay,
    Hue,
    Saturation,
    #[serde(alias = "color")]
    Colour,
    Value,
}

impl CombineMode {
    pub const ALL: [CombineMode; 13] = [
        Self::Normal,
        Self::None,
        Self::Multiply,
        Self::Add,
        Self::Diff,
        Self::Lighten,
        Self::Darken,
        Self::Screen,
        Self::Overlay,
        Self::Hue,
        Self::Saturation,
        Self::Colour,
        Self::Value,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::None => "none",
            Self::Multiply => "multiply",
            Self::Add => "add",
            Self::Diff => "diff",
            Self::Lighten => "lighten",
            Self::Darken => "darken",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Hue => "hue",
            Self::Saturation => "saturation",
            Self::Colour => "colour",
            Self::Value => "value",
        }
    }

    /// Raster blend mode implementing this combine mode
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            Self::Normal => BlendMode::SourceOver,
            Self::None => BlendMode::Source,
            Self::Multiply => BlendMode::Multiply,
            Self::Add => BlendMode::Plus,
            Self::Diff => BlendMode::Difference,
            Self::Lighten => BlendMode::Lighten,
            Self::Darken => BlendMode::Darken,
            Self::Screen => BlendMode::Screen,
            Self::Overlay => BlendMode::Overlay,
            Self::Hue => BlendMode::Hue,
            Self::Saturation => BlendMode::Saturation,
            Self::Colour => BlendMode::Color,
            Self::Value => BlendMode::Luminosity,
        }
    }
}

impl FromStr for CombineMode {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "color" {
            return Ok(Self::Colour);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| MapError::config("combine", format!("unknown combine mode '{}'", s)))
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive range of zoom levels, always inside the supported range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self> {
        for (field, zoom) in [("min_level", min), ("max_level", max)] {
            if !(MIN_ZOOM_LEVEL..=MAX_ZOOM_LEVEL).contains(&zoom) {
                return Err(MapError::config(
                    field,
                    format!("{} is outside {}..={}", zoom, MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL),
                ));
            }
        }
        if min > max {
            return Err(MapError::config(
                "min_level",
                format!("min_level {} is greater than max_level {}", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    /// Every supported zoom level
    pub fn full() -> Self {
        Self {
            min: MIN_ZOOM_LEVEL,
            max: MAX_ZOOM_LEVEL,
        }
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }

    pub fn levels(&self) -> RangeInclusive<u8> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Overlap of two ranges, if any
    pub fn intersect(&self, other: &ZoomRange) -> Option<ZoomRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(ZoomRange { min, max })
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::full()
    }
}

/// User-facing layer configuration; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Existing directory receiving `<quadKey>.png` files
    pub base_dir: PathBuf,
    /// Discard tiles left on disk by earlier runs instead of drawing over them
    pub overwrite: bool,
    /// Save resident tiles when the layer is released
    pub autosave: bool,
    /// Seconds a tile stays resident after its last touch; 0 evicts after every call
    pub in_memory: u64,
    pub min_level: u8,
    pub max_level: u8,
    pub combine: CombineMode,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            overwrite: true,
            autosave: true,
            in_memory: 0,
            min_level: MIN_ZOOM_LEVEL,
            max_level: MAX_ZOOM_LEVEL,
            combine: CombineMode::default(),
            centroid_latitude: DEFAULT_CENTROID.0,
            centroid_longitude: DEFAULT_CENTROID.1,
        }
    }
}

impl LayerConfig {
    /// Checks every field, naming the first offending one
    pub fn validate(&self) -> Result<()> {
        if !self.base_dir.is_dir() {
            return Err(MapError::config(
                "base_dir",
                format!("{} is not an existing directory", self.base_dir.display()),
            ));
        }
        self.zoom_range()?;
        if !self.centroid_latitude.is_finite() {
            return Err(MapError::config("centroid_latitude", "must be a finite number"));
        }
        if !self.centroid_longitude.is_finite() {
            return Err(MapError::config("centroid_longitude", "must be a finite number"));
        }
        Ok(())
    }

    pub fn zoom_range(&self) -> Result<ZoomRange> {
        ZoomRange::new(self.min_level, self.max_level)
    }

    pub fn centroid(&self) -> LatLng {
        LatLng::new(self.centroid_latitude, self.centroid_longitude)
    }

    /// Options shared by every level of the layer
    pub fn level_options(&self) -> LevelOptions {
        LevelOptions {
            base_dir: self.base_dir.clone(),
            tile: TileOptions {
                overwrite: self.overwrite,
                autosave: self.autosave,
            },
            in_memory: Duration::from_secs(self.in_memory),
            combine: self.combine,
            centroid: self.centroid(),
        }
    }
}

/// Drawing configuration shared by all tiles of one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOptions {
    pub base_dir: PathBuf,
    pub tile: TileOptions,
    pub in_memory: Duration,
    pub combine: CombineMode,
    pub centroid: LatLng,
}
