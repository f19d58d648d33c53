//! Map layer builder for fluent API configuration
//!
//! This module provides a MapLayerBuilder that assembles a [`LayerConfig`]
//! step by step and validates it once, when the layer is built.

use crate::{
    core::{
        config::{CombineMode, LayerConfig},
        geo::LatLng,
        map::MapLayer,
    },
    Result,
};
use std::path::PathBuf;
use std::time::Duration;

/// Builder for creating and configuring MapLayer instances
#[derive(Debug, Clone, Default)]
pub struct MapLayerBuilder {
    config: LayerConfig,
}

impl MapLayerBuilder {
    /// Create a new MapLayerBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn with_config(mut self, config: LayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the directory receiving tile files
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = base_dir.into();
        self
    }

    /// Discard or keep tiles left on disk by earlier runs
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.config.overwrite = overwrite;
        self
    }

    /// Enable or disable saving tiles when they are released
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.config.autosave = autosave;
        self
    }

    /// Keep tiles resident for this long after their last touch.
    ///
    /// The timeout has a resolution of whole seconds; zero writes tiles out
    /// after every call.
    pub fn with_in_memory(mut self, timeout: Duration) -> Self {
        self.config.in_memory = timeout.as_secs();
        self
    }

    /// Set zoom limits
    pub fn with_zoom_range(mut self, min_level: u8, max_level: u8) -> Self {
        self.config.min_level = min_level;
        self.config.max_level = max_level;
        self
    }

    /// Set how new pixels combine with existing ones
    pub fn with_combine(mut self, combine: CombineMode) -> Self {
        self.config.combine = combine;
        self
    }

    /// Location used by calls that carry none
    pub fn with_centroid(mut self, centroid: LatLng) -> Self {
        self.config.centroid_latitude = centroid.lat;
        self.config.centroid_longitude = centroid.lng;
        self
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Build the layer with the configured options
    pub fn build(self) -> Result<MapLayer> {
        MapLayer::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_sets_every_field() {
        let dir = TempDir::new().unwrap();
        let builder = MapLayerBuilder::new()
            .with_base_dir(dir.path())
            .with_overwrite(false)
            .with_autosave(false)
            .with_in_memory(Duration::from_secs(30))
            .with_zoom_range(4, 9)
            .with_combine(CombineMode::Multiply)
            .with_centroid(LatLng::new(1.0, 2.0));

        let config = builder.config().clone();
        assert!(!config.overwrite && !config.autosave);
        assert_eq!(config.in_memory, 30);
        assert_eq!(config.combine, CombineMode::Multiply);
        assert_eq!(config.centroid(), LatLng::new(1.0, 2.0));

        let layer = builder.build().unwrap();
        assert_eq!(layer.levels().len(), 6);
    }

    #[test]
    fn test_build_validates() {
        let err = MapLayerBuilder::new()
            .with_base_dir("/does/not/exist")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
