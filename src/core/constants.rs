//! Core constants of the quad-key tiling scheme.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Shallowest zoom level that has a non-empty quad key.
pub const MIN_ZOOM_LEVEL: u8 = 1;

/// Deepest zoom level supported by the quad-key scheme.
pub const MAX_ZOOM_LEVEL: u8 = 23;

/// Latitude limit of the Web Mercator projection (degrees).
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// WGS84 equatorial radius in metres, as used by Web Mercator.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Fallback centroid (Greenwich) used when a call carries no location.
pub const DEFAULT_CENTROID: (f64, f64) = (51.4779, -0.0015);

/// Combine mode applied when none is configured.
pub const DEFAULT_COMBINE: &str = "darken";

/// File extension of persisted tiles.
pub const TILE_EXTENSION: &str = "png";
