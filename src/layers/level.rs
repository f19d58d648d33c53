//! One zoom level of a layer

use crate::core::config::LevelOptions;
use crate::core::constants::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL};
use crate::core::geo::{self, PixelCoord, QuadKey, TileCoord};
use crate::draw::args::DrawArgs;
use crate::draw::filter::{luma, FilterKind};
use crate::draw::palette::Palette;
use crate::draw::shape::{block_of, Shape, Style};
use crate::draw::{Operation, Strategy};
use crate::tiles::cache::TileCache;
use crate::tiles::tile::Tile;
use crate::{MapError, Result};
use std::collections::BTreeMap;
use tiny_skia::{Color, ColorU8};

/// Canvas of one zoom level, split into lazily created tiles.
///
/// Every drawing call is projected to this level's canvas, rendered into each
/// tile it touches, and only then handed to the cache for eviction, so a call
/// never observes a half-evicted tile set.
#[derive(Debug)]
pub struct Level {
    zoom: u8,
    width: u64,
    options: LevelOptions,
    cache: TileCache,
}

impl Level {
    pub fn new(zoom: u8, options: LevelOptions) -> Result<Self> {
        if !(MIN_ZOOM_LEVEL..=MAX_ZOOM_LEVEL).contains(&zoom) {
            return Err(MapError::InvalidZoom {
                zoom,
                min: MIN_ZOOM_LEVEL,
                max: MAX_ZOOM_LEVEL,
            });
        }
        let cache = TileCache::new(zoom, options.base_dir.clone(), options.tile, options.in_memory);
        Ok(Self {
            zoom,
            width: geo::width_at_level(zoom),
            options,
            cache,
        })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Canvas side length in pixels
    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn options(&self) -> &LevelOptions {
        &self.options
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TileCache {
        &mut self.cache
    }

    /// Runs one drawing call on this level, returning the number of tiles it
    /// touched
    pub fn draw(&mut self, op: Operation, args: &DrawArgs) -> Result<usize> {
        let touched = match op.strategy() {
            Strategy::Geometric => {
                let shape = Shape::from_call(op, args, self.zoom, self.options.centroid)?;
                let style = Style::from_args(op, args, self.options.combine)?;
                self.render(&shape, &style)?
            }
            Strategy::Radial => {
                let r_meters = args
                    .number(op, "r")?
                    .ok_or_else(|| MapError::argument(op.name(), "r", "missing radius in metres"))?;
                let min_r = args.number(op, "min_r")?;
                let location = args.location(op)?.unwrap_or(self.options.centroid);
                let style = Style {
                    filled: true,
                    ..Style::from_args(op, args, self.options.combine)?
                };
                self.radial(r_meters, min_r, location.lng, location.lat, &style)?
            }
            Strategy::Colourise => self.colourise(&Palette::from_args(args)?)?,
            Strategy::Filter => self.filter(FilterKind::from_args(args)?)?,
        };
        log::debug!("zoom {}: {} touched {} tiles", self.zoom, op, touched);
        Ok(touched)
    }

    /// Draws a greyscale radial gradient whose radius is given in metres.
    ///
    /// The pixel radius follows the ground resolution at `lat`, so it halves
    /// with every zoom level down, and never drops below `min_r` pixels.
    pub fn radial_circle(&mut self, r_meters: f64, min_r: Option<f64>, lon: f64, lat: f64) -> Result<usize> {
        let style = Style {
            color: Color::BLACK,
            filled: true,
            blend_mode: self.options.combine.blend_mode(),
            ..Style::default()
        };
        self.radial(r_meters, min_r, lon, lat, &style)
    }

    fn radial(&mut self, r_meters: f64, min_r: Option<f64>, lon: f64, lat: f64, style: &Style) -> Result<usize> {
        let op = Operation::RadialCircle;
        if !(r_meters.is_finite() && r_meters > 0.0) {
            return Err(MapError::argument(op.name(), "r", "must be a positive number of metres"));
        }
        let mut radius = r_meters / geo::ground_resolution(self.zoom, lat);
        if let Some(min_r) = min_r {
            radius = radius.max(min_r);
        }
        let shape = Shape::Radial {
            center: geo::latlon_to_pixel(self.zoom, lat, lon).center(),
            radius,
        };
        self.render(&shape, style)
    }

    /// Rasterizes a shape into every tile it covers.
    ///
    /// Coverage is rasterized once per block of tiles and cut into tiles, so
    /// seams between tiles match a single canvas. Tiles the shape's bounds
    /// reach but whose coverage is empty are neither created nor counted.
    pub fn render(&mut self, shape: &Shape, style: &Style) -> Result<usize> {
        self.cache.evict_expired()?;

        let mut blocks: BTreeMap<(u32, u32), Vec<TileCoord>> = BTreeMap::new();
        for coord in shape.tiles(self.zoom, style) {
            blocks.entry(block_of(&coord)).or_default().push(coord);
        }

        let mut touched = Vec::new();
        let outcome = self.render_blocks(shape, style, &blocks, &mut touched);
        let released = self.cache.release(&touched);
        outcome?;
        released?;
        Ok(touched.len())
    }

    fn render_blocks(
        &mut self,
        shape: &Shape,
        style: &Style,
        blocks: &BTreeMap<(u32, u32), Vec<TileCoord>>,
        touched: &mut Vec<QuadKey>,
    ) -> Result<()> {
        for (&block, coords) in blocks {
            let Some(frame) = shape.frame(block, self.zoom, style) else {
                continue;
            };
            let coverage = shape.rasterize(&frame, style);
            for coord in coords {
                let key = coord.quad_key();
                match &coverage {
                    Some(coverage) => {
                        let Some(covered) = coverage.tile(coord) else {
                            continue;
                        };
                        paint_tile(&mut self.cache, &key, |pixmap, origin| {
                            shape.paint(pixmap, origin, &covered, style)
                        })?;
                    }
                    // Flood fills read the tile they start in
                    None => paint_tile(&mut self.cache, &key, |pixmap, origin| {
                        shape.render(pixmap, origin, coord.z, style)
                    })?,
                }
                touched.push(key);
            }
        }
        Ok(())
    }

    /// Remaps every tile of this level from greyscale intensity to `palette`.
    ///
    /// Intensity is `(1 - luma) * alpha`, so opaque black maps to the top of
    /// the gradient. Fully transparent pixels stay transparent.
    pub fn colourise(&mut self, palette: &Palette) -> Result<usize> {
        let table = palette.lookup_table();
        self.for_each_tile(|pixmap| {
            for pixel in pixmap.pixels_mut() {
                let c = pixel.demultiply();
                if c.alpha() == 0 {
                    continue;
                }
                let darkness = 1.0 - luma(c.red(), c.green(), c.blue()) as f64 / 255.0;
                let intensity = darkness * c.alpha() as f64 / 255.0;
                let [r, g, b, a] = table[(intensity * 255.0).round() as usize];
                *pixel = ColorU8::from_rgba(r, g, b, a).premultiply();
            }
        })
    }

    /// Applies an image filter to every tile of this level independently
    pub fn filter(&mut self, kind: FilterKind) -> Result<usize> {
        self.for_each_tile(|pixmap| kind.apply(pixmap))
    }

    /// Tiles holding this level's output: resident ones plus saved ones that
    /// were drawn in this session, or any saved tile when not overwriting
    pub fn output_keys(&self) -> Result<Vec<QuadKey>> {
        let mut keys = self.cache.resident_keys();
        for key in self.cache.persisted_keys()? {
            if !self.options.tile.overwrite || self.cache.was_materialized(&key) {
                keys.push(key);
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn for_each_tile(&mut self, mut f: impl FnMut(&mut tiny_skia::Pixmap)) -> Result<usize> {
        self.cache.evict_expired()?;

        let mut touched = Vec::new();
        let mut outcome = Ok(());
        for key in self.output_keys()? {
            match paint_tile(&mut self.cache, &key, |pixmap, _| f(pixmap)) {
                Ok(()) => touched.push(key),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        let released = self.cache.release(&touched);
        outcome?;
        released?;
        Ok(touched.len())
    }

    /// Saves every resident tile of this level
    pub fn save(&mut self) -> Result<usize> {
        let written = self.cache.save_all()?;
        log::debug!("zoom {}: saved {} tiles", self.zoom, written);
        Ok(written)
    }

    /// Saves resident tiles that opted into autosave
    pub fn autosave(&mut self) -> Result<usize> {
        self.cache.autosave_all()
    }
}

fn paint_tile(
    cache: &mut TileCache,
    key: &QuadKey,
    f: impl FnOnce(&mut tiny_skia::Pixmap, PixelCoord),
) -> Result<()> {
    let tile: &mut Tile = cache.get_or_create(key)?;
    let origin = tile.pixel_origin();
    f(tile.buffer_mut()?, origin);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CombineMode, LayerConfig};
    use crate::core::geo::LatLng;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn options(dir: &TempDir, in_memory: u64) -> LevelOptions {
        LayerConfig {
            base_dir: dir.path().to_path_buf(),
            in_memory,
            combine: CombineMode::Normal,
            ..LayerConfig::default()
        }
        .level_options()
    }

    fn args(value: serde_json::Value) -> DrawArgs {
        DrawArgs::from_value(value).unwrap()
    }

    #[test]
    fn test_rejects_unsupported_zoom() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Level::new(0, options(&dir, 0)),
            Err(MapError::InvalidZoom { zoom: 0, .. })
        ));
        assert_eq!(Level::new(3, options(&dir, 0)).unwrap().width(), 2048);
    }

    #[test]
    fn test_line_across_border_touches_both_tiles() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(1, options(&dir, 60)).unwrap();

        // From 10W to 10E crosses the x = 256 border
        let call = args(json!({"points": [[20.0, -10.0], [20.0, 10.0]], "width": 2}));
        assert_eq!(level.draw(Operation::Line, &call).unwrap(), 2);
        assert_eq!(level.cache().len(), 2);
    }

    #[test]
    fn test_hollow_box_creates_only_outline_tiles() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(4, options(&dir, 60)).unwrap();
        let shape = Shape::Rect {
            min: PixelCoord::new(10, 10),
            max: PixelCoord::new(2500, 2500),
        };
        assert_eq!(level.render(&shape, &Style::default()).unwrap(), 36);
        assert_eq!(level.cache().len(), 36);
        assert!(!level.cache().contains(&TileCoord::new(5, 5, 4).quad_key()));
        assert!(level.cache().contains(&TileCoord::new(9, 5, 4).quad_key()));
    }

    #[test]
    fn test_tiles_without_coverage_are_not_created() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(3, options(&dir, 60)).unwrap();
        // The stroke's reach crosses into the next tile, its pixels do not
        let shape = Shape::Path {
            points: vec![geo::Point::new(20.5, 253.5), geo::Point::new(200.5, 253.5)],
            closed: false,
        };
        let style = Style {
            anti_alias: false,
            ..Style::default()
        };
        assert_eq!(shape.tiles(3, &style).len(), 2);
        assert_eq!(level.render(&shape, &style).unwrap(), 1);
        assert_eq!(level.cache().len(), 1);
    }

    #[test]
    fn test_zero_timeout_writes_after_each_call() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(2, options(&dir, 0)).unwrap();

        let call = args(json!({"x": 10.0, "y": 10.0, "r": 6, "filled": true}));
        level.draw(Operation::Circle, &call).unwrap();

        assert!(level.cache().is_empty());
        let key = geo::latlon_to_pixel(2, 10.0, 10.0);
        let (tx, ty) = geo::pixel_to_tile_coords(key.x, key.y);
        let file = dir.path().join(format!("{}.png", geo::tile_coords_to_quad_key(tx as u32, ty as u32, 2)));
        assert!(file.exists());
    }

    #[test]
    fn test_expired_tiles_evicted_on_next_call() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir, 0);
        opts.in_memory = Duration::from_millis(1);
        let mut level = Level::new(2, opts).unwrap();

        level
            .draw(Operation::SetPixel, &args(json!({"x": -100.0, "y": 40.0})))
            .unwrap();
        assert_eq!(level.cache().len(), 1);
        std::thread::sleep(Duration::from_millis(20));
        level
            .draw(Operation::SetPixel, &args(json!({"x": 100.0, "y": -40.0})))
            .unwrap();
        assert_eq!(level.cache().len(), 1, "first tile saved and evicted");
        assert_eq!(level.cache().persisted_keys().unwrap().len(), 1);
    }

    #[test]
    fn test_radial_radius_halves_per_zoom() {
        let dir = TempDir::new().unwrap();
        let mut fine = Level::new(12, options(&dir, 60)).unwrap();
        let mut coarse = Level::new(11, options(&dir, 60)).unwrap();

        fine.radial_circle(2_000.0, None, 0.0, 0.0).unwrap();
        coarse.radial_circle(2_000.0, None, 0.0, 0.0).unwrap();

        let fine_px = 2_000.0 / geo::ground_resolution(12, 0.0);
        let coarse_px = 2_000.0 / geo::ground_resolution(11, 0.0);
        assert!((fine_px / coarse_px - 2.0).abs() < 1e-9);
        // The centre sits on a tile corner at zoom 11 and 12, touching four tiles
        assert_eq!(fine.cache().len(), 4);
        assert_eq!(coarse.cache().len(), 4);
    }

    #[test]
    fn test_radial_min_radius() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(1, options(&dir, 60)).unwrap();
        // One metre is far below a pixel at zoom 1; the floor keeps it visible
        assert_eq!(level.radial_circle(1.0, Some(3.0), 45.0, 45.0).unwrap(), 1);

        let call = args(json!({"x": 45.0, "y": 45.0, "r": -1}));
        assert!(level.draw(Operation::RadialCircle, &call).is_err());
    }

    #[test]
    fn test_colourise_maps_black_to_palette_top() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(1, options(&dir, 60)).unwrap();
        level
            .draw(
                Operation::Box,
                &args(json!({"points": [[60.0, -170.0], [50.0, -150.0]], "filled": true})),
            )
            .unwrap();

        assert_eq!(level.colourise(&Palette::default()).unwrap(), 1);
        let key: QuadKey = "0".parse().unwrap();
        let pixmap = level.cache_mut().get_or_create(&key).unwrap().buffer().unwrap();
        let p = geo::latlon_to_pixel(1, 55.0, -160.0);
        let c = pixmap.pixel(p.x as u32, p.y as u32).unwrap();
        assert_eq!((c.red(), c.green(), c.blue(), c.alpha()), (255, 0, 0, 255));
    }

    #[test]
    fn test_colourise_reaches_evicted_tiles_of_this_session() {
        let dir = TempDir::new().unwrap();
        // A stale tile from an earlier run must not be picked up
        std::fs::write(dir.path().join("3.png"), b"stale").unwrap();

        let mut level = Level::new(1, options(&dir, 0)).unwrap();
        level
            .draw(Operation::SetPixel, &args(json!({"x": -90.0, "y": 45.0})))
            .unwrap();
        assert!(level.cache().is_empty());

        let keys = level.output_keys().unwrap();
        assert_eq!(keys, vec!["0".parse::<QuadKey>().unwrap()]);
        assert_eq!(level.colourise(&Palette::default()).unwrap(), 1);
    }

    #[test]
    fn test_filter_visits_output_tiles() {
        let dir = TempDir::new().unwrap();
        let mut level = Level::new(1, options(&dir, 60)).unwrap();
        level
            .draw(Operation::SetPixel, &args(json!({"x": 90.0, "y": -45.0})))
            .unwrap();
        let call = args(json!({"type": "negate"}));
        assert_eq!(level.draw(Operation::Filter, &call).unwrap(), 1);

        let p = geo::latlon_to_pixel(1, -45.0, 90.0);
        let key: QuadKey = "3".parse().unwrap();
        let pixmap = level.cache_mut().get_or_create(&key).unwrap().buffer().unwrap();
        let c = pixmap.pixel((p.x - 256) as u32, (p.y - 256) as u32).unwrap();
        assert_eq!((c.red(), c.alpha()), (255, 255));
    }

    #[test]
    fn test_missing_location_uses_centroid() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir, 60);
        opts.centroid = LatLng::new(-30.0, 120.0);
        let mut level = Level::new(1, opts).unwrap();

        level.draw(Operation::SetPixel, &DrawArgs::new()).unwrap();
        assert!(level.cache().contains(&"3".parse().unwrap()));
    }
}
