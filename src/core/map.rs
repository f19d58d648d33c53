use crate::{
    core::{
        builder::MapLayerBuilder,
        config::{LayerConfig, ZoomRange},
        constants::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL},
        geo::LatLng,
    },
    draw::{args::DrawArgs, filter::FilterKind, palette::Palette, Operation},
    layers::level::Level,
    MapError, Result,
};

/// A drawing surface spanning a range of zoom levels.
///
/// Every call is fanned out, unchanged, to each [`Level`] in ascending zoom
/// order. Tiles are written as they are evicted and when the layer is saved or
/// closed; prefer [`MapLayer::close`] or [`MapLayer::scoped`] over relying on
/// `Drop`, which can only log save failures.
#[derive(Debug)]
pub struct MapLayer {
    config: LayerConfig,
    range: ZoomRange,
    levels: Vec<Level>,
}

impl MapLayer {
    /// Validates the configuration and creates one level per zoom
    pub fn new(config: LayerConfig) -> Result<Self> {
        config.validate()?;
        let range = config.zoom_range()?;
        let options = config.level_options();

        let levels = range
            .levels()
            .map(|zoom| Level::new(zoom, options.clone()))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "created map layer in {} for zoom {}..={} (combine: {}, in_memory: {}s)",
            config.base_dir.display(),
            range.min(),
            range.max(),
            config.combine,
            config.in_memory
        );
        Ok(Self {
            config,
            range,
            levels,
        })
    }

    pub fn builder() -> MapLayerBuilder {
        MapLayerBuilder::new()
    }

    /// Opens a layer, runs `f` and closes the layer on every exit path.
    ///
    /// An error from `f` takes precedence over an error while closing.
    pub fn scoped<T>(config: LayerConfig, f: impl FnOnce(&mut MapLayer) -> Result<T>) -> Result<T> {
        let mut layer = MapLayer::new(config)?;
        let result = f(&mut layer);
        let closed = layer.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                log::error!("closing map layer after a failed call: {}", close_err);
                Err(e)
            }
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.range
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, zoom: u8) -> Option<&Level> {
        self.levels.iter().find(|level| level.zoom() == zoom)
    }

    pub fn level_mut(&mut self, zoom: u8) -> Option<&mut Level> {
        self.levels.iter_mut().find(|level| level.zoom() == zoom)
    }

    /// Runs one call on every level it targets, returning the number of
    /// tiles touched across levels
    pub fn dispatch(&mut self, op: Operation, args: &DrawArgs) -> Result<usize> {
        let Some(range) = self.call_range(op, args)? else {
            log::debug!("{} targets no configured zoom level", op);
            return Ok(0);
        };

        let mut touched = 0;
        for level in self.targets(Some(range)) {
            touched += level.draw(op, args)?;
        }
        Ok(touched)
    }

    /// Runs a call given by name with JSON arguments
    pub fn draw(&mut self, op: &str, args: serde_json::Value) -> Result<usize> {
        let op: Operation = op.parse()?;
        self.dispatch(op, &DrawArgs::from_value(args)?)
    }

    /// Levels a call may touch: its own `min_level` / `max_level` narrowed to
    /// the configured range. `None` when they do not overlap.
    fn call_range(&self, op: Operation, args: &DrawArgs) -> Result<Option<ZoomRange>> {
        let min = args.level(op, "min_level")?;
        let max = args.level(op, "max_level")?;
        if min.is_none() && max.is_none() {
            return Ok(Some(self.range));
        }

        let min = min.unwrap_or(MIN_ZOOM_LEVEL).max(MIN_ZOOM_LEVEL);
        let max = max.unwrap_or(MAX_ZOOM_LEVEL).min(MAX_ZOOM_LEVEL);
        if min > max {
            return Err(MapError::argument(
                op.name(),
                "min_level",
                format!("min_level {} is greater than max_level {}", min, max),
            ));
        }
        let call = ZoomRange::new(min, max)?;
        Ok(self.range.intersect(&call))
    }

    pub fn setpixel(&mut self, at: LatLng, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::SetPixel, &style.with_location(at))
    }

    pub fn line(&mut self, from: LatLng, to: LatLng, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::Line, &style.with_points(&[from, to]))
    }

    /// Box between two opposite corners, inclusive
    pub fn draw_box(&mut self, corner: LatLng, opposite: LatLng, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::Box, &style.with_points(&[corner, opposite]))
    }

    pub fn polyline(&mut self, points: &[LatLng], style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::Polyline, &style.with_points(points))
    }

    pub fn polygon(&mut self, points: &[LatLng], style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::Polygon, &style.with_points(points))
    }

    /// Arc of `r` pixels from `d1` to `d2` degrees, clockwise from east
    pub fn arc(&mut self, center: LatLng, r: f64, d1: f64, d2: f64, style: DrawArgs) -> Result<usize> {
        let args = style
            .with_location(center)
            .with("r", r)
            .with("d1", d1)
            .with("d2", d2);
        self.dispatch(Operation::Arc, &args)
    }

    /// Circle of `r` pixels on every level
    pub fn circle(&mut self, center: LatLng, r: f64, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::Circle, &style.with_location(center).with("r", r))
    }

    pub fn flood_fill(&mut self, seed: LatLng, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::FloodFill, &style.with_location(seed))
    }

    /// Text with its baseline starting at `at`; needs a `font` argument
    pub fn string(&mut self, at: LatLng, text: &str, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::String, &style.with_location(at).with("text", text))
    }

    /// Text aligned around `at` by `halign` / `valign` (centred by default)
    pub fn align_string(&mut self, at: LatLng, text: &str, style: DrawArgs) -> Result<usize> {
        self.dispatch(Operation::AlignString, &style.with_location(at).with("text", text))
    }

    /// Applies an image filter to every output tile of the selected levels,
    /// or of every level for `None`
    pub fn filter(&mut self, kind: FilterKind, levels: Option<ZoomRange>) -> Result<usize> {
        let mut touched = 0;
        for level in self.targets(levels) {
            touched += level.filter(kind)?;
        }
        Ok(touched)
    }

    /// Remaps greyscale intensity to `palette` on the selected levels, or on
    /// every level for `None`
    pub fn colourise(&mut self, palette: &Palette, levels: Option<ZoomRange>) -> Result<usize> {
        let mut touched = 0;
        for level in self.targets(levels) {
            touched += level.colourise(palette)?;
        }
        Ok(touched)
    }

    /// Radial gradient with a radius in metres, at least `min_r` pixels wide,
    /// on the selected levels or on every level for `None`
    pub fn radial_circle(
        &mut self,
        r_meters: f64,
        min_r: Option<f64>,
        lon: f64,
        lat: f64,
        levels: Option<ZoomRange>,
    ) -> Result<usize> {
        let mut touched = 0;
        for level in self.targets(levels) {
            touched += level.radial_circle(r_meters, min_r, lon, lat)?;
        }
        Ok(touched)
    }

    /// Configured levels inside `levels`, all of them for `None`
    fn targets(&mut self, levels: Option<ZoomRange>) -> impl Iterator<Item = &mut Level> {
        self.levels
            .iter_mut()
            .filter(move |level| levels.map_or(true, |range| range.contains(level.zoom())))
    }

    /// Writes every modified tile of every level
    pub fn save(&mut self) -> Result<usize> {
        let mut written = 0;
        for level in self.levels.iter_mut() {
            written += level.save()?;
        }
        log::info!("saved {} tiles", written);
        Ok(written)
    }

    /// Saves autosave-enabled tiles, reporting failures, and releases the layer
    pub fn close(mut self) -> Result<()> {
        let mut written = 0;
        for level in self.levels.iter_mut() {
            written += level.autosave()?;
        }
        log::info!("closed map layer in {} ({} tiles written)", self.config.base_dir.display(), written);
        Ok(())
    }
}
