//! Geometry of drawing calls and its rasterization into tiles
//!
//! A [`Shape`] is built once per call and zoom level in canvas pixel space.
//! Its coverage is rasterized once per tile-aligned block of the canvas and
//! then composited into each tile of the block, so the pixels a tile receives
//! depend only on their canvas position, never on how the canvas is split.

use crate::core::bounds::{Bounds, TileSpan};
use crate::core::config::CombineMode;
use crate::core::constants::TILE_SIZE;
use crate::core::geo::{self, LatLng, PixelCoord, Point, TileCoord};
use crate::draw::args::DrawArgs;
use crate::draw::clip;
use crate::draw::text::{self, HAlign, OutlineOp, TextOutline, VAlign};
use crate::draw::Operation;
use crate::{MapError, Result};
use fxhash::FxHashSet;
use std::path::Path as FsPath;
use tiny_skia::{
    BlendMode, Color, ColorU8, FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, PremultipliedColorU8, Rect, Shader, Stroke, Transform,
};

/// Tiles per side of the largest block of canvas rasterized in one pass
pub const BLOCK_TILES: u32 = 16;

/// Extra room around a frame kept when clipping geometry, beyond stroke width
const CLIP_MARGIN: f64 = 1024.0;

/// Default text size in pixels
const DEFAULT_TEXT_SIZE: f64 = 12.0;

/// Paint settings of one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub color: Color,
    pub width: f64,
    pub filled: bool,
    pub anti_alias: bool,
    pub blend_mode: BlendMode,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 1.0,
            filled: false,
            anti_alias: true,
            blend_mode: CombineMode::default().blend_mode(),
        }
    }
}

impl Style {
    /// Reads `color`, `width`, `filled`, `aa` and an optional per-call
    /// `combine`, falling back to the level's combine mode
    pub fn from_args(op: Operation, args: &DrawArgs, combine: CombineMode) -> Result<Self> {
        let width = args.number_or(op, "width", 1.0)?;
        if width <= 0.0 {
            return Err(MapError::argument(op.name(), "width", "must be positive"));
        }
        let combine = match args.text(op, "combine")? {
            Some(name) => name.parse()?,
            None => combine,
        };
        Ok(Self {
            color: args.color(op, "color")?.unwrap_or(Color::BLACK),
            width,
            filled: args.flag(op, "filled")?.unwrap_or(false),
            anti_alias: args.flag(op, "aa")?.unwrap_or(true),
            blend_mode: combine.blend_mode(),
        })
    }

    fn paint(&self) -> Paint<'static> {
        Paint {
            shader: Shader::SolidColor(self.color),
            blend_mode: self.blend_mode,
            anti_alias: self.anti_alias,
            ..Default::default()
        }
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            width: self.width as f32,
            ..Default::default()
        }
    }

    /// How far rendered pixels may reach beyond the geometry
    fn reach(&self) -> f64 {
        if self.filled {
            1.0
        } else {
            // Miter joins extend up to the miter limit (4) times half the width
            2.0 * self.width + 1.0
        }
    }
}

/// Canvas-space geometry of one drawing call at one zoom level
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Pixel(PixelCoord),
    /// Line, polyline or polygon through pixel centres
    Path { points: Vec<Point>, closed: bool },
    /// Box covering the pixels between two corners, inclusive
    Rect { min: PixelCoord, max: PixelCoord },
    Circle { center: Point, radius: f64 },
    /// Angles in degrees, clockwise from three o'clock
    Arc {
        center: Point,
        radius: f64,
        start: f64,
        end: f64,
    },
    /// Opaque centre fading to a transparent edge
    Radial { center: Point, radius: f64 },
    Text { anchor: Point, outline: TextOutline },
    FloodFill { seed: PixelCoord },
}

impl Shape {
    /// Projects the geographic arguments of a geometric call at `zoom`.
    ///
    /// Single-anchor primitives without a location use `centroid`.
    pub fn from_call(op: Operation, args: &DrawArgs, zoom: u8, centroid: LatLng) -> Result<Self> {
        let pixel = |p: LatLng| geo::latlon_to_pixel(zoom, p.lat, p.lng);
        let anchor = || -> Result<PixelCoord> { Ok(pixel(args.location(op)?.unwrap_or(centroid))) };
        let points = |min: usize| -> Result<Vec<PixelCoord>> {
            let points = args.points(op)?.unwrap_or_default();
            if points.len() < min {
                return Err(MapError::argument(
                    op.name(),
                    "points",
                    format!("needs at least {} points, got {}", min, points.len()),
                ));
            }
            Ok(points.into_iter().map(|p| pixel(p)).collect())
        };
        let radius = || -> Result<f64> {
            let r = args
                .number(op, "r")?
                .ok_or_else(|| MapError::argument(op.name(), "r", "missing radius"))?;
            if r <= 0.0 {
                return Err(MapError::argument(op.name(), "r", "must be positive"));
            }
            Ok(r)
        };

        let shape = match op {
            Operation::SetPixel => Shape::Pixel(anchor()?),
            Operation::Line => {
                let p = points(2)?;
                Shape::path(&p[..2], false)
            }
            Operation::Polyline => Shape::path(&points(2)?, false),
            Operation::Polygon => Shape::path(&points(3)?, true),
            Operation::Box => {
                let p = points(2)?;
                Shape::Rect {
                    min: PixelCoord::new(p[0].x.min(p[1].x), p[0].y.min(p[1].y)),
                    max: PixelCoord::new(p[0].x.max(p[1].x), p[0].y.max(p[1].y)),
                }
            }
            Operation::Circle => Shape::Circle {
                center: anchor()?.center(),
                radius: radius()?,
            },
            Operation::Arc => Shape::Arc {
                center: anchor()?.center(),
                radius: radius()?,
                start: args.number_or(op, "d1", 0.0)?,
                end: args.number_or(op, "d2", 360.0)?,
            },
            Operation::FloodFill => Shape::FloodFill { seed: anchor()? },
            Operation::String | Operation::AlignString => {
                let (h, v) = if op == Operation::AlignString {
                    (HAlign::Center, VAlign::Middle)
                } else {
                    (HAlign::Left, VAlign::Baseline)
                };
                let h = match args.text(op, "halign")? {
                    Some(name) => name.parse()?,
                    None => h,
                };
                let v = match args.text(op, "valign")? {
                    Some(name) => name.parse()?,
                    None => v,
                };
                let content = args
                    .text(op, "text")?
                    .ok_or_else(|| MapError::argument(op.name(), "text", "missing text"))?;
                let font = args
                    .text(op, "font")?
                    .ok_or_else(|| MapError::argument(op.name(), "font", "missing font file"))?;
                let size = args.number_or(op, "size", DEFAULT_TEXT_SIZE)?;
                Shape::Text {
                    anchor: anchor()?.center(),
                    outline: text::layout(content, FsPath::new(font), size, h, v)?,
                }
            }
            Operation::RadialCircle | Operation::Colourise | Operation::Filter => {
                return Err(MapError::argument(
                    op.name(),
                    "op",
                    "not a geometric operation",
                ))
            }
        };
        Ok(shape)
    }

    fn path(pixels: &[PixelCoord], closed: bool) -> Self {
        Shape::Path {
            points: pixels.iter().map(PixelCoord::center).collect(),
            closed,
        }
    }

    /// Canvas extent of the rendered pixels
    pub fn bounds(&self, style: &Style) -> Option<Bounds> {
        let reach = style.reach();
        match self {
            Shape::Pixel(p) | Shape::FloodFill { seed: p } => {
                let p = p.to_point();
                Some(Bounds::new(p, Point::new(p.x + 1.0, p.y + 1.0)))
            }
            Shape::Rect { min, max } => Some(
                Bounds::from_coords(
                    min.x as f64,
                    min.y as f64,
                    max.x as f64 + 1.0,
                    max.y as f64 + 1.0,
                )
                .expanded(if style.filled { 0.0 } else { reach }),
            ),
            Shape::Path { points, .. } => Bounds::from_points(points).map(|b| b.expanded(reach)),
            Shape::Circle { center, radius } | Shape::Arc { center, radius, .. } => {
                Some(Bounds::around(*center, radius + reach))
            }
            Shape::Radial { center, radius } => Some(Bounds::around(*center, radius + 1.0)),
            Shape::Text { anchor, outline } => Some(Bounds::new(
                anchor.add(&outline.bounds.min),
                anchor.add(&outline.bounds.max),
            ).expanded(2.0)),
        }
    }

    /// Tiles of `zoom` this shape draws into, in row-major order
    pub fn tiles(&self, zoom: u8, style: &Style) -> Vec<TileCoord> {
        match self {
            Shape::Path { points, closed } if !(*closed && style.filled) => {
                return path_tiles(points, *closed, style.reach(), zoom);
            }
            Shape::Rect { min, max } if !style.filled => {
                return path_tiles(&rect_outline(min, max), true, style.reach(), zoom);
            }
            _ => {}
        }
        let Some(bounds) = self.bounds(style) else {
            return Vec::new();
        };
        bounds
            .tile_range(zoom)
            .into_iter()
            .filter(|tile| self.touches(&Bounds::of_tile(tile), style))
            .collect()
    }

    /// Whether rendering into the tile covering `tile` could change a pixel
    pub fn touches(&self, tile: &Bounds, style: &Style) -> bool {
        let reach = style.reach();
        match self {
            Shape::Path { points, closed } => {
                if *closed && style.filled && clip::point_in_polygon(&tile.center(), points) {
                    return true;
                }
                segments(points, *closed).any(|(a, b)| clip::segment_touches(a, b, tile, reach))
            }
            Shape::Rect { min, max } if !style.filled => {
                let outline = rect_outline(min, max);
                let touches = segments(&outline, true).any(|(a, b)| clip::segment_touches(a, b, tile, reach));
                touches
            }
            Shape::Circle { center, radius } | Shape::Arc { center, radius, .. } => {
                let near = nearest_distance(center, tile);
                let far = farthest_distance(center, tile);
                if style.filled {
                    near <= radius + reach
                } else {
                    near <= radius + reach && far >= radius - reach
                }
            }
            Shape::Radial { center, radius } => nearest_distance(center, tile) <= radius + 1.0,
            _ => self.bounds(style).map_or(false, |b| b.intersects(tile)),
        }
    }

    /// The part of `block` (see [`block_of`]) this shape is rasterized over:
    /// the block cut down to the tiles under the shape's bounds
    pub fn frame(&self, block: (u32, u32), zoom: u8, style: &Style) -> Option<TileSpan> {
        let span = self.bounds(style)?.tile_span(zoom)?;
        let (bx, by) = block;
        let block = TileSpan {
            zoom,
            min_x: bx * BLOCK_TILES,
            min_y: by * BLOCK_TILES,
            max_x: bx * BLOCK_TILES + (BLOCK_TILES - 1),
            max_y: by * BLOCK_TILES + (BLOCK_TILES - 1),
        };
        span.intersection(&block)
    }

    /// Rasterizes the coverage of the shape over `frame`.
    ///
    /// `None` for a flood fill, whose region depends on the pixels already in
    /// its tile.
    pub fn rasterize(&self, frame: &TileSpan, style: &Style) -> Option<Coverage> {
        let origin = frame.pixel_origin();
        let mut mask = Mask::new(frame.width(), frame.height())?;
        let offset = origin.to_point();
        let local = |p: &Point| p.subtract(&offset);
        let window = Bounds::from_coords(0.0, 0.0, frame.width() as f64, frame.height() as f64)
            .expanded(CLIP_MARGIN + 2.0 * style.width);

        match self {
            Shape::Pixel(p) => cover_pixel(&mut mask, p.x - origin.x, p.y - origin.y),
            Shape::Rect { min, max } if style.filled || min == max => cover_rect(
                &mut mask,
                PixelCoord::new(min.x - origin.x, min.y - origin.y),
                PixelCoord::new(max.x - origin.x, max.y - origin.y),
            ),
            Shape::Rect { min, max } => {
                let corners: Vec<Point> = rect_outline(min, max).iter().map(local).collect();
                if let Some(path) = polyline_path(&clip::clip_polygon(&corners, &window), true) {
                    stroke_into(&mut mask, &path, style);
                }
            }
            Shape::Path { points, closed } => {
                let points: Vec<Point> = points.iter().map(local).collect();
                if is_degenerate(&points) {
                    let at = points[0];
                    cover_pixel(&mut mask, at.x.floor() as i64, at.y.floor() as i64);
                } else if *closed {
                    if let Some(path) = polyline_path(&clip::clip_polygon(&points, &window), true) {
                        outline_into(&mut mask, &path, style);
                    }
                } else {
                    for run in clip::clip_polyline(&points, &window) {
                        if let Some(path) = polyline_path(&run, false) {
                            stroke_into(&mut mask, &path, style);
                        }
                    }
                }
            }
            Shape::Circle { center, radius } => {
                let c = local(center);
                if let Some(path) = PathBuilder::from_circle(c.x as f32, c.y as f32, *radius as f32) {
                    outline_into(&mut mask, &path, style);
                }
            }
            Shape::Arc {
                center,
                radius,
                start,
                end,
            } => {
                let ops = arc_ops(local(center), *radius, *start, *end, style.filled);
                if let Some(path) = ops_path(&ops, Point::default()) {
                    outline_into(&mut mask, &path, style);
                }
            }
            Shape::Radial { center, radius } => {
                let c = local(center);
                if let Some(path) = PathBuilder::from_circle(c.x as f32, c.y as f32, *radius as f32) {
                    mask.fill_path(&path, FillRule::Winding, style.anti_alias, Transform::identity());
                }
            }
            Shape::Text { anchor, outline } => {
                if let Some(path) = ops_path(&outline.ops, local(anchor)) {
                    mask.fill_path(&path, FillRule::Winding, style.anti_alias, Transform::identity());
                }
            }
            Shape::FloodFill { .. } => return None,
        }
        Some(Coverage { origin, mask })
    }

    /// Composites `coverage` of this shape into a buffer whose top-left pixel
    /// sits at canvas position `origin`.
    ///
    /// The call's colour is first combined with every pixel of a copy by the
    /// blend mode; each pixel then moves from its old value towards the
    /// combined one in proportion to its coverage.
    pub fn paint(&self, pixmap: &mut Pixmap, origin: PixelCoord, coverage: &[u8], style: &Style) {
        let (width, height) = (pixmap.width(), pixmap.height());
        let mut combined = pixmap.clone();
        match self {
            Shape::Radial { center, radius } => {
                if let Some(source) = radial_source(width, height, origin, *center, *radius, style.color) {
                    let paint = PixmapPaint {
                        opacity: 1.0,
                        blend_mode: style.blend_mode,
                        quality: FilterQuality::Nearest,
                    };
                    combined.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::identity(), None);
                }
            }
            _ => {
                if let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
                    let paint = Paint {
                        anti_alias: false,
                        ..style.paint()
                    };
                    combined.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
        }

        let pixels = pixmap.pixels_mut().iter_mut().zip(combined.pixels()).zip(coverage);
        for ((dst, src), &amount) in pixels {
            if amount == u8::MAX {
                *dst = *src;
            } else if amount > 0 {
                *dst = lerp(*dst, *src, amount);
            }
        }
    }

    /// Renders the shape into a buffer whose top-left pixel sits at canvas
    /// position `origin` of level `zoom`.
    ///
    /// Rasterizes the same frames as a whole level does, so any split of the
    /// canvas into buffers gives the same pixels.
    pub fn render(&self, pixmap: &mut Pixmap, origin: PixelCoord, zoom: u8, style: &Style) {
        if let Shape::FloodFill { seed } = self {
            let seed = (seed.x - origin.x, seed.y - origin.y);
            flood_fill(pixmap, seed, &style.paint());
            return;
        }

        let (width, height) = (pixmap.width(), pixmap.height());
        let window = Bounds::from_coords(
            origin.x as f64,
            origin.y as f64,
            origin.x as f64 + width as f64,
            origin.y as f64 + height as f64,
        );
        let Some(span) = self
            .bounds(style)
            .and_then(|b| b.tile_span(zoom))
            .zip(window.tile_span(zoom))
            .and_then(|(shape, window)| shape.intersection(&window))
        else {
            return;
        };

        for by in span.min_y / BLOCK_TILES..=span.max_y / BLOCK_TILES {
            for bx in span.min_x / BLOCK_TILES..=span.max_x / BLOCK_TILES {
                let coverage = self
                    .frame((bx, by), zoom, style)
                    .and_then(|frame| self.rasterize(&frame, style));
                if let Some(covered) = coverage.and_then(|c| c.window(origin, width, height)) {
                    self.paint(pixmap, origin, &covered, style);
                }
            }
        }
    }
}

/// Block of [`BLOCK_TILES`] by [`BLOCK_TILES`] tiles holding `tile`
pub fn block_of(tile: &TileCoord) -> (u32, u32) {
    (tile.x / BLOCK_TILES, tile.y / BLOCK_TILES)
}

/// Rasterized coverage of one shape over a tile-aligned part of the canvas
#[derive(Debug, Clone)]
pub struct Coverage {
    origin: PixelCoord,
    mask: Mask,
}

impl Coverage {
    /// Canvas position of the first coverage byte
    pub fn origin(&self) -> PixelCoord {
        self.origin
    }

    /// Coverage of the `width` by `height` window whose top-left pixel sits at
    /// `origin`, row-major, or `None` when nothing in it is covered
    pub fn window(&self, origin: PixelCoord, width: u32, height: u32) -> Option<Vec<u8>> {
        let (mw, mh) = (self.mask.width() as i64, self.mask.height() as i64);
        let x0 = origin.x.max(self.origin.x);
        let x1 = (origin.x + width as i64).min(self.origin.x + mw);
        let y0 = origin.y.max(self.origin.y);
        let y1 = (origin.y + height as i64).min(self.origin.y + mh);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let data = self.mask.data();
        let len = (x1 - x0) as usize;
        let mut out = vec![0u8; width as usize * height as usize];
        let mut covered = false;
        for y in y0..y1 {
            let src = ((y - self.origin.y) * mw + (x0 - self.origin.x)) as usize;
            let dst = ((y - origin.y) * width as i64 + (x0 - origin.x)) as usize;
            let row = &data[src..src + len];
            covered |= row.iter().any(|&c| c > 0);
            out[dst..dst + len].copy_from_slice(row);
        }
        covered.then_some(out)
    }

    /// Coverage of one tile, `None` when the shape leaves it untouched
    pub fn tile(&self, tile: &TileCoord) -> Option<Vec<u8>> {
        self.window(tile.pixel_origin(), TILE_SIZE, TILE_SIZE)
    }
}

/// Fills a closed outline or strokes it, by the style
fn outline_into(mask: &mut Mask, path: &Path, style: &Style) {
    if style.filled {
        mask.fill_path(path, FillRule::Winding, style.anti_alias, Transform::identity());
    } else {
        stroke_into(mask, path, style);
    }
}

fn stroke_into(mask: &mut Mask, path: &Path, style: &Style) {
    if let Some(outline) = path.stroke(&style.stroke(), 1.0) {
        mask.fill_path(&outline, FillRule::Winding, style.anti_alias, Transform::identity());
    }
}

fn cover_pixel(mask: &mut Mask, x: i64, y: i64) {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    if x >= 0 && y >= 0 && x < width && y < height {
        mask.data_mut()[(y * width + x) as usize] = u8::MAX;
    }
}

/// Covers the pixels between two corners, inclusive, clamped to the mask
fn cover_rect(mask: &mut Mask, min: PixelCoord, max: PixelCoord) {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    let (x0, x1) = (min.x.max(0), max.x.min(width - 1));
    let (y0, y1) = (min.y.max(0), max.y.min(height - 1));
    if x0 > x1 || y0 > y1 {
        return;
    }
    let data = mask.data_mut();
    for y in y0..=y1 {
        let row = (y * width) as usize;
        data[row + x0 as usize..=row + x1 as usize].fill(u8::MAX);
    }
}

/// `from` moved towards `to` by `amount / 255`, channel by channel
fn lerp(from: PremultipliedColorU8, to: PremultipliedColorU8, amount: u8) -> PremultipliedColorU8 {
    let t = amount as u32;
    let mix = |a: u8, b: u8| ((a as u32 * (255 - t) + b as u32 * t + 127) / 255) as u8;
    PremultipliedColorU8::from_rgba(
        mix(from.red(), to.red()),
        mix(from.green(), to.green()),
        mix(from.blue(), to.blue()),
        mix(from.alpha(), to.alpha()),
    )
    .unwrap_or(to)
}

/// Source colours of a radial gradient over a buffer at `origin`: `color` at
/// the centre, fading linearly to transparent at `radius`
fn radial_source(
    width: u32,
    height: u32,
    origin: PixelCoord,
    center: Point,
    radius: f64,
    color: Color,
) -> Option<Pixmap> {
    let mut source = Pixmap::new(width, height)?;
    let c = color.to_color_u8();
    let columns = width as usize;
    for (i, pixel) in source.pixels_mut().iter_mut().enumerate() {
        let at = Point::new(
            origin.x as f64 + (i % columns) as f64 + 0.5,
            origin.y as f64 + (i / columns) as f64 + 0.5,
        );
        let fade = (1.0 - at.distance_to(&center) / radius).clamp(0.0, 1.0);
        let alpha = (c.alpha() as f64 * fade).round() as u8;
        *pixel = ColorU8::from_rgba(c.red(), c.green(), c.blue(), alpha).premultiply();
    }
    Some(source)
}

/// Centres of the corner pixels of a box, clockwise from `min`
fn rect_outline(min: &PixelCoord, max: &PixelCoord) -> [Point; 4] {
    [
        min.center(),
        PixelCoord::new(max.x, min.y).center(),
        max.center(),
        PixelCoord::new(min.x, max.y).center(),
    ]
}

fn is_degenerate(points: &[Point]) -> bool {
    points.windows(2).all(|pair| pair[0] == pair[1])
}

fn segments(points: &[Point], closed: bool) -> impl Iterator<Item = (Point, Point)> + '_ {
    let closing = if closed && points.len() > 2 {
        Some((points[points.len() - 1], points[0]))
    } else {
        None
    };
    points
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .chain(closing)
}

fn polyline_path(points: &[Point], closed: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    if closed {
        pb.close();
    }
    pb.finish()
}

/// Builds a path from outline commands shifted by `offset`
fn ops_path(ops: &[OutlineOp], offset: Point) -> Option<Path> {
    let at = |p: &Point| {
        let p = p.add(&offset);
        (p.x as f32, p.y as f32)
    };
    let mut pb = PathBuilder::new();
    for op in ops {
        match op {
            OutlineOp::MoveTo(p) => {
                let (x, y) = at(p);
                pb.move_to(x, y);
            }
            OutlineOp::LineTo(p) => {
                let (x, y) = at(p);
                pb.line_to(x, y);
            }
            OutlineOp::QuadTo(c, p) => {
                let ((cx, cy), (x, y)) = (at(c), at(p));
                pb.quad_to(cx, cy, x, y);
            }
            OutlineOp::CubicTo(c1, c2, p) => {
                let ((ax, ay), (bx, by), (x, y)) = (at(c1), at(c2), at(p));
                pb.cubic_to(ax, ay, bx, by, x, y);
            }
            OutlineOp::Close => pb.close(),
        }
    }
    pb.finish()
}

/// Cubic approximation of a circular arc, split into quarter turns at most.
///
/// A filled arc becomes a pie slice closed through the centre.
pub fn arc_ops(center: Point, radius: f64, start: f64, end: f64, pie: bool) -> Vec<OutlineOp> {
    let mut sweep = end - start;
    if sweep < 0.0 {
        sweep = sweep.rem_euclid(360.0);
    }
    let sweep = sweep.min(360.0);
    let on_circle = |deg: f64| {
        let t = deg.to_radians();
        Point::new(center.x + radius * t.cos(), center.y + radius * t.sin())
    };

    let mut ops = Vec::new();
    if pie {
        ops.push(OutlineOp::MoveTo(center));
        ops.push(OutlineOp::LineTo(on_circle(start)));
    } else {
        ops.push(OutlineOp::MoveTo(on_circle(start)));
    }
    if sweep == 0.0 {
        return ops;
    }

    let pieces = (sweep / 90.0).ceil().max(1.0) as usize;
    let step = sweep / pieces as f64;
    let k = 4.0 / 3.0 * (step.to_radians() / 4.0).tan() * radius;
    for i in 0..pieces {
        let a0 = (start + step * i as f64).to_radians();
        let a1 = (start + step * (i + 1) as f64).to_radians();
        let p0 = Point::new(center.x + radius * a0.cos(), center.y + radius * a0.sin());
        let p3 = Point::new(center.x + radius * a1.cos(), center.y + radius * a1.sin());
        let c1 = Point::new(p0.x - k * a0.sin(), p0.y + k * a0.cos());
        let c2 = Point::new(p3.x + k * a1.sin(), p3.y - k * a1.cos());
        ops.push(OutlineOp::CubicTo(c1, c2, p3));
    }
    if pie {
        ops.push(OutlineOp::Close);
    }
    ops
}

/// Fills the 4-connected region sharing the seed pixel's colour.
///
/// The region is confined to the buffer it starts in.
fn flood_fill(pixmap: &mut Pixmap, seed: (i64, i64), paint: &Paint) {
    let (width, height) = (pixmap.width() as i64, pixmap.height() as i64);
    let (sx, sy) = seed;
    if sx < 0 || sy < 0 || sx >= width || sy >= height {
        return;
    }
    let Some(mut mask) = Mask::new(pixmap.width(), pixmap.height()) else {
        return;
    };

    let pixels = pixmap.pixels();
    let index = |x: i64, y: i64| (y * width + x) as usize;
    let target = pixels[index(sx, sy)];
    let mut visited = vec![false; pixels.len()];
    let mut stack = vec![(sx, sy)];
    visited[index(sx, sy)] = true;
    let region = mask.data_mut();

    while let Some((x, y)) = stack.pop() {
        region[index(x, y)] = 255;
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let i = index(nx, ny);
            if !visited[i] && pixels[i] == target {
                visited[i] = true;
                stack.push((nx, ny));
            }
        }
    }

    if let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
        let mut paint = paint.clone();
        paint.anti_alias = false;
        pixmap.fill_rect(rect, &paint, Transform::identity(), Some(&mask));
    }
}

fn nearest_distance(p: &Point, rect: &Bounds) -> f64 {
    let dx = (rect.min.x - p.x).max(0.0).max(p.x - rect.max.x);
    let dy = (rect.min.y - p.y).max(0.0).max(p.y - rect.max.y);
    (dx * dx + dy * dy).sqrt()
}

fn farthest_distance(p: &Point, rect: &Bounds) -> f64 {
    let dx = (p.x - rect.min.x).abs().max((rect.max.x - p.x).abs());
    let dy = (p.y - rect.min.y).abs().max((rect.max.y - p.y).abs());
    (dx * dx + dy * dy).sqrt()
}

/// Tiles within `reach` of a stroked path, walked segment by segment so long
/// lines at deep zoom levels do not enumerate their whole bounding box
fn path_tiles(points: &[Point], closed: bool, reach: f64, zoom: u8) -> Vec<TileCoord> {
    let mut found = FxHashSet::default();
    if points.len() == 1 {
        segment_tiles(points[0], points[0], reach, zoom, &mut found);
    }
    for (a, b) in segments(points, closed) {
        segment_tiles(a, b, reach, zoom, &mut found);
    }
    let mut tiles: Vec<TileCoord> = found
        .into_iter()
        .map(|(x, y)| TileCoord::new(x, y, zoom))
        .collect();
    tiles.sort_by_key(|t| (t.y, t.x));
    tiles
}

fn segment_tiles(a: Point, b: Point, reach: f64, zoom: u8, found: &mut FxHashSet<(u32, u32)>) {
    let size = TILE_SIZE as f64;
    let extent = geo::width_at_level(zoom) as f64;
    let last = geo::tiles_per_side(zoom) as f64 - 1.0;
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    if x1 + reach < 0.0 || x0 - reach > extent {
        return;
    }

    let first_col = ((x0 - reach) / size).floor().clamp(0.0, last) as u32;
    let last_col = ((x1 + reach) / size).floor().clamp(0.0, last) as u32;
    let vertical = (b.x - a.x).abs() < f64::EPSILON;
    let y_at = |x: f64| a.y + (x - a.x) / (b.x - a.x) * (b.y - a.y);

    for col in first_col..=last_col {
        let left = (col as f64 * size - reach).max(x0);
        let right = ((col + 1) as f64 * size + reach).min(x1);
        if left > right {
            continue;
        }
        let (ya, yb) = if vertical {
            (a.y, b.y)
        } else {
            (y_at(left), y_at(right))
        };
        let top = ya.min(yb) - reach;
        let bottom = ya.max(yb) + reach;
        if bottom < 0.0 || top > extent {
            continue;
        }
        let first_row = (top / size).floor().clamp(0.0, last) as u32;
        let last_row = (bottom / size).floor().clamp(0.0, last) as u32;
        for row in first_row..=last_row {
            found.insert((col, row));
        }
    }
}
