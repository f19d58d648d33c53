//! Text outlines for `string` and `align_string`
//!
//! Glyph outlines are laid out once per call in pixel units relative to the
//! anchor, then rasterized like any other filled path.

use crate::core::bounds::Bounds;
use crate::core::geo::Point;
use crate::{MapError, Result};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
    #[default]
    Baseline,
}

impl FromStr for HAlign {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "center" | "centre" | "c" => Ok(Self::Center),
            "right" | "r" => Ok(Self::Right),
            other => Err(MapError::argument(
                "align_string",
                "halign",
                format!("unknown alignment '{}'", other),
            )),
        }
    }
}

impl FromStr for VAlign {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "t" => Ok(Self::Top),
            "middle" | "center" | "centre" | "m" => Ok(Self::Middle),
            "bottom" | "b" => Ok(Self::Bottom),
            "baseline" => Ok(Self::Baseline),
            other => Err(MapError::argument(
                "align_string",
                "valign",
                format!("unknown alignment '{}'", other),
            )),
        }
    }
}

/// One drawing command of an outline, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineOp {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

impl OutlineOp {
    /// End and control points of the command
    pub fn points(&self) -> Vec<Point> {
        match *self {
            OutlineOp::MoveTo(p) | OutlineOp::LineTo(p) => vec![p],
            OutlineOp::QuadTo(c, p) => vec![c, p],
            OutlineOp::CubicTo(c1, c2, p) => vec![c1, c2, p],
            OutlineOp::Close => Vec::new(),
        }
    }
}

/// Laid out text, positioned relative to its anchor point
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutline {
    pub ops: Vec<OutlineOp>,
    /// Extent of the ink relative to the anchor
    pub bounds: Bounds,
}

/// Offset from the anchor to the pen origin for a line of text.
///
/// `ascent` is above the baseline (positive) and `descent` below it
/// (negative), in pixels. Canvas y grows downwards.
pub fn align_offset(width: f64, ascent: f64, descent: f64, h: HAlign, v: VAlign) -> Point {
    let dx = match h {
        HAlign::Left => 0.0,
        HAlign::Center => -width / 2.0,
        HAlign::Right => -width,
    };
    let dy = match v {
        VAlign::Top => ascent,
        VAlign::Middle => (ascent + descent) / 2.0,
        VAlign::Bottom => descent,
        VAlign::Baseline => 0.0,
    };
    Point::new(dx, dy)
}

#[cfg(feature = "text")]
mod glyphs {
    use super::*;
    use ab_glyph::{Font, FontArc, OutlineCurve, PxScale, ScaleFont};
    use fxhash::FxHashMap;
    use once_cell::sync::Lazy;
    use std::path::PathBuf;
    use std::sync::Mutex;

    static FONTS: Lazy<Mutex<FxHashMap<PathBuf, FontArc>>> =
        Lazy::new(|| Mutex::new(FxHashMap::default()));

    pub(super) fn load_font(path: &Path) -> Result<FontArc> {
        let mut fonts = FONTS
            .lock()
            .map_err(|_| MapError::Font("font cache poisoned".to_string()))?;
        if let Some(font) = fonts.get(path) {
            return Ok(font.clone());
        }

        let bytes = std::fs::read(path)
            .map_err(|e| MapError::Font(format!("cannot read {}: {}", path.display(), e)))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| MapError::Font(format!("{}: {}", path.display(), e)))?;
        log::debug!("loaded font {}", path.display());
        fonts.insert(path.to_path_buf(), font.clone());
        Ok(font)
    }

    pub(super) fn layout(
        text: &str,
        font_path: &Path,
        size: f64,
        h: HAlign,
        v: VAlign,
    ) -> Result<TextOutline> {
        let font = load_font(font_path)?;
        let scaled = font.as_scaled(PxScale::from(size as f32));
        let (sx, sy) = (scaled.h_scale_factor() as f64, scaled.v_scale_factor() as f64);

        // Glyph curves in pen space, y down, before alignment
        let mut glyph_ops = Vec::new();
        let mut caret = 0.0f64;
        let mut prev = None;
        for ch in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id) as f64;
            }
            if let Some(outline) = font.outline(id) {
                let at = |p: ab_glyph::Point| Point::new(caret + p.x as f64 * sx, -(p.y as f64) * sy);
                let mut pen: Option<Point> = None;
                for curve in &outline.curves {
                    let (start, op) = match *curve {
                        OutlineCurve::Line(a, b) => (at(a), OutlineOp::LineTo(at(b))),
                        OutlineCurve::Quad(a, b, c) => (at(a), OutlineOp::QuadTo(at(b), at(c))),
                        OutlineCurve::Cubic(a, b, c, d) => {
                            (at(a), OutlineOp::CubicTo(at(b), at(c), at(d)))
                        }
                    };
                    if pen != Some(start) {
                        if pen.is_some() {
                            glyph_ops.push(OutlineOp::Close);
                        }
                        glyph_ops.push(OutlineOp::MoveTo(start));
                    }
                    pen = Some(match op {
                        OutlineOp::LineTo(end)
                        | OutlineOp::QuadTo(_, end)
                        | OutlineOp::CubicTo(_, _, end) => end,
                        _ => start,
                    });
                    glyph_ops.push(op);
                }
                if pen.is_some() {
                    glyph_ops.push(OutlineOp::Close);
                }
            }
            caret += scaled.h_advance(id) as f64;
            prev = Some(id);
        }

        let ascent = scaled.ascent() as f64;
        let descent = scaled.descent() as f64;
        let offset = align_offset(caret, ascent, descent, h, v);
        Ok(TextOutline::from_ops(glyph_ops, offset, caret, ascent, descent))
    }
}

impl TextOutline {
    #[cfg_attr(not(feature = "text"), allow(dead_code))]
    fn from_ops(ops: Vec<OutlineOp>, offset: Point, width: f64, ascent: f64, descent: f64) -> Self {
        let shift = |p: Point| p.add(&offset);
        let ops = ops
            .into_iter()
            .map(|op| match op {
                OutlineOp::MoveTo(p) => OutlineOp::MoveTo(shift(p)),
                OutlineOp::LineTo(p) => OutlineOp::LineTo(shift(p)),
                OutlineOp::QuadTo(a, b) => OutlineOp::QuadTo(shift(a), shift(b)),
                OutlineOp::CubicTo(a, b, c) => OutlineOp::CubicTo(shift(a), shift(b), shift(c)),
                OutlineOp::Close => OutlineOp::Close,
            })
            .collect::<Vec<_>>();
        // Control points bound their curves, overhang included; blank text
        // keeps the line box
        let points: Vec<Point> = ops.iter().flat_map(OutlineOp::points).collect();
        let bounds = Bounds::from_points(&points).unwrap_or_else(|| {
            let line = Bounds::from_coords(0.0, -ascent, width, -descent);
            Bounds::new(line.min.add(&offset), line.max.add(&offset))
        });
        Self { ops, bounds }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Lays out one line of text with the font file at `font_path`
pub fn layout(text: &str, font_path: &Path, size: f64, h: HAlign, v: VAlign) -> Result<TextOutline> {
    if !(size.is_finite() && size > 0.0) {
        return Err(MapError::argument("string", "size", "must be a positive number"));
    }
    #[cfg(feature = "text")]
    {
        glyphs::layout(text, font_path, size, h, v)
    }
    #[cfg(not(feature = "text"))]
    {
        let _ = (text, font_path, h, v);
        Err(MapError::Font(
            "text rendering requires the `text` feature".to_string(),
        ))
    }
}
