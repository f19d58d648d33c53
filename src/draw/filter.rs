//! Per-tile image filters
//!
//! Filters run on one tile at a time and cannot see neighbouring tiles, so
//! kernels with a radius (blur, unsharp mask) leave seams at tile borders.

use crate::draw::args::DrawArgs;
use crate::draw::Operation;
use crate::tiles::tile::{image_into_pixmap, pixmap_to_image};
use crate::{MapError, Result};
use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;

const OP: Operation = Operation::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterKind {
    /// Gaussian blur
    Gaussian { sigma: f32 },
    UnsharpMask { sigma: f32, threshold: i32 },
    /// Positive values increase contrast, negative decrease
    Contrast { amount: f32 },
    Brightness { amount: i32 },
    /// Inverts colour channels, alpha is kept
    Negate,
    Grayscale,
    HueRotate { degrees: i32 },
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian { .. } => "gaussian",
            Self::UnsharpMask { .. } => "unsharpmask",
            Self::Contrast { .. } => "contrast",
            Self::Brightness { .. } => "brightness",
            Self::Negate => "negate",
            Self::Grayscale => "grayscale",
            Self::HueRotate { .. } => "huerotate",
        }
    }

    /// Reads `type` plus the filter's options from call arguments
    pub fn from_args(args: &DrawArgs) -> Result<Self> {
        let name = args
            .text(OP, "type")?
            .ok_or_else(|| MapError::argument(OP.name(), "type", "missing filter type"))?;

        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "blur" => Self::Gaussian {
                sigma: args.number_or(OP, "sigma", 1.0)? as f32,
            },
            "unsharpmask" | "unsharp" | "sharpen" => Self::UnsharpMask {
                sigma: args.number_or(OP, "sigma", 1.0)? as f32,
                threshold: args.number_or(OP, "threshold", 0.0)? as i32,
            },
            "contrast" => Self::Contrast {
                amount: args.number_or(OP, "amount", 10.0)? as f32,
            },
            "brightness" => Self::Brightness {
                amount: args.number_or(OP, "amount", 10.0)? as i32,
            },
            "negate" | "invert" => Self::Negate,
            "grayscale" | "greyscale" => Self::Grayscale,
            "huerotate" => Self::HueRotate {
                degrees: args.number_or(OP, "degrees", 180.0)? as i32,
            },
            other => {
                return Err(MapError::argument(
                    OP.name(),
                    "type",
                    format!("unknown filter '{}'", other),
                ))
            }
        };

        match kind {
            Self::Gaussian { sigma } | Self::UnsharpMask { sigma, .. } if sigma <= 0.0 => {
                Err(MapError::argument(OP.name(), "sigma", "must be positive"))
            }
            kind => Ok(kind),
        }
    }

    /// Applies the filter to one tile buffer in place
    pub fn apply(&self, pixmap: &mut Pixmap) {
        match self {
            // Convolutions run on premultiplied data so transparent pixels
            // do not bleed their colour into neighbours
            Self::Gaussian { sigma } => {
                convolve_premultiplied(pixmap, |image| imageops::blur(image, *sigma))
            }
            Self::UnsharpMask { sigma, threshold } => convolve_premultiplied(pixmap, |image| {
                imageops::unsharpen(image, *sigma, *threshold)
            }),
            _ => {
                let mut image = pixmap_to_image(pixmap);
                self.apply_straight(&mut image);
                image_into_pixmap(&image, pixmap);
            }
        }
    }

    fn apply_straight(&self, image: &mut RgbaImage) {
        match self {
            Self::Contrast { amount } => *image = imageops::contrast(image, *amount),
            Self::Brightness { amount } => *image = imageops::brighten(image, *amount),
            Self::Negate => imageops::invert(image),
            Self::HueRotate { degrees } => *image = imageops::huerotate(image, *degrees),
            Self::Grayscale => {
                for pixel in image.pixels_mut() {
                    let [r, g, b, a] = pixel.0;
                    let luma = luma(r, g, b);
                    pixel.0 = [luma, luma, luma, a];
                }
            }
            Self::Gaussian { .. } | Self::UnsharpMask { .. } => {}
        }
    }
}

/// Rec. 601 luma of a straight colour
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

fn convolve_premultiplied(pixmap: &mut Pixmap, f: impl FnOnce(&RgbaImage) -> RgbaImage) {
    let Some(image) = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
    else {
        return;
    };
    let filtered = f(&image);
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(filtered.pixels()) {
        let [r, g, b, a] = src.0;
        // Rounding can push a channel above alpha, which is not premultiplied
        dst.copy_from_slice(&[r.min(a), g.min(a), b.min(a), a]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tiny_skia::{Color, Paint, Rect, Transform};

    fn tile_with_square(color: Color) -> Pixmap {
        let mut pixmap = Pixmap::new(256, 256).unwrap();
        let mut paint = Paint::default();
        paint.set_color(color);
        let rect = Rect::from_xywh(100.0, 100.0, 50.0, 50.0).unwrap();
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        pixmap
    }

    #[test]
    fn test_parse_from_args() {
        let args = DrawArgs::from_value(json!({"type": "gaussian", "sigma": 2.5})).unwrap();
        assert_eq!(FilterKind::from_args(&args).unwrap(), FilterKind::Gaussian { sigma: 2.5 });

        let args = DrawArgs::from_value(json!({"type": "invert"})).unwrap();
        assert_eq!(FilterKind::from_args(&args).unwrap(), FilterKind::Negate);

        let args = DrawArgs::from_value(json!({"type": "emboss"})).unwrap();
        assert!(FilterKind::from_args(&args).is_err());
        let args = DrawArgs::from_value(json!({"type": "blur", "sigma": 0})).unwrap();
        assert!(FilterKind::from_args(&args).is_err());
        assert!(FilterKind::from_args(&DrawArgs::new()).is_err());
    }

    #[test]
    fn test_negate_keeps_alpha() {
        let mut pixmap = tile_with_square(Color::from_rgba8(0, 0, 0, 255));
        FilterKind::Negate.apply(&mut pixmap);

        let inside = pixmap.pixel(120, 120).unwrap();
        assert_eq!((inside.red(), inside.alpha()), (255, 255));
        assert_eq!(pixmap.pixel(10, 10).unwrap().alpha(), 0);
    }

    #[test]
    fn test_blur_spreads_and_stays_premultiplied() {
        let mut pixmap = tile_with_square(Color::from_rgba8(255, 0, 0, 255));
        FilterKind::Gaussian { sigma: 3.0 }.apply(&mut pixmap);

        let edge = pixmap.pixel(98, 125).unwrap();
        assert!(edge.alpha() > 0 && edge.alpha() < 255);
        for p in pixmap.pixels() {
            assert!(p.red() <= p.alpha());
        }
    }

    #[test]
    fn test_grayscale() {
        let mut pixmap = tile_with_square(Color::from_rgba8(255, 0, 0, 255));
        FilterKind::Grayscale.apply(&mut pixmap);
        let p = pixmap.pixel(120, 120).unwrap();
        assert_eq!((p.red(), p.green(), p.blue()), (76, 76, 76));
    }
}
