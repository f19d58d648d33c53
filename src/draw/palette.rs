use crate::draw::args::{parse_color, DrawArgs};
use crate::draw::Operation;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Colour gradient used by `colourise` to map intensity to colour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    /// Gradient stops `(position, [r, g, b, a])`, positions in `0.0..=1.0`
    pub gradient: Vec<(f64, [u8; 4])>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            gradient: vec![
                (0.0, [0, 0, 255, 0]),     // Transparent blue
                (0.2, [0, 0, 255, 128]),   // Blue
                (0.4, [0, 255, 255, 160]), // Cyan
                (0.6, [0, 255, 0, 192]),   // Green
                (0.8, [255, 255, 0, 224]), // Yellow
                (1.0, [255, 0, 0, 255]),   // Red
            ],
        }
    }
}

impl Palette {
    /// Builds a palette, sorting stops by position and clamping positions
    pub fn new(mut gradient: Vec<(f64, [u8; 4])>) -> Self {
        for stop in gradient.iter_mut() {
            stop.0 = if stop.0.is_finite() { stop.0.clamp(0.0, 1.0) } else { 0.0 };
        }
        gradient.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { gradient }
    }

    /// Reads an optional `palette` argument: a list of `[position, colour]`
    pub fn from_args(args: &DrawArgs) -> Result<Self> {
        let op = Operation::Colourise;
        let Some(value) = args.get("palette") else {
            return Ok(Self::default());
        };
        let invalid = |reason: String| MapError::argument(op.name(), "palette", reason);
        let stops = value
            .as_array()
            .ok_or_else(|| invalid("expected a list of [position, colour]".to_string()))?;

        let mut gradient = Vec::with_capacity(stops.len());
        for stop in stops {
            let (position, color) = match stop.as_array().map(Vec::as_slice) {
                Some([position, color]) => (position, color),
                _ => return Err(invalid(format!("{} is not a [position, colour] pair", stop))),
            };
            let position = position
                .as_f64()
                .ok_or_else(|| invalid(format!("{} is not a position", position)))?;
            let color = parse_color(color)
                .ok_or_else(|| invalid(format!("unrecognised colour {}", color)))?
                .to_color_u8();
            gradient.push((position, [color.red(), color.green(), color.blue(), color.alpha()]));
        }
        if gradient.is_empty() {
            return Err(invalid("needs at least one stop".to_string()));
        }
        Ok(Self::new(gradient))
    }

    /// Black to white through grey, alpha following intensity
    pub fn greyscale() -> Self {
        Self::new(vec![(0.0, [0, 0, 0, 0]), (1.0, [255, 255, 255, 255])])
    }

    /// Map intensity to color using the gradient
    pub fn color_at(&self, intensity: f64) -> [u8; 4] {
        let Some(first) = self.gradient.first() else {
            return [0, 0, 0, 0];
        };
        let intensity = if intensity.is_nan() { 0.0 } else { intensity };
        if intensity <= first.0 {
            return first.1;
        }

        for pair in self.gradient.windows(2) {
            let (t1, c1) = pair[0];
            let (t2, c2) = pair[1];
            if intensity >= t1 && intensity <= t2 {
                let span = t2 - t1;
                let t = if span > 0.0 { (intensity - t1) / span } else { 1.0 };
                let mut out = [0u8; 4];
                for i in 0..4 {
                    out[i] = (c1[i] as f64 + (c2[i] as f64 - c1[i] as f64) * t).round() as u8;
                }
                return out;
            }
        }

        self.gradient.last().map_or(first.1, |stop| stop.1)
    }

    /// 256-entry lookup table indexed by intensity byte
    pub fn lookup_table(&self) -> Vec<[u8; 4]> {
        (0..=255u8)
            .map(|i| self.color_at(i as f64 / 255.0))
            .collect()
    }
}
