//! Loosely typed drawing arguments with typed accessors

use crate::core::geo::LatLng;
use crate::draw::Operation;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tiny_skia::Color;

/// Keyword arguments of one drawing call.
///
/// Locations are geographic: `points` is a list of `[lat, lon]` pairs, `x` is
/// a longitude and `y` a latitude. Everything else is styling handed to the
/// rasterizer (`color`, `width`, `filled`, `aa`, `r`, `d1`, `d2`, `text`,
/// `font`, `size`, `halign`, `valign`, filter options) plus the optional
/// per-call `min_level` / `max_level`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawArgs(Map<String, Value>);

impl DrawArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object; `null` is treated as no arguments
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(MapError::argument(
                "draw",
                "args",
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// Adds or replaces one argument
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Sets `points` from geographic coordinates
    pub fn with_points(self, points: &[LatLng]) -> Self {
        let list: Vec<Value> = points
            .iter()
            .map(|p| Value::from(vec![p.lat, p.lng]))
            .collect();
        self.with("points", list)
    }

    /// Sets `x` / `y` from one geographic coordinate
    pub fn with_location(self, location: LatLng) -> Self {
        self.with("x", location.lng).with("y", location.lat)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The `points` list, if present
    pub fn points(&self, op: Operation) -> Result<Option<Vec<LatLng>>> {
        let Some(value) = self.get("points") else {
            return Ok(None);
        };
        let list = value
            .as_array()
            .ok_or_else(|| MapError::argument(op.name(), "points", "expected a list of [lat, lon]"))?;

        let mut points = Vec::with_capacity(list.len());
        for item in list {
            points.push(parse_latlng(item).ok_or_else(|| {
                MapError::argument(op.name(), "points", format!("{} is not a [lat, lon] pair", item))
            })?);
        }
        Ok(Some(points))
    }

    /// The single location of a call: `x`/`y` when both are given, else the
    /// first entry of `points`
    pub fn location(&self, op: Operation) -> Result<Option<LatLng>> {
        let lon = self.number(op, "x")?;
        let lat = self.number(op, "y")?;
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Some(LatLng::new(lat, lon))),
            (None, None) => Ok(self.points(op)?.and_then(|p| p.first().copied())),
            _ => Err(MapError::argument(
                op.name(),
                if lat.is_none() { "y" } else { "x" },
                "x and y must be given together",
            )),
        }
    }

    pub fn number(&self, op: Operation, key: &'static str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| MapError::argument(op.name(), key, format!("expected a number, got {}", value))),
        }
    }

    pub fn number_or(&self, op: Operation, key: &'static str, default: f64) -> Result<f64> {
        Ok(self.number(op, key)?.unwrap_or(default))
    }

    pub fn flag(&self, op: Operation, key: &'static str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64().map_or(false, |n| n != 0.0))),
            Some(other) => Err(MapError::argument(
                op.name(),
                key,
                format!("expected a boolean, got {}", other),
            )),
        }
    }

    pub fn text(&self, op: Operation, key: &'static str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(MapError::argument(
                op.name(),
                key,
                format!("expected a string, got {}", other),
            )),
        }
    }

    pub fn color(&self, op: Operation, key: &'static str) -> Result<Option<Color>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse_color(value)
                .map(Some)
                .ok_or_else(|| MapError::argument(op.name(), key, format!("unrecognised colour {}", value))),
        }
    }

    /// A zoom level argument such as `min_level`
    pub fn level(&self, op: Operation, key: &'static str) -> Result<Option<u8>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| MapError::argument(op.name(), key, format!("expected a zoom level, got {}", value))),
        }
    }
}

impl From<Map<String, Value>> for DrawArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn parse_latlng(value: &Value) -> Option<LatLng> {
    match value {
        Value::Array(pair) if pair.len() == 2 => {
            let lat = pair[0].as_f64()?;
            let lon = pair[1].as_f64()?;
            (lat.is_finite() && lon.is_finite()).then(|| LatLng::new(lat, lon))
        }
        Value::Object(obj) => {
            let lat = obj.get("lat")?.as_f64()?;
            let lon = obj.get("lng").or_else(|| obj.get("lon"))?.as_f64()?;
            (lat.is_finite() && lon.is_finite()).then(|| LatLng::new(lat, lon))
        }
        _ => None,
    }
}

/// Parses `"#rrggbb"`, `"#rrggbbaa"`, a colour name or `[r, g, b(, a)]`
pub fn parse_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(s) => parse_color_str(s),
        Value::Array(parts) if parts.len() == 3 || parts.len() == 4 => {
            let mut channels = [255u8; 4];
            for (channel, part) in channels.iter_mut().zip(parts) {
                *channel = u8::try_from(part.as_u64()?).ok()?;
            }
            let [r, g, b, a] = channels;
            Some(Color::from_rgba8(r, g, b, a))
        }
        _ => None,
    }
}

fn parse_color_str(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        return Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, alpha));
    }

    let rgba = match s.to_ascii_lowercase().as_str() {
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "red" => (255, 0, 0, 255),
        "green" => (0, 128, 0, 255),
        "lime" => (0, 255, 0, 255),
        "blue" => (0, 0, 255, 255),
        "yellow" => (255, 255, 0, 255),
        "cyan" => (0, 255, 255, 255),
        "magenta" => (255, 0, 255, 255),
        "orange" => (255, 165, 0, 255),
        "grey" | "gray" => (128, 128, 128, 255),
        "transparent" => (0, 0, 0, 0),
        _ => return None,
    };
    Some(Color::from_rgba8(rgba.0, rgba.1, rgba.2, rgba.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_points_and_location() {
        let args = DrawArgs::from_value(json!({"points": [[51.5, -0.1], [48.8, 2.3]]})).unwrap();
        let points = args.points(Operation::Line).unwrap().unwrap();
        assert_eq!(points, vec![LatLng::new(51.5, -0.1), LatLng::new(48.8, 2.3)]);
        assert_eq!(args.location(Operation::Circle).unwrap(), Some(LatLng::new(51.5, -0.1)));

        let args = DrawArgs::new().with_location(LatLng::new(10.0, 20.0));
        assert_eq!(args.location(Operation::Circle).unwrap(), Some(LatLng::new(10.0, 20.0)));
        assert_eq!(DrawArgs::new().location(Operation::Circle).unwrap(), None);
    }

    #[test]
    fn test_half_location_is_rejected() {
        let args = DrawArgs::new().with("x", 3.0);
        match args.location(Operation::Circle) {
            Err(MapError::InvalidArgument { key, .. }) => assert_eq!(key, "y"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_points() {
        let args = DrawArgs::new().with("points", json!([[1.0]]));
        assert!(args.points(Operation::Polygon).is_err());
        assert!(DrawArgs::from_value(json!([1, 2])).is_err());
        assert!(DrawArgs::from_value(Value::Null).unwrap().as_map().is_empty());
    }

    #[test]
    fn test_colours() {
        assert_eq!(parse_color(&json!("#ff0000")), Some(Color::from_rgba8(255, 0, 0, 255)));
        assert_eq!(parse_color(&json!("#00ff0080")), Some(Color::from_rgba8(0, 255, 0, 128)));
        assert_eq!(parse_color(&json!("Blue")), Some(Color::from_rgba8(0, 0, 255, 255)));
        assert_eq!(parse_color(&json!([1, 2, 3])), Some(Color::from_rgba8(1, 2, 3, 255)));
        assert_eq!(parse_color(&json!("#12345")), None);
        assert_eq!(parse_color(&json!([1, 2, 300])), None);
    }

    #[test]
    fn test_typed_accessors() {
        let args = DrawArgs::from_value(json!({
            "width": 3, "filled": 1, "text": "hi", "min_level": 4, "max_level": 300, "r": "big"
        }))
        .unwrap();
        assert_eq!(args.number(Operation::Line, "width").unwrap(), Some(3.0));
        assert_eq!(args.flag(Operation::Box, "filled").unwrap(), Some(true));
        assert_eq!(args.text(Operation::String, "text").unwrap(), Some("hi"));
        assert_eq!(args.level(Operation::Line, "min_level").unwrap(), Some(4));
        assert!(args.level(Operation::Line, "max_level").is_err());
        assert!(args.number(Operation::Circle, "r").is_err());
        assert_eq!(args.number_or(Operation::Circle, "missing", 2.5).unwrap(), 2.5);
    }
}
