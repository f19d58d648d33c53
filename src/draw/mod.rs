//! Drawing operations and the machinery behind them
//!
//! Every public drawing call is identified by an [`Operation`]. The static
//! operation table maps the wire name of a call to its operation, and
//! [`Operation::strategy`] tells a level how to fan the call out over tiles.

pub mod args;
pub mod clip;
pub mod filter;
pub mod palette;
pub mod shape;
pub mod text;

use crate::MapError;
use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A drawing call understood by layers and levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operation {
    SetPixel,
    Line,
    Box,
    Polyline,
    Polygon,
    Arc,
    Circle,
    FloodFill,
    String,
    AlignString,
    Filter,
    Colourise,
    RadialCircle,
}

/// How a level turns one call into work on its tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Project the geometry, enumerate the tiles it touches, rasterize per tile
    Geometric,
    /// Metric radius converted per zoom, then rendered like [`Strategy::Geometric`]
    Radial,
    /// Palette remap of every tile of the level
    Colourise,
    /// Image filter over every tile of the level
    Filter,
}

static OPERATIONS: Lazy<FxHashMap<&'static str, Operation>> = Lazy::new(|| {
    let mut table = FxHashMap::default();
    for op in Operation::ALL {
        table.insert(op.name(), op);
    }
    table.insert("colorise", Operation::Colourise);
    table.insert("colorize", Operation::Colourise);
    table.insert("colourize", Operation::Colourise);
    table.insert("rectangle", Operation::Box);
    table
});

impl Operation {
    pub const ALL: [Operation; 13] = [
        Self::SetPixel,
        Self::Line,
        Self::Box,
        Self::Polyline,
        Self::Polygon,
        Self::Arc,
        Self::Circle,
        Self::FloodFill,
        Self::String,
        Self::AlignString,
        Self::Filter,
        Self::Colourise,
        Self::RadialCircle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetPixel => "setpixel",
            Self::Line => "line",
            Self::Box => "box",
            Self::Polyline => "polyline",
            Self::Polygon => "polygon",
            Self::Arc => "arc",
            Self::Circle => "circle",
            Self::FloodFill => "flood_fill",
            Self::String => "string",
            Self::AlignString => "align_string",
            Self::Filter => "filter",
            Self::Colourise => "colourise",
            Self::RadialCircle => "radial_circle",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Self::RadialCircle => Strategy::Radial,
            Self::Colourise => Strategy::Colourise,
            Self::Filter => Strategy::Filter,
            _ => Strategy::Geometric,
        }
    }

    /// Looks up an operation by its wire name
    pub fn lookup(name: &str) -> Option<Operation> {
        OPERATIONS.get(name.trim().to_ascii_lowercase().as_str()).copied()
    }
}

impl FromStr for Operation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| MapError::UnknownOperation(s.to_string()))
    }
}

impl TryFrom<String> for Operation {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.name().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_operation_is_in_the_table() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert_eq!("Colorise".parse::<Operation>().unwrap(), Operation::Colourise);
    }

    #[test]
    fn test_unknown_operation() {
        match "explode".parse::<Operation>() {
            Err(MapError::UnknownOperation(name)) => assert_eq!(name, "explode"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strategies() {
        let geometric = Operation::ALL
            .iter()
            .filter(|op| op.strategy() == Strategy::Geometric)
            .count();
        assert_eq!(geometric, 10);
        assert_eq!(Operation::RadialCircle.strategy(), Strategy::Radial);
        assert_eq!(Operation::Filter.strategy(), Strategy::Filter);
    }

    #[test]
    fn test_operation_serde() {
        let op: Operation = serde_json::from_str("\"flood_fill\"").unwrap();
        assert_eq!(op, Operation::FloodFill);
        assert_eq!(serde_json::to_string(&Operation::AlignString).unwrap(), "\"align_string\"");
    }
}
