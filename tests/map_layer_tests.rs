use maplayer::{
    core::{bounds::Bounds, geo::latlon_to_pixel},
    draw::shape::{Shape, Style},
    DrawArgs, LatLng, LayerConfig, MapError, MapLayer, Operation, PixelCoord,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use tiny_skia::Pixmap;

/// Integration tests driving a whole layer the way a job file would
#[cfg(test)]
mod map_layer_tests {
    use super::*;

    fn config(dir: &Path, min: u8, max: u8) -> LayerConfig {
        LayerConfig {
            base_dir: dir.to_path_buf(),
            min_level: min,
            max_level: max,
            ..LayerConfig::default()
        }
    }

    /// File name -> bytes of every tile in a directory
    fn tiles_on_disk(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                (name, std::fs::read(&path).unwrap())
            })
            .collect()
    }

    fn pixel(dir: &Path, key: &str, x: u32, y: u32) -> [u8; 4] {
        let image = image::open(dir.join(format!("{}.png", key))).unwrap().to_rgba8();
        image.get_pixel(x, y).0
    }

    fn solid(color: &str) -> DrawArgs {
        DrawArgs::new().with("color", color).with("aa", false)
    }

    #[test]
    fn test_circle_writes_tiles_only_on_configured_levels() {
        let dir = TempDir::new().unwrap();
        MapLayer::scoped(config(dir.path(), 1, 2), |layer| {
            layer.circle(LatLng::new(10.0, 10.0), 5.0, solid("black").with("filled", true))
        })
        .unwrap();

        let tiles = tiles_on_disk(dir.path());
        assert!(!tiles.is_empty());
        for name in tiles.keys() {
            let stem = name.trim_end_matches(".png");
            assert!(stem.len() == 1 || stem.len() == 2, "unexpected tile {}", name);
        }
        assert!(tiles.keys().any(|n| n.len() == "0.png".len()));
        assert!(tiles.keys().any(|n| n.len() == "00.png".len()));
    }

    #[test]
    fn test_call_levels_narrow_the_layer() {
        let dir = TempDir::new().unwrap();
        let mut layer = MapLayer::new(config(dir.path(), 1, 3)).unwrap();
        let touched = layer
            .draw(
                "circle",
                json!({"y": 10.0, "x": 10.0, "r": 4, "filled": true, "min_level": 2, "max_level": 2}),
            )
            .unwrap();
        assert!(touched > 0);

        let outside = layer
            .draw("circle", json!({"y": 10.0, "x": 10.0, "r": 4, "min_level": 9}))
            .unwrap();
        assert_eq!(outside, 0);
        layer.close().unwrap();

        for name in tiles_on_disk(dir.path()).keys() {
            assert_eq!(name.len(), "00.png".len(), "only zoom 2 was drawn: {}", name);
        }
    }

    #[test]
    fn test_eviction_does_not_change_output() {
        let draw = |in_memory: u64| {
            let dir = TempDir::new().unwrap();
            let config = LayerConfig {
                in_memory,
                ..config(dir.path(), 1, 3)
            };
            MapLayer::scoped(config, |layer| {
                let a = LatLng::new(20.0, -10.0);
                let b = LatLng::new(-20.0, 10.0);
                layer.line(a, b, solid("red").with("width", 3))?;
                layer.line(LatLng::new(-20.0, -10.0), LatLng::new(20.0, 10.0), solid("blue"))?;
                layer.circle(LatLng::new(0.0, 0.0), 6.0, solid("green").with("filled", true))?;
                layer.draw_box(a, b, solid("black"))
            })
            .unwrap();
            tiles_on_disk(dir.path())
        };

        let evicting = draw(0);
        let resident = draw(60);
        assert!(!evicting.is_empty());
        assert_eq!(evicting.keys().collect::<Vec<_>>(), resident.keys().collect::<Vec<_>>());
        for (name, bytes) in &evicting {
            assert!(bytes == &resident[name], "tile {} differs", name);
        }
    }

    #[test]
    fn test_line_is_continuous_across_tiles() {
        let dir = TempDir::new().unwrap();
        MapLayer::scoped(config(dir.path(), 1, 1), |layer| {
            layer.line(LatLng::new(20.0, -10.0), LatLng::new(20.0, 10.0), solid("black"))
        })
        .unwrap();

        let row = (latlon_to_pixel(1, 20.0, 0.0).y % 256) as u32;
        assert_eq!(pixel(dir.path(), "0", 255, row), [0, 0, 0, 255]);
        assert_eq!(pixel(dir.path(), "1", 0, row), [0, 0, 0, 255]);
        assert_eq!(pixel(dir.path(), "1", 0, row + 1)[3], 0);
    }

    #[test]
    fn test_layer_tiles_match_a_single_canvas() {
        let dir = TempDir::new().unwrap();
        let config = LayerConfig {
            in_memory: 60,
            ..config(dir.path(), 3, 3)
        };
        let mut layer = MapLayer::new(config).unwrap();
        let ring = [
            LatLng::new(60.0, -150.0),
            LatLng::new(40.0, 120.0),
            LatLng::new(-55.0, 60.0),
            LatLng::new(-20.0, -100.0),
        ];
        let diagonal = [LatLng::new(70.0, -170.0), LatLng::new(-70.0, 165.0)];
        let calls = [
            (
                Operation::Polygon,
                DrawArgs::new().with_points(&ring).with("filled", true).with("color", "#3366cc80"),
            ),
            (Operation::Polygon, DrawArgs::new().with_points(&ring).with("width", 3)),
            (Operation::Line, DrawArgs::new().with_points(&diagonal).with("width", 2)),
            (
                Operation::Circle,
                DrawArgs::new()
                    .with_location(LatLng::new(5.0, 10.0))
                    .with("r", 600.0)
                    .with("color", "red")
                    .with("aa", false),
            ),
        ];

        let mut canvas = Pixmap::new(2048, 2048).unwrap();
        let combine = layer.config().combine;
        for (op, args) in &calls {
            layer.dispatch(*op, args).unwrap();
            let shape = Shape::from_call(*op, args, 3, LatLng::default()).unwrap();
            let style = Style::from_args(*op, args, combine).unwrap();
            shape.render(&mut canvas, PixelCoord::new(0, 0), 3, &style);
        }

        let level = layer.level_mut(3).unwrap();
        for tile in Bounds::from_coords(0.0, 0.0, 2048.0, 2048.0).tile_range(3) {
            let origin = tile.pixel_origin();
            let key = tile.quad_key();
            let buffer = level.cache_mut().get_or_create(&key).unwrap().buffer().unwrap();
            for y in 0..256 {
                for x in 0..256 {
                    let (cx, cy) = (origin.x as u32 + x, origin.y as u32 + y);
                    assert_eq!(buffer.pixel(x, y), canvas.pixel(cx, cy), "canvas ({}, {})", cx, cy);
                }
            }
        }
    }

    #[cfg(feature = "text")]
    #[test]
    fn test_text_is_drawn_into_tiles() {
        let font = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/DejaVuSansMono-Oblique.ttf");
        let dir = TempDir::new().unwrap();
        let mut layer = MapLayer::new(config(dir.path(), 2, 2)).unwrap();
        let style = || DrawArgs::new().with("font", font).with("size", 40.0);

        // Zoom 2 puts the anchor on the corner of four tiles
        let at = LatLng::new(0.0, 0.0);
        let left = layer.string(at, "Wolf", style()).unwrap();
        assert!(left >= 1 && left < 4, "left-aligned text touched {} tiles", left);
        let centred = layer.align_string(at, "Wolf", style()).unwrap();
        assert_eq!(centred, 4);

        assert!(matches!(
            layer.string(at, "Wolf", DrawArgs::new()),
            Err(MapError::InvalidArgument { key: "font", .. })
        ));
        layer.close().unwrap();
        assert_eq!(tiles_on_disk(dir.path()).len(), 4);
    }

    #[test]
    fn test_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = LayerConfig {
            in_memory: 60,
            ..config(dir.path(), 2, 2)
        };
        let mut layer = MapLayer::new(config).unwrap();
        layer
            .line(LatLng::new(40.0, -100.0), LatLng::new(40.0, 100.0), DrawArgs::new())
            .unwrap();

        let written = layer.save().unwrap();
        assert!(written > 0);
        let before = tiles_on_disk(dir.path());
        assert_eq!(layer.save().unwrap(), 0);
        layer.close().unwrap();
        assert_eq!(tiles_on_disk(dir.path()), before);
    }

    #[test]
    fn test_existing_tiles_are_kept_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let first = LatLng::new(20.0, 20.0);
        let second = LatLng::new(30.0, 30.0);
        let local = |at: LatLng| {
            let p = latlon_to_pixel(1, at.lat, at.lng);
            ((p.x % 256) as u32, (p.y % 256) as u32)
        };

        MapLayer::scoped(config(dir.path(), 1, 1), |layer| layer.setpixel(first, solid("red"))).unwrap();

        let keep = LayerConfig {
            overwrite: false,
            ..config(dir.path(), 1, 1)
        };
        MapLayer::scoped(keep, |layer| layer.setpixel(second, solid("blue"))).unwrap();

        let (x, y) = local(first);
        assert_eq!(pixel(dir.path(), "1", x, y), [255, 0, 0, 255]);
        let (x, y) = local(second);
        assert_eq!(pixel(dir.path(), "1", x, y), [0, 0, 255, 255]);

        MapLayer::scoped(config(dir.path(), 1, 1), |layer| layer.setpixel(second, solid("blue"))).unwrap();
        let (x, y) = local(first);
        assert_eq!(pixel(dir.path(), "1", x, y)[3], 0, "overwrite starts from a blank tile");
    }

    #[test]
    fn test_colourise_maps_dark_pixels_to_the_hot_end() {
        let dir = TempDir::new().unwrap();
        MapLayer::scoped(config(dir.path(), 1, 1), |layer| {
            layer.setpixel(LatLng::new(20.0, 20.0), solid("black"))?;
            layer.draw("colourise", json!({}))
        })
        .unwrap();

        let p = latlon_to_pixel(1, 20.0, 20.0);
        assert_eq!(
            pixel(dir.path(), "1", (p.x % 256) as u32, (p.y % 256) as u32),
            [255, 0, 0, 255]
        );
    }

    #[test]
    fn test_call_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        let mut layer = MapLayer::new(config(dir.path(), 1, 2)).unwrap();

        assert!(matches!(layer.draw("spiral", json!({})), Err(MapError::UnknownOperation(_))));
        assert!(matches!(
            layer.draw("line", json!({"points": [[0, 0]]})),
            Err(MapError::InvalidArgument { key: "points", .. })
        ));
        assert!(matches!(
            layer.draw("circle", json!({"r": -1})),
            Err(MapError::InvalidArgument { key: "r", .. })
        ));
        assert!(matches!(
            layer.draw("filter", json!({"type": "sepia"})),
            Err(MapError::InvalidArgument { key: "type", .. })
        ));
        layer.close().unwrap();
        assert!(tiles_on_disk(dir.path()).is_empty());
    }

    #[test]
    fn test_configuration_errors() {
        let dir = TempDir::new().unwrap();
        let bad_range = MapLayer::new(config(dir.path(), 0, 4)).unwrap_err();
        assert!(bad_range.is_configuration());

        let missing_dir = MapLayer::new(config(&dir.path().join("missing"), 1, 2)).unwrap_err();
        assert!(matches!(missing_dir, MapError::Config { field: "base_dir", .. }));

        let parsed: Result<LayerConfig, _> =
            serde_json::from_value(json!({"combine": "sparkle"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_builder_creates_a_working_layer() {
        let dir = TempDir::new().unwrap();
        let mut layer = MapLayer::builder()
            .with_base_dir(dir.path())
            .with_zoom_range(3, 4)
            .build()
            .unwrap();
        layer.setpixel(LatLng::new(0.5, 0.5), DrawArgs::new()).unwrap();
        layer.close().unwrap();
        assert_eq!(tiles_on_disk(dir.path()).len(), 2);
    }
}
