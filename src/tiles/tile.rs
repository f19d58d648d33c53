//! A single 256×256 raster tile addressed by quad key

use crate::core::constants::{TILE_EXTENSION, TILE_SIZE};
use crate::core::geo::{self, PixelCoord, Point, QuadKey, TileCoord};
use crate::{MapError, Result};
use image::{ImageFormat, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};
use tiny_skia::{ColorU8, Pixmap};

/// Persistence flags every tile of a level shares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOptions {
    /// Ignore and delete a file left by an earlier run instead of loading it
    pub overwrite: bool,
    /// Save on release
    pub autosave: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            autosave: true,
        }
    }
}

/// One raster unit of a level.
///
/// The pixel buffer is materialized on first access: loaded from
/// `<base_dir>/<quadKey>.png` or allocated fully transparent. Modifications
/// mark the tile dirty; a dirty tile with `autosave` is saved when dropped.
#[derive(Debug)]
pub struct Tile {
    key: QuadKey,
    coord: TileCoord,
    origin: PixelCoord,
    path: PathBuf,
    options: TileOptions,
    buffer: Option<Pixmap>,
    dirty: bool,
}

impl Tile {
    /// Creates a tile without touching the filesystem
    pub fn new(key: QuadKey, base_dir: &Path, options: TileOptions) -> Self {
        let coord = key.tile_coord();
        let path = tile_path(base_dir, &key);
        Self {
            origin: coord.pixel_origin(),
            coord,
            key,
            path,
            options,
            buffer: None,
            dirty: false,
        }
    }

    /// Parses and validates `key` before creating the tile
    pub fn from_str_key(key: &str, base_dir: &Path, options: TileOptions) -> Result<Self> {
        Ok(Self::new(key.parse()?, base_dir, options))
    }

    pub fn key(&self) -> &QuadKey {
        &self.key
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn zoom(&self) -> u8 {
        self.coord.z
    }

    /// Canvas position of the tile's top-left pixel
    pub fn pixel_origin(&self) -> PixelCoord {
        self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> TileOptions {
        self.options
    }

    pub fn is_materialized(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read access to the pixels, materializing them if needed
    pub fn buffer(&mut self) -> Result<&Pixmap> {
        self.materialize()?;
        self.buffer.as_ref().ok_or_else(missing_buffer)
    }

    /// Write access to the pixels; marks the tile dirty
    pub fn buffer_mut(&mut self) -> Result<&mut Pixmap> {
        self.materialize()?;
        self.dirty = true;
        self.buffer.as_mut().ok_or_else(missing_buffer)
    }

    fn materialize(&mut self) -> Result<()> {
        if self.buffer.is_some() {
            return Ok(());
        }

        let exists = self.path.is_file();
        let pixmap = if exists && !self.options.overwrite {
            log::debug!("loading tile {} from {}", self.key, self.path.display());
            load_pixmap(&self.path)?
        } else {
            if exists {
                match std::fs::remove_file(&self.path) {
                    Ok(()) => log::debug!("removed stale tile {}", self.path.display()),
                    Err(e) => log::warn!(
                        "could not remove stale tile {}: {}",
                        self.path.display(),
                        e
                    ),
                }
            }
            blank_pixmap()?
        };

        self.buffer = Some(pixmap);
        Ok(())
    }

    /// Writes the tile to disk if it holds unsaved, non-blank pixels.
    ///
    /// Returns whether a file was written. A blank dirty tile removes a file it
    /// was previously saved to, so disk content keeps matching the buffer.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let Some(pixmap) = self.buffer.as_ref() else {
            self.dirty = false;
            return Ok(false);
        };

        if is_blank(pixmap) {
            if self.path.is_file() {
                log::debug!("tile {} is blank, removing {}", self.key, self.path.display());
                match std::fs::remove_file(&self.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            self.dirty = false;
            return Ok(false);
        }

        let image = pixmap_to_image(pixmap);
        image
            .save_with_format(&self.path, ImageFormat::Png)
            .map_err(|source| MapError::TileSave {
                path: self.path.clone(),
                source,
            })?;
        log::debug!("saved tile {} to {}", self.key, self.path.display());
        self.dirty = false;
        Ok(true)
    }

    /// Canvas pixel of a geographic point at this tile's zoom
    pub fn latlon_to_pixel(&self, lat: f64, lon: f64) -> PixelCoord {
        geo::latlon_to_pixel(self.zoom(), lat, lon)
    }

    /// Tile-local pixel of a geographic point; may fall outside the tile
    pub fn latlon_to_local(&self, lat: f64, lon: f64) -> PixelCoord {
        let pixel = self.latlon_to_pixel(lat, lon);
        PixelCoord::new(pixel.x - self.origin.x, pixel.y - self.origin.y)
    }

    /// Translates a canvas point into this tile's local space
    pub fn to_local(&self, point: Point) -> Point {
        point.subtract(&self.origin.to_point())
    }
}

impl Drop for Tile {
    fn drop(&mut self) {
        if self.options.autosave && self.dirty {
            if let Err(e) = self.save() {
                log::error!("autosave of tile {} failed: {}", self.key, e);
            }
        }
    }
}

/// Deterministic file location of a tile
pub fn tile_path(base_dir: &Path, key: &QuadKey) -> PathBuf {
    base_dir.join(format!("{}.{}", key, TILE_EXTENSION))
}

fn missing_buffer() -> MapError {
    MapError::Io(io::Error::new(
        io::ErrorKind::Other,
        "tile buffer missing after materialization",
    ))
}

/// A fully transparent tile-sized buffer
pub fn blank_pixmap() -> Result<Pixmap> {
    Pixmap::new(TILE_SIZE, TILE_SIZE).ok_or_else(|| {
        MapError::Io(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "could not allocate tile buffer",
        ))
    })
}

/// True when no pixel has any coverage
pub fn is_blank(pixmap: &Pixmap) -> bool {
    pixmap.pixels().iter().all(|p| p.alpha() == 0)
}

/// Straight-alpha copy of a premultiplied buffer
pub fn pixmap_to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}

/// Writes a straight-alpha image back into a buffer of the same size
pub fn image_into_pixmap(image: &RgbaImage, pixmap: &mut Pixmap) {
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
}

fn load_pixmap(path: &Path) -> Result<Pixmap> {
    let load_error = |source| MapError::TileLoad {
        path: path.to_path_buf(),
        source,
    };
    let image = image::open(path).map_err(load_error)?.to_rgba8();
    if image.dimensions() != (TILE_SIZE, TILE_SIZE) {
        return Err(load_error(image::ImageError::Parameter(
            image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ),
        )));
    }

    let mut pixmap = blank_pixmap()?;
    image_into_pixmap(&image, &mut pixmap);
    Ok(pixmap)
}
