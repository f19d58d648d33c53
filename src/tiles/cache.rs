use crate::core::constants::TILE_EXTENSION;
use crate::core::geo::QuadKey;
use crate::tiles::tile::{Tile, TileOptions};
use crate::{MapError, Result};
use fxhash::FxHashSet;
use lru::LruCache;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CacheEntry {
    tile: Tile,
    last_touch: Instant,
}

/// Registry of the resident tiles of one zoom level.
///
/// Entries are kept in least-recently-touched order, so expiry only ever
/// inspects the tail. With a zero `in_memory` timeout every tile touched by a
/// drawing call is saved and evicted once the call completes; otherwise a tile
/// stays until the timeout passed since its last touch and is evicted on the
/// next cache access. Eviction always saves first.
#[derive(Debug)]
pub struct TileCache {
    zoom: u8,
    base_dir: PathBuf,
    options: TileOptions,
    in_memory: Duration,
    tiles: LruCache<QuadKey, CacheEntry>,
    /// Keys whose buffer was materialized at least once in this session
    materialized: FxHashSet<QuadKey>,
}

impl TileCache {
    /// Create an empty cache for the tiles of `zoom` stored under `base_dir`
    pub fn new(zoom: u8, base_dir: PathBuf, options: TileOptions, in_memory: Duration) -> Self {
        Self {
            zoom,
            base_dir,
            options,
            in_memory,
            tiles: LruCache::unbounded(),
            materialized: FxHashSet::default(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the resident tile for `key`, creating it on first access.
    ///
    /// A tile that was already materialized earlier in this session is
    /// recreated without `overwrite`, so it reloads what it saved on eviction.
    pub fn get_or_create(&mut self, key: &QuadKey) -> Result<&mut Tile> {
        if key.zoom() != self.zoom {
            return Err(MapError::InvalidQuadKey(format!(
                "'{}' belongs to zoom {}, cache holds zoom {}",
                key,
                key.zoom(),
                self.zoom
            )));
        }

        let now = Instant::now();
        if !self.tiles.contains(key) {
            let mut options = self.options;
            if self.materialized.contains(key) {
                options.overwrite = false;
            }
            log::debug!("creating tile {} (overwrite: {})", key, options.overwrite);
            let tile = Tile::new(key.clone(), &self.base_dir, options);
            self.tiles.put(
                key.clone(),
                CacheEntry {
                    tile,
                    last_touch: now,
                },
            );
        }

        self.materialized.insert(key.clone());
        let entry = self
            .tiles
            .get_mut(key)
            .ok_or_else(|| MapError::InvalidQuadKey(format!("tile {} vanished from cache", key)))?;
        entry.last_touch = now;
        Ok(&mut entry.tile)
    }

    /// End-of-call hook for the tiles a drawing call touched
    pub fn release(&mut self, touched: &[QuadKey]) -> Result<()> {
        if !self.in_memory.is_zero() {
            return Ok(());
        }
        for key in touched {
            self.evict(key)?;
        }
        Ok(())
    }

    /// Evicts every tile whose timeout elapsed
    pub fn evict_expired(&mut self) -> Result<usize> {
        self.evict_expired_at(Instant::now())
    }

    /// Evicts every tile whose timeout elapsed at `now`
    pub fn evict_expired_at(&mut self, now: Instant) -> Result<usize> {
        let mut evicted = 0;
        loop {
            let key = match self.tiles.peek_lru() {
                Some((key, entry))
                    if now.saturating_duration_since(entry.last_touch) >= self.in_memory =>
                {
                    key.clone()
                }
                _ => break,
            };
            self.evict(&key)?;
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!("evicted {} expired tiles at zoom {}", evicted, self.zoom);
        }
        Ok(evicted)
    }

    /// Saves and drops one tile; a failed save leaves it resident
    pub fn evict(&mut self, key: &QuadKey) -> Result<bool> {
        let Some(entry) = self.tiles.peek_mut(key) else {
            return Ok(false);
        };
        entry.tile.save()?;
        self.tiles.pop(key);
        log::debug!("evicted tile {}", key);
        Ok(true)
    }

    /// Saves every resident tile
    pub fn save_all(&mut self) -> Result<usize> {
        let mut written = 0;
        for (_, entry) in self.tiles.iter_mut() {
            if entry.tile.save()? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Saves the resident tiles that opted into autosave
    pub fn autosave_all(&mut self) -> Result<usize> {
        if !self.options.autosave {
            return Ok(0);
        }
        self.save_all()
    }

    pub fn contains(&self, key: &QuadKey) -> bool {
        self.tiles.contains(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Keys currently resident, in quad key order
    pub fn resident_keys(&self) -> Vec<QuadKey> {
        let mut keys: Vec<QuadKey> = self.tiles.iter().map(|(key, _)| key.clone()).collect();
        keys.sort();
        keys
    }

    /// Whether the key was materialized during this session
    pub fn was_materialized(&self, key: &QuadKey) -> bool {
        self.materialized.contains(key)
    }

    /// Keys of this zoom with a tile file in the base directory, sorted
    pub fn persisted_keys(&self) -> Result<Vec<QuadKey>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.len() != self.zoom as usize {
                continue;
            }
            if let Ok(key) = stem.parse::<QuadKey>() {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiny_skia::{Color, Paint, Rect, Transform};

    fn key(s: &str) -> QuadKey {
        s.parse().unwrap()
    }

    fn cache(dir: &TempDir, in_memory: u64) -> TileCache {
        TileCache::new(
            2,
            dir.path().to_path_buf(),
            TileOptions::default(),
            Duration::from_secs(in_memory),
        )
    }

    fn paint(tile: &mut Tile, x: f32, alpha: u8) {
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(0, 0, 0, alpha));
        let rect = Rect::from_xywh(x, 0.0, 4.0, 4.0).unwrap();
        tile.buffer_mut()
            .unwrap()
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    #[test]
    fn test_single_live_tile_per_key() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 60);

        paint(cache.get_or_create(&key("01")).unwrap(), 0.0, 255);
        let tile = cache.get_or_create(&key("01")).unwrap();
        assert!(tile.is_dirty(), "same tile returned");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rejects_foreign_zoom() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 0);
        assert!(cache.get_or_create(&key("012")).is_err());
    }

    #[test]
    fn test_zero_timeout_evicts_on_release() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 0);

        paint(cache.get_or_create(&key("01")).unwrap(), 0.0, 255);
        cache.release(&[key("01")]).unwrap();

        assert!(cache.is_empty());
        assert!(dir.path().join("01.png").exists());
    }

    #[test]
    fn test_reload_after_eviction_keeps_pixels() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 0);

        paint(cache.get_or_create(&key("01")).unwrap(), 0.0, 255);
        cache.release(&[key("01")]).unwrap();

        // Overwrite is configured, but the file is ours from this session
        let tile = cache.get_or_create(&key("01")).unwrap();
        paint(tile, 10.0, 255);
        let pixmap = tile.buffer().unwrap();
        assert_eq!(pixmap.pixel(1, 1).unwrap().alpha(), 255);
        assert_eq!(pixmap.pixel(11, 1).unwrap().alpha(), 255);
    }

    #[test]
    fn test_timeout_eviction_is_lazy() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 30);

        paint(cache.get_or_create(&key("00")).unwrap(), 0.0, 255);
        cache.release(&[key("00")]).unwrap();
        assert_eq!(cache.len(), 1, "still resident before the timeout");

        assert_eq!(cache.evict_expired_at(Instant::now()).unwrap(), 0);
        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(cache.evict_expired_at(later).unwrap(), 1);
        assert!(cache.is_empty());
        assert!(dir.path().join("00.png").exists(), "saved before eviction");
    }

    #[test]
    fn test_expiry_follows_last_touch() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 30);

        cache.get_or_create(&key("00")).unwrap();
        cache.get_or_create(&key("01")).unwrap();
        // Touch "00" again so "01" becomes the oldest
        cache.get_or_create(&key("00")).unwrap();
        assert_eq!(cache.tiles.peek_lru().map(|(k, _)| k.clone()), Some(key("01")));

        let later = Instant::now() + Duration::from_secs(60);
        assert_eq!(cache.evict_expired_at(later).unwrap(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_all_and_persisted_keys() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir, 60);

        paint(cache.get_or_create(&key("10")).unwrap(), 0.0, 255);
        paint(cache.get_or_create(&key("23")).unwrap(), 0.0, 128);
        cache.get_or_create(&key("33")).unwrap();

        assert_eq!(cache.save_all().unwrap(), 2);
        assert_eq!(cache.save_all().unwrap(), 0, "nothing new to write");

        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("012.png"), b"x").unwrap();
        assert_eq!(cache.persisted_keys().unwrap(), vec![key("10"), key("23")]);
        assert_eq!(cache.resident_keys(), vec![key("10"), key("23"), key("33")]);
    }

    #[test]
    fn test_drop_autosaves() {
        let dir = TempDir::new().unwrap();
        {
            let mut cache = cache(&dir, 60);
            paint(cache.get_or_create(&key("32")).unwrap(), 0.0, 255);
        }
        assert!(dir.path().join("32.png").exists());
    }
}
