pub mod cache;
pub mod tile;

// Re-exports for convenience
pub use cache::TileCache;
pub use tile::{Tile, TileOptions};
