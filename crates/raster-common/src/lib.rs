//! Common types shared across the raster viewer crates.

pub mod bbox;
pub mod color;
pub mod error;
pub mod layer;
pub mod raster;
pub mod tile;

pub use bbox::BoundingBox;
pub use color::{hex_to_rgb, Rgb, FALLBACK_GRAY};
pub use error::{ViewerError, ViewerResult};
pub use layer::{LayerId, LayerKind};
pub use raster::{NoDataValues, RasterDataset};
pub use tile::{TileCoord, TileRequest, MAX_TILE_ZOOM};
