//! Slippy-map tile addressing.
//!
//! Tiles follow the XYZ / Web Mercator scheme used by web map clients:
//! `2^z` columns and rows, origin at the top-left (north-west) corner.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Default edge length of a map tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Deepest zoom level tiles are addressed at.
pub const MAX_TILE_ZOOM: u32 = 30;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Whether the zoom is addressable and x and y are inside the `2^z` grid.
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_TILE_ZOOM {
            return false;
        }
        let n = 1u64 << self.z;
        (self.x as u64) < n && (self.y as u64) < n
    }

    /// Longitude/latitude bounds of this tile.
    pub fn latlon_bounds(&self) -> BoundingBox {
        tile_to_latlon_bounds(self)
    }
}

/// A request for one rendered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRequest {
    pub coord: TileCoord,
    /// Output edge length in pixels (tiles are square).
    pub tile_size: u32,
}

impl TileRequest {
    pub fn new(z: u32, x: u32, y: u32, tile_size: u32) -> Self {
        Self {
            coord: TileCoord::new(z, x, y),
            tile_size,
        }
    }

    pub fn zoom(&self) -> u32 {
        self.coord.z
    }

    /// Geographic bounds covered by the tile.
    pub fn bounds(&self) -> BoundingBox {
        self.coord.latlon_bounds()
    }
}

impl From<TileCoord> for TileRequest {
    fn from(coord: TileCoord) -> Self {
        Self {
            coord,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// Convert lat/lon to Web Mercator tile coordinates.
///
/// Coordinates are clamped to the grid; zoom levels past [`MAX_TILE_ZOOM`]
/// saturate instead of overflowing.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = tiles_per_axis(zoom);

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, n - 1.0) as u32;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n)
        .floor()
        .clamp(0.0, n - 1.0) as u32;

    TileCoord { z: zoom, x, y }
}

/// Convert Web Mercator tile coordinates to lat/lon bounds.
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> BoundingBox {
    let n = tiles_per_axis(coord.z);
    let (x, y) = (coord.x as f64, coord.y as f64);

    let lon_min = x / n * 360.0 - 180.0;
    let lon_max = (x + 1.0) / n * 360.0 - 180.0;

    let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * y / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (y + 1.0) / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

fn tiles_per_axis(zoom: u32) -> f64 {
    (zoom as f64).exp2()
}

/// All tiles at `zoom` that intersect `bounds`, row by row. Empty past
/// [`MAX_TILE_ZOOM`].
pub fn tiles_covering(bounds: &BoundingBox, zoom: u32) -> Vec<TileCoord> {
    if zoom > MAX_TILE_ZOOM {
        return Vec::new();
    }
    let top_left = latlon_to_tile(bounds.max_y, bounds.min_x, zoom);
    let bottom_right = latlon_to_tile(bounds.min_y, bounds.max_x, zoom);

    let mut tiles = Vec::new();
    for y in top_left.y..=bottom_right.y {
        for x in top_left.x..=bottom_right.x {
            tiles.push(TileCoord::new(zoom, x, y));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlon_to_tile() {
        let coord = latlon_to_tile(0.0, 0.0, 0);
        assert_eq!(coord, TileCoord { z: 0, x: 0, y: 0 });

        let coord = latlon_to_tile(40.7128, -74.0060, 10); // NYC
        assert_eq!(coord.z, 10);
        assert!(coord.x > 290 && coord.x < 310);
        assert!(coord.y > 370 && coord.y < 400);
    }

    #[test]
    fn test_zoom0_tile_covers_world() {
        let bbox = tile_to_latlon_bounds(&TileCoord::new(0, 0, 0));
        assert!((bbox.min_x - (-180.0)).abs() < 1e-9);
        assert!((bbox.max_x - 180.0).abs() < 1e-9);
        assert!((bbox.max_y - 85.0511).abs() < 1e-3);
        assert!((bbox.min_y + 85.0511).abs() < 1e-3);
    }

    #[test]
    fn test_tile_validity() {
        assert!(TileCoord::new(2, 3, 3).is_valid());
        assert!(!TileCoord::new(2, 4, 0).is_valid());
        assert!(TileCoord::new(MAX_TILE_ZOOM, 0, 0).is_valid());
        assert!(!TileCoord::new(MAX_TILE_ZOOM + 2, 0, 0).is_valid());
    }

    #[test]
    fn test_deep_zoom_does_not_overflow() {
        let coord = latlon_to_tile(89.0, 179.9, 40);
        assert_eq!(coord.z, 40);
        assert_eq!(coord.y, 0);
        assert_eq!(coord.x, u32::MAX);

        let bbox = tile_to_latlon_bounds(&TileCoord::new(32, u32::MAX, u32::MAX));
        assert!(bbox.max_x <= 180.0 + 1e-9);
        assert!(bbox.min_x < bbox.max_x);

        let bounds = BoundingBox::new(1.0, 1.0, 1.1, 1.1);
        assert!(tiles_covering(&bounds, 32).is_empty());
        assert!(!tiles_covering(&bounds, MAX_TILE_ZOOM).is_empty());
    }

    #[test]
    fn test_tiles_covering() {
        let bounds = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
        let tiles = tiles_covering(&bounds, 1);
        assert_eq!(tiles.len(), 4);

        let tiny = BoundingBox::new(1.0, 1.0, 1.1, 1.1);
        assert_eq!(tiles_covering(&tiny, 3).len(), 1);
    }

    #[test]
    fn test_tile_request_defaults() {
        let req: TileRequest = TileCoord::new(3, 1, 2).into();
        assert_eq!(req.tile_size, DEFAULT_TILE_SIZE);
        assert_eq!(req.zoom(), 3);
    }
}
