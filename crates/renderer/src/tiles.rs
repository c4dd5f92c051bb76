//! Per-tile rasterization.
//!
//! A tile is rendered independently from the slice of the raster it covers.
//! The tile's geographic bounds are first mapped to a pixel window in the
//! dataset; each tile pixel is then mapped back to its geographic centre and
//! sampled from that window, so zooming past 1:1 never leaves holes.

use crate::error::{RenderError, RenderResult};
use crate::probe::pixel_for;
use crate::rasterize::{downsample_2x, PixelPainter, RgbaImage};
use crate::ramp::RampResolver;
use raster_common::{BoundingBox, NoDataValues, RasterDataset, TileRequest};
use rayon::prelude::*;
use tracing::trace;

/// Half-open pixel range `[start_x, end_x) x [start_y, end_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub start_x: usize,
    pub end_x: usize,
    pub start_y: usize,
    pub end_y: usize,
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.start_x >= self.end_x || self.start_y >= self.end_y
    }

    pub fn width(&self) -> usize {
        self.end_x.saturating_sub(self.start_x)
    }

    pub fn height(&self) -> usize {
        self.end_y.saturating_sub(self.start_y)
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.start_x && x < self.end_x && y >= self.start_y && y < self.end_y
    }
}

/// Pixel window of a raster covered by `tile_bounds`.
///
/// Start indices floor and end indices ceil, so partially covered pixels are
/// included; everything is clamped to the grid.
pub fn pixel_window(
    bounds: &BoundingBox,
    width: usize,
    height: usize,
    tile_bounds: &BoundingBox,
) -> PixelWindow {
    let w = width as f64;
    let h = height as f64;
    let to_x = |lng: f64| (lng - bounds.west()) / bounds.width() * w;
    let to_y = |lat: f64| (bounds.north() - lat) / bounds.height() * h;
    let clamp = |v: f64, max: f64| if v.is_nan() { 0 } else { v.clamp(0.0, max) as usize };

    PixelWindow {
        start_x: clamp(to_x(tile_bounds.west()).floor(), w),
        end_x: clamp(to_x(tile_bounds.east()).ceil(), w),
        start_y: clamp(to_y(tile_bounds.north()).floor(), h),
        end_y: clamp(to_y(tile_bounds.south()).ceil(), h),
    }
}

/// Supersampling factor for a zoom level: 1 up to z10, 2 above.
pub fn tile_render_scale(zoom: u32) -> usize {
    ((zoom as f64 / 10.0).ceil() as usize).clamp(1, 2)
}

/// Rasterize one map tile.
///
/// Tiles outside the raster, or outside the addressable tile grid, come back
/// fully transparent without touching the ramp.
pub fn render_tile(
    dataset: &RasterDataset,
    ramp: &RampResolver,
    no_data: &NoDataValues,
    request: &TileRequest,
) -> RenderResult<RgbaImage> {
    let size = request.tile_size as usize;
    if size == 0 {
        return Err(RenderError::InvalidDimensions {
            width: 0,
            height: 0,
        });
    }

    if !request.coord.is_valid() {
        trace!(tile = %request.coord.cache_key(), "Tile outside grid");
        return RgbaImage::transparent(size, size);
    }

    let tile_bounds = request.bounds();
    let window = pixel_window(
        dataset.bounds(),
        dataset.width(),
        dataset.height(),
        &tile_bounds,
    );
    if window.is_empty() {
        trace!(tile = %request.coord.cache_key(), "Tile outside raster");
        return RgbaImage::transparent(size, size);
    }

    let scale = tile_render_scale(request.zoom());
    let image = sample_window(dataset, ramp, no_data, &tile_bounds, &window, size * scale)?;

    trace!(
        tile = %request.coord.cache_key(),
        window_w = window.width(),
        window_h = window.height(),
        scale,
        "Rendered tile"
    );

    if scale == 1 {
        Ok(image)
    } else {
        downsample_2x(&image)
    }
}

fn sample_window(
    dataset: &RasterDataset,
    ramp: &RampResolver,
    no_data: &NoDataValues,
    tile_bounds: &BoundingBox,
    window: &PixelWindow,
    size: usize,
) -> RenderResult<RgbaImage> {
    let mut image = RgbaImage::transparent(size, size)?;
    let step_x = tile_bounds.width() / size as f64;
    let step_y = tile_bounds.height() / size as f64;
    let (bounds, width, height) = (dataset.bounds(), dataset.width(), dataset.height());

    image
        .pixels_mut()
        .par_chunks_mut(size * 4)
        .enumerate()
        .for_each_init(
            || PixelPainter::new(ramp, no_data),
            |painter, (py, row)| {
                let lat = tile_bounds.north() - (py as f64 + 0.5) * step_y;
                for (px, out) in row.chunks_exact_mut(4).enumerate() {
                    let lng = tile_bounds.west() + (px as f64 + 0.5) * step_x;
                    let Some((x, y)) = pixel_for(bounds, width, height, lng, lat) else {
                        continue;
                    };
                    if !window.contains(x, y) {
                        continue;
                    }
                    if let Some(value) = dataset.value_at_pixel(x, y) {
                        out.copy_from_slice(&painter.paint(value));
                    }
                }
            },
        );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_full_and_partial() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let full = pixel_window(&bounds, 100, 100, &bounds);
        assert_eq!(
            full,
            PixelWindow { start_x: 0, end_x: 100, start_y: 0, end_y: 100 }
        );

        let quarter = pixel_window(&bounds, 100, 100, &BoundingBox::new(5.0, 5.0, 20.0, 20.0));
        assert_eq!(
            quarter,
            PixelWindow { start_x: 50, end_x: 100, start_y: 0, end_y: 50 }
        );
    }

    #[test]
    fn test_window_rounds_outward() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let w = pixel_window(&bounds, 10, 10, &BoundingBox::new(2.5, 2.5, 3.5, 3.5));
        assert_eq!(w, PixelWindow { start_x: 2, end_x: 4, start_y: 6, end_y: 8 });
    }

    #[test]
    fn test_window_disjoint_is_empty() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        for tile in [
            BoundingBox::new(20.0, 0.0, 30.0, 10.0),
            BoundingBox::new(-30.0, 0.0, -20.0, 10.0),
            BoundingBox::new(0.0, 20.0, 10.0, 30.0),
            BoundingBox::new(0.0, -30.0, 10.0, -20.0),
        ] {
            assert!(pixel_window(&bounds, 10, 10, &tile).is_empty(), "{:?}", tile);
        }
    }

    #[test]
    fn test_render_scale() {
        assert_eq!(tile_render_scale(0), 1);
        assert_eq!(tile_render_scale(5), 1);
        assert_eq!(tile_render_scale(10), 1);
        assert_eq!(tile_render_scale(11), 2);
        assert_eq!(tile_render_scale(18), 2);
        assert_eq!(tile_render_scale(25), 2);
    }
}
