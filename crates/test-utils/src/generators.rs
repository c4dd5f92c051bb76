//! Synthetic raster generators.
//!
//! These produce predictable, verifiable sample grids in row-major order.

use raster_common::{BoundingBox, RasterDataset};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Left-to-right ramp from `min` at column 0 to `max` at the last column.
pub fn create_gradient_grid(width: usize, height: usize, min: f32, max: f32) -> Vec<f32> {
    let span = (width.max(2) - 1) as f32;
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(min + (max - min) * col as f32 / span);
        }
    }
    data
}

/// Density-like surface: zero background with a few hot spots.
///
/// Mimics a cell tower density raster where most pixels are empty.
pub fn create_density_grid(width: usize, height: usize) -> Vec<f32> {
    let centers = [
        (width as f32 * 0.25, height as f32 * 0.3, 30.0),
        (width as f32 * 0.7, height as f32 * 0.6, 12.0),
    ];
    let radius = (width.min(height) as f32 / 4.0).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let mut v = 0.0f32;
            for &(cx, cy, peak) in &centers {
                let dx = col as f32 - cx;
                let dy = row as f32 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d < radius {
                    v += peak * (1.0 - d / radius);
                }
            }
            data.push(v);
        }
    }
    data
}

/// Replaces every `stride`-th sample with `nodata`.
pub fn inject_nodata(data: &mut [f32], stride: usize, nodata: f32) {
    if stride == 0 {
        return;
    }
    for v in data.iter_mut().step_by(stride) {
        *v = nodata;
    }
}

/// Builds a dataset over `bounds`, panicking on mismatched dimensions.
pub fn dataset(samples: Vec<f32>, width: usize, height: usize, bounds: BoundingBox) -> RasterDataset {
    RasterDataset::new(samples, width, height, bounds).expect("valid test dataset")
}

/// A `width x height` gradient dataset covering `bounds`.
pub fn gradient_dataset(width: usize, height: usize, bounds: BoundingBox) -> RasterDataset {
    dataset(
        create_gradient_grid(width, height, 0.0, 100.0),
        width,
        height,
        bounds,
    )
}
