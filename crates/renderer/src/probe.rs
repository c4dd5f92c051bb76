//! Hover value lookup.

use raster_common::{BoundingBox, RasterDataset};
use std::sync::Arc;

/// Pixel containing a geographic coordinate.
///
/// `x = floor((lng - west) / (east - west) * width)` and
/// `y = floor((north - lat) / (north - south) * height)`. Coordinates outside
/// `bounds`, and those on the east or south edge (which floor to `width` or
/// `height`), have no pixel.
pub fn pixel_for(
    bounds: &BoundingBox,
    width: usize,
    height: usize,
    lng: f64,
    lat: f64,
) -> Option<(usize, usize)> {
    if !bounds.contains_point(lng, lat) {
        return None;
    }
    let fx = ((lng - bounds.west()) / bounds.width() * width as f64).floor();
    let fy = ((bounds.north() - lat) / bounds.height() * height as f64).floor();
    if !(fx >= 0.0 && fy >= 0.0) {
        return None;
    }
    let (x, y) = (fx as usize, fy as usize);
    (x < width && y < height).then_some((x, y))
}

/// Raw sample under a geographic coordinate.
///
/// `None` outside `bounds`, outside the pixel grid, or when the sample is NaN.
/// Sentinel values such as `-1` are returned as-is.
pub fn value_at(dataset: &RasterDataset, bounds: &BoundingBox, lng: f64, lat: f64) -> Option<f32> {
    let (x, y) = pixel_for(bounds, dataset.width(), dataset.height(), lng, lat)?;
    dataset.value_at_pixel(x, y).filter(|v| !v.is_nan())
}

/// Tooltip text for a probed value.
pub fn format_hover_value(value: f32) -> String {
    format!("Value: {:.2}", value)
}

/// A lookup bound to one dataset, handed to whatever shows tooltips.
#[derive(Debug, Clone)]
pub struct ValueProbe {
    dataset: Arc<RasterDataset>,
}

impl ValueProbe {
    pub fn new(dataset: Arc<RasterDataset>) -> Self {
        Self { dataset }
    }

    pub fn bounds(&self) -> &BoundingBox {
        self.dataset.bounds()
    }

    pub fn value_at(&self, lng: f64, lat: f64) -> Option<f32> {
        value_at(&self.dataset, self.dataset.bounds(), lng, lat)
    }

    pub fn hover_text(&self, lng: f64, lat: f64) -> Option<String> {
        self.value_at(lng, lat).map(format_hover_value)
    }
}
