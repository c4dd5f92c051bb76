//! Decoded single-band rasters and no-data handling.

use crate::{BoundingBox, ViewerError, ViewerResult};
use serde::{Deserialize, Serialize};

/// A decoded single-band raster. Immutable once built.
///
/// Samples are row-major: pixel `(x, y)` lives at `samples[y * width + x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    samples: Vec<f32>,
    width: usize,
    height: usize,
    bounds: BoundingBox,
    nodata: Option<f64>,
}

impl RasterDataset {
    /// Build a dataset, checking `samples.len() == width * height`.
    pub fn new(
        samples: Vec<f32>,
        width: usize,
        height: usize,
        bounds: BoundingBox,
    ) -> ViewerResult<Self> {
        if width == 0 || height == 0 {
            return Err(ViewerError::Decode(format!(
                "raster dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            ViewerError::Decode(format!("raster dimensions {}x{} overflow", width, height))
        })?;
        if samples.len() != expected {
            return Err(ViewerError::Decode(format!(
                "sample count {} does not match dimensions {}x{}",
                samples.len(),
                width,
                height
            )));
        }

        Ok(Self {
            samples,
            width,
            height,
            bounds,
            nodata: None,
        })
    }

    /// Attach the no-data value declared by the source file.
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// No-data value declared by the source file, if any.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw value of pixel `(x, y)`, `None` outside the grid.
    pub fn value_at_pixel(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get(y * self.width + x).copied()
    }

    /// One row of samples.
    pub fn row(&self, y: usize) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        Some(&self.samples[start..start + self.width])
    }

    /// Minimum and maximum over the valid samples (no-data and NaN excluded).
    pub fn value_range(&self, no_data: &NoDataValues) -> Option<(f32, f32)> {
        self.samples
            .iter()
            .copied()
            .filter(|v| !no_data.contains(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            })
    }
}

/// Sentinel values rendered fully transparent.
///
/// NaN is always treated as no-data, whether or not it is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoDataValues(Vec<f32>);

impl Default for NoDataValues {
    /// `{-1}`, the most common sentinel in the source rasters.
    fn default() -> Self {
        Self(vec![-1.0])
    }
}

impl NoDataValues {
    pub fn new(values: impl IntoIterator<Item = f32>) -> Self {
        let mut set = Self(Vec::new());
        for v in values {
            set.insert(v);
        }
        set
    }

    /// Only NaN is transparent.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, value: f32) {
        if !value.is_nan() && !self.0.contains(&value) {
            self.0.push(value);
        }
    }

    /// Add the dataset's own declared no-data value to this set.
    pub fn with_dataset(mut self, dataset: &RasterDataset) -> Self {
        if let Some(nodata) = dataset.nodata() {
            self.insert(nodata as f32);
        }
        self
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value.is_nan() || self.0.contains(&value)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }
}
