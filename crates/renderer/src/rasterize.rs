//! Value grid to RGBA rasterization.
//!
//! Every sample is either a no-data value (alpha 0) or resolved through the
//! ramp and written fully opaque. Alpha is never computed from data; layer
//! opacity is applied downstream by whatever draws the image.
//!
//! Rasters are often heavily quantized, so colors are memoized per distinct
//! sample value. Rows are processed in parallel with one memo per worker.

use crate::error::{RenderError, RenderResult};
use crate::ramp::RampResolver;
use raster_common::{NoDataValues, RasterDataset};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Interleaved RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl RgbaImage {
    /// A fully transparent image.
    pub fn transparent(width: usize, height: usize) -> RenderResult<Self> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![0u8; len],
        })
    }

    pub fn from_raw(width: usize, height: usize, pixels: Vec<u8>) -> RenderResult<Self> {
        if byte_len(width, height)? != pixels.len() {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn opaque_count(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }
}

fn byte_len(width: usize, height: usize) -> RenderResult<usize> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(RenderError::InvalidDimensions { width, height })
}

/// Shared flag a newer request sets to stop an in-flight render.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Resolves sample values to RGBA with a per-value memo.
pub(crate) struct PixelPainter<'a> {
    ramp: &'a RampResolver,
    no_data: &'a NoDataValues,
    cache: HashMap<u32, [u8; 4]>,
}

impl<'a> PixelPainter<'a> {
    pub(crate) fn new(ramp: &'a RampResolver, no_data: &'a NoDataValues) -> Self {
        Self {
            ramp,
            no_data,
            cache: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn paint(&mut self, value: f32) -> [u8; 4] {
        if self.no_data.contains(value) {
            return TRANSPARENT;
        }
        let ramp = self.ramp;
        *self
            .cache
            .entry(value.to_bits())
            .or_insert_with(|| ramp.color_for(value as f64).with_alpha(255))
    }
}

/// Rasterize the whole dataset.
pub fn rasterize(
    dataset: &RasterDataset,
    ramp: &RampResolver,
    no_data: &NoDataValues,
) -> RgbaImage {
    let start = Instant::now();
    let mut pixels = vec![0u8; dataset.len() * 4];
    paint_rows(dataset, ramp, no_data, &mut pixels, None);

    debug!(
        width = dataset.width(),
        height = dataset.height(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Rasterized dataset"
    );

    RgbaImage {
        width: dataset.width(),
        height: dataset.height(),
        pixels,
    }
}

/// Rasterize the whole dataset, stopping early once `cancel` is set.
///
/// Rows not yet started when the flag flips are skipped.
pub fn rasterize_cancellable(
    dataset: &RasterDataset,
    ramp: &RampResolver,
    no_data: &NoDataValues,
    cancel: &CancelToken,
) -> RenderResult<RgbaImage> {
    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }
    let mut pixels = vec![0u8; dataset.len() * 4];
    paint_rows(dataset, ramp, no_data, &mut pixels, Some(cancel));
    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }

    Ok(RgbaImage {
        width: dataset.width(),
        height: dataset.height(),
        pixels,
    })
}

fn paint_rows(
    dataset: &RasterDataset,
    ramp: &RampResolver,
    no_data: &NoDataValues,
    pixels: &mut [u8],
    cancel: Option<&CancelToken>,
) {
    let width = dataset.width();
    pixels
        .par_chunks_mut(width * 4)
        .zip(dataset.samples().par_chunks(width))
        .for_each_init(
            || PixelPainter::new(ramp, no_data),
            |painter, (out_row, in_row)| {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return;
                }
                for (px, &value) in out_row.chunks_exact_mut(4).zip(in_row) {
                    px.copy_from_slice(&painter.paint(value));
                }
            },
        );
}

/// Nearest-neighbour upscale by an integer factor. No interpolation, so
/// class edges stay sharp.
pub fn upscale_nearest(image: &RgbaImage, factor: usize) -> RenderResult<RgbaImage> {
    if factor == 0 {
        return Err(RenderError::InvalidDimensions {
            width: 0,
            height: 0,
        });
    }
    if factor == 1 {
        return Ok(image.clone());
    }

    let (width, height) = (image.width, image.height);
    let overflow = RenderError::InvalidDimensions { width, height };
    let out_w = width.checked_mul(factor).ok_or_else(|| overflow.clone())?;
    let out_h = height.checked_mul(factor).ok_or(overflow)?;
    let mut out = RgbaImage::transparent(out_w, out_h)?;

    let src = &image.pixels;
    out.pixels
        .par_chunks_mut(out_w * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src[(y / factor) * width * 4..(y / factor + 1) * width * 4];
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let sx = (x / factor) * 4;
                px.copy_from_slice(&src_row[sx..sx + 4]);
            }
        });

    Ok(out)
}

/// Halve both dimensions, reducing each 2x2 block to one pixel.
///
/// Alpha stays binary: a block is opaque when at least two of its four
/// samples are, and its color is the mean of the opaque samples. Odd
/// trailing rows and columns are dropped.
pub fn downsample_2x(image: &RgbaImage) -> RenderResult<RgbaImage> {
    let (width, height) = (image.width, image.height);
    let out_w = width / 2;
    let out_h = height / 2;
    let mut out = RgbaImage::transparent(out_w, out_h)?;

    let src = &image.pixels;
    out.pixels
        .par_chunks_mut(out_w * 4)
        .enumerate()
        .for_each(|(oy, row)| {
            for (ox, px) in row.chunks_exact_mut(4).enumerate() {
                let mut sum = [0u32; 3];
                let mut opaque = 0u32;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let i = ((oy * 2 + dy) * width + ox * 2 + dx) * 4;
                    if src[i + 3] != 0 {
                        sum[0] += src[i] as u32;
                        sum[1] += src[i + 1] as u32;
                        sum[2] += src[i + 2] as u32;
                        opaque += 1;
                    }
                }
                if opaque >= 2 {
                    let mean = |s: u32| ((s + opaque / 2) / opaque) as u8;
                    px.copy_from_slice(&[mean(sum[0]), mean(sum[1]), mean(sum[2]), 255]);
                }
            }
        });

    Ok(out)
}
