//! GeoTIFF decoder for single-band rasters.
//!
//! Turns the raw bytes of a GeoTIFF into a [`RasterDataset`]: the band's
//! samples as `f32` in row-major order, plus the geographic bounds derived
//! from the model tie point and pixel scale tags.
//!
//! ```text
//! west  = tie_x                      north = tie_y
//! east  = west + scale_x * width     south = north - scale_y * height
//! ```
//!
//! Decoding is a pure function of the input bytes. Compression codecs are
//! whatever the `tiff` crate supports.

mod error;

pub use error::{DecodeError, DecodeResult};

use raster_common::{BoundingBox, RasterDataset};
use std::io::{Cursor, Read, Seek};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::debug;

/// Georeferencing and layout read from the first image directory.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffInfo {
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: u16,
    /// Raster-space point `(i, j)` of the tie point.
    pub tie_raster: (f64, f64),
    /// Model-space point `(x, y)` of the tie point.
    pub tie_model: (f64, f64),
    /// Model units per pixel `(x, y)`.
    pub pixel_scale: (f64, f64),
    /// Value of the GDAL_NODATA tag, when present and numeric.
    pub nodata: Option<f64>,
}

impl GeoTiffInfo {
    /// Geographic bounds of the whole image.
    ///
    /// The tie point is shifted back to raster pixel `(0, 0)` first, so files
    /// tied at a pixel other than the origin still produce correct bounds.
    pub fn bounds(&self) -> BoundingBox {
        let (sx, sy) = self.pixel_scale;
        let origin_x = self.tie_model.0 - self.tie_raster.0 * sx;
        let origin_y = self.tie_model.1 + self.tie_raster.1 * sy;
        BoundingBox::from_tie_point(origin_x, origin_y, sx, sy, self.width, self.height)
    }
}

/// Decode a single-band GeoTIFF into a raster dataset.
pub fn decode(bytes: &[u8]) -> DecodeResult<RasterDataset> {
    let mut decoder = open(bytes)?;
    let info = read_info_from(&mut decoder)?;

    let image = decoder.read_image()?;
    let samples = to_f32_samples(image);

    let expected = info.width * info.height;
    if samples.len() != expected {
        return Err(DecodeError::DimensionMismatch {
            actual: samples.len(),
            expected,
            width: info.width,
            height: info.height,
        });
    }

    let bounds = info.bounds();
    debug!(
        width = info.width,
        height = info.height,
        west = bounds.west(),
        north = bounds.north(),
        nodata = ?info.nodata,
        "Decoded GeoTIFF"
    );

    RasterDataset::new(samples, info.width, info.height, bounds)
        .map(|ds| ds.with_nodata(info.nodata))
        .map_err(|e| DecodeError::Tiff(e.to_string()))
}

/// Read only the georeferencing of a GeoTIFF, without decoding pixels.
pub fn read_info(bytes: &[u8]) -> DecodeResult<GeoTiffInfo> {
    let mut decoder = open(bytes)?;
    read_info_from(&mut decoder)
}

fn open(bytes: &[u8]) -> DecodeResult<Decoder<Cursor<&[u8]>>> {
    Decoder::new(Cursor::new(bytes)).map_err(|e| DecodeError::NotTiff(e.to_string()))
}

fn read_info_from<R: Read + Seek>(decoder: &mut Decoder<R>) -> DecodeResult<GeoTiffInfo> {
    let (width, height) = decoder.dimensions()?;
    if width == 0 || height == 0 {
        return Err(DecodeError::NoBand);
    }

    let samples_per_pixel = decoder
        .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
        .unwrap_or(1);
    match samples_per_pixel {
        0 => return Err(DecodeError::NoBand),
        1 => {}
        n => return Err(DecodeError::MultiBand(n)),
    }

    let tie_points = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .ok_or(DecodeError::MissingTiePoint)?
        .into_f64_vec()?;
    if tie_points.len() < 6 {
        return Err(DecodeError::InvalidGeoTag {
            tag: "ModelTiepointTag",
            message: format!("expected at least 6 values, found {}", tie_points.len()),
        });
    }

    let pixel_scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .ok_or(DecodeError::MissingPixelScale)?
        .into_f64_vec()?;
    if pixel_scale.len() < 2 {
        return Err(DecodeError::InvalidGeoTag {
            tag: "ModelPixelScaleTag",
            message: format!("expected at least 2 values, found {}", pixel_scale.len()),
        });
    }
    if !(pixel_scale[0] > 0.0 && pixel_scale[1] > 0.0) {
        return Err(DecodeError::InvalidGeoTag {
            tag: "ModelPixelScaleTag",
            message: format!("scale must be positive, got {:?}", &pixel_scale[..2]),
        });
    }

    let nodata = read_nodata(decoder)?;

    Ok(GeoTiffInfo {
        width: width as usize,
        height: height as usize,
        samples_per_pixel,
        tie_raster: (tie_points[0], tie_points[1]),
        tie_model: (tie_points[3], tie_points[4]),
        pixel_scale: (pixel_scale[0], pixel_scale[1]),
        nodata,
    })
}

/// GDAL stores no-data as an ASCII number in tag 42113.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> DecodeResult<Option<f64>> {
    let Some(raw) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = raw.into_string()?;
    let trimmed = text.trim_matches(char::from(0)).trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        return Ok(Some(f64::NAN));
    }
    Ok(trimmed.parse().ok())
}

fn to_f32_samples(image: DecodingResult) -> Vec<f32> {
    match image {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
    }
}
