//! In-memory GeoTIFF writer for decoder and loader tests.

use std::io::Cursor;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Builds a single-band `f32` GeoTIFF with tie point and pixel scale tags.
///
/// ```ignore
/// let bytes = GeoTiffBuilder::new(4, 3, vec![0.0; 12])
///     .origin(36.0, 1.0)
///     .pixel_size(0.5, 0.5)
///     .nodata("-9999")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    width: u32,
    height: u32,
    samples: Vec<f32>,
    origin: (f64, f64),
    pixel_size: (f64, f64),
    with_tie_point: bool,
    with_pixel_scale: bool,
    nodata: Option<String>,
}

impl GeoTiffBuilder {
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> Self {
        Self {
            width,
            height,
            samples,
            origin: (0.0, 0.0),
            pixel_size: (1.0, 1.0),
            with_tie_point: true,
            with_pixel_scale: true,
            nodata: None,
        }
    }

    /// North-west corner in model coordinates.
    pub fn origin(mut self, west: f64, north: f64) -> Self {
        self.origin = (west, north);
        self
    }

    pub fn pixel_size(mut self, x: f64, y: f64) -> Self {
        self.pixel_size = (x, y);
        self
    }

    /// GDAL no-data text, e.g. `"-9999"`.
    pub fn nodata(mut self, text: &str) -> Self {
        self.nodata = Some(text.to_string());
        self
    }

    pub fn without_tie_point(mut self) -> Self {
        self.with_tie_point = false;
        self
    }

    pub fn without_pixel_scale(mut self) -> Self {
        self.with_pixel_scale = false;
        self
    }

    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf)?;
            let mut image =
                encoder.new_image::<colortype::Gray32Float>(self.width, self.height)?;
            if self.with_pixel_scale {
                let scale = [self.pixel_size.0, self.pixel_size.1, 0.0];
                image
                    .encoder()
                    .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
            }
            if self.with_tie_point {
                let tie = [0.0, 0.0, 0.0, self.origin.0, self.origin.1, 0.0];
                image.encoder().write_tag(Tag::ModelTiepointTag, &tie[..])?;
            }
            if let Some(nodata) = &self.nodata {
                image.encoder().write_tag(Tag::GdalNodata, nodata.as_str())?;
            }
            image.write_data(&self.samples)?;
        }
        Ok(buf.into_inner())
    }
}

/// A three-band RGB GeoTIFF, for exercising the single-band check.
pub fn rgb_geotiff(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
    let pixels = vec![127u8; (width * height * 3) as usize];
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf)?;
        let mut image = encoder.new_image::<colortype::RGB8>(width, height)?;
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])?;
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 0.0, 0.0, 0.0][..])?;
        image.write_data(&pixels)?;
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_writes_tiff_header() {
        let bytes = GeoTiffBuilder::new(2, 2, vec![1.0, 2.0, 3.0, 4.0])
            .build()
            .unwrap();
        assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));
    }
}
