//! PNG encoding of rendered images.

use crate::error::{RenderError, RenderResult};
use crate::rasterize::RgbaImage;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};

/// Encode an RGBA image as PNG.
pub fn encode_png(image: &RgbaImage) -> RenderResult<Vec<u8>> {
    let width = u32::try_from(image.width()).map_err(|_| dimension_error(image))?;
    let height = u32::try_from(image.height()).map_err(|_| dimension_error(image))?;

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::Sub);
    encoder.write_image(image.pixels(), width, height, ColorType::Rgba8)?;
    Ok(buf)
}

/// Decode PNG bytes back into an RGBA image.
pub fn decode_png(bytes: &[u8]) -> RenderResult<RgbaImage> {
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    RgbaImage::from_raw(width as usize, height as usize, decoded.into_raw())
}

fn dimension_error(image: &RgbaImage) -> RenderError {
    RenderError::InvalidDimensions {
        width: image.width(),
        height: image.height(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_signature() {
        let img = RgbaImage::transparent(4, 4).unwrap();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_png_preserves_alpha() {
        let pixels = vec![255, 0, 0, 255, 0, 0, 0, 0];
        let img = RgbaImage::from_raw(2, 1, pixels.clone()).unwrap();
        let back = decode_png(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(back.pixels(), &pixels[..]);
    }
}
