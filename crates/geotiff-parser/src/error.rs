//! Error types for GeoTIFF decoding.

use raster_common::ViewerError;
use thiserror::Error;

/// Result type for GeoTIFF decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Why a byte stream could not be turned into a raster dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The bytes are not a readable TIFF at all.
    #[error("not a TIFF file: {0}")]
    NotTiff(String),

    /// The TIFF parsed but reading its tags or pixels failed.
    #[error("TIFF read error: {0}")]
    Tiff(String),

    #[error("missing ModelTiepointTag (33922)")]
    MissingTiePoint,

    #[error("missing ModelPixelScaleTag (33550)")]
    MissingPixelScale,

    /// A geo tag is present but malformed.
    #[error("invalid geo tag {tag}: {message}")]
    InvalidGeoTag { tag: &'static str, message: String },

    #[error("image has no raster band")]
    NoBand,

    #[error("expected a single band, found {0}")]
    MultiBand(u16),

    #[error("raster has {actual} samples, expected {expected} ({width}x{height})")]
    DimensionMismatch {
        actual: usize,
        expected: usize,
        width: usize,
        height: usize,
    },
}

impl From<tiff::TiffError> for DecodeError {
    fn from(err: tiff::TiffError) -> Self {
        DecodeError::Tiff(err.to_string())
    }
}

impl From<DecodeError> for ViewerError {
    fn from(err: DecodeError) -> Self {
        ViewerError::Decode(err.to_string())
    }
}
