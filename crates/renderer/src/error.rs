//! Error types for rendering.

use raster_common::ViewerError;
use thiserror::Error;

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A newer request superseded this render.
    #[error("render cancelled")]
    Cancelled,

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("image encoding failed: {0}")]
    Encode(String),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Encode(err.to_string())
    }
}

impl From<RenderError> for ViewerError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Cancelled => ViewerError::Cancelled,
            other => ViewerError::InvalidConfig(other.to_string()),
        }
    }
}
