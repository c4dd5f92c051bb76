//! Error types shared by the raster viewer crates.

use thiserror::Error;

/// Result type alias using ViewerError.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Top-level error taxonomy for layer loading and rendering.
///
/// Only structural failures live here. Per-pixel and per-value problems
/// (bad ramp entries, non-numeric attributes, out-of-bounds probes) are
/// absorbed where they happen and never surface as errors.
#[derive(Debug, Clone, Error)]
pub enum ViewerError {
    /// The bytes are not a usable single-band GeoTIFF.
    #[error("Failed to decode raster: {0}")]
    Decode(String),

    /// The raster or vector source could not be fetched.
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A load or render was superseded or aborted before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ViewerError {
    /// Whether the failure should abort the owning layer's load.
    ///
    /// Cancellation is a normal outcome of a newer request and is not fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ViewerError::Cancelled)
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::InvalidConfig(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        ViewerError::InvalidConfig(err.to_string())
    }
}
