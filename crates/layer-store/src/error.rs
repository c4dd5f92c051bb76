//! Error types for the layer store.

use geotiff_parser::DecodeError;
use raster_common::{LayerId, ViewerError};
use renderer::RenderError;
use thiserror::Error;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from loading and rendering layers.
///
/// Cloneable because one in-flight load is awaited by every caller that
/// asked for the same layer.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),

    /// The layer was unloaded while its load was in flight.
    #[error("Load of layer {0} was aborted")]
    Aborted(LayerId),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::InvalidConfig(err.to_string())
    }
}

impl From<StoreError> for ViewerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Fetch { url, message } => ViewerError::Fetch { url, message },
            StoreError::Status { url, status } => ViewerError::Fetch {
                url,
                message: format!("HTTP {}", status),
            },
            StoreError::Decode(e) => e.into(),
            StoreError::InvalidGeoJson(message) => ViewerError::Decode(message),
            StoreError::LayerNotFound(id) => ViewerError::LayerNotFound(id.to_string()),
            StoreError::Aborted(_) => ViewerError::Cancelled,
            StoreError::Render(e) => e.into(),
            StoreError::InvalidConfig(message) | StoreError::Task(message) => {
                ViewerError::InvalidConfig(message)
            }
        }
    }
}
