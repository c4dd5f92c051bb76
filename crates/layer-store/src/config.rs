//! Layer store configuration.

use crate::error::{StoreError, StoreResult};
use raster_common::NoDataValues;
use renderer::ramp::RampConfig;
use renderer::zoom::ZoomPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Store-wide settings shared by every layer it loads.
///
/// ```json
/// {
///   "fetch_timeout_secs": 30,
///   "initial_zoom": 6,
///   "no_data": [-1],
///   "zoom_policy": { "smoothing_threshold": 8, "high_zoom_mode": { "mode": "tiled" } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Zoom the map starts at; layers loaded before any zoom event render here.
    pub initial_zoom: u32,
    pub zoom_policy: ZoomPolicy,
    /// No-data sentinels for layers that do not bring their own.
    pub no_data: Vec<f32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            user_agent: concat!("raster-viewer/", env!("CARGO_PKG_VERSION")).to_string(),
            initial_zoom: 6,
            zoom_policy: ZoomPolicy::default(),
            no_data: vec![-1.0],
        }
    }
}

impl StoreConfig {
    pub fn from_json(json_str: &str) -> StoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.no_data.iter().any(|v| v.is_nan()) {
            return Err(StoreError::InvalidConfig(
                "no_data entries must be numbers (NaN is always no-data)".to_string(),
            ));
        }
        self.zoom_policy
            .validate()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn default_no_data(&self) -> NoDataValues {
        NoDataValues::new(self.no_data.iter().copied())
    }
}

/// How one raster layer is fetched and styled.
///
/// `no_data` overrides the store default; the file's own GDAL no-data value
/// is always added on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayerOptions {
    pub url: String,
    pub ramp: RampConfig,
    #[serde(default)]
    pub no_data: Option<Vec<f32>>,
    #[serde(default)]
    pub zoom_policy: Option<ZoomPolicy>,
}

impl RasterLayerOptions {
    pub fn new(url: impl Into<String>, ramp: RampConfig) -> Self {
        Self {
            url: url.into(),
            ramp,
            no_data: None,
            zoom_policy: None,
        }
    }

    pub fn with_no_data(mut self, values: impl IntoIterator<Item = f32>) -> Self {
        self.no_data = Some(values.into_iter().collect());
        self
    }

    pub fn with_zoom_policy(mut self, policy: ZoomPolicy) -> Self {
        self.zoom_policy = Some(policy);
        self
    }
}
