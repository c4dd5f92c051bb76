//! Layer registry for the raster viewer.
//!
//! [`LayerStore`] owns every layer on the map: it fetches GeoTIFF and
//! GeoJSON sources through a [`LayerSource`], decodes each raster once,
//! and drives zoom-dependent re-rendering through one [`RenderScheduler`]
//! per raster layer. Vector layers are styled by quantile classification of
//! a numeric attribute.

pub mod config;
pub mod error;
pub mod render;
pub mod source;
pub mod store;
pub mod vector;

pub use config::{RasterLayerOptions, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use render::{RenderOutcome, RenderScheduler, RenderSnapshot, RenderTask};
pub use source::{HttpSource, LayerSource, MemorySource};
pub use store::{LayerStore, RasterLayer, StoreStats};
pub use vector::{
    numeric_value, style_by_attribute, style_with_ramp, AttributeStyle, Feature,
    FeatureCollection, FeatureStyle, VectorLayer,
};
