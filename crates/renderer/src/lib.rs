//! Rendering of single-band rasters to RGBA.
//!
//! - [`ramp`]: value to color lookup through piecewise ramps
//! - [`rasterize`]: full-image rasterization with no-data transparency
//! - [`tiles`]: per-tile pixel windows and tile rasterization
//! - [`zoom`]: zoom-dependent strategy and the layer render state machine
//! - [`quantile`]: equal-count classification for attribute styling
//! - [`probe`]: hover value lookup
//! - [`encode`]: PNG output

pub mod encode;
pub mod error;
pub mod probe;
pub mod quantile;
pub mod ramp;
pub mod rasterize;
pub mod style;
pub mod tiles;
pub mod zoom;

pub use error::{RenderError, RenderResult};
pub use probe::{format_hover_value, value_at, ValueProbe};
pub use quantile::{ClassificationError, QuantileClassifier};
pub use ramp::{color_for, ColorRamp, InvalidColorRamp, RampConfig, RampResolver};
pub use rasterize::{rasterize, CancelToken, RgbaImage};
pub use style::RampCatalog;
pub use tiles::{pixel_window, render_tile, PixelWindow};
pub use zoom::{
    render_for_zoom, LayerRenderState, LayerStyle, RenderOutput, TiledRaster, ZoomAdaptiveLayer,
    ZoomPolicy,
};
