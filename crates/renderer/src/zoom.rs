//! Zoom-dependent render strategy and the per-layer render state machine.
//!
//! Below the smoothing threshold a layer is one full-image overlay drawn with
//! smoothing. At or above it the layer is either a sharp overlay (nearest
//! neighbour upscale) or a tile source rasterized on demand.
//!
//! ```text
//! Unrendered --zoom_changed(z)--> Rendered(z) --zoom_changed(z')--> Rendered(z')
//!      ^                              |
//!      +---------- show -------- remove --> Removed
//! ```

use crate::error::{RenderError, RenderResult};
use crate::probe::ValueProbe;
use crate::ramp::RampResolver;
use crate::rasterize::{rasterize_cancellable, upscale_nearest, CancelToken, RgbaImage};
use crate::tiles::render_tile;
use raster_common::{
    BoundingBox, NoDataValues, RasterDataset, TileCoord, TileRequest, ViewerError, ViewerResult,
    MAX_TILE_ZOOM,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// What to draw at or above the smoothing threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HighZoomMode {
    /// One overlay upscaled by `scale_factor` with nearest neighbour.
    Sharp { scale_factor: u32 },
    /// Tiles rasterized individually as the map requests them.
    Tiled,
}

impl Default for HighZoomMode {
    fn default() -> Self {
        HighZoomMode::Sharp { scale_factor: 2 }
    }
}

/// Zoom policy for one raster layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPolicy {
    /// Zoom levels below this render a single smoothed overlay.
    pub smoothing_threshold: u32,
    pub high_zoom_mode: HighZoomMode,
    /// Edge length of tiles in pixels.
    pub tile_size: u32,
    /// Zoom range in which tiles are produced.
    pub min_zoom: u32,
    pub max_zoom: u32,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self {
            smoothing_threshold: 8,
            high_zoom_mode: HighZoomMode::default(),
            tile_size: 256,
            min_zoom: 5,
            max_zoom: 18,
        }
    }
}

impl ZoomPolicy {
    /// A tiled policy with the default tile size and zoom range.
    pub fn tiled() -> Self {
        Self {
            high_zoom_mode: HighZoomMode::Tiled,
            ..Self::default()
        }
    }

    pub fn from_json(json_str: &str) -> ViewerResult<Self> {
        let policy: Self = serde_json::from_str(json_str)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ViewerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> ViewerResult<()> {
        if self.tile_size == 0 {
            return Err(ViewerError::InvalidConfig(
                "tile_size must be greater than 0".to_string(),
            ));
        }
        if self.max_zoom > MAX_TILE_ZOOM {
            return Err(ViewerError::InvalidConfig(format!(
                "max_zoom ({}) must not exceed {}",
                self.max_zoom, MAX_TILE_ZOOM
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(ViewerError::InvalidConfig(format!(
                "min_zoom ({}) must not exceed max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        if let HighZoomMode::Sharp { scale_factor: 0 } = self.high_zoom_mode {
            return Err(ViewerError::InvalidConfig(
                "scale_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mode_for(&self, zoom: u32) -> RenderMode {
        if zoom < self.smoothing_threshold {
            return RenderMode::Smoothed;
        }
        match self.high_zoom_mode {
            HighZoomMode::Sharp { scale_factor } => RenderMode::Sharp {
                scale_factor: scale_factor.max(1) as usize,
            },
            HighZoomMode::Tiled => RenderMode::Tiled,
        }
    }
}

/// The rendering chosen for a particular zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Smoothed,
    Sharp { scale_factor: usize },
    Tiled,
}

/// Ramp plus no-data set: everything besides the data that decides pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    pub ramp: RampResolver,
    pub no_data: NoDataValues,
}

impl LayerStyle {
    pub fn new(ramp: RampResolver, no_data: NoDataValues) -> Self {
        Self { ramp, no_data }
    }
}

/// Something the map can draw.
#[derive(Debug, Clone)]
pub enum RenderOutput {
    Overlay {
        image: RgbaImage,
        bounds: BoundingBox,
        /// Whether the map should interpolate when scaling the image.
        smoothing: bool,
    },
    Tiled(TiledRaster),
}

impl RenderOutput {
    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            RenderOutput::Overlay { image, .. } => Some(image),
            RenderOutput::Tiled(_) => None,
        }
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self, RenderOutput::Tiled(_))
    }
}

/// A tile source over one dataset. Tiles are rendered when asked for.
#[derive(Debug, Clone)]
pub struct TiledRaster {
    dataset: Arc<RasterDataset>,
    style: LayerStyle,
    tile_size: u32,
    min_zoom: u32,
    max_zoom: u32,
}

impl TiledRaster {
    pub fn new(dataset: Arc<RasterDataset>, style: LayerStyle, policy: &ZoomPolicy) -> Self {
        Self {
            dataset,
            style,
            tile_size: policy.tile_size,
            min_zoom: policy.min_zoom,
            max_zoom: policy.max_zoom,
        }
    }

    pub fn bounds(&self) -> &BoundingBox {
        self.dataset.bounds()
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn zoom_range(&self) -> (u32, u32) {
        (self.min_zoom, self.max_zoom)
    }

    /// Render one tile. Zoom levels outside the layer's range give an empty tile.
    pub fn tile(&self, coord: TileCoord) -> RenderResult<RgbaImage> {
        let size = self.tile_size as usize;
        if coord.z < self.min_zoom || coord.z > self.max_zoom || !coord.is_valid() {
            return RgbaImage::transparent(size, size);
        }
        let request = TileRequest {
            coord,
            tile_size: self.tile_size,
        };
        render_tile(
            &self.dataset,
            &self.style.ramp,
            &self.style.no_data,
            &request,
        )
    }

    /// Tiles at `zoom` that intersect the raster. Empty outside the layer's
    /// zoom range.
    pub fn covering_tiles(&self, zoom: u32) -> Vec<TileCoord> {
        if zoom < self.min_zoom || zoom > self.max_zoom {
            return Vec::new();
        }
        raster_common::tile::tiles_covering(self.dataset.bounds(), zoom)
    }
}

/// Render a dataset for a zoom level.
pub fn render_for_zoom(
    dataset: &Arc<RasterDataset>,
    style: &LayerStyle,
    zoom: u32,
    policy: &ZoomPolicy,
) -> RenderResult<RenderOutput> {
    render_for_zoom_cancellable(dataset, style, zoom, policy, &CancelToken::new())
}

/// Render a dataset for a zoom level, giving up once `cancel` is set.
pub fn render_for_zoom_cancellable(
    dataset: &Arc<RasterDataset>,
    style: &LayerStyle,
    zoom: u32,
    policy: &ZoomPolicy,
    cancel: &CancelToken,
) -> RenderResult<RenderOutput> {
    let start = Instant::now();
    let mode = policy.mode_for(zoom);

    let output = match mode {
        RenderMode::Smoothed => RenderOutput::Overlay {
            image: rasterize_cancellable(dataset, &style.ramp, &style.no_data, cancel)?,
            bounds: *dataset.bounds(),
            smoothing: true,
        },
        RenderMode::Sharp { scale_factor } => {
            let image = rasterize_cancellable(dataset, &style.ramp, &style.no_data, cancel)?;
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            RenderOutput::Overlay {
                image: upscale_nearest(&image, scale_factor)?,
                bounds: *dataset.bounds(),
                smoothing: false,
            }
        }
        RenderMode::Tiled => RenderOutput::Tiled(TiledRaster::new(
            Arc::clone(dataset),
            style.clone(),
            policy,
        )),
    };

    debug!(
        zoom,
        mode = ?mode,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Rendered layer for zoom"
    );
    Ok(output)
}

/// Render state of one layer.
#[derive(Debug, Clone)]
pub enum LayerRenderState {
    Unrendered,
    Rendered {
        zoom: u32,
        output: Arc<RenderOutput>,
    },
    Removed,
}

/// Everything needed to render a layer off the owning thread.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub dataset: Arc<RasterDataset>,
    pub style: LayerStyle,
    pub policy: ZoomPolicy,
    pub zoom: u32,
}

impl RenderJob {
    pub fn run(&self, cancel: &CancelToken) -> RenderResult<RenderOutput> {
        render_for_zoom_cancellable(&self.dataset, &self.style, self.zoom, &self.policy, cancel)
    }
}

/// One raster layer's render state machine.
///
/// Zoom changes re-render unless the layer is already rendered at that zoom.
/// Removing a layer keeps the last output aside so showing it again at the
/// same zoom needs no new render.
#[derive(Debug)]
pub struct ZoomAdaptiveLayer {
    dataset: Arc<RasterDataset>,
    style: LayerStyle,
    policy: ZoomPolicy,
    state: LayerRenderState,
    retained: Option<(u32, Arc<RenderOutput>)>,
}

impl ZoomAdaptiveLayer {
    pub fn new(dataset: Arc<RasterDataset>, style: LayerStyle, policy: ZoomPolicy) -> Self {
        Self {
            dataset,
            style,
            policy,
            state: LayerRenderState::Unrendered,
            retained: None,
        }
    }

    pub fn state(&self) -> &LayerRenderState {
        &self.state
    }

    pub fn dataset(&self) -> &Arc<RasterDataset> {
        &self.dataset
    }

    pub fn policy(&self) -> &ZoomPolicy {
        &self.policy
    }

    pub fn probe(&self) -> ValueProbe {
        ValueProbe::new(Arc::clone(&self.dataset))
    }

    pub fn rendered_zoom(&self) -> Option<u32> {
        match &self.state {
            LayerRenderState::Rendered { zoom, .. } => Some(*zoom),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&Arc<RenderOutput>> {
        match &self.state {
            LayerRenderState::Rendered { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self.state, LayerRenderState::Removed)
    }

    /// Whether a render is required to display the layer at `zoom`.
    pub fn needs_render(&self, zoom: u32) -> bool {
        match &self.state {
            LayerRenderState::Unrendered => true,
            LayerRenderState::Rendered { zoom: current, .. } => *current != zoom,
            LayerRenderState::Removed => false,
        }
    }

    /// Inputs for rendering at `zoom` on another thread.
    pub fn render_job(&self, zoom: u32) -> RenderJob {
        RenderJob {
            dataset: Arc::clone(&self.dataset),
            style: self.style.clone(),
            policy: self.policy.clone(),
            zoom,
        }
    }

    /// Install a finished render. Ignored once the layer is removed.
    pub fn commit(&mut self, zoom: u32, output: Arc<RenderOutput>) -> bool {
        if self.is_removed() {
            return false;
        }
        self.state = LayerRenderState::Rendered { zoom, output };
        true
    }

    /// Handle a zoom change synchronously, rendering in place when needed.
    pub fn zoom_changed(&mut self, zoom: u32) -> RenderResult<Option<Arc<RenderOutput>>> {
        if self.is_removed() {
            return Ok(None);
        }
        if self.needs_render(zoom) {
            let output = render_for_zoom(&self.dataset, &self.style, zoom, &self.policy)?;
            self.commit(zoom, Arc::new(output));
        }
        Ok(self.output().cloned())
    }

    /// Take the layer off the map, discarding the displayed output.
    pub fn remove(&mut self) {
        let previous = std::mem::replace(&mut self.state, LayerRenderState::Removed);
        if let LayerRenderState::Rendered { zoom, output } = previous {
            self.retained = Some((zoom, output));
        }
    }

    /// Put a removed layer back. Returns `true` when a render is needed,
    /// i.e. the zoom moved since the retained render.
    pub fn show(&mut self, zoom: u32) -> bool {
        if !self.is_removed() {
            return self.needs_render(zoom);
        }
        match self.retained.take() {
            Some((retained_zoom, output)) if retained_zoom == zoom => {
                self.state = LayerRenderState::Rendered { zoom, output };
                false
            }
            _ => {
                self.state = LayerRenderState::Unrendered;
                true
            }
        }
    }

    /// Swap the style (e.g. a new ramp was picked). Forces a re-render.
    pub fn set_style(&mut self, style: LayerStyle) {
        self.style = style;
        self.retained = None;
        if !self.is_removed() {
            self.state = LayerRenderState::Unrendered;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::RampConfig;

    fn layer(policy: ZoomPolicy) -> ZoomAdaptiveLayer {
        let samples = (0..16).map(|i| i as f32).collect();
        let ds = RasterDataset::new(samples, 4, 4, BoundingBox::new(0.0, 0.0, 4.0, 4.0)).unwrap();
        let ramp = RampResolver::new(&RampConfig::equal_interval(0.0, 16.0, ["#000", "#fff"]));
        ZoomAdaptiveLayer::new(
            Arc::new(ds),
            LayerStyle::new(ramp, NoDataValues::default()),
            policy,
        )
    }

    #[test]
    fn test_policy_defaults_and_modes() {
        let policy = ZoomPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.mode_for(7), RenderMode::Smoothed);
        assert_eq!(policy.mode_for(8), RenderMode::Sharp { scale_factor: 2 });
        assert_eq!(ZoomPolicy::tiled().mode_for(12), RenderMode::Tiled);
    }

    #[test]
    fn test_policy_validation() {
        let bad = ZoomPolicy {
            min_zoom: 10,
            max_zoom: 5,
            ..ZoomPolicy::default()
        };
        assert!(bad.validate().is_err());
        let zero = ZoomPolicy {
            high_zoom_mode: HighZoomMode::Sharp { scale_factor: 0 },
            ..ZoomPolicy::default()
        };
        assert!(zero.validate().is_err());
        let deep = ZoomPolicy {
            max_zoom: 40,
            ..ZoomPolicy::tiled()
        };
        assert!(deep.validate().is_err());
        assert!(ZoomPolicy::from_json(r#"{ "max_zoom": 32 }"#).is_err());
    }

    #[test]
    fn test_policy_json() {
        let policy =
            ZoomPolicy::from_json(r#"{"smoothing_threshold": 6, "high_zoom_mode": {"mode": "tiled"}}"#)
                .unwrap();
        assert_eq!(policy.smoothing_threshold, 6);
        assert_eq!(policy.high_zoom_mode, HighZoomMode::Tiled);
        assert_eq!(policy.tile_size, 256);
        assert!(ZoomPolicy::from_json(r#"{"tile_size": 0}"#).is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut layer = layer(ZoomPolicy::default());
        assert!(matches!(layer.state(), LayerRenderState::Unrendered));

        let low = layer.zoom_changed(5).unwrap().unwrap();
        assert!(matches!(*low, RenderOutput::Overlay { smoothing: true, .. }));
        assert_eq!(layer.rendered_zoom(), Some(5));

        let again = layer.zoom_changed(5).unwrap().unwrap();
        assert!(Arc::ptr_eq(&low, &again));

        let high = layer.zoom_changed(9).unwrap().unwrap();
        match &*high {
            RenderOutput::Overlay { image, smoothing, .. } => {
                assert!(!smoothing);
                assert_eq!((image.width(), image.height()), (8, 8));
            }
            RenderOutput::Tiled(_) => panic!("expected overlay"),
        }

        layer.remove();
        assert!(layer.is_removed());
        assert!(layer.zoom_changed(10).unwrap().is_none());
    }

    #[test]
    fn test_show_reuses_render_at_same_zoom() {
        let mut layer = layer(ZoomPolicy::default());
        layer.zoom_changed(6).unwrap();
        layer.remove();
        assert!(!layer.show(6));
        assert_eq!(layer.rendered_zoom(), Some(6));

        layer.remove();
        assert!(layer.show(7));
        assert!(matches!(layer.state(), LayerRenderState::Unrendered));
    }

    #[test]
    fn test_commit_after_remove_is_ignored() {
        let mut layer = layer(ZoomPolicy::default());
        let job = layer.render_job(3);
        layer.remove();
        let output = job.run(&CancelToken::new()).unwrap();
        assert!(!layer.commit(3, Arc::new(output)));
        assert!(layer.output().is_none());
    }
}
