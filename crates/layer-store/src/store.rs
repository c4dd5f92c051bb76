//! Typed registry of the layers on the map.
//!
//! Raster layers are fetched and decoded once per id and kept for the
//! session; hiding a layer only drops its render state. Concurrent loads of
//! the same id share a single fetch and decode, and unloading an id whose
//! load is still running aborts it.

use crate::config::{RasterLayerOptions, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::render::{RenderScheduler, RenderSnapshot, RenderTask};
use crate::source::{HttpSource, LayerSource};
use crate::vector::{AttributeStyle, FeatureCollection, VectorLayer};
use futures::future::{abortable, AbortHandle, BoxFuture, FutureExt, Shared};
use raster_common::{LayerId, LayerKind, NoDataValues, RasterDataset};
use renderer::ramp::{RampConfig, RampResolver};
use renderer::zoom::{LayerStyle, ZoomAdaptiveLayer};
use renderer::ValueProbe;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

type SharedLoad = Shared<BoxFuture<'static, StoreResult<Arc<RasterDataset>>>>;

struct InFlight {
    load_id: u64,
    future: SharedLoad,
    abort: AbortHandle,
}

enum LoadSlot {
    Loaded(Arc<RasterDataset>),
    Pending(u64, SharedLoad),
}

/// A registered raster layer.
#[derive(Clone)]
pub struct RasterLayer {
    url: String,
    dataset: Arc<RasterDataset>,
    no_data: NoDataValues,
    scheduler: RenderScheduler,
}

impl RasterLayer {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dataset(&self) -> &Arc<RasterDataset> {
        &self.dataset
    }

    pub fn no_data(&self) -> &NoDataValues {
        &self.no_data
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }
}

/// Load and cache counters.
#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    /// Fetches started (raster and vector).
    pub fetches: u64,
    /// Loads answered from an already registered layer.
    pub cache_hits: u64,
    /// Loads that joined another caller's in-flight load.
    pub shared_loads: u64,
    pub failures: u64,
    pub aborted: u64,
    pub raster_layers: usize,
    pub vector_layers: usize,
}

impl StoreStats {
    /// Share of loads that needed no fetch, in percent.
    pub fn hit_rate(&self) -> f64 {
        let reused = self.cache_hits + self.shared_loads;
        let total = reused + self.fetches;
        if total == 0 {
            0.0
        } else {
            (reused as f64 / total as f64) * 100.0
        }
    }
}

pub struct LayerStore {
    config: StoreConfig,
    source: Arc<dyn LayerSource>,
    rasters: RwLock<HashMap<LayerId, RasterLayer>>,
    vectors: RwLock<HashMap<LayerId, VectorLayer>>,
    in_flight: Mutex<HashMap<LayerId, InFlight>>,
    stats: RwLock<StoreStats>,
    zoom: AtomicU32,
    next_load: AtomicU64,
}

impl LayerStore {
    pub fn new(config: StoreConfig, source: Arc<dyn LayerSource>) -> StoreResult<Self> {
        config.validate()?;
        let zoom = AtomicU32::new(config.initial_zoom);
        Ok(Self {
            config,
            source,
            rasters: RwLock::new(HashMap::new()),
            vectors: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            stats: RwLock::new(StoreStats::default()),
            zoom,
            next_load: AtomicU64::new(1),
        })
    }

    /// A store fetching over HTTP.
    pub fn with_http(config: StoreConfig) -> StoreResult<Self> {
        let source = HttpSource::new(&config)?;
        Self::new(config, Arc::new(source))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn current_zoom(&self) -> u32 {
        self.zoom.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Raster layers
    // ------------------------------------------------------------------

    /// Fetch, decode and register a raster layer, then start its first
    /// render at the current zoom.
    ///
    /// Loading an id that is already registered returns the cached dataset
    /// without fetching. If the fetch or decode fails nothing is registered.
    pub async fn load(
        &self,
        id: impl Into<LayerId>,
        options: RasterLayerOptions,
    ) -> StoreResult<Arc<RasterDataset>> {
        let id = id.into();
        if let Some(policy) = &options.zoom_policy {
            policy
                .validate()
                .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        }

        let (load_id, future) = match self.join_or_start(&id, &options.url).await {
            LoadSlot::Loaded(dataset) => return Ok(dataset),
            LoadSlot::Pending(load_id, future) => (load_id, future),
        };

        let result = future.await;
        self.finish_load(&id, load_id, &options, result).await
    }

    async fn join_or_start(&self, id: &LayerId, url: &str) -> LoadSlot {
        let mut in_flight = self.in_flight.lock().await;

        if let Some(layer) = self.rasters.read().await.get(id) {
            self.stats.write().await.cache_hits += 1;
            debug!(layer = %id, "Raster layer already loaded");
            return LoadSlot::Loaded(Arc::clone(&layer.dataset));
        }

        if let Some(pending) = in_flight.get(id) {
            self.stats.write().await.shared_loads += 1;
            debug!(layer = %id, "Joining in-flight load");
            return LoadSlot::Pending(pending.load_id, pending.future.clone());
        }

        let load_id = self.next_load.fetch_add(1, Ordering::SeqCst);
        let (future, abort) = abortable(fetch_raster(Arc::clone(&self.source), url.to_string()));
        let layer = id.clone();
        let future: SharedLoad = future
            .map(move |result| match result {
                Ok(loaded) => loaded,
                Err(_) => Err(StoreError::Aborted(layer)),
            })
            .boxed()
            .shared();

        in_flight.insert(
            id.clone(),
            InFlight {
                load_id,
                future: future.clone(),
                abort,
            },
        );
        self.stats.write().await.fetches += 1;
        info!(layer = %id, url = %url, "Loading raster layer");

        LoadSlot::Pending(load_id, future)
    }

    async fn finish_load(
        &self,
        id: &LayerId,
        load_id: u64,
        options: &RasterLayerOptions,
        result: StoreResult<Arc<RasterDataset>>,
    ) -> StoreResult<Arc<RasterDataset>> {
        let mut in_flight = self.in_flight.lock().await;
        let is_current = in_flight.get(id).map(|f| f.load_id) == Some(load_id);

        let dataset = match result {
            Ok(dataset) => dataset,
            Err(e) => {
                if is_current {
                    in_flight.remove(id);
                    self.stats.write().await.failures += 1;
                    warn!(layer = %id, error = %e, "Raster layer load failed");
                }
                return Err(e);
            }
        };

        let mut rasters = self.rasters.write().await;
        if let Some(existing) = rasters.get(id) {
            return Ok(Arc::clone(&existing.dataset));
        }
        if !is_current {
            // unloaded while the fetch was running
            return Err(StoreError::Aborted(id.clone()));
        }
        in_flight.remove(id);

        let layer = self.build_layer(options, Arc::clone(&dataset));
        rasters.insert(id.clone(), layer.clone());
        drop(rasters);
        drop(in_flight);

        info!(
            layer = %id,
            width = dataset.width(),
            height = dataset.height(),
            "Raster layer registered"
        );
        // first render runs in the background; watch the snapshot for it
        let _ = layer.scheduler.request_current(&self.zoom).await;
        Ok(dataset)
    }

    fn build_layer(&self, options: &RasterLayerOptions, dataset: Arc<RasterDataset>) -> RasterLayer {
        let no_data = match &options.no_data {
            Some(values) => NoDataValues::new(values.iter().copied()),
            None => self.config.default_no_data(),
        }
        .with_dataset(&dataset);
        let policy = options
            .zoom_policy
            .clone()
            .unwrap_or_else(|| self.config.zoom_policy.clone());
        let style = LayerStyle::new(RampResolver::new(&options.ramp), no_data.clone());

        RasterLayer {
            url: options.url.clone(),
            dataset: Arc::clone(&dataset),
            no_data,
            scheduler: RenderScheduler::new(ZoomAdaptiveLayer::new(dataset, style, policy)),
        }
    }

    /// Drop a layer, aborting its load if one is still running.
    /// Returns whether anything was removed.
    pub async fn unload(&self, id: &LayerId) -> bool {
        let mut removed = false;

        if let Some(pending) = self.in_flight.lock().await.remove(id) {
            pending.abort.abort();
            self.stats.write().await.aborted += 1;
            info!(layer = %id, "Aborted in-flight load");
            removed = true;
        }

        let raster = self.rasters.write().await.remove(id);
        if let Some(layer) = raster {
            layer.scheduler.remove().await;
            removed = true;
        }

        if self.vectors.write().await.remove(id).is_some() {
            removed = true;
        }

        if removed {
            info!(layer = %id, "Layer unloaded");
        }
        removed
    }

    pub async fn is_loaded(&self, id: &LayerId) -> bool {
        self.rasters.read().await.contains_key(id) || self.vectors.read().await.contains_key(id)
    }

    pub async fn is_loading(&self, id: &LayerId) -> bool {
        self.in_flight.lock().await.contains_key(id)
    }

    pub async fn raster(&self, id: &LayerId) -> StoreResult<RasterLayer> {
        self.rasters
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::LayerNotFound(id.clone()))
    }

    pub async fn dataset(&self, id: &LayerId) -> StoreResult<Arc<RasterDataset>> {
        Ok(Arc::clone(self.raster(id).await?.dataset()))
    }

    pub async fn probe(&self, id: &LayerId) -> StoreResult<ValueProbe> {
        Ok(self.raster(id).await?.scheduler.probe().clone())
    }

    /// Tooltip text for the raster value under `(lng, lat)`.
    pub async fn hover_text(&self, id: &LayerId, lng: f64, lat: f64) -> StoreResult<Option<String>> {
        Ok(self.probe(id).await?.hover_text(lng, lat))
    }

    pub async fn subscribe(&self, id: &LayerId) -> StoreResult<watch::Receiver<RenderSnapshot>> {
        Ok(self.raster(id).await?.scheduler.subscribe())
    }

    /// Take a raster layer off the map. The dataset stays cached.
    pub async fn hide(&self, id: &LayerId) -> StoreResult<()> {
        let layer = self.raster(id).await?;
        layer.scheduler.remove().await;
        debug!(layer = %id, "Raster layer hidden");
        Ok(())
    }

    /// Put a hidden raster layer back. Re-renders only if the zoom changed
    /// since it was hidden.
    pub async fn show(&self, id: &LayerId) -> StoreResult<RenderTask> {
        let layer = self.raster(id).await?;
        debug!(layer = %id, "Raster layer shown");
        Ok(layer.scheduler.show(&self.zoom).await)
    }

    /// Switch a raster layer to another ramp and re-render it.
    pub async fn set_ramp(&self, id: &LayerId, ramp: &RampConfig) -> StoreResult<RenderTask> {
        let layer = self.raster(id).await?;
        let style = LayerStyle::new(RampResolver::new(ramp), layer.no_data.clone());
        Ok(layer.scheduler.restyle(style, &self.zoom).await)
    }

    /// Record the map's new zoom and re-render every raster layer on the
    /// map for it. Hidden layers report [`RenderOutcome::Skipped`].
    ///
    /// [`RenderOutcome::Skipped`]: crate::render::RenderOutcome::Skipped
    pub async fn zoom_changed(&self, zoom: u32) -> Vec<(LayerId, RenderTask)> {
        let previous = self.zoom.swap(zoom, Ordering::SeqCst);
        let started = Instant::now();
        let schedulers: Vec<(LayerId, RenderScheduler)> = self
            .rasters
            .read()
            .await
            .iter()
            .map(|(id, layer)| (id.clone(), layer.scheduler.clone()))
            .collect();

        let mut tasks = Vec::with_capacity(schedulers.len());
        for (id, scheduler) in schedulers {
            tasks.push((id, scheduler.request_current(&self.zoom).await));
        }
        debug!(
            from = previous,
            to = zoom,
            layers = tasks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Zoom changed"
        );
        tasks
    }

    // ------------------------------------------------------------------
    // Vector layers
    // ------------------------------------------------------------------

    /// Fetch and register a GeoJSON layer.
    pub async fn load_vector(
        &self,
        id: impl Into<LayerId>,
        url: &str,
    ) -> StoreResult<Arc<FeatureCollection>> {
        let id = id.into();
        if let Some(layer) = self.vectors.read().await.get(&id) {
            self.stats.write().await.cache_hits += 1;
            return Ok(Arc::clone(layer.collection()));
        }

        self.stats.write().await.fetches += 1;
        let parsed = match self.source.fetch(url).await {
            Ok(bytes) => FeatureCollection::from_slice(&bytes),
            Err(e) => Err(e),
        };
        let collection = match parsed {
            Ok(collection) => Arc::new(collection),
            Err(e) => {
                self.stats.write().await.failures += 1;
                warn!(layer = %id, url = %url, error = %e, "Vector layer load failed");
                return Err(e);
            }
        };

        let mut vectors = self.vectors.write().await;
        let layer = vectors
            .entry(id.clone())
            .or_insert_with(|| VectorLayer::new(Arc::clone(&collection)));
        info!(layer = %id, features = collection.len(), "Vector layer registered");
        Ok(Arc::clone(layer.collection()))
    }

    pub async fn vector(&self, id: &LayerId) -> StoreResult<VectorLayer> {
        self.vectors
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::LayerNotFound(id.clone()))
    }

    /// Color a vector layer's features by `property`.
    pub async fn select_attribute(
        &self,
        id: &LayerId,
        property: &str,
        ramp: &RampConfig,
    ) -> StoreResult<AttributeStyle> {
        let mut vectors = self.vectors.write().await;
        let layer = vectors
            .get_mut(id)
            .ok_or_else(|| StoreError::LayerNotFound(id.clone()))?;
        let style = layer.select(property, ramp).clone();
        if style.has_no_data() {
            info!(layer = %id, property = %property, "No numeric data for attribute");
        }
        Ok(style)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub async fn layers(&self) -> Vec<(LayerId, LayerKind)> {
        let mut layers: Vec<(LayerId, LayerKind)> = self
            .rasters
            .read()
            .await
            .keys()
            .map(|id| (id.clone(), LayerKind::Raster))
            .collect();
        layers.extend(
            self.vectors
                .read()
                .await
                .keys()
                .map(|id| (id.clone(), LayerKind::Vector)),
        );
        layers.sort_by(|a, b| a.0.cmp(&b.0));
        layers
    }

    pub async fn stats(&self) -> StoreStats {
        let mut stats = self.stats.read().await.clone();
        stats.raster_layers = self.rasters.read().await.len();
        stats.vector_layers = self.vectors.read().await.len();
        stats
    }
}

async fn fetch_raster(source: Arc<dyn LayerSource>, url: String) -> StoreResult<Arc<RasterDataset>> {
    let started = Instant::now();
    let bytes = source.fetch(&url).await?;
    let dataset = tokio::task::spawn_blocking(move || geotiff_parser::decode(&bytes)).await??;
    debug!(
        url = %url,
        width = dataset.width(),
        height = dataset.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Raster fetched and decoded"
    );
    Ok(Arc::new(dataset))
}
