//! Cancel-and-restart render scheduling for one raster layer.
//!
//! Renders run on the blocking pool. Each request bumps a generation
//! counter and cancels the render before it; a finished render is only
//! committed if its generation is still the newest, so a slow render for an
//! old zoom can never replace the output of a newer one.

use renderer::rasterize::CancelToken;
use renderer::zoom::{LayerStyle, RenderOutput, ZoomAdaptiveLayer};
use renderer::{RenderError, ValueProbe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the map should currently display for a layer.
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    /// Generation of the request that produced this snapshot.
    pub generation: u64,
    pub zoom: Option<u32>,
    pub output: Option<Arc<RenderOutput>>,
}

impl RenderSnapshot {
    pub fn is_displayed(&self) -> bool {
        self.output.is_some()
    }
}

/// How a render request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A fresh render was committed and published.
    Published { zoom: u32 },
    /// The layer already had output for this zoom.
    Reused { zoom: u32 },
    /// A newer request replaced this one before it committed.
    Superseded,
    /// The layer is removed from the map.
    Skipped,
    Failed(String),
}

/// Handle on a requested render.
pub struct RenderTask {
    inner: TaskInner,
}

enum TaskInner {
    Ready(RenderOutcome),
    Spawned(JoinHandle<RenderOutcome>),
}

impl RenderTask {
    fn ready(outcome: RenderOutcome) -> Self {
        Self {
            inner: TaskInner::Ready(outcome),
        }
    }

    pub async fn wait(self) -> RenderOutcome {
        match self.inner {
            TaskInner::Ready(outcome) => outcome,
            TaskInner::Spawned(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => RenderOutcome::Failed(e.to_string()),
            },
        }
    }
}

struct SchedulerInner {
    layer: Mutex<ZoomAdaptiveLayer>,
    in_flight: Mutex<Option<CancelToken>>,
    generation: AtomicU64,
    renders: AtomicU64,
    snapshot: watch::Sender<RenderSnapshot>,
    probe: ValueProbe,
}

/// Serializes zoom-driven renders of one layer.
#[derive(Clone)]
pub struct RenderScheduler {
    inner: Arc<SchedulerInner>,
}

impl RenderScheduler {
    pub fn new(layer: ZoomAdaptiveLayer) -> Self {
        let (snapshot, _) = watch::channel(RenderSnapshot::default());
        let probe = layer.probe();
        Self {
            inner: Arc::new(SchedulerInner {
                layer: Mutex::new(layer),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                renders: AtomicU64::new(0),
                snapshot,
                probe,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn probe(&self) -> &ValueProbe {
        &self.inner.probe
    }

    /// Number of renders committed so far.
    pub fn render_count(&self) -> u64 {
        self.inner.renders.load(Ordering::SeqCst)
    }

    pub async fn rendered_zoom(&self) -> Option<u32> {
        self.inner.layer.lock().await.rendered_zoom()
    }

    pub async fn is_removed(&self) -> bool {
        self.inner.layer.lock().await.is_removed()
    }

    /// Render for `zoom`, cancelling whatever render is still running.
    pub async fn request(&self, zoom: u32) -> RenderTask {
        let layer = self.inner.layer.lock().await;
        self.start(layer, zoom).await
    }

    /// Render for the map zoom, read once the layer lock is held.
    ///
    /// Any zoom change stored before the lock is taken is seen here, and one
    /// stored after it queues its own request behind this one.
    pub async fn request_current(&self, zoom: &AtomicU32) -> RenderTask {
        let layer = self.inner.layer.lock().await;
        let zoom = zoom.load(Ordering::SeqCst);
        self.start(layer, zoom).await
    }

    async fn start(&self, layer: MutexGuard<'_, ZoomAdaptiveLayer>, zoom: u32) -> RenderTask {
        if layer.is_removed() {
            return RenderTask::ready(RenderOutcome::Skipped);
        }

        let generation = self.cancel_in_flight().await;
        if !layer.needs_render(zoom) {
            self.publish(generation, &layer);
            return RenderTask::ready(RenderOutcome::Reused { zoom });
        }

        let job = layer.render_job(zoom);
        let token = CancelToken::new();
        *self.inner.in_flight.lock().await = Some(token.clone());
        drop(layer);

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.run(&token)).await;
            match result {
                Ok(Ok(output)) => {
                    let outcome = scheduler.commit(generation, zoom, Arc::new(output)).await;
                    debug!(
                        zoom,
                        generation,
                        outcome = ?outcome,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Render finished"
                    );
                    outcome
                }
                Ok(Err(RenderError::Cancelled)) => {
                    debug!(zoom, generation, "Render cancelled");
                    RenderOutcome::Superseded
                }
                Ok(Err(e)) => {
                    warn!(zoom, error = %e, "Render failed");
                    RenderOutcome::Failed(e.to_string())
                }
                Err(e) => RenderOutcome::Failed(e.to_string()),
            }
        });

        RenderTask {
            inner: TaskInner::Spawned(handle),
        }
    }

    /// Take the layer off the map. The last output is kept for `show`.
    pub async fn remove(&self) {
        let mut layer = self.inner.layer.lock().await;
        let generation = self.cancel_in_flight().await;
        layer.remove();
        self.publish(generation, &layer);
    }

    /// Put the layer back at the map zoom, rendering only if the zoom moved.
    pub async fn show(&self, zoom: &AtomicU32) -> RenderTask {
        let mut layer = self.inner.layer.lock().await;
        let zoom = zoom.load(Ordering::SeqCst);
        if !layer.show(zoom) {
            let generation = self.cancel_in_flight().await;
            self.publish(generation, &layer);
            return RenderTask::ready(RenderOutcome::Reused { zoom });
        }
        self.start(layer, zoom).await
    }

    /// Restyle and re-render at the map zoom.
    pub async fn restyle(&self, style: LayerStyle, zoom: &AtomicU32) -> RenderTask {
        let mut layer = self.inner.layer.lock().await;
        layer.set_style(style);
        let zoom = zoom.load(Ordering::SeqCst);
        self.start(layer, zoom).await
    }

    /// Cancel the running render and start a new generation.
    async fn cancel_in_flight(&self) -> u64 {
        if let Some(token) = self.inner.in_flight.lock().await.take() {
            token.cancel();
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn commit(&self, generation: u64, zoom: u32, output: Arc<RenderOutput>) -> RenderOutcome {
        let mut layer = self.inner.layer.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return RenderOutcome::Superseded;
        }
        if !layer.commit(zoom, output) {
            return RenderOutcome::Skipped;
        }
        self.inner.in_flight.lock().await.take();
        self.inner.renders.fetch_add(1, Ordering::SeqCst);
        self.publish(generation, &layer);
        RenderOutcome::Published { zoom }
    }

    fn publish(&self, generation: u64, layer: &ZoomAdaptiveLayer) {
        self.inner.snapshot.send_replace(RenderSnapshot {
            generation,
            zoom: layer.rendered_zoom(),
            output: layer.output().cloned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{BoundingBox, NoDataValues};
    use renderer::ramp::{RampConfig, RampResolver};
    use renderer::zoom::ZoomPolicy;
    use test_utils::gradient_dataset;

    fn scheduler() -> RenderScheduler {
        let dataset = Arc::new(gradient_dataset(20, 10, BoundingBox::new(0.0, 0.0, 2.0, 1.0)));
        let style = LayerStyle::new(
            RampResolver::new(&RampConfig::equal_interval(0.0, 100.0, ["#000000", "#ffffff"])),
            NoDataValues::default(),
        );
        RenderScheduler::new(ZoomAdaptiveLayer::new(dataset, style, ZoomPolicy::default()))
    }

    #[tokio::test]
    async fn test_request_publishes_snapshot() {
        let scheduler = scheduler();
        let rx = scheduler.subscribe();
        assert!(!rx.borrow().is_displayed());

        let outcome = scheduler.request(6).await.wait().await;
        assert_eq!(outcome, RenderOutcome::Published { zoom: 6 });
        assert_eq!(rx.borrow().zoom, Some(6));
        assert!(rx.borrow().is_displayed());
        assert_eq!(scheduler.render_count(), 1);
    }

    #[tokio::test]
    async fn test_same_zoom_is_reused() {
        let scheduler = scheduler();
        scheduler.request(6).await.wait().await;
        let outcome = scheduler.request(6).await.wait().await;
        assert_eq!(outcome, RenderOutcome::Reused { zoom: 6 });
        assert_eq!(scheduler.render_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_is_not_committed() {
        let scheduler = scheduler();
        let first = scheduler.generation_for_test().await;
        let later = scheduler.generation_for_test().await;
        assert!(later > first);

        let output = Arc::new(
            scheduler
                .inner
                .layer
                .lock()
                .await
                .render_job(9)
                .run(&CancelToken::new())
                .unwrap(),
        );
        assert_eq!(
            scheduler.commit(first, 9, output).await,
            RenderOutcome::Superseded
        );
        assert_eq!(scheduler.rendered_zoom().await, None);
    }

    #[tokio::test]
    async fn test_removed_layer_skips_requests() {
        let scheduler = scheduler();
        scheduler.request(6).await.wait().await;
        scheduler.remove().await;
        assert!(!scheduler.snapshot().is_displayed());
        assert_eq!(scheduler.request(7).await.wait().await, RenderOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_zoom_read_under_layer_lock() {
        let scheduler = scheduler();
        let zoom = Arc::new(AtomicU32::new(6));
        let spawn_request = || {
            let scheduler = scheduler.clone();
            let zoom = Arc::clone(&zoom);
            tokio::spawn(async move { scheduler.request_current(&zoom).await.wait().await })
        };

        // a registration queued on the layer while the map zooms in
        let guard = scheduler.inner.layer.lock().await;
        let registration = spawn_request();
        tokio::task::yield_now().await;
        zoom.store(9, Ordering::SeqCst);
        let zoom_change = spawn_request();
        tokio::task::yield_now().await;
        drop(guard);

        for outcome in [registration.await.unwrap(), zoom_change.await.unwrap()] {
            assert!(
                !matches!(
                    outcome,
                    RenderOutcome::Published { zoom: 6 } | RenderOutcome::Reused { zoom: 6 }
                ),
                "stale render {:?}",
                outcome
            );
        }
        assert_eq!(scheduler.rendered_zoom().await, Some(9));
        assert_eq!(scheduler.snapshot().zoom, Some(9));
    }

    #[tokio::test]
    async fn test_show_and_restyle_use_map_zoom() {
        let scheduler = scheduler();
        let zoom = AtomicU32::new(6);
        scheduler.request_current(&zoom).await.wait().await;
        scheduler.remove().await;

        zoom.store(7, Ordering::SeqCst);
        assert_eq!(
            scheduler.show(&zoom).await.wait().await,
            RenderOutcome::Published { zoom: 7 }
        );

        let style = LayerStyle::new(
            RampResolver::new(&RampConfig::palette(["#ff0000"])),
            NoDataValues::default(),
        );
        zoom.store(8, Ordering::SeqCst);
        assert_eq!(
            scheduler.restyle(style, &zoom).await.wait().await,
            RenderOutcome::Published { zoom: 8 }
        );
    }

    impl RenderScheduler {
        async fn generation_for_test(&self) -> u64 {
            self.cancel_in_flight().await
        }
    }
}
