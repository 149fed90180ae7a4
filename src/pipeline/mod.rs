//! Render pipeline: one snapshot in, live preview and download buffer out
//!
//! A single worker task consumes snapshots. Every submission is stamped with
//! a generation number when it is made; a render whose generation has been
//! overtaken by the time it completes is discarded.
//!
//! | state      | event              | action                                  | next       |
//! |------------|--------------------|-----------------------------------------|------------|
//! | any        | Submit (empty)     | unmount preview, revoke artifact        | Idle       |
//! | any        | Submit (non-empty) | run preview + download jobs             | Rendering  |
//! | Rendering  | jobs done, current | publish frame, swap artifact            | Ready      |
//! | Rendering  | jobs done, stale   | drop results                            | (next cmd) |
//! | any        | Reset              | unmount preview, revoke artifact        | Idle       |
//! | any        | Shutdown / dropped | unmount preview, revoke artifact        | Closed     |
//!
//! Failed jobs leave the previous frame and artifact in place.

mod snapshot;
mod worker;

pub use snapshot::RenderSnapshot;

use crate::artifact::{Artifact, ArtifactHandle, ArtifactRegistry};
use crate::engine::StylingEngine;
use crate::error::{Error, Result};
use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use worker::{Command, Worker};

/// Lifecycle phase of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing mounted (no content yet, or just reset)
    Idle,
    /// A render pass is running
    Rendering,
    /// Preview and artifact reflect the last successful pass
    Ready,
    /// Worker has torn down
    Closed,
}

/// Most recent frame of the mounted preview
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Generation that produced this frame
    pub generation: u64,
    /// Rendered pixels at the preview resolution
    pub image: Arc<RgbaImage>,
}

/// Observable pipeline state
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Newest generation the worker has finished with
    pub generation: u64,
    /// Current phase
    pub phase: Phase,
    /// Live preview, if mounted
    pub preview: Option<PreviewFrame>,
    /// Current downloadable artifact
    pub artifact: Option<ArtifactHandle>,
    /// Number of preview instances constructed so far
    pub mounts: u64,
    /// Message of the most recent failed job, cleared by the next success
    pub last_error: Option<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            preview: None,
            artifact: None,
            mounts: 0,
            last_error: None,
        }
    }
}

/// Handle to the render worker
pub struct RenderPipeline {
    tx: mpsc::UnboundedSender<Command>,
    latest: Arc<AtomicU64>,
    state_rx: watch::Receiver<PipelineState>,
    registry: ArtifactRegistry,
    task: Option<JoinHandle<()>>,
}

impl RenderPipeline {
    /// Start the worker on the current Tokio runtime.
    pub fn spawn<E: StylingEngine>(engine: Arc<E>, registry: ArtifactRegistry) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PipelineState::default());
        let latest = Arc::new(AtomicU64::new(0));

        let worker = Worker::new(engine, registry.clone(), Arc::clone(&latest), state_tx);
        let task = tokio::spawn(worker.run(rx));

        Self {
            tx,
            latest,
            state_rx,
            registry,
            task: Some(task),
        }
    }

    /// Queue a snapshot; returns the generation it was stamped with.
    pub fn submit(&self, snapshot: RenderSnapshot) -> Result<u64> {
        let generation = self.next_generation();
        self.tx
            .send(Command::Submit {
                generation,
                snapshot: Arc::new(snapshot),
            })
            .map_err(|_| Error::PipelineClosed)?;
        tracing::trace!(generation, "Snapshot submitted");
        Ok(generation)
    }

    /// Unmount the preview and release the artifact (data-type switch).
    pub fn reset(&self) -> Result<u64> {
        let generation = self.next_generation();
        self.tx
            .send(Command::Reset { generation })
            .map_err(|_| Error::PipelineClosed)?;
        Ok(generation)
    }

    /// Watch channel of state updates
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Latest published state
    pub fn state(&self) -> PipelineState {
        self.state_rx.borrow().clone()
    }

    /// Newest generation handed out
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Wait until everything submitted so far has been processed.
    pub async fn settled(&self) -> PipelineState {
        let target = self.latest_generation();
        let mut rx = self.state_rx.clone();
        let waited = rx
            .wait_for(|state| state.generation >= target || state.phase == Phase::Closed)
            .await
            .map(|state| state.clone());
        waited.unwrap_or_else(|_| self.state_rx.borrow().clone())
    }

    /// The current downloadable artifact, if any
    pub fn current_artifact(&self) -> Option<Arc<Artifact>> {
        let handle = self.state_rx.borrow().artifact.clone()?;
        self.registry.resolve(&handle)
    }

    /// Registry backing the artifacts
    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Stop the worker, releasing the preview and artifact.
    pub async fn shutdown(mut self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Other(format!("Render worker failed: {e}")))?;
        }
        Ok(())
    }

    fn next_generation(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StyledInstance;
    use crate::style::{DownloadSize, RenderOptions, StyleConfiguration};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Engine that renders 1x1 frames, optionally slowly, and fails on "fail"
    #[derive(Default)]
    struct FakeEngine {
        creates: AtomicUsize,
        updates: Arc<AtomicUsize>,
        delay_for: Option<(&'static str, Duration)>,
    }

    struct FakeInstance {
        options: RenderOptions,
        frame: Arc<RgbaImage>,
        updates: Arc<AtomicUsize>,
    }

    fn check(engine_delay: Option<(&'static str, Duration)>, options: &RenderOptions) -> Result<()> {
        if let Some((needle, delay)) = engine_delay {
            if options.data.contains(needle) {
                std::thread::sleep(delay);
            }
        }
        if options.data.contains("fail") {
            return Err(Error::Render("malformed options".to_string()));
        }
        Ok(())
    }

    impl StylingEngine for FakeEngine {
        type Instance = FakeInstance;

        fn create(&self, options: RenderOptions) -> Result<FakeInstance> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            check(self.delay_for, &options)?;
            Ok(FakeInstance {
                options,
                frame: Arc::new(RgbaImage::new(1, 1)),
                updates: Arc::clone(&self.updates),
            })
        }
    }

    impl StyledInstance for FakeInstance {
        fn update(&mut self, options: RenderOptions) -> Result<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            check(None, &options)?;
            self.options = options;
            self.frame = Arc::new(RgbaImage::new(1, 1));
            Ok(())
        }

        fn options(&self) -> &RenderOptions {
            &self.options
        }

        fn frame(&self) -> Arc<RgbaImage> {
            Arc::clone(&self.frame)
        }
    }

    fn snapshot(payload: &str) -> RenderSnapshot {
        RenderSnapshot::new(payload, StyleConfiguration::default(), DownloadSize::new(200))
    }

    #[tokio::test]
    async fn empty_payload_renders_nothing() {
        let engine = Arc::new(FakeEngine::default());
        let pipeline = RenderPipeline::spawn(Arc::clone(&engine), ArtifactRegistry::new());

        pipeline.submit(snapshot("")).unwrap();
        let state = pipeline.settled().await;

        assert_eq!(state.phase, Phase::Idle);
        assert!(state.preview.is_none());
        assert!(state.artifact.is_none());
        assert_eq!(engine.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn preview_is_updated_in_place_and_old_artifacts_released() {
        let engine = Arc::new(FakeEngine::default());
        let registry = ArtifactRegistry::new();
        let pipeline = RenderPipeline::spawn(Arc::clone(&engine), registry.clone());

        pipeline.submit(snapshot("one")).unwrap();
        let first = pipeline.settled().await;
        assert_eq!(first.phase, Phase::Ready);
        assert_eq!(first.mounts, 1);
        let first_handle = first.artifact.clone().unwrap();

        pipeline.submit(snapshot("two")).unwrap();
        let second = pipeline.settled().await;
        assert_eq!(second.mounts, 1);
        assert_eq!(engine.updates.load(Ordering::SeqCst), 1);
        assert_ne!(second.artifact, Some(first_handle.clone()));
        assert!(registry.resolve(&first_handle).is_none());
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn failed_render_keeps_previous_artifact() {
        let engine = Arc::new(FakeEngine::default());
        let pipeline = RenderPipeline::spawn(engine, ArtifactRegistry::new());

        pipeline.submit(snapshot("good")).unwrap();
        let good = pipeline.settled().await;

        pipeline.submit(snapshot("fail please")).unwrap();
        let after = pipeline.settled().await;

        assert_eq!(after.artifact, good.artifact);
        assert!(after.last_error.is_some());
        assert_eq!(
            after.preview.map(|p| p.generation),
            good.preview.map(|p| p.generation)
        );
        let artifact = pipeline.current_artifact().unwrap();
        assert_eq!(artifact.generation, good.generation);
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let engine = Arc::new(FakeEngine {
            delay_for: Some(("slow", Duration::from_millis(150))),
            ..FakeEngine::default()
        });
        let registry = ArtifactRegistry::new();
        let pipeline = RenderPipeline::spawn(engine, registry.clone());

        pipeline.submit(snapshot("slow first")).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let newest = pipeline.submit(snapshot("fast second")).unwrap();

        let state = pipeline.settled().await;
        assert_eq!(state.generation, newest);
        let artifact = pipeline.current_artifact().unwrap();
        assert_eq!(artifact.generation, newest);
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn reset_unmounts_and_next_render_mounts_again() {
        let engine = Arc::new(FakeEngine::default());
        let registry = ArtifactRegistry::new();
        let pipeline = RenderPipeline::spawn(engine, registry.clone());

        pipeline.submit(snapshot("hello")).unwrap();
        pipeline.settled().await;

        pipeline.reset().unwrap();
        let cleared = pipeline.settled().await;
        assert_eq!(cleared.phase, Phase::Idle);
        assert!(cleared.preview.is_none());
        assert!(cleared.artifact.is_none());
        assert_eq!(registry.live_count(), 0);

        pipeline.submit(snapshot("again")).unwrap();
        let remounted = pipeline.settled().await;
        assert_eq!(remounted.mounts, 2);
    }

    #[tokio::test]
    async fn emptied_payload_clears_artifact() {
        let engine = Arc::new(FakeEngine::default());
        let registry = ArtifactRegistry::new();
        let pipeline = RenderPipeline::spawn(engine, registry.clone());

        pipeline.submit(snapshot("content")).unwrap();
        pipeline.settled().await;
        pipeline.submit(snapshot("")).unwrap();
        let state = pipeline.settled().await;

        assert!(state.artifact.is_none());
        assert!(state.preview.is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let engine = Arc::new(FakeEngine::default());
        let registry = ArtifactRegistry::new();
        let pipeline = RenderPipeline::spawn(engine, registry.clone());

        pipeline.submit(snapshot("bye")).unwrap();
        pipeline.settled().await;
        assert_eq!(registry.live_count(), 1);

        let mut rx = pipeline.subscribe();
        pipeline.shutdown().await.unwrap();
        assert_eq!(registry.live_count(), 0);
        assert_eq!(rx.borrow_and_update().phase, Phase::Closed);
    }
}
