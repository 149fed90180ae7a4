//! Single-consumer render worker

use super::{Phase, PipelineState, PreviewFrame, RenderSnapshot};
use crate::artifact::{Artifact, ArtifactHandle, ArtifactRegistry};
use crate::engine::{StyledInstance, StylingEngine};
use crate::error::{Error, Result};
use crate::metrics;
use crate::style::RenderOptions;
use bytes::Bytes;
use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

pub(super) enum Command {
    Submit {
        generation: u64,
        snapshot: Arc<RenderSnapshot>,
    },
    Reset {
        generation: u64,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Work left after draining the queue
#[derive(Default)]
struct Batch {
    reset: Option<u64>,
    submit: Option<(u64, Arc<RenderSnapshot>)>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Batch {
    fn absorb(&mut self, command: Command) {
        match command {
            Command::Submit {
                generation,
                snapshot,
            } => self.submit = Some((generation, snapshot)),
            Command::Reset { generation } => {
                self.reset = Some(generation);
                self.submit = None;
            }
            Command::Shutdown(done) => self.shutdown = Some(done),
        }
    }
}

/// Result of the preview job: the instance to keep mounted, and what it produced
type PreviewOutcome<I> = (Option<I>, Result<(Arc<RgbaImage>, bool)>);

pub(super) struct Worker<E: StylingEngine> {
    engine: Arc<E>,
    registry: ArtifactRegistry,
    latest: Arc<AtomicU64>,
    state_tx: watch::Sender<PipelineState>,
    mounted: Option<E::Instance>,
    mounts: u64,
}

impl<E: StylingEngine> Worker<E> {
    pub(super) fn new(
        engine: Arc<E>,
        registry: ArtifactRegistry,
        latest: Arc<AtomicU64>,
        state_tx: watch::Sender<PipelineState>,
    ) -> Self {
        Self {
            engine,
            registry,
            latest,
            state_tx,
            mounted: None,
            mounts: 0,
        }
    }

    pub(super) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(first) = rx.recv().await {
            let mut batch = Batch::default();
            batch.absorb(first);
            while let Ok(next) = rx.try_recv() {
                batch.absorb(next);
            }

            if let Some(done) = batch.shutdown {
                self.teardown();
                let _ = done.send(());
                return;
            }
            if let Some(generation) = batch.reset {
                self.clear(generation, "reset");
            }
            if let Some((generation, snapshot)) = batch.submit {
                if snapshot.is_empty() {
                    self.clear(generation, "empty payload");
                } else {
                    self.render(generation, snapshot).await;
                }
            }
        }

        // Every handle was dropped without an explicit shutdown.
        self.teardown();
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation < self.latest.load(Ordering::SeqCst)
    }

    async fn render(&mut self, generation: u64, snapshot: Arc<RenderSnapshot>) {
        self.state_tx.send_modify(|state| state.phase = Phase::Rendering);
        let started = Instant::now();

        let preview = preview_job(
            Arc::clone(&self.engine),
            self.mounted.take(),
            snapshot.preview_options(),
        );
        let download = download_job(Arc::clone(&self.engine), snapshot.download_options());
        let ((mounted, preview), download) = tokio::join!(preview, download);
        self.mounted = mounted;
        if matches!(preview, Ok((_, true))) {
            self.mounts += 1;
        }

        let elapsed = started.elapsed();
        metrics::record_render("preview", elapsed, preview.is_ok());
        metrics::record_render("download", elapsed, download.is_ok());

        if self.is_stale(generation) {
            metrics::record_stale();
            debug!(
                generation,
                latest = self.latest.load(Ordering::SeqCst),
                "Discarding stale render"
            );
            return;
        }

        let mut errors = Vec::new();
        let frame = match preview {
            Ok((image, _)) => Some(image),
            Err(err) => {
                warn!(generation, error = %err, "Preview render failed");
                errors.push(err.to_string());
                None
            }
        };
        let artifact = match download {
            Ok(png) => Some(self.registry.create(Artifact {
                png,
                size: snapshot.download_size.get(),
                generation,
            })),
            Err(err) => {
                warn!(generation, error = %err, "Download render failed");
                errors.push(err.to_string());
                None
            }
        };

        let mounts = self.mounts;
        let mut replaced = None;
        self.state_tx.send_modify(|state| {
            state.mounts = mounts;
            if let Some(image) = frame {
                state.preview = Some(PreviewFrame { generation, image });
            }
            if let Some(handle) = artifact {
                replaced = state.artifact.replace(handle);
            }
            state.last_error = (!errors.is_empty()).then(|| errors.join("; "));
            state.generation = generation;
            state.phase = if state.preview.is_some() {
                Phase::Ready
            } else {
                Phase::Idle
            };
        });
        self.revoke(replaced);

        debug!(generation, elapsed_ms = elapsed.as_millis() as u64, "Render settled");
    }

    fn clear(&mut self, generation: u64, reason: &'static str) {
        self.mounted = None;
        let mut released = None;
        self.state_tx.send_modify(|state| {
            released = state.artifact.take();
            state.preview = None;
            state.last_error = None;
            state.generation = state.generation.max(generation);
            state.phase = Phase::Idle;
        });
        self.revoke(released);
        debug!(generation, reason, "Preview unmounted");
    }

    fn teardown(&mut self) {
        self.mounted = None;
        let mut released = None;
        self.state_tx.send_modify(|state| {
            released = state.artifact.take();
            state.preview = None;
            state.phase = Phase::Closed;
        });
        self.revoke(released);
        debug!("Render worker stopped");
    }

    fn revoke(&self, handle: Option<ArtifactHandle>) {
        if let Some(handle) = handle {
            self.registry.revoke(&handle);
        }
    }
}

/// Update the mounted instance in place, or construct one.
async fn preview_job<E: StylingEngine>(
    engine: Arc<E>,
    mounted: Option<E::Instance>,
    options: RenderOptions,
) -> PreviewOutcome<E::Instance> {
    let job = tokio::task::spawn_blocking(move || -> PreviewOutcome<E::Instance> {
        match mounted {
            Some(mut instance) => {
                let result = instance.update(options).map(|()| (instance.frame(), false));
                (Some(instance), result)
            }
            None => match engine.create(options) {
                Ok(instance) => {
                    let frame = instance.frame();
                    (Some(instance), Ok((frame, true)))
                }
                Err(err) => (None, Err(err)),
            },
        }
    });
    job.await.unwrap_or_else(|err| {
        (
            None,
            Err(Error::Render(format!("Preview job aborted: {err}"))),
        )
    })
}

/// Render a throwaway instance at download size and encode it.
async fn download_job<E: StylingEngine>(engine: Arc<E>, options: RenderOptions) -> Result<Bytes> {
    tokio::task::spawn_blocking(move || engine.create(options)?.raw_png())
        .await
        .map_err(|err| Error::Render(format!("Download job aborted: {err}")))?
}
