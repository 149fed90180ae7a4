//! Lightweight render metrics aggregation, reported through `tracing`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

static METRICS: OnceLock<Arc<MetricsInner>> = OnceLock::new();

/// Enable periodic metrics emission with the provided interval in seconds.
///
/// Must be called from within a Tokio runtime.
pub fn enable(interval_secs: u64) {
    let interval = interval_secs.max(5);
    let inner = Arc::clone(METRICS.get_or_init(|| Arc::new(MetricsInner::new(interval))));
    inner.update_interval(interval);
    inner.ensure_task();
}

/// Record the outcome of one render job (`preview` or `download`).
pub fn record_render(job: &str, duration: Duration, success: bool) {
    if let Some(inner) = METRICS.get() {
        inner.lock().record_render(job, duration, success);
    }
}

/// Record a render pass whose result was discarded as stale.
pub fn record_stale() {
    if let Some(inner) = METRICS.get() {
        inner.lock().stale_drops += 1;
    }
}

/// Record a download attempt.
pub fn record_download(transparent: bool, success: bool) {
    if let Some(inner) = METRICS.get() {
        inner.lock().record_download(transparent, success);
    }
}

/// Emit the current window immediately, e.g. before exiting.
pub fn flush() {
    if let Some(inner) = METRICS.get() {
        let snapshot = inner.lock().snapshot_and_reset();
        log_snapshot(&snapshot);
    }
}

struct MetricsInner {
    state: Mutex<MetricsState>,
    interval_secs: AtomicU64,
    task_spawned: AtomicBool,
}

impl MetricsInner {
    fn new(interval_secs: u64) -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
            interval_secs: AtomicU64::new(interval_secs.max(5)),
            task_spawned: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_interval(&self, interval_secs: u64) {
        self.interval_secs
            .store(interval_secs.max(5), Ordering::Relaxed);
    }

    fn ensure_task(self: &Arc<Self>) {
        if self
            .task_spawned
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let runner = Arc::clone(self);
            tokio::spawn(async move {
                runner.run().await;
            });
        }
    }

    async fn run(self: Arc<Self>) {
        let mut current_secs = self.interval_secs.load(Ordering::Relaxed).max(5);
        loop {
            let mut ticker = time::interval(Duration::from_secs(current_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; skip it so reports cover a full window.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = self.lock().snapshot_and_reset();
                log_snapshot(&snapshot);

                let next_secs = self.interval_secs.load(Ordering::Relaxed).max(5);
                if next_secs != current_secs {
                    current_secs = next_secs;
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct JobCounters {
    successes: u64,
    failures: u64,
    success_duration: Duration,
}

impl JobCounters {
    fn avg_latency_ms(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.success_duration.as_secs_f64() * 1_000.0 / self.successes as f64
        }
    }
}

struct MetricsState {
    per_job: HashMap<String, JobCounters>,
    stale_drops: u64,
    downloads_opaque: u64,
    downloads_transparent: u64,
    download_failures: u64,
    last_reset: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            per_job: HashMap::new(),
            stale_drops: 0,
            downloads_opaque: 0,
            downloads_transparent: 0,
            download_failures: 0,
            last_reset: Instant::now(),
        }
    }

    fn record_render(&mut self, job: &str, duration: Duration, success: bool) {
        let entry = self.per_job.entry(job.to_string()).or_default();
        if success {
            entry.successes += 1;
            entry.success_duration += duration;
        } else {
            entry.failures += 1;
        }
    }

    fn record_download(&mut self, transparent: bool, success: bool) {
        match (success, transparent) {
            (false, _) => self.download_failures += 1,
            (true, true) => self.downloads_transparent += 1,
            (true, false) => self.downloads_opaque += 1,
        }
    }

    fn snapshot_and_reset(&mut self) -> Snapshot {
        let mut per_job: Vec<_> = self.per_job.drain().collect();
        per_job.sort_by(|a, b| a.0.cmp(&b.0));

        let snapshot = Snapshot {
            elapsed: self.last_reset.elapsed(),
            per_job,
            stale_drops: self.stale_drops,
            downloads_opaque: self.downloads_opaque,
            downloads_transparent: self.downloads_transparent,
            download_failures: self.download_failures,
        };

        self.stale_drops = 0;
        self.downloads_opaque = 0;
        self.downloads_transparent = 0;
        self.download_failures = 0;
        self.last_reset = Instant::now();

        snapshot
    }
}

struct Snapshot {
    elapsed: Duration,
    per_job: Vec<(String, JobCounters)>,
    stale_drops: u64,
    downloads_opaque: u64,
    downloads_transparent: u64,
    download_failures: u64,
}

impl Snapshot {
    fn renders(&self) -> u64 {
        self.per_job
            .iter()
            .map(|(_, c)| c.successes + c.failures)
            .sum()
    }
}

fn log_snapshot(snapshot: &Snapshot) {
    info!(
        target: "qrstyle::metrics",
        interval_secs = snapshot.elapsed.as_secs(),
        renders = snapshot.renders(),
        stale_drops = snapshot.stale_drops,
        downloads_opaque = snapshot.downloads_opaque,
        downloads_transparent = snapshot.downloads_transparent,
        download_failures = snapshot.download_failures,
        "Render metrics window"
    );

    if !snapshot.per_job.is_empty() {
        let breakdown = format_breakdown(&snapshot.per_job);
        info!(target: "qrstyle::metrics", breakdown, "Per-job metrics");
    }
}

fn format_breakdown(entries: &[(String, JobCounters)]) -> String {
    entries
        .iter()
        .map(|(job, counters)| {
            let avg_ms = counters.avg_latency_ms();
            if counters.failures > 0 {
                format!(
                    "{job}: {} ok / {} err (avg {avg_ms:.1} ms)",
                    counters.successes, counters.failures
                )
            } else {
                format!("{job}: {} ok (avg {avg_ms:.1} ms)", counters.successes)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
