//! Logging utilities wrapping `tracing` initialisation

use crate::config::{LogRotation, LoggingOptions};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use tracing::Subscriber;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialise the global tracing subscriber according to the provided logging options.
///
/// Subsequent calls are ignored to avoid reinitialisation panics.
pub fn init(options: &LoggingOptions) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let level = std::env::var("QRSTYLE_LOG_LEVEL").unwrap_or_else(|_| options.level.clone());
    let directives = filter_directives(&level, options.metrics);
    let env_filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?;

    if let Some(file_layer) = file_layer::<LayeredEnvFilter>(options)? {
        Registry::default()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer::<_>(options.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
    } else {
        Registry::default()
            .with(env_filter)
            .with(console_layer::<LayeredEnvFilter>(options.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
    }
}

const METRICS_TARGET: &str = "qrstyle::metrics";

/// Filter directives for `level`, keeping render timings visible when
/// metrics are on even if the base level would hide them.
fn filter_directives(level: &str, metrics: bool) -> String {
    let level = level.trim();
    if !metrics || level.contains(METRICS_TARGET) {
        return level.to_string();
    }
    if level.is_empty() {
        format!("warn,{METRICS_TARGET}=info")
    } else {
        format!("{level},{METRICS_TARGET}=info")
    }
}

type LayeredEnvFilter = Layered<EnvFilter, Registry>;
type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn file_layer<S>(options: &LoggingOptions) -> Result<Option<BoxedLayer<S>>>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    let path = match options.file.as_ref() {
        Some(path) => path,
        None => return Ok(None),
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory {}: {e}",
            dir.display()
        ))
    })?;

    let (non_blocking, guard) = log_writer(dir, path, options.rotation)?;
    // Dropping the guard would stop the writer thread.
    let _ = FILE_GUARD.set(guard);

    Ok(Some(
        fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_target(true)
            .with_level(true)
            .boxed(),
    ))
}

fn log_writer(
    dir: &Path,
    path: &Path,
    rotation: Option<LogRotation>,
) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let builder = non_blocking::NonBlockingBuilder::default().lossy(false);
    let Some(rotation) = rotation else {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::Config(format!("Failed to open log file {}: {e}", path.display())))?;
        return Ok(builder.finish(file));
    };

    let file_name = path.file_name().ok_or_else(|| {
        Error::Config(format!(
            "Rotated log path '{}' has no file name",
            path.display()
        ))
    })?;
    let appender = match rotation {
        LogRotation::Hourly => rolling::hourly(dir, file_name),
        LogRotation::Daily => rolling::daily(dir, file_name),
    };
    Ok(builder.finish(appender))
}

/// Console logs go to stderr so stdout stays clean for `--json` output.
fn console_layer<S>(color: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr)
        .with_ansi(color)
        .with_target(true)
        .with_level(true)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_requires_file_name() {
        let options = LoggingOptions {
            file: Some(std::path::PathBuf::from("/")),
            rotation: Some(LogRotation::Daily),
            ..LoggingOptions::default()
        };
        let layer = file_layer::<LayeredEnvFilter>(&options);
        assert!(matches!(layer, Err(Error::Config(_))));
    }

    #[test]
    fn metrics_stay_visible_at_quiet_levels() {
        assert_eq!(filter_directives("warn", true), "warn,qrstyle::metrics=info");
        assert_eq!(filter_directives("", true), "warn,qrstyle::metrics=info");
        assert_eq!(filter_directives("warn", false), "warn");
    }

    #[test]
    fn explicit_metrics_directive_wins() {
        let level = "info,qrstyle::metrics=off";
        assert_eq!(filter_directives(level, true), level);
        assert!(EnvFilter::try_new(filter_directives("debug", true)).is_ok());
    }

    #[test]
    fn no_file_means_no_file_layer() {
        let layer = file_layer::<LayeredEnvFilter>(&LoggingOptions::default()).unwrap();
        assert!(layer.is_none());
    }
}
