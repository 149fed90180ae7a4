//! One-shot download renders and file saves
//!
//! Downloads never touch the mounted preview: each command builds its own
//! engine instance at the selected download size, encodes it, and hands the
//! PNG to a [`DownloadSink`].

use crate::engine::{StyledInstance, StylingEngine};
use crate::error::{Error, Result};
use crate::metrics;
use crate::pipeline::RenderSnapshot;
use crate::style::{RenderOptions, RenderTarget};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Destination for finished downloads
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Persist `png` under `file_name`, returning where it ended up.
    async fn save(&self, file_name: &str, png: Bytes) -> Result<PathBuf>;
}

/// Writes downloads into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, file_name: &str, png: Bytes) -> Result<PathBuf> {
        if !self.dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                Error::Download(format!(
                    "Failed to create directory {}: {e}",
                    self.dir.display()
                ))
            })?;
        }

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &png)
            .await
            .map_err(|e| Error::Download(format!("Failed to write {}: {e}", path.display())))?;
        Ok(path)
    }
}

/// Outcome of a completed download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedDownload {
    /// Where the sink stored the file
    pub path: PathBuf,
    /// `qrcode-[transparent-]<epoch-millis>.png`
    pub file_name: String,
    /// Side length in pixels
    pub size: u32,
    /// Whether the background was forced transparent
    pub transparent: bool,
}

/// File name for a download made at `millis` since the Unix epoch.
pub fn file_name(transparent: bool, millis: u128) -> String {
    if transparent {
        format!("qrcode-transparent-{millis}.png")
    } else {
        format!("qrcode-{millis}.png")
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Opaque and transparent download commands
pub struct DownloadService<E: StylingEngine> {
    engine: Arc<E>,
    sink: Arc<dyn DownloadSink>,
}

impl<E: StylingEngine> DownloadService<E> {
    /// Service rendering with `engine` and saving through `sink`
    pub fn new(engine: Arc<E>, sink: Arc<dyn DownloadSink>) -> Self {
        Self { engine, sink }
    }

    /// Download with the configured background.
    pub async fn download_opaque(&self, snapshot: &RenderSnapshot) -> Result<Option<SavedDownload>> {
        self.download(snapshot, false).await
    }

    /// Download with the background forced transparent.
    pub async fn download_transparent(
        &self,
        snapshot: &RenderSnapshot,
    ) -> Result<Option<SavedDownload>> {
        self.download(snapshot, true).await
    }

    /// Render `snapshot` once and save it; `Ok(None)` when there is no content.
    pub async fn download(
        &self,
        snapshot: &RenderSnapshot,
        transparent: bool,
    ) -> Result<Option<SavedDownload>> {
        if snapshot.is_empty() {
            return Ok(None);
        }

        let size = snapshot.download_size;
        let mut options =
            RenderOptions::build(&snapshot.payload, &snapshot.style, RenderTarget::Download(size));
        if transparent {
            options = options.transparent();
        }

        let engine = Arc::clone(&self.engine);
        let png = tokio::task::spawn_blocking(move || engine.create(options)?.raw_png())
            .await
            .map_err(|e| Error::Render(format!("Download render aborted: {e}")))?;
        let png = match png {
            Ok(png) => png,
            Err(err) => {
                metrics::record_download(transparent, false);
                return Err(err);
            }
        };

        let file_name = file_name(transparent, epoch_millis());
        let saved = self.sink.save(&file_name, png).await;
        metrics::record_download(transparent, saved.is_ok());
        let path = saved?;

        info!(
            path = %path.display(),
            size = size.get(),
            transparent,
            "QR code downloaded"
        );

        Ok(Some(SavedDownload {
            path,
            file_name,
            size: size.get(),
            transparent,
        }))
    }
}
