//! Logo ingestion: file to decoded RGBA image
//!
//! Ingestion runs in the background and cannot be cancelled once started.
//! Each request gets a [`LogoTicket`]; only the newest ticket's result is
//! ever applied, so a slow upload never overrides a later upload or removal.

use crate::error::{Error, Result};
use bytes::Bytes;
use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A decoded logo ready for compositing
#[derive(Clone)]
pub struct Logo {
    id: Uuid,
    name: String,
    image: Arc<RgbaImage>,
}

impl Logo {
    /// Wrap an already decoded image
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            image: Arc::new(image),
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...) held in memory.
    pub fn decode(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let name = name.into();
        let decoded = image::load_from_memory(data)
            .map_err(|e| Error::Upload(format!("{name}: {e}")))?;
        Ok(Self::new(name, decoded.to_rgba8()))
    }

    /// Display name (usually the file name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded pixels
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }
}

impl PartialEq for Logo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Logo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logo")
            .field("name", &self.name)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Identifies one ingestion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogoTicket(u64);

/// Result of the newest ingestion
#[derive(Debug)]
pub enum LogoOutcome {
    /// Decoded and ready to apply
    Loaded(LogoTicket, Logo),
    /// Read or decode failed; the logo is not applied
    Failed(LogoTicket, Error),
}

/// Runs logo ingestions and filters out superseded results
pub struct LogoLoader {
    latest: u64,
    in_flight: usize,
    tx: mpsc::UnboundedSender<(LogoTicket, Result<Logo>)>,
    rx: mpsc::UnboundedReceiver<(LogoTicket, Result<Logo>)>,
}

impl LogoLoader {
    /// Create an idle loader
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            latest: 0,
            in_flight: 0,
            tx,
            rx,
        }
    }

    /// Start reading and decoding a logo file in the background.
    pub fn start(&mut self, path: impl Into<PathBuf>) -> LogoTicket {
        let path = path.into();
        let ticket = self.next_ticket();
        let tx = self.tx.clone();
        self.in_flight += 1;

        tracing::debug!(?ticket, path = %path.display(), "Logo ingestion started");

        tokio::spawn(async move {
            let result = ingest_file(&path).await;
            let _ = tx.send((ticket, result));
        });

        ticket
    }

    /// Start decoding logo bytes already in memory.
    pub fn start_bytes(&mut self, name: impl Into<String>, data: Bytes) -> LogoTicket {
        let name = name.into();
        let ticket = self.next_ticket();
        let tx = self.tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = decode_blocking(name, data).await;
            let _ = tx.send((ticket, result));
        });

        ticket
    }

    /// Mark every in-flight ingestion as superseded (e.g. the logo was removed).
    pub fn supersede(&mut self) {
        self.next_ticket();
    }

    /// Whether any ingestion has not reported back yet
    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Wait for the next non-stale outcome; `None` once nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<LogoOutcome> {
        while self.in_flight > 0 {
            let (ticket, result) = self.rx.recv().await?;
            self.in_flight -= 1;
            if let Some(outcome) = self.accept(ticket, result) {
                return Some(outcome);
            }
        }
        None
    }

    /// Collect a finished outcome without waiting.
    pub fn try_outcome(&mut self) -> Option<LogoOutcome> {
        while let Ok((ticket, result)) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if let Some(outcome) = self.accept(ticket, result) {
                return Some(outcome);
            }
        }
        None
    }

    fn accept(&self, ticket: LogoTicket, result: Result<Logo>) -> Option<LogoOutcome> {
        if ticket.0 != self.latest {
            tracing::debug!(?ticket, latest = self.latest, "Dropping superseded logo ingestion");
            return None;
        }
        Some(match result {
            Ok(logo) => LogoOutcome::Loaded(ticket, logo),
            Err(err) => LogoOutcome::Failed(ticket, err),
        })
    }

    fn next_ticket(&mut self) -> LogoTicket {
        self.latest += 1;
        LogoTicket(self.latest)
    }
}

impl Default for LogoLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn ingest_file(path: &Path) -> Result<Logo> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Upload(format!("Failed to read {}: {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    decode_blocking(name, Bytes::from(data)).await
}

async fn decode_blocking(name: String, data: Bytes) -> Result<Logo> {
    tokio::task::spawn_blocking(move || Logo::decode(name, &data))
        .await
        .map_err(|e| Error::Upload(format!("Logo decode task failed: {e}")))?
}
