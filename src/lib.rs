//! qrstyle - styled QR codes with a live preview and sized PNG downloads
//!
//! Describe some content (a URL, free text, an email or a phone call), pick a
//! style, and get back both a live preview raster and a separately sized
//! downloadable PNG, optionally with a transparent background and a logo.
//!
//! # Features
//!
//! - **Content encoding**: `mailto:` / `tel:` payloads with URI-component escaping
//! - **Styling**: six dot shapes, three corner-square and two corner-dot shapes,
//!   colours, error correction and centred logos
//! - **Render pipeline**: generation-numbered worker where the latest edit always wins
//! - **Downloads**: one-shot renders at 200-2000px, opaque or transparent
//!
//! # Example
//!
//! ```no_run
//! use qrstyle::{DirectorySink, Field, RasterEngine, Session, SessionOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> qrstyle::Result<()> {
//!     let mut session = Session::new(
//!         Arc::new(RasterEngine::new()),
//!         Arc::new(DirectorySink::new("out")),
//!         SessionOptions::default(),
//!     );
//!
//!     session.set_field(Field::Value, "https://example.com")?;
//!     let state = session.settled().await;
//!     println!("Preview ready: {}", state.preview.is_some());
//!
//!     if let Some(saved) = session.download(true).await? {
//!         println!("Saved {}", saved.path.display());
//!     }
//!     session.shutdown().await
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod artifact;
pub mod config;
pub mod console;
pub mod content;
pub mod download;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod qr;
pub mod session;
pub mod style;

// Re-exports for convenience
pub use error::{Error, Result};

pub use artifact::{Artifact, ArtifactHandle, ArtifactRegistry};
pub use config::{DownloadOptions, LogRotation, LoggingOptions, QrStyleConfig, StyleOptions};
pub use content::{ContentRequest, DataType};
pub use download::{DirectorySink, DownloadService, DownloadSink, SavedDownload};
pub use engine::{RasterEngine, StyledInstance, StylingEngine};
pub use pipeline::{Phase, PipelineState, RenderPipeline, RenderSnapshot};
pub use qr::QrVerifier;
pub use session::{Details, Field, Session, SessionOptions};
pub use style::{
    Background, CornerDotStyle, CornerSquareStyle, DotStyle, DownloadSize, ErrorCorrection,
    HexColor, Logo, LogoSize, StyleConfiguration,
};
