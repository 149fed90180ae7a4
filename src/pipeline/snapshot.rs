//! Immutable render input shared by every job

use crate::style::{DownloadSize, RenderOptions, RenderTarget, StyleConfiguration};

/// Everything a render pass needs, frozen at submission time
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    /// Canonical payload; empty means "no content"
    pub payload: String,
    /// Style at submission time
    pub style: StyleConfiguration,
    /// Side length for the download buffer
    pub download_size: DownloadSize,
}

impl RenderSnapshot {
    /// Bundle a payload with its style and download size
    pub fn new(
        payload: impl Into<String>,
        style: StyleConfiguration,
        download_size: DownloadSize,
    ) -> Self {
        Self {
            payload: payload.into(),
            style,
            download_size,
        }
    }

    /// Whether there is nothing to render
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Engine options for the live preview
    pub fn preview_options(&self) -> RenderOptions {
        RenderOptions::build(&self.payload, &self.style, RenderTarget::Preview)
    }

    /// Engine options for a download-sized raster
    pub fn download_options(&self) -> RenderOptions {
        RenderOptions::build(
            &self.payload,
            &self.style,
            RenderTarget::Download(self.download_size),
        )
    }
}
