//! Interactive session: form state wired to the render pipeline
//!
//! Every edit recomputes the payload and submits a fresh snapshot. Switching
//! data type wipes the fields and resets the pipeline.

use crate::artifact::ArtifactRegistry;
use crate::content::{ContentRequest, DataType};
use crate::download::{DownloadService, DownloadSink, SavedDownload};
use crate::engine::StylingEngine;
use crate::error::{Error, Result};
use crate::pipeline::{PipelineState, RenderPipeline, RenderSnapshot};
use crate::style::{
    Background, CornerDotStyle, CornerSquareStyle, DotStyle, DownloadSize, ErrorCorrection,
    HexColor, Logo, LogoLoader, LogoOutcome, LogoSize, LogoTicket, StyleConfiguration,
};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Editable form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// URL or text value
    Value,
    /// Email recipient
    EmailTo,
    /// Email subject
    EmailSubject,
    /// Email body
    EmailBody,
    /// Phone number
    PhoneNumber,
}

impl Field {
    fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::EmailTo => "to",
            Self::EmailSubject => "subject",
            Self::EmailBody => "body",
            Self::PhoneNumber => "number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "value" | "url" | "text" => Ok(Self::Value),
            "to" | "address" | "email" => Ok(Self::EmailTo),
            "subject" => Ok(Self::EmailSubject),
            "body" | "message" => Ok(Self::EmailBody),
            "number" | "phone" | "tel" => Ok(Self::PhoneNumber),
            other => Err(format!("Unknown field '{other}'")),
        }
    }
}

/// Logo section of [`Details`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogoDetails {
    /// Source file name
    pub name: String,
    /// Relative size as a whole percentage
    pub size_percent: u32,
}

/// Summary shown next to a generated code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Details {
    /// Content kind
    pub data_type: DataType,
    /// Encoded payload
    pub payload: String,
    /// Download side length in pixels
    pub download_size: u32,
    /// Data module shape
    pub dot_style: DotStyle,
    /// Redundancy tier
    pub error_correction: ErrorCorrection,
    /// Logo, when one is applied
    pub logo: Option<LogoDetails>,
}

/// Starting point for a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Initial style
    pub style: StyleConfiguration,
    /// Initial download size
    pub download_size: DownloadSize,
    /// Initial data type
    pub data_type: DataType,
}

/// Controller owning the form, style, logo loader, pipeline and downloads
pub struct Session<E: StylingEngine> {
    content: ContentRequest,
    style: StyleConfiguration,
    download_size: DownloadSize,
    logos: LogoLoader,
    pipeline: RenderPipeline,
    downloads: DownloadService<E>,
}

impl<E: StylingEngine> Session<E> {
    /// Start a session; spawns the render worker on the current runtime.
    pub fn new(engine: Arc<E>, sink: Arc<dyn DownloadSink>, options: SessionOptions) -> Self {
        let pipeline = RenderPipeline::spawn(Arc::clone(&engine), ArtifactRegistry::new());
        let downloads = DownloadService::new(engine, sink);
        Self {
            content: ContentRequest::empty(options.data_type),
            style: options.style,
            download_size: options.download_size,
            logos: LogoLoader::new(),
            pipeline,
            downloads,
        }
    }

    /// Current form contents
    pub fn content(&self) -> &ContentRequest {
        &self.content
    }

    /// Current style
    pub fn style(&self) -> &StyleConfiguration {
        &self.style
    }

    /// Current download size
    pub fn download_size(&self) -> DownloadSize {
        self.download_size
    }

    /// Payload the form currently encodes to
    pub fn payload(&self) -> String {
        self.content.encode()
    }

    /// Underlying render pipeline
    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Snapshot of the current form and style.
    ///
    /// The payload is empty unless the form's primary field has content, so a
    /// blank-looking form never renders.
    pub fn snapshot(&self) -> RenderSnapshot {
        let payload = if self.content.has_content() {
            self.payload()
        } else {
            String::new()
        };
        RenderSnapshot::new(payload, self.style.clone(), self.download_size)
    }

    /// Switch content kind, clearing every field and the current artifact.
    pub fn set_data_type(&mut self, data_type: DataType) -> Result<()> {
        if self.content.data_type() == data_type {
            return Ok(());
        }
        debug!(from = %self.content.data_type(), to = %data_type, "Data type switched");
        self.content = ContentRequest::empty(data_type);
        self.pipeline.reset()?;
        Ok(())
    }

    /// Edit one field of the current form.
    pub fn set_field(&mut self, field: Field, input: impl Into<String>) -> Result<()> {
        let slot = match (&mut self.content, field) {
            (ContentRequest::Url { value } | ContentRequest::Text { value }, Field::Value) => value,
            (ContentRequest::Email { address, .. }, Field::EmailTo) => address,
            (ContentRequest::Email { subject, .. }, Field::EmailSubject) => subject,
            (ContentRequest::Email { body, .. }, Field::EmailBody) => body,
            (ContentRequest::Phone { number }, Field::PhoneNumber) => number,
            (content, field) => {
                return Err(Error::Other(format!(
                    "Field '{field}' does not apply to {} content",
                    content.data_type()
                )));
            }
        };
        *slot = input.into();
        self.refresh()
    }

    /// Set the module colour.
    pub fn set_foreground(&mut self, color: HexColor) -> Result<()> {
        self.style.foreground = color;
        self.refresh()
    }

    /// Set the background fill.
    pub fn set_background(&mut self, background: Background) -> Result<()> {
        self.style.background = background;
        self.refresh()
    }

    /// Set the data module shape.
    pub fn set_dot_style(&mut self, style: DotStyle) -> Result<()> {
        self.style.dot_style = style;
        self.refresh()
    }

    /// Set the finder ring shape.
    pub fn set_corner_square_style(&mut self, style: CornerSquareStyle) -> Result<()> {
        self.style.corner_square_style = style;
        self.refresh()
    }

    /// Set the finder eye shape.
    pub fn set_corner_dot_style(&mut self, style: CornerDotStyle) -> Result<()> {
        self.style.corner_dot_style = style;
        self.refresh()
    }

    /// Set the redundancy tier.
    pub fn set_error_correction(&mut self, level: ErrorCorrection) -> Result<()> {
        self.style.error_correction = level;
        self.refresh()
    }

    /// Set the download size; returns the clamped, snapped value.
    pub fn set_download_size(&mut self, size: u32) -> Result<DownloadSize> {
        self.download_size = DownloadSize::new(size);
        self.refresh()?;
        Ok(self.download_size)
    }

    /// Set the logo's relative size; returns the clamped value.
    pub fn set_logo_size(&mut self, size: f32) -> Result<LogoSize> {
        self.style.logo_size = LogoSize::new(size);
        self.refresh()?;
        Ok(self.style.logo_size)
    }

    /// Begin loading a logo file; call [`Session::finish_logo`] to apply it.
    pub fn load_logo(&mut self, path: impl Into<PathBuf>) -> LogoTicket {
        self.logos.start(path)
    }

    /// Wait for the newest logo ingestion and apply it.
    ///
    /// Returns `Ok(None)` when nothing was pending or the result was
    /// superseded. A failed upload leaves the current logo untouched and is
    /// reported as [`Error::Upload`].
    pub async fn finish_logo(&mut self) -> Result<Option<LogoTicket>> {
        match self.logos.next_outcome().await {
            Some(outcome) => self.apply_logo(outcome),
            None => Ok(None),
        }
    }

    /// Apply a finished logo ingestion without waiting.
    pub fn poll_logo(&mut self) -> Result<Option<LogoTicket>> {
        match self.logos.try_outcome() {
            Some(outcome) => self.apply_logo(outcome),
            None => Ok(None),
        }
    }

    /// Drop the logo and any ingestion still in flight.
    pub fn remove_logo(&mut self) -> Result<()> {
        self.logos.supersede();
        if self.style.logo.take().is_some() {
            info!("Logo removed");
        }
        self.refresh()
    }

    /// Save the current code; `Ok(None)` when the form has no content.
    pub async fn download(&self, transparent: bool) -> Result<Option<SavedDownload>> {
        if !self.content.has_content() {
            return Ok(None);
        }
        self.downloads.download(&self.snapshot(), transparent).await
    }

    /// Details panel, or `None` while the placeholder is shown
    pub fn details(&self) -> Option<Details> {
        if !self.content.has_content() {
            return None;
        }
        Some(Details {
            data_type: self.content.data_type(),
            payload: self.payload(),
            download_size: self.download_size.get(),
            dot_style: self.style.dot_style,
            error_correction: self.style.error_correction,
            logo: self.style.logo.as_ref().map(|logo| LogoDetails {
                name: logo.name().to_string(),
                size_percent: self.style.logo_size.percent(),
            }),
        })
    }

    /// Wait for the pipeline to catch up with every edit so far.
    pub async fn settled(&self) -> PipelineState {
        self.pipeline.settled().await
    }

    /// Stop rendering and release the preview and artifact.
    pub async fn shutdown(self) -> Result<()> {
        self.pipeline.shutdown().await
    }

    fn apply_logo(&mut self, outcome: LogoOutcome) -> Result<Option<LogoTicket>> {
        match outcome {
            LogoOutcome::Loaded(ticket, logo) => {
                info!(name = logo.name(), "Logo applied");
                self.set_logo(logo)?;
                Ok(Some(ticket))
            }
            LogoOutcome::Failed(_, err) => {
                warn!(error = %err, "Logo not applied");
                Err(err)
            }
        }
    }

    fn set_logo(&mut self, logo: Logo) -> Result<()> {
        self.style.logo = Some(logo);
        self.refresh()
    }

    fn refresh(&self) -> Result<()> {
        self.pipeline.submit(self.snapshot())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DirectorySink;
    use crate::engine::RasterEngine;
    use crate::pipeline::Phase;
    use image::{Rgba, RgbaImage};

    fn session(dir: &std::path::Path) -> Session<RasterEngine> {
        Session::new(
            Arc::new(RasterEngine::new()),
            Arc::new(DirectorySink::new(dir)),
            SessionOptions::default(),
        )
    }

    #[tokio::test]
    async fn empty_form_shows_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());

        assert!(session.details().is_none());
        assert!(session.download(false).await.unwrap().is_none());
        let state = session.settled().await;
        assert!(state.preview.is_none());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn whitespace_value_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());

        session.set_field(Field::Value, "hello").unwrap();
        assert!(session.settled().await.artifact.is_some());

        session.set_field(Field::Value, "   ").unwrap();
        let state = session.settled().await;
        assert!(state.preview.is_none());
        assert!(state.artifact.is_none());
        assert_eq!(state.phase, Phase::Idle);
        assert!(session.details().is_none());
        assert!(session.snapshot().is_empty());
        assert_eq!(session.pipeline().registry().live_count(), 0);
    }

    #[tokio::test]
    async fn field_edits_drive_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());

        session.set_field(Field::Value, "https://example.com").unwrap();
        let state = session.settled().await;
        assert_eq!(state.phase, Phase::Ready);
        assert!(state.preview.is_some());
        assert!(state.artifact.is_some());

        let details = session.details().unwrap();
        assert_eq!(details.payload, "https://example.com");
        assert_eq!(details.error_correction, ErrorCorrection::M);
        assert_eq!(details.download_size, 300);
    }

    #[tokio::test]
    async fn switching_type_clears_fields_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());

        session.set_field(Field::Value, "hello").unwrap();
        session.settled().await;

        session.set_data_type(DataType::Email).unwrap();
        assert_eq!(session.content(), &ContentRequest::empty(DataType::Email));
        let state = session.settled().await;
        assert!(state.artifact.is_none());
        assert!(state.preview.is_none());
        assert_eq!(session.pipeline().registry().live_count(), 0);

        session.set_data_type(DataType::Url).unwrap();
        assert_eq!(session.payload(), "");
    }

    #[tokio::test]
    async fn field_must_match_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        assert!(session.set_field(Field::PhoneNumber, "123").is_err());

        session.set_data_type(DataType::Phone).unwrap();
        session.set_field(Field::PhoneNumber, "+15551234").unwrap();
        assert_eq!(session.payload(), "tel:+15551234");
    }

    #[tokio::test]
    async fn sizes_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        assert_eq!(session.set_download_size(10_000).unwrap().get(), 2000);
        assert_eq!(session.set_download_size(333).unwrap().get(), 350);
        assert!((session.set_logo_size(0.9).unwrap().get() - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn logo_upload_applies_and_remove_supersedes() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(16, 16, Rgba([200, 0, 0, 255]))
            .save(&logo_path)
            .unwrap();

        let mut session = session(dir.path());
        session.set_field(Field::Value, "https://example.com").unwrap();

        session.load_logo(&logo_path);
        assert!(session.finish_logo().await.unwrap().is_some());
        let details = session.details().unwrap();
        assert_eq!(
            details.logo,
            Some(LogoDetails {
                name: "logo.png".to_string(),
                size_percent: 30,
            })
        );

        session.load_logo(&logo_path);
        session.remove_logo().unwrap();
        assert!(session.finish_logo().await.unwrap().is_none());
        assert!(session.style().logo.is_none());
    }

    #[tokio::test]
    async fn bad_logo_is_reported_and_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("logo.png");
        std::fs::write(&bogus, b"not an image").unwrap();

        let mut session = session(dir.path());
        session.load_logo(&bogus);
        let err = session.finish_logo().await.unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
        assert!(session.style().logo.is_none());
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("subject".parse::<Field>().unwrap(), Field::EmailSubject);
        assert_eq!("TO".parse::<Field>().unwrap(), Field::EmailTo);
        assert!("colour".parse::<Field>().is_err());
    }
}
