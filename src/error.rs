//! Error types for qrstyle operations

use thiserror::Error;

/// Result type alias using qrstyle's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrstyle operations
#[derive(Error, Debug)]
pub enum Error {
    /// The payload could not be turned into a QR matrix (too long for the
    /// chosen error correction level, etc.)
    #[error("Failed to encode QR code: {0}")]
    Encode(String),

    /// The styling engine failed to produce a raster
    #[error("Render failed: {0}")]
    Render(String),

    /// A logo file could not be read or decoded
    #[error("Logo upload failed: {0}")]
    Upload(String),

    /// Saving a downloadable artifact failed
    #[error("Download failed: {0}")]
    Download(String),

    /// A colour string was not a valid hex colour
    #[error("Invalid colour '{0}', expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor(String),

    /// The render worker is no longer running
    #[error("Render pipeline has shut down")]
    PipelineClosed,

    /// Decoding a rendered QR code back to text failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in an image
    #[error("No QR code found in image")]
    NoQrCodeFound,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(e: qrcode::types::QrError) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}
