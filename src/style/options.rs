//! Mapping from [`StyleConfiguration`] onto the styling engine's options

use super::{
    Background, CornerDotStyle, CornerSquareStyle, DotStyle, DownloadSize, ErrorCorrection,
    HexColor, Logo, PREVIEW_SIZE, StyleConfiguration,
};
use serde::Serialize;

/// Quiet margin around the symbol, in pixels
pub const QR_MARGIN: u32 = 10;
/// Gap kept clear around a logo, in pixels
pub const LOGO_MARGIN: u32 = 8;

/// Which render job the options are for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "size", rename_all = "lowercase")]
pub enum RenderTarget {
    /// Live preview at the fixed canonical resolution
    Preview,
    /// Detached raster at the user-selected size
    Download(DownloadSize),
}

impl RenderTarget {
    /// Side length in pixels
    pub fn side(self) -> u32 {
        match self {
            Self::Preview => PREVIEW_SIZE,
            Self::Download(size) => size.get(),
        }
    }
}

/// Colour plus shape for one class of modules
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementOptions<S> {
    /// Fill colour
    pub color: HexColor,
    /// Shape
    #[serde(rename = "type")]
    pub style: S,
}

/// How the engine would fetch a remote logo; local logos ignore it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    /// No credentials
    Anonymous,
}

/// Logo compositing options
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageOptions {
    /// Decoded logo
    #[serde(skip)]
    pub logo: Logo,
    /// Fetch policy
    pub cross_origin: CrossOrigin,
    /// Clear gap around the logo in pixels
    pub margin: u32,
    /// Share of the error-correction budget the logo may cover
    pub image_size: f32,
    /// Drop data modules that sit under the logo
    pub hide_background_dots: bool,
}

/// Full option set consumed by a [`crate::engine::StylingEngine`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOptions {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Payload to encode
    pub data: String,
    /// Margin around the symbol in pixels
    pub margin: u32,
    /// Redundancy tier
    pub error_correction: ErrorCorrection,
    /// Data modules
    pub dots: ElementOptions<DotStyle>,
    /// Finder rings
    pub corners_square: ElementOptions<CornerSquareStyle>,
    /// Finder eyes
    pub corners_dot: ElementOptions<CornerDotStyle>,
    /// Canvas fill
    pub background: Background,
    /// Optional logo
    pub image: Option<ImageOptions>,
}

impl RenderOptions {
    /// Build engine options for `payload` styled by `style` at `target` size.
    ///
    /// The foreground colour is applied to every module class alike. A logo
    /// always forces the fixed compositing options.
    pub fn build(payload: &str, style: &StyleConfiguration, target: RenderTarget) -> Self {
        let side = target.side();
        let foreground = style.foreground;

        Self {
            width: side,
            height: side,
            data: payload.to_string(),
            margin: QR_MARGIN,
            error_correction: style.error_correction,
            dots: ElementOptions {
                color: foreground,
                style: style.dot_style,
            },
            corners_square: ElementOptions {
                color: foreground,
                style: style.corner_square_style,
            },
            corners_dot: ElementOptions {
                color: foreground,
                style: style.corner_dot_style,
            },
            background: style.background,
            image: style.logo.as_ref().map(|logo| ImageOptions {
                logo: logo.clone(),
                cross_origin: CrossOrigin::Anonymous,
                margin: LOGO_MARGIN,
                image_size: style.logo_size.get(),
                hide_background_dots: true,
            }),
        }
    }

    /// Same options with the background forced to transparent.
    pub fn transparent(self) -> Self {
        Self {
            background: Background::Transparent,
            ..self
        }
    }
}
