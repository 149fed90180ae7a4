//! Visual parameters for rendered QR codes
//!
//! [`StyleConfiguration`] is the long-lived, incrementally edited style
//! state. [`options::RenderOptions`] is what the styling engine consumes.

mod color;
pub mod logo;
pub mod options;

pub use color::{Background, HexColor};
pub use logo::{Logo, LogoLoader, LogoOutcome, LogoTicket};
pub use options::{ImageOptions, RenderOptions, RenderTarget};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side length of the live preview, independent of the download size
pub const PREVIEW_SIZE: u32 = 400;

macro_rules! style_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every accepted value
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Identifier used in config files and on the command line
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = value.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == wanted)
                    .ok_or_else(|| {
                        let accepted: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        format!(
                            "Unsupported {} '{}', expected one of: {}",
                            stringify!($name),
                            value,
                            accepted.join(", ")
                        )
                    })
            }
        }
    };
}

style_enum! {
    /// Shape drawn for each dark data module
    DotStyle {
        #[default]
        /// Full square cell
        Square => "square",
        /// Circle inscribed in the cell
        Dots => "dots",
        /// Square with softly rounded free corners
        Rounded => "rounded",
        /// Square with fully rounded free corners
        ExtraRounded => "extra-rounded",
        /// Leaf shape: free top-left and bottom-right corners rounded
        Classy => "classy",
        /// Leaf shape with the remaining free corners softened too
        ClassyRounded => "classy-rounded",
    }
}

style_enum! {
    /// Outer 7x7 ring of each finder pattern
    CornerSquareStyle {
        #[default]
        /// Square ring
        Square => "square",
        /// Circular ring
        Dot => "dot",
        /// Ring with strongly rounded corners
        ExtraRounded => "extra-rounded",
    }
}

style_enum! {
    /// Inner 3x3 eye of each finder pattern
    CornerDotStyle {
        #[default]
        /// Square eye
        Square => "square",
        /// Round eye
        Dot => "dot",
    }
}

/// QR redundancy tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery
    L,
    /// ~15% recovery
    #[default]
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl ErrorCorrection {
    /// All levels, lowest redundancy first
    pub const ALL: [ErrorCorrection; 4] = [Self::L, Self::M, Self::Q, Self::H];

    /// Share of the symbol the level can restore
    pub fn recovery_ratio(self) -> f32 {
        match self {
            Self::L => 0.07,
            Self::M => 0.15,
            Self::Q => 0.25,
            Self::H => 0.30,
        }
    }

    /// Level understood by the matrix encoder
    pub fn to_ec_level(self) -> qrcode::EcLevel {
        match self {
            Self::L => qrcode::EcLevel::L,
            Self::M => qrcode::EcLevel::M,
            Self::Q => qrcode::EcLevel::Q,
            Self::H => qrcode::EcLevel::H,
        }
    }

    /// Human description with the approximate recovery capacity
    pub fn describe(self) -> &'static str {
        match self {
            Self::L => "Low (7% recovery)",
            Self::M => "Medium (15% recovery)",
            Self::Q => "Quartile (25% recovery)",
            Self::H => "High (30% recovery)",
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(letter)
    }
}

impl FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(Self::L),
            "M" | "MEDIUM" => Ok(Self::M),
            "Q" | "QUARTILE" => Ok(Self::Q),
            "H" | "HIGH" => Ok(Self::H),
            _ => Err(format!(
                "Unsupported error correction level '{value}', expected L, M, Q or H"
            )),
        }
    }
}

/// Logo size relative to the QR symbol, always within [0.10, 0.60]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct LogoSize(f32);

impl LogoSize {
    /// Smallest accepted fraction
    pub const MIN: f32 = 0.10;
    /// Largest accepted fraction
    pub const MAX: f32 = 0.60;

    /// Clamp into range; NaN falls back to the default.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Fraction of the symbol
    pub fn get(self) -> f32 {
        self.0
    }

    /// Rounded percentage, as shown to users
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for LogoSize {
    fn default() -> Self {
        Self(0.3)
    }
}

impl From<f32> for LogoSize {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<LogoSize> for f32 {
    fn from(value: LogoSize) -> Self {
        value.0
    }
}

/// Download side length in pixels: [200, 2000] in steps of 50
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct DownloadSize(u32);

impl DownloadSize {
    /// Smallest download size
    pub const MIN: u32 = 200;
    /// Largest download size
    pub const MAX: u32 = 2000;
    /// Slider step
    pub const STEP: u32 = 50;

    /// Clamp into range and snap to the nearest step.
    pub fn new(value: u32) -> Self {
        let clamped = value.clamp(Self::MIN, Self::MAX);
        let snapped = (clamped + Self::STEP / 2) / Self::STEP * Self::STEP;
        Self(snapped.clamp(Self::MIN, Self::MAX))
    }

    /// Pixels per side
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for DownloadSize {
    fn default() -> Self {
        Self(300)
    }
}

impl From<u32> for DownloadSize {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<DownloadSize> for u32 {
    fn from(value: DownloadSize) -> Self {
        value.0
    }
}

/// User-chosen visual parameters shared by preview and downloads
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfiguration {
    /// Colour of dots, corner squares and corner dots
    pub foreground: HexColor,
    /// Fill behind the modules
    pub background: Background,
    /// Data module shape
    pub dot_style: DotStyle,
    /// Finder ring shape
    pub corner_square_style: CornerSquareStyle,
    /// Finder eye shape
    pub corner_dot_style: CornerDotStyle,
    /// Redundancy tier
    pub error_correction: ErrorCorrection,
    /// Optional centred logo
    pub logo: Option<Logo>,
    /// Logo size, kept while no logo is loaded so it survives re-uploads
    pub logo_size: LogoSize,
}

impl Default for StyleConfiguration {
    fn default() -> Self {
        Self {
            foreground: HexColor::rgb(0x00, 0x99, 0x66),
            background: Background::default(),
            dot_style: DotStyle::default(),
            corner_square_style: CornerSquareStyle::default(),
            corner_dot_style: CornerDotStyle::default(),
            error_correction: ErrorCorrection::default(),
            logo: None,
            logo_size: LogoSize::default(),
        }
    }
}
