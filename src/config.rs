//! qrstyle runtime configuration handling

use crate::error::{Error, Result};
use crate::style::{
    Background, CornerDotStyle, CornerSquareStyle, DotStyle, DownloadSize, ErrorCorrection,
    HexColor, LogoSize, StyleConfiguration,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrStyleConfig {
    /// Initial style of new sessions
    pub style: StyleOptions,
    /// Download size and destination
    pub download: DownloadOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QrStyleConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrstyle.toml / qrstyle.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrstyle.toml", "qrstyle.yaml", "qrstyle.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrstyle");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.style.apply_env_overrides();
        self.download.apply_env_overrides();
        self.logging.apply_env_overrides();
    }
}

/// Style defaults for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    /// Module colour
    pub foreground: HexColor,
    /// Background colour or `transparent`
    pub background: Background,
    /// Data module shape
    pub dot_style: DotStyle,
    /// Finder ring shape
    pub corner_square_style: CornerSquareStyle,
    /// Finder eye shape
    pub corner_dot_style: CornerDotStyle,
    /// Redundancy tier
    pub error_correction: ErrorCorrection,
    /// Logo size relative to the symbol, 0.10 to 0.60
    pub logo_size: LogoSize,
    /// Logo file loaded at startup
    pub logo: Option<PathBuf>,
}

impl Default for StyleOptions {
    fn default() -> Self {
        let style = StyleConfiguration::default();
        Self {
            foreground: style.foreground,
            background: style.background,
            dot_style: style.dot_style,
            corner_square_style: style.corner_square_style,
            corner_dot_style: style.corner_dot_style,
            error_correction: style.error_correction,
            logo_size: style.logo_size,
            logo: None,
        }
    }
}

impl StyleOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        override_parsed("QRSTYLE_FOREGROUND", &mut self.foreground);
        override_parsed("QRSTYLE_BACKGROUND", &mut self.background);
        override_parsed("QRSTYLE_DOT_STYLE", &mut self.dot_style);
        override_parsed("QRSTYLE_CORNER_SQUARE_STYLE", &mut self.corner_square_style);
        override_parsed("QRSTYLE_CORNER_DOT_STYLE", &mut self.corner_dot_style);
        override_parsed("QRSTYLE_ERROR_CORRECTION", &mut self.error_correction);
        if let Ok(size) = env::var("QRSTYLE_LOGO_SIZE") {
            if let Ok(parsed) = size.parse::<f32>() {
                self.logo_size = LogoSize::new(parsed);
            }
        }
        if let Ok(logo) = env::var("QRSTYLE_LOGO") {
            if logo.trim().is_empty() {
                self.logo = None;
            } else {
                self.logo = Some(PathBuf::from(logo));
            }
        }
    }

    /// Session style described by these options (logo excluded; it loads asynchronously)
    pub fn to_style(&self) -> StyleConfiguration {
        StyleConfiguration {
            foreground: self.foreground,
            background: self.background,
            dot_style: self.dot_style,
            corner_square_style: self.corner_square_style,
            corner_dot_style: self.corner_dot_style,
            error_correction: self.error_correction,
            logo: None,
            logo_size: self.logo_size,
        }
    }
}

/// Where and how large downloads are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// Side length in pixels, 200 to 2000 in steps of 50
    pub size: DownloadSize,
    /// Output directory for saved PNG files
    pub dir: PathBuf,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            size: DownloadSize::default(),
            dir: PathBuf::from("."),
        }
    }
}

impl DownloadOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(size) = env::var("QRSTYLE_DOWNLOAD_SIZE") {
            if let Ok(parsed) = size.parse::<u32>() {
                self.size = DownloadSize::new(parsed);
            }
        }
        if let Ok(dir) = env::var("QRSTYLE_DOWNLOAD_DIR") {
            self.dir = PathBuf::from(dir);
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRSTYLE_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in console logging
    pub color: bool,
    /// Enable periodic render metrics summaries over tracing
    pub metrics: bool,
    /// Interval in seconds for emitting aggregated metrics when enabled
    pub metrics_interval_secs: u64,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            color: true,
            metrics: false,
            metrics_interval_secs: 60,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRSTYLE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRSTYLE_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(color) = env_flag("QRSTYLE_LOG_COLOR") {
            self.color = color;
        }
        if let Some(metrics) = env_flag("QRSTYLE_LOG_METRICS") {
            self.metrics = metrics;
        }
        if let Ok(interval) = env::var("QRSTYLE_LOG_METRICS_INTERVAL") {
            if let Ok(value) = interval.parse::<u64>() {
                self.metrics_interval_secs = value.max(5);
            }
        }
        if let Ok(rotation) = env::var("QRSTYLE_LOG_ROTATION") {
            if let Ok(parsed) = rotation.parse::<LogRotation>() {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(format!(
                "Unsupported rotation '{other}', expected 'hourly' or 'daily'"
            )),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    match env::var(name).ok()?.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn override_parsed<T>(name: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(value) => *slot = value,
        Err(err) => tracing::warn!(variable = name, error = %err, "Ignoring invalid override"),
    }
}
