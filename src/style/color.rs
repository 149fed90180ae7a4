//! Hex colours and the background sentinel

use crate::error::{Error, Result};
use image::Rgba;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An sRGB colour written as `#rrggbb` (alpha kept when given)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor(pub [u8; 4]);

impl HexColor {
    /// Opaque white
    pub const WHITE: HexColor = HexColor([0xff, 0xff, 0xff, 0xff]);

    /// Build an opaque colour from components
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 0xff])
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || Error::InvalidColor(value.to_string());

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                let mut out = [0xff; 4];
                for (i, c) in digits.chars().enumerate() {
                    let nibble = c.to_digit(16).ok_or_else(invalid)? as u8;
                    out[i] = nibble * 17;
                }
                Ok(Self(out))
            }
            6 => Ok(Self([
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                0xff,
            ])),
            8 => Ok(Self([
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                channel(&digits[6..8])?,
            ])),
            _ => Err(invalid()),
        }
    }

    /// Pixel value for the raster engine
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 0xff {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl FromStr for HexColor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HexColor::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Background fill: a colour, or fully transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Background {
    /// Solid fill
    Color(HexColor),
    /// No fill; pixels outside the modules keep zero alpha
    Transparent,
}

impl Background {
    /// Sentinel string accepted in place of a colour
    pub const TRANSPARENT: &'static str = "transparent";

    /// Pixel value used to clear the canvas
    pub fn to_rgba(self) -> Rgba<u8> {
        match self {
            Self::Color(color) => color.to_rgba(),
            Self::Transparent => Rgba([0, 0, 0, 0]),
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(HexColor::WHITE)
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Color(color) => color.fmt(f),
            Self::Transparent => f.write_str(Self::TRANSPARENT),
        }
    }
}

impl FromStr for Background {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.trim().eq_ignore_ascii_case(Self::TRANSPARENT) {
            Ok(Self::Transparent)
        } else {
            HexColor::parse(value).map(Self::Color)
        }
    }
}

impl Serialize for Background {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Background {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Background>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!(HexColor::parse("#009966").unwrap(), HexColor::rgb(0, 0x99, 0x66));
        assert_eq!(HexColor::parse("fff").unwrap(), HexColor::WHITE);
        assert_eq!(
            HexColor::parse("#11223344").unwrap(),
            HexColor([0x11, 0x22, 0x33, 0x44])
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(HexColor::parse("#12345").is_err());
        assert!(HexColor::parse("#gggggg").is_err());
        assert!(HexColor::parse("").is_err());
    }

    #[test]
    fn displays_lowercase_hex() {
        assert_eq!(HexColor::rgb(0, 0x99, 0x66).to_string(), "#009966");
    }

    #[test]
    fn background_accepts_transparent_sentinel() {
        assert_eq!("transparent".parse::<Background>().unwrap(), Background::Transparent);
        assert_eq!(
            "#ffffff".parse::<Background>().unwrap(),
            Background::Color(HexColor::WHITE)
        );
        assert_eq!(Background::Transparent.to_rgba().0[3], 0);
    }
}
