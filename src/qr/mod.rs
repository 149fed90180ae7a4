//! QR matrix encoding and decoding
//!
//! [`ModuleMatrix`] wraps the `qrcode` encoder and answers the geometric
//! questions the styling engine asks (is this module dark, is it part of a
//! finder pattern). [`QrVerifier`] scans rendered images back to text.

mod decoder;

pub use decoder::QrVerifier;

use crate::error::Result;
use crate::style::ErrorCorrection;
use qrcode::{Color, QrCode};

/// Side length of a finder pattern in modules
pub const FINDER_SIZE: usize = 7;

/// Dark/light module grid for one payload
#[derive(Debug, Clone)]
pub struct ModuleMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl ModuleMatrix {
    /// Encode `data` as a byte-mode QR symbol at the given level.
    pub fn encode(data: &str, level: ErrorCorrection) -> Result<Self> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), level.to_ec_level())?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();

        tracing::trace!(width, level = %level, bytes = data.len(), "Encoded QR matrix");

        Ok(Self { width, dark })
    }

    /// Modules per side
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at (x, y) is dark; out of range reads as light.
    pub fn is_dark(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.width {
            return false;
        }
        self.dark[y * self.width + x]
    }

    /// Whether the symbol still reads back as `data` with every module for
    /// which `damaged(x, y)` holds inverted.
    pub fn survives_damage(&self, data: &str, damaged: impl Fn(usize, usize) -> bool) -> bool {
        let grid = rqrr::SimpleGrid::from_func(self.width, |x, y| {
            self.dark[y * self.width + x] != damaged(x, y)
        });
        matches!(rqrr::Grid::new(grid).decode(), Ok((_, decoded)) if decoded == data)
    }

    /// Top-left module of the finder pattern containing (x, y), if any.
    pub fn finder_origin(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let far = self.width.saturating_sub(FINDER_SIZE);
        let in_near = |v: usize| v < FINDER_SIZE;
        let in_far = |v: usize| v >= far && v < self.width;

        if in_near(x) && in_near(y) {
            Some((0, 0))
        } else if in_far(x) && in_near(y) {
            Some((far, 0))
        } else if in_near(x) && in_far(y) {
            Some((0, far))
        } else {
            None
        }
    }
}
