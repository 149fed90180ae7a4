//! Styling engine: render options to rasters
//!
//! The pipeline only talks to the [`StylingEngine`] and [`StyledInstance`]
//! traits. [`RasterEngine`] is the built-in implementation on top of
//! `qrcode` and `image`.

mod raster;
mod shapes;

pub use raster::render;

use crate::error::{Error, Result};
use crate::style::RenderOptions;
use bytes::Bytes;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Factory for styled QR renderer instances
pub trait StylingEngine: Send + Sync + 'static {
    /// Instance type produced by this engine
    type Instance: StyledInstance;

    /// Construct a new instance and render `options` into it.
    fn create(&self, options: RenderOptions) -> Result<Self::Instance>;
}

/// One renderer instance: holds its options and the last good frame
pub trait StyledInstance: Send + 'static {
    /// Re-render with new options, reusing this instance.
    ///
    /// On failure the previous options and frame are kept.
    fn update(&mut self, options: RenderOptions) -> Result<()>;

    /// Options of the current frame
    fn options(&self) -> &RenderOptions;

    /// Current frame
    fn frame(&self) -> Arc<RgbaImage>;

    /// Current frame encoded as PNG
    fn raw_png(&self) -> Result<Bytes> {
        encode_png(&self.frame())
    }
}

/// Built-in rasterizing engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl StylingEngine for RasterEngine {
    type Instance = RasterInstance;

    fn create(&self, options: RenderOptions) -> Result<RasterInstance> {
        let frame = render(&options)?;
        Ok(RasterInstance {
            options,
            frame: Arc::new(frame),
        })
    }
}

/// Instance produced by [`RasterEngine`]
#[derive(Debug)]
pub struct RasterInstance {
    options: RenderOptions,
    frame: Arc<RgbaImage>,
}

impl StyledInstance for RasterInstance {
    fn update(&mut self, options: RenderOptions) -> Result<()> {
        let frame = render(&options)?;
        self.options = options;
        self.frame = Arc::new(frame);
        Ok(())
    }

    fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn frame(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.frame)
    }
}

/// Encode an RGBA raster as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Bytes> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::Render(format!("PNG encoding failed: {e}")))?;
    Ok(Bytes::from(buf))
}
