//! Styled rasterizer: options to RGBA canvas

use super::shapes::{Neighbours, corner_dot_contains, corner_square_contains, dot_contains};
use crate::error::{Error, Result};
use crate::qr::{FINDER_SIZE, ModuleMatrix};
use crate::style::{ImageOptions, RenderOptions};
use image::imageops::{self, FilterType};
use image::{Pixel, RgbaImage};

/// Pixel geometry of the symbol on the canvas
#[derive(Debug, Clone, Copy)]
struct Layout {
    side: u32,
    module: u32,
    offset: u32,
    count: usize,
}

impl Layout {
    fn new(options: &RenderOptions, count: usize) -> Result<Self> {
        let side = options.width.min(options.height);
        let usable = side.saturating_sub(options.margin * 2);
        let module = usable / count as u32;
        if module == 0 {
            return Err(Error::Render(format!(
                "{side}px canvas cannot fit {count} modules with a {}px margin",
                options.margin
            )));
        }
        let offset = (side - module * count as u32) / 2;
        Ok(Self {
            side,
            module,
            offset,
            count,
        })
    }

    fn symbol_px(&self) -> u32 {
        self.module * self.count as u32
    }
}

/// Modules cleared for the logo, centred on the symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HiddenArea {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl HiddenArea {
    fn centred(count: usize, w: usize, h: usize) -> Self {
        Self {
            x: (count - w) / 2,
            y: (count - h) / 2,
            w,
            h,
        }
    }

    fn contains(&self, x: usize, y: usize) -> bool {
        (self.x..self.x + self.w).contains(&x) && (self.y..self.y + self.h).contains(&y)
    }
}

/// Where the logo goes: the cleared block and the logo's pixel rectangle
#[derive(Debug, Clone, Copy)]
struct LogoPlacement {
    hidden: HiddenArea,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Modules kept clear on each side so finders and the outermost alignment
/// pattern stay readable.
const KEEP_CLEAR: usize = 9;

fn odd_floor(value: usize) -> usize {
    if value % 2 == 0 { value.saturating_sub(1) } else { value }
}

fn odd_ceil(value: f32) -> usize {
    1 + 2 * ((value - 1.0) / 2.0).ceil().max(0.0) as usize
}

/// Largest odd block of roughly the logo's aspect ratio within both the
/// module budget and the per-axis limit.
fn block_for_budget(aspect: f32, budget: usize, max_axis: usize) -> Option<(usize, usize)> {
    if budget == 0 || max_axis == 0 {
        return None;
    }

    let mut w = odd_floor(((budget as f32 / aspect).sqrt() as usize).clamp(1, max_axis)).max(1);
    let mut h = odd_ceil(w as f32 * aspect);
    if w * h > budget || h > max_axis {
        h = if h > max_axis {
            odd_floor(max_axis).max(1)
        } else {
            h.saturating_sub(2).max(1)
        };
        w = odd_ceil(h as f32 / aspect).min(odd_floor(max_axis).max(1));
    }
    Some((w, h))
}

/// Size the cleared block from the error-correction budget, shrinking it
/// until the symbol still reads back with every covered module lost.
fn logo_placement(
    image: &ImageOptions,
    options: &RenderOptions,
    matrix: &ModuleMatrix,
    layout: &Layout,
) -> Option<LogoPlacement> {
    let (logo_w, logo_h) = image.logo.image().dimensions();
    if logo_w == 0 || logo_h == 0 {
        return None;
    }

    let count = layout.count;
    let aspect = logo_h as f32 / logo_w as f32;
    let cover = image.image_size * options.error_correction.recovery_ratio();
    let budget = (cover * (count * count) as f32).floor() as usize;
    let max_axis = count.saturating_sub(KEEP_CLEAR * 2);

    let (mut w, mut h) = block_for_budget(aspect, budget, max_axis)?;
    let hidden = loop {
        let area = HiddenArea::centred(count, w, h);
        if matrix.survives_damage(&options.data, |x, y| area.contains(x, y)) {
            break area;
        }
        if w == 1 && h == 1 {
            tracing::warn!(count, "No room for a logo at this error correction level");
            return None;
        }
        if w >= h {
            w = w.saturating_sub(2).max(1);
        } else {
            h = h.saturating_sub(2).max(1);
        }
    };

    let block_w = hidden.w as u32 * layout.module;
    let block_h = hidden.h as u32 * layout.module;
    let (avail_w, avail_h) = if block_w > image.margin * 2 && block_h > image.margin * 2 {
        (block_w - image.margin * 2, block_h - image.margin * 2)
    } else {
        (block_w, block_h)
    };
    let scale = (avail_w as f32 / logo_w as f32).min(avail_h as f32 / logo_h as f32);
    let w = ((logo_w as f32 * scale).floor() as u32).clamp(1, avail_w);
    let h = ((logo_h as f32 * scale).floor() as u32).clamp(1, avail_h);

    let block_x = layout.offset + hidden.x as u32 * layout.module;
    let block_y = layout.offset + hidden.y as u32 * layout.module;
    Some(LogoPlacement {
        hidden,
        x: block_x + (block_w - w) / 2,
        y: block_y + (block_h - h) / 2,
        w,
        h,
    })
}

/// Render `options` into a fresh RGBA canvas.
pub fn render(options: &RenderOptions) -> Result<RgbaImage> {
    if options.data.is_empty() {
        return Err(Error::Render("Nothing to render: empty payload".to_string()));
    }

    let matrix = ModuleMatrix::encode(&options.data, options.error_correction)?;
    let layout = Layout::new(options, matrix.width())?;

    let placement = options
        .image
        .as_ref()
        .and_then(|image| logo_placement(image, options, &matrix, &layout));
    let hidden = placement
        .filter(|_| options.image.as_ref().is_some_and(|i| i.hide_background_dots))
        .map(|p| p.hidden);

    let is_hidden = |x: usize, y: usize| hidden.is_some_and(|area| area.contains(x, y));
    let is_data_dark = |x: isize, y: isize| {
        if !matrix.is_dark(x, y) {
            return false;
        }
        let (ux, uy) = (x as usize, y as usize);
        matrix.finder_origin(ux, uy).is_none() && !is_hidden(ux, uy)
    };

    let mut canvas = RgbaImage::from_pixel(layout.side, layout.side, options.background.to_rgba());
    let dot_color = options.dots.color.to_rgba();
    let ring_color = options.corners_square.color.to_rgba();
    let eye_color = options.corners_dot.color.to_rgba();
    let module = layout.module as f32;
    let symbol = layout.symbol_px();

    for py in 0..symbol {
        for px in 0..symbol {
            let mx = (px / layout.module) as usize;
            let my = (py / layout.module) as usize;

            let paint = if let Some((ox, oy)) = matrix.finder_origin(mx, my) {
                let fx = (px as f32 + 0.5) / module - ox as f32;
                let fy = (py as f32 + 0.5) / module - oy as f32;
                debug_assert!(fx < FINDER_SIZE as f32 && fy < FINDER_SIZE as f32);
                if corner_dot_contains(options.corners_dot.style, fx, fy) {
                    Some(eye_color)
                } else if corner_square_contains(options.corners_square.style, fx, fy) {
                    Some(ring_color)
                } else {
                    None
                }
            } else if is_data_dark(mx as isize, my as isize) {
                let (x, y) = (mx as isize, my as isize);
                let neighbours = Neighbours {
                    top: is_data_dark(x, y - 1),
                    right: is_data_dark(x + 1, y),
                    bottom: is_data_dark(x, y + 1),
                    left: is_data_dark(x - 1, y),
                };
                let u = ((px % layout.module) as f32 + 0.5) / module;
                let v = ((py % layout.module) as f32 + 0.5) / module;
                dot_contains(options.dots.style, neighbours, u, v).then_some(dot_color)
            } else {
                None
            };

            if let Some(color) = paint {
                canvas
                    .get_pixel_mut(px + layout.offset, py + layout.offset)
                    .blend(&color);
            }
        }
    }

    if let (Some(image), Some(place)) = (options.image.as_ref(), placement) {
        let source: &RgbaImage = image.logo.image();
        let resized = imageops::resize(source, place.w, place.h, FilterType::Triangle);
        imageops::overlay(&mut canvas, &resized, place.x as i64, place.y as i64);
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::QrVerifier;
    use crate::style::{
        Background, DownloadSize, ErrorCorrection, HexColor, Logo, LogoSize, RenderTarget,
        StyleConfiguration,
    };
    use image::Rgba;

    fn options(payload: &str, style: &StyleConfiguration) -> RenderOptions {
        RenderOptions::build(payload, style, RenderTarget::Preview)
    }

    #[test]
    fn canvas_matches_requested_size() {
        let style = StyleConfiguration::default();
        let img = render(&RenderOptions::build(
            "https://example.com",
            &style,
            RenderTarget::Download(DownloadSize::new(250)),
        ))
        .unwrap();
        assert_eq!(img.dimensions(), (250, 250));
    }

    #[test]
    fn corners_keep_background_and_finder_uses_foreground() {
        let style = StyleConfiguration::default();
        let img = render(&options("hello", &style)).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 255, 255, 255]));

        let layout = Layout::new(&options("hello", &style), 21).unwrap();
        let inside_ring = layout.offset + layout.module / 2;
        assert_eq!(
            *img.get_pixel(inside_ring, inside_ring),
            Rgba([0x00, 0x99, 0x66, 0xff])
        );
    }

    #[test]
    fn transparent_background_has_zero_alpha() {
        let style = StyleConfiguration {
            background: Background::Transparent,
            ..StyleConfiguration::default()
        };
        let img = render(&options("hello", &style)).unwrap();
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert!(img.pixels().any(|p| p.0[3] == 255));
    }

    #[test]
    fn empty_payload_is_a_render_error() {
        let style = StyleConfiguration::default();
        assert!(matches!(render(&options("", &style)), Err(Error::Render(_))));
    }

    #[test]
    fn tiny_canvas_is_a_render_error() {
        let mut opts = options("hello", &StyleConfiguration::default());
        opts.width = 25;
        opts.height = 25;
        assert!(matches!(render(&opts), Err(Error::Render(_))));
    }

    #[test]
    fn logo_is_composited_at_centre() {
        let logo = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let style = StyleConfiguration {
            background: Background::Color(HexColor::WHITE),
            logo: Some(Logo::new("red.png", logo)),
            logo_size: LogoSize::new(0.3),
            ..StyleConfiguration::default()
        };
        let img = render(&options("https://example.com/logo", &style)).unwrap();
        let [r, g, b, a] = img.get_pixel(200, 200).0;
        assert!(r > 240 && g < 15 && b < 15 && a == 255);
    }

    #[test]
    fn hidden_block_is_centred_odd_and_clear_of_finders() {
        let logo = Logo::new("l", RgbaImage::new(10, 10));
        let style = StyleConfiguration {
            logo: Some(logo),
            logo_size: LogoSize::new(0.3),
            error_correction: ErrorCorrection::H,
            ..StyleConfiguration::default()
        };
        let opts = options("https://example.com/hidden", &style);
        let matrix = ModuleMatrix::encode(&opts.data, opts.error_correction).unwrap();
        let layout = Layout::new(&opts, matrix.width()).unwrap();
        let place = logo_placement(opts.image.as_ref().unwrap(), &opts, &matrix, &layout).unwrap();

        let hidden = place.hidden;
        assert_eq!(hidden.x, layout.count - hidden.x - hidden.w);
        assert_eq!(hidden.w % 2, 1);
        assert_eq!(hidden.h % 2, 1);
        assert!(hidden.x >= KEEP_CLEAR && hidden.y >= KEEP_CLEAR);

        let block_x = layout.offset + hidden.x as u32 * layout.module;
        assert!(place.x >= block_x);
        assert!(place.x + place.w <= block_x + hidden.w as u32 * layout.module);
    }

    #[test]
    fn budget_grows_with_error_correction() {
        let low = block_for_budget(1.0, (0.6 * 0.07 * 625.0) as usize, 7).unwrap();
        let high = block_for_budget(1.0, (0.6 * 0.30 * 841.0) as usize, 11).unwrap();
        assert_eq!(low, (5, 5));
        assert_eq!(high, (11, 11));
        assert_eq!(block_for_budget(1.0, 0, 7), None);
        assert_eq!(block_for_budget(1.0, 3, 7), Some((1, 1)));
    }

    #[test]
    fn wide_logo_gets_a_wide_block() {
        let (w, h) = block_for_budget(0.5, 60, 21).unwrap();
        assert!(w > h, "{w}x{h}");
        assert!(w * h <= 60);
    }

    #[test]
    fn largest_logo_scans_back_at_every_level() {
        let verifier = QrVerifier::new();
        let payload = "https://example.com";
        let logo = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));

        for level in ErrorCorrection::ALL {
            let style = StyleConfiguration {
                logo: Some(Logo::new("red.png", logo.clone())),
                logo_size: LogoSize::new(LogoSize::MAX),
                error_correction: level,
                ..StyleConfiguration::default()
            };
            let opts =
                RenderOptions::build(payload, &style, RenderTarget::Download(DownloadSize::new(800)));
            let img = render(&opts).unwrap();

            let [r, g, b, _] = img.get_pixel(400, 400).0;
            assert!(r > 240 && g < 15 && b < 15, "{level}: logo missing");

            let decoded = verifier
                .decode(&image::DynamicImage::ImageRgba8(img))
                .unwrap_or_else(|e| panic!("{level}: {e}"));
            assert_eq!(decoded, payload, "{level}");
        }
    }
}
