//! QR code decoder using rqrr, used to check rendered artifacts scan back

use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};

/// Scans rendered QR images back to their payload text
pub struct QrVerifier {
    quiet_zone: u32,
}

impl QrVerifier {
    /// Create a verifier with the default padding
    pub fn new() -> Self {
        Self { quiet_zone: 32 }
    }

    /// Decode PNG (or any supported format) bytes.
    pub fn decode_png(&self, data: &[u8]) -> Result<String> {
        let img = image::load_from_memory(data)?;
        self.decode(&img)
    }

    /// Decode a rendered image.
    ///
    /// Transparent pixels are flattened onto white and a white quiet zone is
    /// added, since styled renders only carry a thin margin.
    pub fn decode(&self, img: &DynamicImage) -> Result<String> {
        let gray = flatten_padded(&img.to_rgba8(), self.quiet_zone);
        let first = match self.decode_gray(gray.clone()) {
            Ok(content) => return Ok(content),
            Err(err) => err,
        };

        // rqrr fits each finder from its outer corners, which rounded and
        // circular finders do not have.
        for candidate in squared_finders(&gray) {
            if let Ok(content) = self.decode_gray(candidate) {
                tracing::debug!("Decoded after squaring finder patterns");
                return Ok(content);
            }
        }
        Err(first)
    }

    fn decode_gray(&self, img: GrayImage) -> Result<String> {
        let mut prepared = rqrr::PreparedImage::prepare(img);
        let grids = prepared.detect_grids();

        let grid = grids.first().ok_or(Error::NoQrCodeFound)?;

        match grid.decode() {
            Ok((meta, content)) => {
                tracing::debug!(
                    "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                    meta.version,
                    meta.ecc_level,
                    content.len()
                );
                Ok(content)
            }
            Err(e) => Err(Error::QrDecode(format!("Decode failed: {:?}", e))),
        }
    }

    /// Decode and compare against the expected payload.
    pub fn verify_png(&self, data: &[u8], expected: &str) -> Result<()> {
        let decoded = self.decode_png(data)?;
        if decoded == expected {
            Ok(())
        } else {
            Err(Error::QrDecode(format!(
                "Payload mismatch: expected {expected:?}, scanned {decoded:?}"
            )))
        }
    }
}

impl Default for QrVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_padded(img: &RgbaImage, pad: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::from_pixel(w + pad * 2, h + pad * 2, Luma([255]));

    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as f32;
        let luma = 0.299 * blend(r) + 0.587 * blend(g) + 0.114 * blend(b);
        out.put_pixel(x + pad, y + pad, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }

    out
}

/// Axis-aligned bounds of the dark pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

fn dark_bounds(img: &GrayImage, threshold: u8) -> Option<Bounds> {
    let (mut left, mut top, mut right, mut bottom) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, px) in img.enumerate_pixels() {
        if px.0[0] < threshold {
            left = left.min(x);
            top = top.min(y);
            right = right.max(x);
            bottom = bottom.max(y);
        }
    }
    (left <= right).then(|| Bounds {
        left,
        top,
        width: right - left + 1,
        height: bottom - top + 1,
    })
}

/// First five alternating runs starting at (x, y), which must be dark.
fn runs_from(img: &GrayImage, threshold: u8, x: u32, y: u32) -> Option<[u32; 5]> {
    let is_dark = |x: u32| img.get_pixel(x, y).0[0] < threshold;
    if !is_dark(x) {
        return None;
    }

    let mut runs = [0u32; 5];
    let mut index = 0;
    let mut colour = true;
    for px in x..img.width() {
        if is_dark(px) != colour {
            index += 1;
            if index == runs.len() {
                return Some(runs);
            }
            colour = !colour;
        }
        runs[index] += 1;
    }
    None
}

/// Whether `runs` has the 1:1:3:1:1 proportions of a finder's centre line.
fn is_finder_line(runs: &[u32; 5]) -> bool {
    const RATIO: [f32; 5] = [1.0, 1.0, 3.0, 1.0, 1.0];
    let unit = (runs[0] + runs[1] + runs[3] + runs[4]) as f32 / 4.0;
    let tolerance = unit * 0.75;
    runs.iter()
        .zip(RATIO)
        .all(|(&run, ratio)| (run as f32 - ratio * unit).abs() <= tolerance)
}

/// Copies of `img` with the three finder patterns repainted as plain squares,
/// one per plausible symbol size.
///
/// Only handles upright symbols whose top-left finder touches the left and
/// top edges of the dark area, which is how rendered codes come out.
fn squared_finders(img: &GrayImage) -> Vec<GrayImage> {
    let (lo, hi) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if hi.saturating_sub(lo) < 32 {
        return Vec::new();
    }
    let threshold = ((lo as u16 + hi as u16) / 2) as u8;

    let Some(bounds) = dark_bounds(img, threshold) else {
        return Vec::new();
    };
    if bounds.width.abs_diff(bounds.height) > bounds.width / 20 + 1 {
        return Vec::new();
    }

    // The first band of rows crossing the top-left finder's centre line.
    let mut band: Vec<(u32, [u32; 5])> = Vec::new();
    let reach = bounds.left + bounds.width / 8;
    for y in bounds.top..bounds.top + bounds.height / 3 {
        let start = (bounds.left..reach).find(|&x| img.get_pixel(x, y).0[0] < threshold);
        match start
            .and_then(|x| runs_from(img, threshold, x, y))
            .filter(is_finder_line)
        {
            Some(runs) => band.push((y, runs)),
            None if !band.is_empty() => break,
            None => {}
        }
    }
    let Some(&(_, runs)) = band.get(band.len() / 2) else {
        return Vec::new();
    };

    let unit = runs.iter().sum::<u32>() as f32 / 7.0;
    let estimate = ((bounds.width as f32 / unit - 17.0) / 4.0).round() as i32;
    [estimate, estimate - 1, estimate + 1]
        .into_iter()
        .filter(|version| (1..=40).contains(version))
        .map(|version| {
            let count = (version * 4 + 17) as u32;
            repaint_finders(img, bounds, count)
        })
        .collect()
}

fn repaint_finders(img: &GrayImage, bounds: Bounds, count: u32) -> GrayImage {
    let mut out = img.clone();
    let module = bounds.width as f32 / count as f32;
    let far = (count - 7) as f32;

    for (ox, oy) in [(0.0, 0.0), (far, 0.0), (0.0, far)] {
        let x0 = bounds.left + (ox * module).floor() as u32;
        let y0 = bounds.top + (oy * module).floor() as u32;
        let x1 = (bounds.left + ((ox + 7.0) * module).ceil() as u32).min(out.width());
        let y1 = (bounds.top + ((oy + 7.0) * module).ceil() as u32).min(out.height());

        for py in y0..y1 {
            for px in x0..x1 {
                let fx = (px - bounds.left) as f32 + 0.5;
                let fy = (py - bounds.top) as f32 + 0.5;
                let (mx, my) = (fx / module - ox, fy / module - oy);
                if !(0.0..7.0).contains(&mx) || !(0.0..7.0).contains(&my) {
                    continue;
                }
                let ring = !((1.0..6.0).contains(&mx) && (1.0..6.0).contains(&my));
                let stone = (2.0..5.0).contains(&mx) && (2.0..5.0).contains(&my);
                let luma = if ring || stone { 0 } else { 255 };
                out.put_pixel(px, py, Luma([luma]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn blank_image_has_no_qr() {
        let verifier = QrVerifier::new();
        let blank = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([255; 4])));
        assert!(matches!(verifier.decode(&blank), Err(Error::NoQrCodeFound)));
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let gray = flatten_padded(&img, 1);
        assert_eq!(gray.dimensions(), (4, 4));
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn finder_line_proportions() {
        assert!(is_finder_line(&[10, 10, 30, 10, 10]));
        assert!(is_finder_line(&[11, 9, 31, 10, 9]));
        assert!(!is_finder_line(&[10, 10, 10, 10, 10]));
        assert!(!is_finder_line(&[10, 40, 30, 10, 10]));
    }

    #[test]
    fn runs_start_on_dark() {
        let mut img = GrayImage::from_pixel(12, 1, Luma([255]));
        for x in [0, 2, 3, 4, 6] {
            img.put_pixel(x, 0, Luma([0]));
        }
        assert_eq!(runs_from(&img, 128, 0, 0), Some([1, 1, 3, 1, 1]));
        assert_eq!(runs_from(&img, 128, 1, 0), None);
    }

    #[test]
    fn repainted_finder_is_a_square_ring_and_eye() {
        let img = GrayImage::from_pixel(21, 21, Luma([255]));
        let bounds = Bounds {
            left: 0,
            top: 0,
            width: 21,
            height: 21,
        };
        let out = repaint_finders(&img, bounds, 21);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 1).0[0], 255);
        assert_eq!(out.get_pixel(3, 3).0[0], 0);
        assert_eq!(out.get_pixel(20, 0).0[0], 0);
        assert_eq!(out.get_pixel(0, 20).0[0], 0);
        assert_eq!(out.get_pixel(20, 20).0[0], 255);
        assert_eq!(out.get_pixel(10, 10).0[0], 255);
    }

    #[test]
    fn opaque_black_stays_black() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let gray = flatten_padded(&img, 0);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
    }
}
