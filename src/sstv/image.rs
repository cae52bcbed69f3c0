//! In-memory raster types
//!
//! `RgbImage` is the encoder's input, `DecodedImage` the progressively
//! filled decoder output. Binary PPM (P6) is supported for the CLI.

use std::path::Path;

use crate::error::{Result, SstvError};
use crate::sstv::decoder::ScanlineEvent;

/// 8-bit RGB raster, row-major, 3 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Create a black image
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Create an image filled with one color
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap raw RGB bytes
    ///
    /// # Errors
    /// * `InvalidImage` - If `data.len() != width * height * 3`
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height * 3 {
            return Err(SstvError::InvalidImage {
                reason: format!(
                    "expected {} bytes for {}x{}, got {}",
                    width * height * 3,
                    width,
                    height,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// RGB bytes of row `y`
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.width * 3;
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Overwrite row `y`; `pixels` is truncated or zero-extended to the width
    pub fn set_row(&mut self, y: usize, pixels: &[u8]) {
        let stride = self.width * 3;
        let row = &mut self.data[y * stride..(y + 1) * stride];
        let n = pixels.len().min(stride);
        row[..n].copy_from_slice(&pixels[..n]);
        row[n..].fill(0);
    }

    /// Nearest-neighbour resize
    pub fn resize_nearest(&self, width: usize, height: usize) -> RgbImage {
        let mut out = RgbImage::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = y * self.height / height;
            for x in 0..width {
                let sx = x * self.width / width;
                out.set_pixel(x, y, self.pixel(sx, sy));
            }
        }
        out
    }

    /// Number of pixels differing between two rows of equal-sized images
    pub fn row_difference(&self, other: &RgbImage, y: usize) -> usize {
        self.row(y)
            .chunks_exact(3)
            .zip(other.row(y).chunks_exact(3))
            .filter(|(a, b)| a != b)
            .count()
    }

    // ========================================================================
    // PPM
    // ========================================================================

    /// Encode as binary PPM (P6)
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse a binary PPM (P6) with maxval <= 255
    pub fn from_ppm(bytes: &[u8]) -> Result<Self> {
        let mut cursor = 0;
        let magic = next_token(bytes, &mut cursor)?;
        if magic != "P6" {
            return Err(SstvError::UnsupportedFormat {
                format: format!("PPM variant '{}' (only binary P6)", magic),
            });
        }
        let width = parse_header_number(bytes, &mut cursor, "width")?;
        let height = parse_header_number(bytes, &mut cursor, "height")?;
        let maxval = parse_header_number(bytes, &mut cursor, "maxval")?;
        if maxval == 0 || maxval > 255 {
            return Err(SstvError::UnsupportedFormat {
                format: format!("PPM maxval {} (only 8-bit)", maxval),
            });
        }
        // single whitespace byte separates header and raster
        cursor += 1;
        let expected = width * height * 3;
        let raster = bytes
            .get(cursor..cursor + expected)
            .ok_or_else(|| SstvError::InvalidImage {
                reason: format!("truncated PPM raster: expected {} bytes", expected),
            })?;

        let data = if maxval == 255 {
            raster.to_vec()
        } else {
            raster
                .iter()
                .map(|&v| ((v as usize * 255 + maxval / 2) / maxval).min(255) as u8)
                .collect()
        };
        RgbImage::from_raw(width, height, data)
    }

    /// Read a PPM file
    pub fn read_ppm(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SstvError::FileNotFound {
                path: path.display().to_string(),
                source: Some(e),
            },
            _ => SstvError::Io(e),
        })?;
        Self::from_ppm(&bytes)
    }

    /// Write a PPM file
    pub fn write_ppm(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ppm())?;
        Ok(())
    }
}

fn next_token(bytes: &[u8], cursor: &mut usize) -> Result<String> {
    loop {
        match bytes.get(*cursor) {
            Some(b'#') => {
                while let Some(&b) = bytes.get(*cursor) {
                    *cursor += 1;
                    if b == b'\n' {
                        break;
                    }
                }
            }
            Some(b) if b.is_ascii_whitespace() => *cursor += 1,
            Some(_) => break,
            None => {
                return Err(SstvError::InvalidImage {
                    reason: "unexpected end of PPM header".into(),
                })
            }
        }
    }
    let start = *cursor;
    while let Some(b) = bytes.get(*cursor) {
        if b.is_ascii_whitespace() {
            break;
        }
        *cursor += 1;
    }
    Ok(String::from_utf8_lossy(&bytes[start..*cursor]).into_owned())
}

fn parse_header_number(bytes: &[u8], cursor: &mut usize, field: &str) -> Result<usize> {
    let token = next_token(bytes, cursor)?;
    token.parse().map_err(|_| SstvError::InvalidImage {
        reason: format!("bad PPM {}: '{}'", field, token),
    })
}

// ============================================================================
// Color conversion (full-range BT.601)
// ============================================================================

/// RGB to full-range (Y, Cr, Cb)
pub fn rgb_to_ycrcb([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    [to_u8(y), to_u8(cr), to_u8(cb)]
}

/// Full-range (Y, Cr, Cb) back to RGB
pub fn ycrcb_to_rgb([y, cr, cb]: [u8; 3]) -> [u8; 3] {
    let (y, cr, cb) = (y as f64, cr as f64 - 128.0, cb as f64 - 128.0);
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[inline]
fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// DecodedImage
// ============================================================================

/// Progressively filled decoder output
///
/// Rows start black and are written at most once each.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: RgbImage,
    written: Vec<bool>,
    rows_written: usize,
}

impl DecodedImage {
    /// Create an all-black raster
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            image: RgbImage::new(width, height),
            written: vec![false; height],
            rows_written: 0,
        }
    }

    /// Write the row carried by `event`
    ///
    /// # Returns
    /// `false` if the row was out of range or already written
    pub fn apply(&mut self, event: &ScanlineEvent) -> bool {
        match self.written.get_mut(event.index) {
            Some(written) if !*written => {
                *written = true;
                self.image.set_row(event.index, &event.pixels);
                self.rows_written += 1;
                true
            }
            _ => false,
        }
    }

    /// Whether row `y` has been written
    pub fn is_row_written(&self, y: usize) -> bool {
        self.written.get(y).copied().unwrap_or(false)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn is_complete(&self) -> bool {
        self.rows_written == self.written.len()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filled_and_pixel_access() {
        let mut image = RgbImage::filled(4, 3, [10, 20, 30]);
        assert_eq!(image.pixel(3, 2), [10, 20, 30]);
        image.set_pixel(1, 1, [1, 2, 3]);
        assert_eq!(image.pixel(1, 1), [1, 2, 3]);
        assert_eq!(image.row(1).len(), 12);
    }

    #[test]
    fn test_from_raw_validates_length() {
        assert!(RgbImage::from_raw(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            RgbImage::from_raw(2, 2, vec![0; 11]),
            Err(SstvError::InvalidImage { .. })
        ));
    }

    #[test]
    fn test_ppm_round_trip_with_comment() {
        let mut image = RgbImage::new(3, 2);
        image.set_pixel(2, 1, [255, 128, 7]);
        let mut bytes = b"P6\n# made by hand\n".to_vec();
        bytes.extend_from_slice(&image.to_ppm()[3..]);
        let parsed = RgbImage::from_ppm(&bytes).unwrap();
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_ppm_rejects_ascii_variant() {
        let result = RgbImage::from_ppm(b"P3\n1 1\n255\n0 0 0\n");
        assert!(matches!(result, Err(SstvError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_ppm_truncated_raster() {
        let result = RgbImage::from_ppm(b"P6\n2 2\n255\n\x00\x00");
        assert!(matches!(result, Err(SstvError::InvalidImage { .. })));
    }

    #[test]
    fn test_resize_nearest() {
        let mut image = RgbImage::new(2, 2);
        image.set_pixel(1, 1, [9, 9, 9]);
        let big = image.resize_nearest(4, 4);
        assert_eq!(big.pixel(3, 3), [9, 9, 9]);
        assert_eq!(big.pixel(2, 2), [9, 9, 9]);
        assert_eq!(big.pixel(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_gray_survives_ycrcb() {
        assert_eq!(rgb_to_ycrcb([128, 128, 128]), [128, 128, 128]);
        assert_eq!(ycrcb_to_rgb([128, 128, 128]), [128, 128, 128]);
    }

    #[test]
    fn test_ycrcb_round_trip_is_close() {
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [12, 200, 99]] {
            let back = ycrcb_to_rgb(rgb_to_ycrcb(rgb));
            for c in 0..3 {
                assert!((back[c] as i32 - rgb[c] as i32).abs() <= 2, "{:?} -> {:?}", rgb, back);
            }
        }
    }

    #[test]
    fn test_decoded_rows_written_once() {
        let mut decoded = DecodedImage::new(2, 3);
        let event = ScanlineEvent {
            index: 1,
            pixels: vec![5; 6],
            timestamp_secs: 0.0,
            confidence: 1.0,
            locked: true,
        };
        assert!(decoded.apply(&event));
        assert!(!decoded.apply(&event));
        assert!(decoded.is_row_written(1));
        assert!(!decoded.is_row_written(0));
        assert_eq!(decoded.rows_written(), 1);
        assert_eq!(decoded.image().pixel(1, 1), [5, 5, 5]);
        assert_eq!(decoded.image().pixel(0, 0), [0, 0, 0]);
    }
}
