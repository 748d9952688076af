//! RGBA image buffers
//!
//! Camera frames are carried as tightly packed RGBA8 buffers. The sensor
//! delivers landscape images; the preview is shown rotated a quarter turn
//! clockwise.

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Image buffer errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Buffer size mismatch: got {got} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        got: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tightly packed RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Wrap an RGBA buffer, checking its length against the dimensions
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ImageError::BufferSize {
                got: data.len(),
                expected,
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image whose pixel at `(x, y)` is `pixel(x, y)`
    pub fn from_fn(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Image filled with a single colour
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[offset..offset + 4]);
        Some(px)
    }

    /// Rotate a quarter turn clockwise (display orientation)
    pub fn rotated_clockwise(&self) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        // Rotated image is h wide and w tall
        let mut data = vec![0u8; self.data.len()];
        for y in 0..h {
            for x in 0..w {
                let (dx, dy) = (h - 1 - y, x);
                let src = (y * w + x) * 4;
                let dst = (dy * h + dx) * 4;
                data[dst..dst + 4].copy_from_slice(&self.data[src..src + 4]);
            }
        }
        Self {
            width: self.height,
            height: self.width,
            data,
        }
    }

    /// Encode as an 8-bit RGBA PNG
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.data)?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Encode as PNG and write it to `path`
    pub fn write_png(&self, path: &Path) -> Result<(), ImageError> {
        let bytes = self.encode_png()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 image where every pixel encodes its own coordinates
    fn coordinate_image() -> RgbaImage {
        let mut data = Vec::new();
        for y in 0..2u8 {
            for x in 0..3u8 {
                data.extend_from_slice(&[x, y, 0, 255]);
            }
        }
        RgbaImage::new(3, 2, data).unwrap()
    }

    #[test]
    fn test_rejects_short_buffer() {
        let err = RgbaImage::new(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, ImageError::BufferSize { expected: 64, .. }));
    }

    #[test]
    fn test_clockwise_rotation() {
        let rotated = coordinate_image().rotated_clockwise();
        assert_eq!(rotated.dimensions(), (2, 3));
        // Bottom-left of the source ends up top-left
        assert_eq!(rotated.pixel(0, 0), Some([0, 1, 0, 255]));
        // Top-left of the source ends up top-right
        assert_eq!(rotated.pixel(1, 0), Some([0, 0, 0, 255]));
        assert_eq!(rotated.pixel(1, 2), Some([2, 0, 0, 255]));
    }

    #[test]
    fn test_four_quarter_turns_restore_image() {
        let image = coordinate_image();
        let turned = image
            .rotated_clockwise()
            .rotated_clockwise()
            .rotated_clockwise()
            .rotated_clockwise();
        assert_eq!(turned, image);
    }

    #[test]
    fn test_png_roundtrip_header() {
        let png_bytes = RgbaImage::filled(8, 6, [10, 20, 30, 255])
            .encode_png()
            .unwrap();
        assert_eq!(&png_bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(png_bytes.as_slice());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 8);
        assert_eq!(reader.info().height, 6);
    }
}
