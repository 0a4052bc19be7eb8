//! Decoded pixel buffers ready for GPU upload

use crate::render::backend::PixelFormat;
use crate::retrieve::RetrieveError;

/// A decoded image held on the CPU side until a texture uploads it.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw texel data, tightly packed rows, top row first.
    pub data: Vec<u8>,
    /// Image width in texels.
    pub width: u32,
    /// Image height in texels.
    pub height: u32,
    /// Texel layout of `data`.
    pub format: PixelFormat,
}

impl ImageData {
    /// Decode an encoded image (PNG, JPEG, ...) from memory into RGBA8.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, RetrieveError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| RetrieveError::DecodeFailed(e.to_string()))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::debug!("Decoded image {}x{} from memory", width, height);

        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    /// Create a solid color RGBA image (placeholders and tests).
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let texel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(texel_count * 4);
        for _ in 0..texel_count {
            data.extend_from_slice(&color);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Wrap a single-channel glyph mask produced by a text rasterizer.
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Gray8,
        }
    }

    /// Size of the texel data in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether both dimensions are powers of two (mipmap eligibility).
    pub fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_power_of_two() {
        assert!(ImageData::solid_color(256, 256, [0; 4]).is_power_of_two());
        assert!(!ImageData::solid_color(100, 100, [0; 4]).is_power_of_two());
    }

    #[test]
    fn test_decode_png_round_trip() {
        use std::io::Cursor;

        let source = image::RgbaImage::from_pixel(8, 2, image::Rgba([10, 20, 30, 255]));
        let mut encoded = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .expect("png encode");

        let decoded = ImageData::from_encoded(&encoded).expect("png decode");
        assert_eq!(decoded.width, 8);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.format, PixelFormat::Rgba8);
        assert_eq!(&decoded.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = ImageData::from_encoded(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(result, Err(RetrieveError::DecodeFailed(_))));
    }
}
