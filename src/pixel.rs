//! RGBA8 pixel buffer operations shared by the texture processor and atlas
//! packer: decode, resize, and re-encode, built on the same `image` entry
//! points the texture packer uses to get a uniform `RgbaImage` before any
//! resizing or compression decisions are made.

use std::path::Path;

use image::{imageops::FilterType, GenericImageView, ImageFormat, RgbaImage};

use crate::error::{LodError, Result};

/// An owned RGBA8 pixel buffer with explicit dimensions.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self { width, height, pixels }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, pixels: img.into_raw() }
    }

    fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .expect("PixelBuffer invariant: pixels.len() == width * height * 4")
    }

    /// Decodes an in-memory image (PNG or JPEG) to RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| LodError::TextureDecodeFailed(e.to_string()))?;
        Ok(Self::from_rgba_image(img.to_rgba8()))
    }

    /// Loads and decodes an image file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LodError::FileNotFound(path.to_path_buf()));
        }
        let img = image::open(path).map_err(|e| LodError::TextureLoadFailed(e.to_string()))?;
        Ok(Self::from_rgba_image(img.to_rgba8()))
    }

    /// Resizes with a linear (triangle) filter, matching the downsample
    /// quality the source assets were authored to expect.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<Self> {
        if new_width == 0 || new_height == 0 {
            return Err(LodError::TextureResizeFailed(format!(
                "target dimensions must be non-zero, got {new_width}x{new_height}"
            )));
        }
        let resized = image::imageops::resize(
            &self.to_rgba_image(),
            new_width,
            new_height,
            FilterType::Triangle,
        );
        Ok(Self::from_rgba_image(resized))
    }

    /// Encodes to PNG bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(LodError::TextureEncodeFailed(format!(
                "cannot encode a {}x{} image", self.width, self.height
            )));
        }
        let mut out = Vec::new();
        self.to_rgba_image()
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| LodError::TextureEncodeFailed(e.to_string()))?;
        Ok(out)
    }

    /// Encodes to JPEG bytes at quality 85, dropping the alpha channel.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(LodError::TextureEncodeFailed(format!(
                "cannot encode a {}x{} image", self.width, self.height
            )));
        }
        let rgb = image::DynamicImage::ImageRgba8(self.to_rgba_image()).to_rgb8();
        let mut out = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 85);
        encoder
            .encode_image(&rgb)
            .map_err(|e| LodError::TextureEncodeFailed(e.to_string()))?;
        Ok(out)
    }

    /// Encodes choosing the format from the output extension, defaulting to
    /// PNG when the extension is absent or unrecognized.
    pub fn encode_for_path(&self, path: &Path) -> Result<Vec<u8>> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("jpg") | Some("jpeg") => self.encode_jpeg(),
            _ => self.encode_png(),
        }
    }

    /// Writes the encoded bytes for `path` to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode_for_path(path)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Copies a rectangular region from `src` into `self` at `(dst_x, dst_y)`.
    /// Used by the atlas packer to blit a source image into its shelf slot.
    pub fn blit(&mut self, src: &PixelBuffer, dst_x: u32, dst_y: u32) {
        for y in 0..src.height {
            let dst_row_start = ((dst_y + y) * self.width + dst_x) as usize * 4;
            let src_row_start = (y * src.width) as usize * 4;
            let row_bytes = src.width as usize * 4;
            self.pixels[dst_row_start..dst_row_start + row_bytes]
                .copy_from_slice(&src.pixels[src_row_start..src_row_start + row_bytes]);
        }
    }

    /// A buffer of the given size filled with transparent black.
    pub fn blank(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0u8; width as usize * height as usize * 4] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_malformed_bytes() {
        let err = PixelBuffer::decode(b"not an image").unwrap_err();
        assert!(matches!(err, LodError::TextureDecodeFailed(_)));
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = PixelBuffer::load(Path::new("/nonexistent/path/texture.png")).unwrap_err();
        assert!(matches!(err, LodError::FileNotFound(_)));
    }

    #[test]
    fn resize_rejects_zero_target() {
        let buf = PixelBuffer::blank(4, 4);
        let err = buf.resize(0, 4).unwrap_err();
        assert!(matches!(err, LodError::TextureResizeFailed(_)));
    }

    #[test]
    fn encode_png_rejects_zero_dimensions() {
        let buf = PixelBuffer::blank(0, 0);
        let err = buf.encode_png().unwrap_err();
        assert!(matches!(err, LodError::TextureEncodeFailed(_)));
    }

    #[test]
    fn encode_jpeg_rejects_zero_dimensions() {
        let buf = PixelBuffer::blank(3, 0);
        let err = buf.encode_jpeg().unwrap_err();
        assert!(matches!(err, LodError::TextureEncodeFailed(_)));
    }

    #[test]
    fn blit_copies_region() {
        let mut dst = PixelBuffer::blank(4, 4);
        let src = PixelBuffer::new(2, 2, vec![255u8; 2 * 2 * 4]);
        dst.blit(&src, 1, 1);
        let px = |x: u32, y: u32| {
            let i = ((y * dst.width + x) * 4) as usize;
            &dst.pixels[i..i + 4]
        };
        assert_eq!(px(1, 1), &[255, 255, 255, 255]);
        assert_eq!(px(0, 0), &[0, 0, 0, 0]);
    }
}
