use anyhow::Result;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use proofsheet_core::models::DerivativeFormat;
use std::io::Cursor;

/// Decoding and re-encoding of derivative images
pub struct ImageCompressor;

impl ImageCompressor {
    /// Decode an original, guessing its format from the bytes.
    pub fn decode(data: &[u8]) -> Result<DynamicImage> {
        let cursor = Cursor::new(data);
        let img = ImageReader::new(cursor).with_guessed_format()?.decode()?;
        Ok(img)
    }

    /// Encode `img` in `format` at `quality` (1-100, ignored for PNG).
    pub fn compress(img: &DynamicImage, format: DerivativeFormat, quality: u8) -> Result<Bytes> {
        match format {
            DerivativeFormat::WebP => Self::compress_webp(img, quality),
            DerivativeFormat::Jpeg => Self::compress_jpeg(img, quality),
            DerivativeFormat::Png => Self::compress_png(img),
        }
    }

    fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality.clamp(1, 100) as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder.encode_image(&rgb_img)?;
        Ok(Bytes::from(buffer))
    }

    fn compress_png(img: &DynamicImage) -> Result<Bytes> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        img.write_to(&mut cursor, ImageFormat::Png)?;

        Ok(Bytes::from(buffer))
    }
}
