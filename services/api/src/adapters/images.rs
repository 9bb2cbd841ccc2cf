//! services/api/src/adapters/images.rs
//!
//! Upload processing with the `image` crate: decode, downscale to fit the
//! target box, re-encode as JPEG.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use quillwright_core::ports::{ImageKind, ImageProcessor, PortError, PortResult, ProcessedImage};

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResizer;

impl ImageProcessor for ImageResizer {
    fn process(&self, bytes: &[u8], kind: ImageKind) -> PortResult<ProcessedImage> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| PortError::InvalidInput(format!("Unreadable image: {e}")))?;

        let (max_w, max_h) = kind.max_dimensions();
        let fitted = if decoded.width() > max_w || decoded.height() > max_h {
            decoded.resize(max_w, max_h, FilterType::Lanczos3)
        } else {
            decoded
        };

        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());
        let mut out = Cursor::new(Vec::new());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
            .map_err(|e| PortError::Unexpected(format!("JPEG encoding failed: {e}")))?;

        Ok(ProcessedImage {
            bytes: out.into_inner(),
            extension: "jpg",
        })
    }
}
