//! Demo job processor: grayscale conversion.
//!
//! Stands in for the real detection/annotation routine. Decodes the input
//! (JPEG or PNG, the pure-Rust decoders compiled in), converts to
//! grayscale, and re-encodes in the input's format.

use image::{DynamicImage, ImageFormat};
use relay_types::ProcessingError;
use relay_worker::JobProcessor;
use std::io::Cursor;
use tracing::debug;

/// Converts images to grayscale, preserving the input format.
pub struct GrayscaleProcessor;

impl GrayscaleProcessor {
    fn encoding_format(input: &[u8]) -> Result<ImageFormat, ProcessingError> {
        let format = image::guess_format(input)
            .map_err(|e| ProcessingError::Failed(format!("unrecognized image data: {e}")))?;
        match format {
            ImageFormat::Jpeg | ImageFormat::Png => Ok(format),
            other => Err(ProcessingError::Failed(format!(
                "unsupported image format: {other:?}"
            ))),
        }
    }
}

impl JobProcessor for GrayscaleProcessor {
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let format = Self::encoding_format(input)?;
        let decoded = image::load_from_memory_with_format(input, format)
            .map_err(|e| ProcessingError::Failed(format!("decode failed: {e}")))?;

        let gray = DynamicImage::ImageLuma8(decoded.to_luma8());
        debug!(
            width = gray.width(),
            height = gray.height(),
            ?format,
            "Converted image to grayscale"
        );

        let mut output = Cursor::new(Vec::new());
        gray.write_to(&mut output, format)
            .map_err(|e| ProcessingError::Failed(format!("encode failed: {e}")))?;
        Ok(output.into_inner())
    }
}
