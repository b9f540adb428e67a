//! Tile image decoding.
//!
//! Turns fetched bytes into pixel data, in one of two modes:
//!
//! - **Native** ([`decode_native`]): full resolution, writing pixel data
//!   into a caller-supplied buffer so storage recycled through the
//!   [`BufferPool`](crate::pool::BufferPool) is actually reused.
//! - **Sub-sampled** ([`decode_sub_sampled`]): reduced resolution for lower
//!   zoom levels, always freshly allocated.
//!
//! Every decode runs under [`DecodeLimits`]; an image that would exceed
//! them fails with [`DecodeError::LimitsExceeded`] instead of exhausting
//! memory.

use crate::config::DecodeLimits;
use image::codecs::jpeg::JpegDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{ColorType, DynamicImage, ImageBuffer, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;
use tracing::trace;

/// Errors that can occur while decoding tile bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes do not start with a recognizable image signature.
    #[error("unrecognized image format")]
    UnknownFormat,

    /// The decode would exceed the configured memory guards.
    ///
    /// Reported separately so the pipeline can treat it as memory pressure
    /// (skip the tile, keep the worker alive) rather than corrupt input.
    #[error("decode limits exceeded: {0}")]
    LimitsExceeded(String),

    /// The bytes are corrupt or otherwise undecodable.
    #[error("image decode failed: {0}")]
    Decode(String),
}

impl DecodeError {
    /// True when the failure was the memory guard, not bad input.
    pub fn is_memory_pressure(&self) -> bool {
        matches!(self, DecodeError::LimitsExceeded(_))
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(e) => DecodeError::LimitsExceeded(e.to_string()),
            other => DecodeError::Decode(other.to_string()),
        }
    }
}

/// Decodes at native resolution, writing pixels into `target`.
///
/// `target` is cleared and resized to the exact decoded size; its existing
/// capacity is reused when large enough. Color types with no zero-copy
/// `DynamicImage` representation (e.g. 16-bit PNG) fall back to an
/// allocating decode.
pub(crate) fn decode_native(
    bytes: &[u8],
    target: Vec<u8>,
    limits: &DecodeLimits,
) -> Result<DynamicImage, DecodeError> {
    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
    let image_limits = limits.to_image_limits();

    match format {
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes))?;
            read_into(decoder, target, image_limits, bytes, limits)
        }
        ImageFormat::Jpeg => {
            let decoder = JpegDecoder::new(Cursor::new(bytes))?;
            read_into(decoder, target, image_limits, bytes, limits)
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))?;
            read_into(decoder, target, image_limits, bytes, limits)
        }
        _ => decode_dynamic(bytes, limits),
    }
}

/// Decodes at `1/sub_sample` of the native width and height.
///
/// Always allocates; the buffer pool is not involved in sub-sampled
/// decodes.
pub(crate) fn decode_sub_sampled(
    bytes: &[u8],
    sub_sample: u32,
    limits: &DecodeLimits,
) -> Result<DynamicImage, DecodeError> {
    let image = decode_dynamic(bytes, limits)?;

    let factor = sub_sample.max(1);
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    Ok(image.thumbnail_exact(width, height))
}

/// Runs a concrete decoder into the supplied buffer.
fn read_into<D: ImageDecoder>(
    mut decoder: D,
    mut target: Vec<u8>,
    image_limits: image::Limits,
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<DynamicImage, DecodeError> {
    decoder.set_limits(image_limits)?;

    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();
    let total = usize::try_from(decoder.total_bytes())
        .map_err(|_| DecodeError::LimitsExceeded("image too large for address space".into()))?;

    if !matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8
    ) {
        // No 8-bit DynamicImage wrapper for this color type; decode fresh.
        trace!(?color, "falling back to allocating decode");
        return decode_dynamic(bytes, limits);
    }

    target.clear();
    target.resize(total, 0);
    decoder.read_image(&mut target)?;

    let image = match color {
        ColorType::L8 => ImageBuffer::from_raw(width, height, target).map(DynamicImage::ImageLuma8),
        ColorType::La8 => {
            ImageBuffer::from_raw(width, height, target).map(DynamicImage::ImageLumaA8)
        }
        ColorType::Rgb8 => ImageBuffer::from_raw(width, height, target).map(DynamicImage::ImageRgb8),
        ColorType::Rgba8 => {
            ImageBuffer::from_raw(width, height, target).map(DynamicImage::ImageRgba8)
        }
        _ => unreachable!("unsupported color types fall back above"),
    };

    image.ok_or_else(|| DecodeError::Decode("decoded buffer size mismatch".into()))
}

/// Allocating decode through the format-guessing reader.
fn decode_dynamic(bytes: &[u8], limits: &DecodeLimits) -> Result<DynamicImage, DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Decode(e.to_string()))?;
    reader.limits(limits.to_image_limits());
    Ok(reader.decode()?)
}
