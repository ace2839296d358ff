//! JPEG encoding strategy

use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tracing::{debug, info};

use xrlink_core::{XrlinkError, XrlinkResult};

use crate::{Frame, PixelFormat};

/// Lowest quality accepted by the encoders
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Highest quality accepted by the encoders
pub const MAX_JPEG_QUALITY: u8 = 100;

/// A JPEG codec the sender can drive
///
/// Implementations must be callable from a blocking worker thread.
pub trait FrameEncoder: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether the backing codec can be used on this machine
    fn is_available(&self) -> bool {
        true
    }

    /// Encode a frame that already has the target size
    fn encode(&self, frame: &Frame, quality: u8) -> XrlinkResult<Vec<u8>>;
}

/// Portable encoder backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareJpegEncoder;

impl FrameEncoder for SoftwareJpegEncoder {
    fn name(&self) -> &'static str {
        "software-jpeg"
    }

    fn encode(&self, frame: &Frame, quality: u8) -> XrlinkResult<Vec<u8>> {
        let quality = quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY);
        let color = match frame.format() {
            PixelFormat::Gray8 => ColorType::L8,
            PixelFormat::Rgb8 => ColorType::Rgb8,
            PixelFormat::Rgba8 => {
                return Err(XrlinkError::EncodeFailed(
                    "alpha must be removed before encoding".into(),
                ))
            }
        };

        let mut out = Vec::with_capacity(frame.pixels().len() / 8);
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(frame.pixels(), frame.width(), frame.height(), color)
            .map_err(|e| XrlinkError::EncodeFailed(e.to_string()))?;
        Ok(out)
    }
}

/// Pick the first available encoder, falling back to software.
///
/// Resolved once at startup; the hot path only ever sees the returned handle.
pub fn select_encoder(candidates: Vec<Arc<dyn FrameEncoder>>) -> Arc<dyn FrameEncoder> {
    for candidate in candidates {
        if candidate.is_available() {
            info!(encoder = candidate.name(), "selected frame encoder");
            return candidate;
        }
        debug!(encoder = candidate.name(), "frame encoder unavailable, skipping");
    }
    info!(encoder = "software-jpeg", "selected fallback frame encoder");
    Arc::new(SoftwareJpegEncoder)
}

/// Resize `frame` to the target size when it differs, then encode it
pub fn encode_frame(
    encoder: &dyn FrameEncoder,
    frame: Frame,
    target_width: u32,
    target_height: u32,
    quality: u8,
) -> XrlinkResult<Bytes> {
    let frame = frame
        .resized(target_width, target_height)?
        .into_jpeg_source()?;
    let data = encoder.encode(&frame, quality)?;
    if data.is_empty() {
        return Err(XrlinkError::EncodeFailed(format!(
            "{} produced no output",
            encoder.name()
        )));
    }
    Ok(Bytes::from(data))
}
