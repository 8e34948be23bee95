// SPDX-License-Identifier: MPL-2.0

//! Still capture from the live feed
//!
//! Grabs the most recent frame a feed has published and encodes it as
//! JPEG, without interrupting the feed itself.

use super::types::{CameraFrame, FrameSlot};
use crate::backends::{CapturedImage, StillCapture};
use crate::constants::CaptureQuality;
use crate::errors::CaptureError;
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use tracing::{debug, info};

/// Still capture backed by a [`FrameSlot`]
#[derive(Debug, Clone)]
pub struct FrameGrabCapture {
    slot: FrameSlot,
    quality: CaptureQuality,
}

impl FrameGrabCapture {
    pub fn new(slot: FrameSlot) -> Self {
        Self {
            slot,
            quality: CaptureQuality::default(),
        }
    }

    pub fn with_quality(mut self, quality: CaptureQuality) -> Self {
        self.quality = quality;
        self
    }
}

#[async_trait]
impl StillCapture for FrameGrabCapture {
    async fn capture_once(&self) -> Result<CapturedImage, CaptureError> {
        let frame = self.slot.latest().ok_or(CaptureError::NoFrameAvailable)?;
        info!(
            width = frame.width,
            height = frame.height,
            source = ?frame.source,
            "Capturing still frame"
        );

        let quality = self.quality;
        // Encoding is CPU-bound
        tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality))
            .await
            .map_err(|e| CaptureError::Failed(format!("Encoding task error: {}", e)))?
    }
}

/// Encode a frame as JPEG (alpha is dropped)
pub fn encode_jpeg(
    frame: &Arc<CameraFrame>,
    quality: CaptureQuality,
) -> Result<CapturedImage, CaptureError> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.tight_rgba()).ok_or_else(
        || CaptureError::EncodingFailed("Frame data does not match its dimensions".into()),
    )?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut buffer = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());
        encoder.encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )?;
    }

    debug!(size = buffer.len(), "JPEG encoding complete");

    Ok(CapturedImage {
        data: buffer,
        width: frame.width,
        height: frame.height,
    })
}
