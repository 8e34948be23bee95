// SPDX-License-Identifier: GPL-3.0-only

//! QR decoding of camera frames
//!
//! Converts camera frames to grayscale, downscales them for speed and runs
//! the rqrr grid detector and decoder over the result.

use crate::backends::camera::types::CameraFrame;
use crate::constants::detection;
use crate::frame_processor::types::{FrameRegion, QrDetection};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Finds and decodes QR codes in frames
///
/// Large frames are shrunk first; codes held up to a camera stay readable
/// well below full resolution.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Longest side, in pixels, a frame is analysed at
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: detection::MAX_DIMENSION,
        }
    }

    /// Detector analysing frames at up to `max_dimension` pixels
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Decode every QR code visible in `frame`
    ///
    /// Runs on the blocking pool.
    pub async fn detect(&self, frame: Arc<CameraFrame>) -> Vec<QrDetection> {
        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || detect_sync(&frame, max_dimension))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "QR decode task failed");
                Vec::new()
            })
    }
}

/// Blocking variant of [`QrDetector::detect`]
pub fn detect_sync(frame: &CameraFrame, max_dimension: u32) -> Vec<QrDetection> {
    let start = std::time::Instant::now();

    let Some((gray, scale)) = prepare_grayscale(frame, max_dimension) else {
        warn!(
            width = frame.width,
            height = frame.height,
            "Frame data does not match its dimensions"
        );
        return Vec::new();
    };

    let (proc_width, proc_height) = gray.dimensions();
    trace!(
        proc_width,
        proc_height,
        scale,
        conversion_ms = start.elapsed().as_millis(),
        "Prepared grayscale image"
    );

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        proc_width as usize,
        proc_height as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();

    let mut detections = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR code");
                continue;
            }
        };

        // Axis-aligned box around the four grid corners, back in frame pixels
        let xs = grid.bounds.iter().map(|p| p.x.max(0) as f32);
        let ys = grid.bounds.iter().map(|p| p.y.max(0) as f32);
        let min_x = xs.clone().fold(f32::MAX, f32::min) * scale;
        let max_x = xs.fold(0.0, f32::max) * scale;
        let min_y = ys.clone().fold(f32::MAX, f32::min) * scale;
        let max_y = ys.fold(0.0, f32::max) * scale;

        let region = FrameRegion::from_pixels(
            min_x as u32,
            min_y as u32,
            (max_x - min_x).min(frame.width as f32) as u32,
            (max_y - min_y).min(frame.height as f32) as u32,
            frame.width,
            frame.height,
        );

        debug!(content = %content, x = region.x, y = region.y, "Detected QR code");
        detections.push(QrDetection::new(region, content));
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    detections
}

/// Grayscale copy of the frame, downscaled to fit `max_dimension`
///
/// Returns the image and the factor that maps its pixels back to frame pixels.
fn prepare_grayscale(frame: &CameraFrame, max_dimension: u32) -> Option<(GrayImage, f32)> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.tight_rgba())?;
    let image = DynamicImage::ImageRgba8(rgba);

    if frame.width > max_dimension || frame.height > max_dimension {
        let resized = image.resize(max_dimension, max_dimension, FilterType::Triangle);
        let scale = frame.width as f32 / resized.width().max(1) as f32;
        Some((resized.to_luma8(), scale))
    } else {
        Some((image.to_luma8(), 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 232 px square PNG: a version 1 code reading `https://a.test`, 8 px
    /// modules, starting 32 px in from each edge
    fn fixture_frame() -> CameraFrame {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("qr_a_test.png");
        CameraFrame::load(&path).unwrap()
    }

    fn assert_covers_code(bounds: &FrameRegion) {
        // Code spans 32..200 of 232 px, about 0.14 to 0.86
        assert!((0.08..0.2).contains(&bounds.x), "x = {}", bounds.x);
        assert!((0.08..0.2).contains(&bounds.y), "y = {}", bounds.y);
        assert!((0.6..0.85).contains(&bounds.width), "width = {}", bounds.width);
        assert!((0.6..0.85).contains(&bounds.height), "height = {}", bounds.height);
    }

    fn solid_frame(width: u32, height: u32, value: u8) -> CameraFrame {
        CameraFrame::from_rgba(width, height, vec![value; (width * height * 4) as usize])
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = solid_frame(320, 240, 255);
        assert!(detect_sync(&frame, 640).is_empty());
    }

    #[test]
    fn test_decodes_code_at_native_size() {
        let frame = fixture_frame();
        let detections = detect_sync(&frame, 640);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].content, "https://a.test");
        assert_covers_code(&detections[0].bounds);
    }

    #[test]
    fn test_decodes_code_after_downscale() {
        let frame = fixture_frame();
        let (gray, scale) = prepare_grayscale(&frame, 116).unwrap();
        assert_eq!(gray.dimensions(), (116, 116));
        assert_eq!(scale, 2.0);

        let detections = detect_sync(&frame, 116);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].content, "https://a.test");
        // Bounds are mapped back to full-size frame coordinates
        assert_covers_code(&detections[0].bounds);
    }

    #[tokio::test]
    async fn test_async_detect_finds_code() {
        let detections = QrDetector::new().detect(Arc::new(fixture_frame())).await;
        let contents: Vec<_> = detections.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["https://a.test"]);
    }

    #[test]
    fn test_large_frame_is_downscaled() {
        let frame = solid_frame(1920, 1080, 128);
        let (gray, scale) = prepare_grayscale(&frame, 640).unwrap();
        assert_eq!(gray.width(), 640);
        assert!(gray.height() <= 640);
        assert!((scale - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_small_frame_kept_at_native_size() {
        let frame = solid_frame(200, 100, 0);
        let (gray, scale) = prepare_grayscale(&frame, 640).unwrap();
        assert_eq!(gray.dimensions(), (200, 100));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_truncated_frame_is_skipped() {
        let frame = CameraFrame::from_rgba(10, 10, vec![0u8; 16]);
        assert!(detect_sync(&frame, 640).is_empty());
    }

    #[tokio::test]
    async fn test_async_detect_on_blank_frame() {
        let detector = QrDetector::with_max_dimension(320);
        let detections = detector.detect(Arc::new(solid_frame(64, 64, 255))).await;
        assert!(detections.is_empty());
    }
}
