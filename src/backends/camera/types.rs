// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for frame sources

use crate::errors::CameraError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

/// A single RGBA frame from a feed
#[derive(Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, `stride` bytes per row
    pub data: Arc<[u8]>,
    /// Bytes per row (may include padding)
    pub stride: u32,
    pub captured_at: Instant,
    /// File the frame was read from, for file-backed feeds
    pub source: Option<PathBuf>,
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .field("source", &self.source)
            .finish()
    }
}

impl CameraFrame {
    /// Wrap tightly packed RGBA data
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::from_rgba_with_stride(width, height, width * 4, data)
    }

    /// Wrap RGBA data whose rows are `stride` bytes apart
    ///
    /// Feeds that align rows hand frames over this way; padding is stripped
    /// by [`CameraFrame::tight_rgba`].
    pub fn from_rgba_with_stride(width: u32, height: u32, stride: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            stride: stride.max(width * 4),
            captured_at: Instant::now(),
            source: None,
        }
    }

    /// Load an image file as a frame
    pub fn load(path: &Path) -> Result<Self, CameraError> {
        debug!(path = %path.display(), "Loading image file");

        let img = image::open(path).map_err(|e| {
            CameraError::LoadFailed(format!("'{}': {}", path.display(), e))
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut frame = Self::from_rgba(width, height, rgba.into_raw());
        frame.source = Some(path.to_path_buf());
        Ok(frame)
    }

    /// Copy pixel data without stride padding
    ///
    /// Rows missing from a truncated buffer are left out.
    pub fn tight_rgba(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        let stride = self.stride as usize;
        if stride == row_bytes {
            return self.data.to_vec();
        }

        let mut result = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height as usize {
            let row_start = y * stride;
            let row_end = row_start + row_bytes;
            if row_end <= self.data.len() {
                result.extend_from_slice(&self.data[row_start..row_end]);
            }
        }
        result
    }
}

/// Most recent frame of a feed, shared with the still capture service
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<Arc<CameraFrame>>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Arc<CameraFrame>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("has_frame", &self.latest().is_some())
            .finish()
    }
}
