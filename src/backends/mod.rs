// SPDX-License-Identifier: MPL-2.0

//! Collaborators of the scan coordinator
//!
//! The coordinator only talks to these traits. Concrete implementations are
//! constructed by the application and injected through
//! [`ScanServices`](crate::coordinator::ScanServices).

pub mod camera;
pub mod location;

use crate::coordinator::DetectionSink;
use crate::errors::{CameraError, CaptureError, LocationError};
use crate::model::Coordinate;
use async_trait::async_trait;

/// An encoded still frame
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    /// Encoded image bytes (JPEG)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Live feed of decoded QR payloads
///
/// While started, every decoded payload is handed to the sink. At most one
/// sink is attached at a time; `start` on a running source is a no-op.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn start(&self, sink: DetectionSink) -> Result<(), CameraError>;

    async fn stop(&self);
}

/// One-shot still capture of the current frame
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StillCapture: Send + Sync {
    async fn capture_once(&self) -> Result<CapturedImage, CaptureError>;
}

/// Best-effort positioning
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Begin receiving position updates
    async fn start(&self) -> Result<(), LocationError>;

    async fn stop(&self);

    /// Most recent position; never blocks waiting for a fix
    fn latest(&self) -> Option<Coordinate>;
}
