// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JPEG quality presets for captured still frames
///
/// Still frames are stored inline with every scan, so the preset trades
/// history size against how readable the code is in the saved image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureQuality {
    /// Small thumbnails
    Low,
    /// Balanced quality and size
    Medium,
    /// Sharp enough to re-decode the code from the image (default)
    #[default]
    High,
    /// Minimal compression
    Maximum,
}

impl CaptureQuality {
    /// Get all preset variants for iteration
    pub const ALL: [CaptureQuality; 4] = [
        CaptureQuality::Low,
        CaptureQuality::Medium,
        CaptureQuality::High,
        CaptureQuality::Maximum,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureQuality::Low => "Low",
            CaptureQuality::Medium => "Medium",
            CaptureQuality::High => "High",
            CaptureQuality::Maximum => "Maximum",
        }
    }

    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            CaptureQuality::Low => 60,
            CaptureQuality::Medium => 80,
            CaptureQuality::High => 92,
            CaptureQuality::Maximum => 98,
        }
    }
}

/// Scan coordinator timing
pub mod timing {
    use super::Duration;

    /// Minimum interval between two accepted detections
    pub const SCAN_COOLDOWN: Duration = Duration::from_secs(3);

    /// How long the "scan saved" confirmation stays visible
    pub const CONFIRMATION_DISPLAY: Duration = Duration::from_secs(2);

    /// Upper bound on a single still capture before it counts as failed
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Delay between frames when replaying image files as a feed
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(500);
}

/// Channel sizing for the coordinator event loop
pub mod channels {
    /// Pending commands (detections, capture completions, timers)
    pub const COMMAND_CAPACITY: usize = 64;

    /// Buffered status updates per subscriber
    pub const UPDATE_CAPACITY: usize = 32;
}

/// QR detection settings
pub mod detection {
    /// Frames are downscaled so their longest side is at most this many pixels
    pub const MAX_DIMENSION: u32 = 640;
}

/// Supported file formats
pub mod file_formats {
    /// Image file extensions accepted as frames
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Export layout
pub mod export {
    /// Prefix of every export directory name
    pub const DIR_PREFIX: &str = "qr_export_";

    /// Name of the CSV file inside an export directory
    pub const CSV_FILE_NAME: &str = "scans.csv";

    /// Sub-directory holding the still images
    pub const IMAGES_DIR_NAME: &str = "images";
}

/// Application name used for config and data directories
pub const APP_NAME: &str = "qrscan";
