// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner
//!
//! Every failure in this crate is scoped to the operation that raised it.
//! The coordinator turns them into status updates instead of propagating
//! them out of its event loop.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Frame source errors
    Camera(CameraError),
    /// Still capture errors
    Capture(CaptureError),
    /// Location provider errors
    Location(LocationError),
    /// Scan history store errors
    Storage(StorageError),
    /// Export errors
    Export(ExportError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Frame source errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No usable frames were found at the given location
    NoFramesFound(String),
    /// A frame could not be loaded or decoded
    LoadFailed(String),
    /// The feed cannot be started (device missing or access denied)
    Unavailable(String),
}

/// Still capture errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// No frame has been published by the feed yet
    NoFrameAvailable,
    /// The frame could not be encoded
    EncodingFailed(String),
    /// The capture did not complete in time
    TimedOut(Duration),
    /// Backend reported a failure
    Failed(String),
}

/// Location provider errors
#[derive(Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Positioning is not available on this device
    Unavailable,
    /// The user denied access to positioning
    Denied,
    /// Coordinates out of range
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

/// Scan history store errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Database engine error
    Database(String),
    /// A scan with this id is already stored
    Duplicate(Uuid),
    /// A stored row could not be turned back into a scan
    InvalidRecord(String),
    /// Filesystem error (creating the database directory)
    Io(String),
}

/// Export errors
#[derive(Debug, Clone)]
pub enum ExportError {
    /// History is empty
    NothingToExport,
    /// Filesystem error
    Io(String),
    /// CSV serialization error
    Csv(String),
    /// Path is not an export directory created by this crate
    NotAnExport(PathBuf),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Location(e) => write!(f, "Location error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Export(e) => write!(f, "Export error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoFramesFound(msg) => write!(f, "No frames found: {}", msg),
            CameraError::LoadFailed(msg) => write!(f, "Failed to load frame: {}", msg),
            CameraError::Unavailable(msg) => write!(f, "Camera unavailable: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoFrameAvailable => write!(f, "No frame available for capture"),
            CaptureError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            CaptureError::TimedOut(after) => {
                write!(f, "Capture timed out after {} ms", after.as_millis())
            }
            CaptureError::Failed(msg) => write!(f, "Capture failed: {}", msg),
        }
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::Unavailable => write!(f, "Location unavailable"),
            LocationError::Denied => write!(f, "Location access denied"),
            LocationError::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "Invalid coordinate ({}, {})", latitude, longitude),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Database(msg) => write!(f, "Database error: {}", msg),
            StorageError::Duplicate(id) => write!(f, "Scan {} already exists", id),
            StorageError::InvalidRecord(msg) => write!(f, "Invalid record: {}", msg),
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NothingToExport => write!(f, "No scans to export"),
            ExportError::Io(msg) => write!(f, "I/O error: {}", msg),
            ExportError::Csv(msg) => write!(f, "CSV error: {}", msg),
            ExportError::NotAnExport(path) => {
                write!(f, "{} is not an export directory", path.display())
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for LocationError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ExportError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<LocationError> for AppError {
    fn from(err: LocationError) -> Self {
        AppError::Location(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Export(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

// Foreign error conversions for the leaf error types
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::EncodingFailed(err.to_string())
    }
}

impl From<image::ImageError> for CameraError {
    fn from(err: image::ImageError) -> Self {
        CameraError::LoadFailed(err.to_string())
    }
}
