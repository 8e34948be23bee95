// SPDX-License-Identifier: MPL-2.0

//! qrscan - QR code scan logger
//!
//! Watches a frame feed for QR codes and records every distinct sighting as
//! a scan event: the decoded payload, when it was seen, where (if a position
//! is known) and a still image of the frame.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`coordinator`]: Debounce, still capture and correlation state machine
//! - [`backends`]: Frame source, still capture and location provider traits
//!   and their implementations
//! - [`frame_processor`]: QR decoding and payload classification
//! - [`storage`]: Scan history persistence
//! - [`export`]: CSV + image export of the scan history
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Replay a folder of photos as a camera feed and log the codes in them:
//! // qrscan scan ~/Pictures/codes
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod errors;
pub mod export;
pub mod frame_processor;
pub mod model;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::CaptureQuality;
pub use coordinator::{CoordinatorSettings, ScanServices, ScanUpdate, ScannerHandle};
pub use errors::{AppError, AppResult};
pub use frame_processor::{PayloadKind, QrDetection};
pub use model::{Coordinate, ScanEvent, ScanSummary};
pub use storage::ScanStore;
