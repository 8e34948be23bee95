// SPDX-License-Identifier: MPL-2.0

//! Camera side of the scanner
//!
//! ```text
//! ┌───────────────────┐  frames   ┌───────────┐  latest frame  ┌──────────────────┐
//! │ FolderFrameSource │──────────▶│ FrameSlot │───────────────▶│ FrameGrabCapture │
//! └─────────┬─────────┘           └───────────┘                └──────────────────┘
//!           │ decoded payloads
//!           ▼
//!     DetectionSink → coordinator
//! ```

pub mod capture;
pub mod folder_source;
pub mod types;

pub use capture::FrameGrabCapture;
pub use folder_source::FolderFrameSource;
pub use types::{CameraFrame, FrameSlot};
