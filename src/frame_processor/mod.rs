// SPDX-License-Identifier: MPL-2.0

//! Frame analysis
//!
//! Decodes QR codes from camera frames and classifies what the decoded
//! payloads contain.

pub mod tasks;
pub mod types;

pub use tasks::qr_detector;
pub use types::{FrameRegion, PayloadKind, QrDetection};
