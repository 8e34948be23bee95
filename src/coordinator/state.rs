// SPDX-License-Identifier: GPL-3.0-only

//! Scan coordinator state

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Point in time as seen by the coordinator
///
/// Debounce arithmetic uses the monotonic clock so wall-clock adjustments
/// cannot reopen or extend the cooldown window. The wall-clock part only
/// becomes the scan's `captured_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub monotonic: Instant,
    pub wall: DateTime<Utc>,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            monotonic: Instant::now(),
            wall: Utc::now(),
        }
    }

    /// Same moment shifted forward by `offset` on both clocks
    pub fn after(&self, offset: std::time::Duration) -> Self {
        Self {
            monotonic: self.monotonic + offset,
            wall: self.wall
                + chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero()),
        }
    }
}

/// Identifies one still-capture request
///
/// `session` changes on every `start()`, so completions issued before a
/// stop/start cycle never match the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureTicket {
    pub session: u64,
    pub sequence: u64,
}

/// A decoded payload waiting for its still frame
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCapture {
    pub ticket: CaptureTicket,
    pub payload: String,
    pub detected_at: Timestamp,
}

/// Coordinator state machine
///
/// ```text
///            start()                on_detection (accepted)
///   Idle ──────────────▶ Watching ─────────────────────────▶ Capturing
///    ▲                     ▲  ◀──────────────────────────────    │
///    │      stop()         │     on_capture_complete             │
///    └─────────────────────┴─────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CoordinatorState {
    /// Not scanning
    #[default]
    Idle,
    /// Scanning, no capture in flight
    Watching,
    /// Scanning, a still capture is in flight for `PendingCapture`
    Capturing(PendingCapture),
}

impl CoordinatorState {
    pub fn is_scanning(&self) -> bool {
        !matches!(self, CoordinatorState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingCapture> {
        match self {
            CoordinatorState::Capturing(pending) => Some(pending),
            _ => None,
        }
    }

    /// Short name for logs and status output
    pub fn label(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::Watching => "watching",
            CoordinatorState::Capturing(_) => "capturing",
        }
    }
}
