// SPDX-License-Identifier: GPL-3.0-only

//! Scan coordinator
//!
//! Turns a noisy stream of QR detections into scan events:
//!
//! 1. A detection is accepted only if the previous acceptance is at least
//!    one cooldown old; anything sooner is dropped.
//! 2. An accepted detection requests a still capture and waits for it.
//! 3. A successful capture is correlated back to the pending payload and
//!    becomes a [`ScanEvent`]; a failed one is discarded.
//!
//! [`ScanCoordinator`] is the synchronous state machine. It performs no I/O
//! and takes time as an argument. [`runner`] drives it from a single tokio
//! task and wires it to the frame source, capture, location and store.

pub mod runner;
pub mod state;

pub use runner::{CoordinatorSettings, DetectionSink, ScanServices, ScanUpdate, ScannerHandle};
pub use state::{CaptureTicket, CoordinatorState, PendingCapture, Timestamp};

use crate::backends::CapturedImage;
use crate::constants::timing;
use crate::errors::CaptureError;
use crate::model::{Coordinate, ScanEvent};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// What happened to a detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Not scanning
    Ignored,
    /// Empty payload
    Rejected,
    /// Inside the cooldown window
    Debounced,
    /// Accepted; the caller must issue a still capture for this ticket
    Accepted(CaptureTicket),
}

/// What happened to a capture completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Correlated to the pending payload; hand this event to the store
    Completed(ScanEvent),
    /// Capture failed; the pending payload was dropped
    Failed,
    /// No matching pending capture (after stop, duplicate or out of order)
    Stale,
}

/// Debounce / capture / correlate state machine
#[derive(Debug)]
pub struct ScanCoordinator {
    state: CoordinatorState,
    last_accepted_at: Option<Timestamp>,
    cooldown: Duration,
    session: u64,
    next_sequence: u64,
}

impl Default for ScanCoordinator {
    fn default() -> Self {
        Self::new(timing::SCAN_COOLDOWN)
    }
}

impl ScanCoordinator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: CoordinatorState::Idle,
            last_accepted_at: None,
            cooldown,
            session: 0,
            next_sequence: 0,
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state.is_scanning()
    }

    /// Decoded payload awaiting its image, if any
    pub fn pending_payload(&self) -> Option<&str> {
        self.state.pending().map(|p| p.payload.as_str())
    }

    pub fn last_accepted_at(&self) -> Option<Timestamp> {
        self.last_accepted_at
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Begin scanning. Returns `false` if already scanning.
    pub fn start(&mut self) -> bool {
        if self.state.is_scanning() {
            return false;
        }
        self.session += 1;
        self.state = CoordinatorState::Watching;
        info!(session = self.session, "Scanning started");
        true
    }

    /// Stop scanning. Returns `false` if not scanning.
    ///
    /// An in-flight capture is abandoned; its completion will be stale.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_scanning() {
            return false;
        }
        if let CoordinatorState::Capturing(pending) =
            std::mem::replace(&mut self.state, CoordinatorState::Idle)
        {
            debug!(payload = %pending.payload, "Abandoning pending capture on stop");
            // The abandoned acceptance produced no event, so it must not hold the cooldown
            self.last_accepted_at = None;
        }
        info!(session = self.session, "Scanning stopped");
        true
    }

    /// Handle a decoded payload from the frame source
    pub fn on_detection(&mut self, payload: &str, now: Timestamp) -> DetectionOutcome {
        match self.state {
            CoordinatorState::Idle => return DetectionOutcome::Ignored,
            CoordinatorState::Watching | CoordinatorState::Capturing(_) => {}
        }

        if payload.trim().is_empty() {
            trace!("Ignoring empty payload");
            return DetectionOutcome::Rejected;
        }

        if let Some(last) = self.last_accepted_at {
            let elapsed = now.monotonic.saturating_duration_since(last.monotonic);
            if elapsed < self.cooldown {
                trace!(
                    elapsed_ms = elapsed.as_millis(),
                    "Detection inside cooldown window"
                );
                return DetectionOutcome::Debounced;
            }
        }

        // Single outstanding capture; only reachable when the capture outlives the cooldown
        if matches!(self.state, CoordinatorState::Capturing(_)) {
            debug!("Capture still in flight, dropping detection");
            return DetectionOutcome::Debounced;
        }

        self.next_sequence += 1;
        let ticket = CaptureTicket {
            session: self.session,
            sequence: self.next_sequence,
        };
        self.last_accepted_at = Some(now);
        self.state = CoordinatorState::Capturing(PendingCapture {
            ticket,
            payload: payload.to_string(),
            detected_at: now,
        });

        info!(payload = %payload, sequence = ticket.sequence, "Detection accepted");
        DetectionOutcome::Accepted(ticket)
    }

    /// Handle the result of a still capture
    ///
    /// `location` is the latest known position at completion time.
    pub fn on_capture_complete(
        &mut self,
        ticket: CaptureTicket,
        result: Result<CapturedImage, CaptureError>,
        location: Option<Coordinate>,
    ) -> CompletionOutcome {
        let matches_pending = self
            .state
            .pending()
            .is_some_and(|pending| pending.ticket == ticket);
        if !matches_pending {
            debug!(
                session = ticket.session,
                sequence = ticket.sequence,
                "Discarding stale capture completion"
            );
            return CompletionOutcome::Stale;
        }

        let CoordinatorState::Capturing(pending) =
            std::mem::replace(&mut self.state, CoordinatorState::Watching)
        else {
            return CompletionOutcome::Stale;
        };

        match result {
            Ok(image) => {
                let event = ScanEvent::new(
                    pending.payload,
                    pending.detected_at.wall,
                    location,
                    Some(image.data),
                );
                info!(
                    id = %event.id,
                    payload = %event.payload,
                    has_location = event.location.is_some(),
                    "Scan completed"
                );
                CompletionOutcome::Completed(event)
            }
            Err(e) => {
                warn!(error = %e, payload = %pending.payload, "Capture failed, discarding detection");
                // Nothing was recorded, so the next detection need not wait out the cooldown
                self.last_accepted_at = None;
                CompletionOutcome::Failed
            }
        }
    }
}
