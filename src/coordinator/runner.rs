// SPDX-License-Identifier: GPL-3.0-only

//! Async driver for the scan coordinator
//!
//! ```text
//!  FrameSource ──deliver()──┐
//!                           ▼
//!  ScannerHandle ──▶ mpsc<Command> ──▶ event loop (owns ScanCoordinator)
//!                           ▲               │
//!  capture task ────────────┤               ├──▶ ScanStore::insert
//!  confirmation timer ──────┘               └──▶ broadcast<ScanUpdate>
//! ```
//!
//! All coordinator state lives in one task. Everything else talks to it by
//! sending a [`Command`], so there is no shared mutable state to lock.

use super::{CaptureTicket, CompletionOutcome, DetectionOutcome, ScanCoordinator, Timestamp};
use crate::backends::{CapturedImage, FrameSource, LocationProvider, StillCapture};
use crate::config::Config;
use crate::constants::{channels, timing};
use crate::errors::{AppError, AppResult, CaptureError};
use crate::model::ScanSummary;
use crate::storage::ScanStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Messages processed by the event loop
pub(crate) enum Command {
    Start(oneshot::Sender<AppResult<bool>>),
    Stop(oneshot::Sender<bool>),
    Detection {
        payload: String,
        at: Timestamp,
    },
    CaptureDone {
        ticket: CaptureTicket,
        result: Result<CapturedImage, CaptureError>,
    },
    ConfirmationElapsed(u64),
    Status(oneshot::Sender<ScannerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Entry point for decoded payloads coming from a frame source
#[derive(Debug, Clone)]
pub struct DetectionSink {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start(_) => write!(f, "Start"),
            Command::Stop(_) => write!(f, "Stop"),
            Command::Detection { payload, .. } => write!(f, "Detection({})", payload),
            Command::CaptureDone { ticket, result } => {
                write!(f, "CaptureDone({:?}, ok={})", ticket, result.is_ok())
            }
            Command::ConfirmationElapsed(generation) => {
                write!(f, "ConfirmationElapsed({})", generation)
            }
            Command::Status(_) => write!(f, "Status"),
            Command::Shutdown(_) => write!(f, "Shutdown"),
        }
    }
}

impl DetectionSink {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Hand a decoded payload to the coordinator
    ///
    /// The detection is timestamped here, not when the event loop gets to
    /// it. Never blocks: if the queue is full the payload is dropped, which
    /// is harmless since the same code will be decoded again on a later
    /// frame. Returns `false` once the coordinator has shut down.
    pub fn deliver(&self, payload: String) -> bool {
        let command = Command::Detection {
            payload,
            at: Timestamp::now(),
        };
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Command queue full, dropping detection");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Collaborators injected into the coordinator
#[derive(Clone)]
pub struct ScanServices {
    pub frames: Arc<dyn FrameSource>,
    pub capture: Arc<dyn StillCapture>,
    pub location: Arc<dyn LocationProvider>,
    pub store: Arc<dyn ScanStore>,
}

/// Coordinator timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    /// Minimum spacing between accepted detections
    pub cooldown: Duration,
    /// How long a save confirmation stays up
    pub confirmation: Duration,
    /// Bound on a single still capture
    pub capture_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            cooldown: timing::SCAN_COOLDOWN,
            confirmation: timing::CONFIRMATION_DISPLAY,
            capture_timeout: timing::CAPTURE_TIMEOUT,
        }
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            cooldown: config.scan_cooldown(),
            confirmation: config.confirmation_duration(),
            capture_timeout: config.capture_timeout(),
        }
    }
}

/// Notifications published by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    /// Scanning was switched on or off
    ScanningChanged(bool),
    /// A scan event was durably stored
    Saved(ScanSummary),
    /// The "scan saved" confirmation became visible
    ConfirmationShown,
    /// The confirmation timed out
    ConfirmationHidden,
    /// A still capture failed; the detection was discarded
    CaptureFailed(String),
    /// A completed scan could not be stored
    PersistFailed(String),
    /// The frame source could not be started
    SourceFailed(String),
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerStatus {
    pub state: &'static str,
    pub scanning: bool,
    pub pending_payload: Option<String>,
    pub confirmation_visible: bool,
    /// Scans stored since the coordinator was spawned
    pub saved: u64,
}

/// Cloneable handle to a running coordinator
#[derive(Clone)]
pub struct ScannerHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<ScanUpdate>,
}

impl std::fmt::Debug for ScannerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl ScannerHandle {
    /// Spawn the event loop on the current tokio runtime
    pub fn spawn(services: ScanServices, settings: CoordinatorSettings) -> Self {
        let (commands, receiver) = mpsc::channel(channels::COMMAND_CAPACITY);
        let (updates, _) = broadcast::channel(channels::UPDATE_CAPACITY);

        let event_loop = EventLoop {
            coordinator: ScanCoordinator::new(settings.cooldown),
            settings,
            services,
            commands: commands.downgrade(),
            updates: updates.clone(),
            capture_task: None,
            confirmation_task: None,
            confirmation_generation: 0,
            confirmation_visible: false,
            saved: 0,
        };
        tokio::spawn(event_loop.run(receiver));
        debug!(?settings, "Scan coordinator spawned");

        Self { commands, updates }
    }

    /// Start scanning
    ///
    /// Returns `Ok(false)` if scanning was already on. Fails if the frame
    /// source cannot be started; a missing location provider only degrades.
    pub async fn start(&self) -> AppResult<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start(reply)).await?;
        response.await.map_err(|_| closed())?
    }

    /// Stop scanning. Returns `Ok(false)` if scanning was already off.
    pub async fn stop(&self) -> AppResult<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stop(reply)).await?;
        response.await.map_err(|_| closed())
    }

    pub async fn status(&self) -> AppResult<ScannerStatus> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply)).await?;
        response.await.map_err(|_| closed())
    }

    /// Stop scanning and end the event loop
    pub async fn shutdown(&self) -> AppResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown(reply)).await?;
        response.await.map_err(|_| closed())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanUpdate> {
        self.updates.subscribe()
    }

    /// Sink feeding detections straight into this coordinator
    pub fn detection_sink(&self) -> DetectionSink {
        DetectionSink::new(self.commands.clone())
    }

    async fn send(&self, command: Command) -> AppResult<()> {
        self.commands.send(command).await.map_err(|_| closed())
    }
}

fn closed() -> AppError {
    AppError::Other("scan coordinator has shut down".into())
}

struct EventLoop {
    coordinator: ScanCoordinator,
    settings: CoordinatorSettings,
    services: ScanServices,
    /// Weak so the loop ends once every handle is gone
    commands: mpsc::WeakSender<Command>,
    updates: broadcast::Sender<ScanUpdate>,
    capture_task: Option<JoinHandle<()>>,
    confirmation_task: Option<JoinHandle<()>>,
    confirmation_generation: u64,
    confirmation_visible: bool,
    saved: u64,
}

impl EventLoop {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.recv().await {
            trace!(?command, "Coordinator command");
            match command {
                Command::Start(reply) => {
                    let result = self.start().await;
                    let _ = reply.send(result);
                }
                Command::Stop(reply) => {
                    let stopped = self.stop().await;
                    let _ = reply.send(stopped);
                }
                Command::Detection { payload, at } => self.on_detection(&payload, at),
                Command::CaptureDone { ticket, result } => {
                    self.on_capture_done(ticket, result).await
                }
                Command::ConfirmationElapsed(generation) => {
                    self.on_confirmation_elapsed(generation)
                }
                Command::Status(reply) => {
                    let _ = reply.send(self.status());
                }
                Command::Shutdown(reply) => {
                    self.stop().await;
                    self.abort_tasks();
                    let _ = reply.send(());
                    info!("Scan coordinator shut down");
                    return;
                }
            }
        }

        // Every handle dropped without an explicit shutdown
        self.stop().await;
        self.abort_tasks();
        debug!("Scan coordinator event loop ended");
    }

    async fn start(&mut self) -> AppResult<bool> {
        if self.coordinator.is_scanning() {
            return Ok(false);
        }

        let sender = self.commands.upgrade().ok_or_else(closed)?;
        if let Err(e) = self.services.frames.start(DetectionSink::new(sender)).await {
            error!(error = %e, "Frame source failed to start");
            self.publish(ScanUpdate::SourceFailed(e.to_string()));
            return Err(e.into());
        }

        if let Err(e) = self.services.location.start().await {
            warn!(error = %e, "Location unavailable, scans will have no position");
        }

        self.coordinator.start();
        self.dismiss_confirmation();
        self.publish(ScanUpdate::ScanningChanged(true));
        Ok(true)
    }

    async fn stop(&mut self) -> bool {
        if !self.coordinator.stop() {
            return false;
        }

        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        self.services.frames.stop().await;
        self.services.location.stop().await;
        self.publish(ScanUpdate::ScanningChanged(false));
        true
    }

    fn on_detection(&mut self, payload: &str, at: Timestamp) {
        let DetectionOutcome::Accepted(ticket) = self.coordinator.on_detection(payload, at) else {
            return;
        };

        let capture = Arc::clone(&self.services.capture);
        let commands = self.commands.clone();
        let timeout = self.settings.capture_timeout;

        self.capture_task = Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, capture.capture_once()).await {
                Ok(result) => result,
                Err(_) => Err(CaptureError::TimedOut(timeout)),
            };
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::CaptureDone { ticket, result }).await;
            }
        }));
    }

    async fn on_capture_done(
        &mut self,
        ticket: CaptureTicket,
        result: Result<CapturedImage, CaptureError>,
    ) {
        let failure = result.as_ref().err().map(ToString::to_string);
        let location = self.services.location.latest();

        match self
            .coordinator
            .on_capture_complete(ticket, result, location)
        {
            CompletionOutcome::Completed(event) => {
                self.capture_task = None;
                match self.services.store.insert(&event).await {
                    Ok(()) => {
                        self.saved += 1;
                        info!(id = %event.id, "Scan saved");
                        self.publish(ScanUpdate::Saved(event.summary()));
                        self.show_confirmation();
                    }
                    Err(e) => {
                        error!(error = %e, id = %event.id, "Failed to save scan");
                        self.publish(ScanUpdate::PersistFailed(e.to_string()));
                    }
                }
            }
            CompletionOutcome::Failed => {
                self.capture_task = None;
                self.publish(ScanUpdate::CaptureFailed(failure.unwrap_or_default()));
            }
            CompletionOutcome::Stale => {}
        }
    }

    fn show_confirmation(&mut self) {
        if let Some(task) = self.confirmation_task.take() {
            task.abort();
        }
        self.confirmation_generation += 1;
        self.confirmation_visible = true;
        self.publish(ScanUpdate::ConfirmationShown);

        let generation = self.confirmation_generation;
        let display = self.settings.confirmation;
        let commands = self.commands.clone();
        self.confirmation_task = Some(tokio::spawn(async move {
            tokio::time::sleep(display).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands
                    .send(Command::ConfirmationElapsed(generation))
                    .await;
            }
        }));
    }

    fn on_confirmation_elapsed(&mut self, generation: u64) {
        if generation != self.confirmation_generation || !self.confirmation_visible {
            return;
        }
        self.confirmation_visible = false;
        self.confirmation_task = None;
        self.publish(ScanUpdate::ConfirmationHidden);
    }

    /// Hide a confirmation left over from the previous session
    fn dismiss_confirmation(&mut self) {
        if let Some(task) = self.confirmation_task.take() {
            task.abort();
        }
        if self.confirmation_visible {
            self.confirmation_visible = false;
            self.publish(ScanUpdate::ConfirmationHidden);
        }
    }

    fn status(&self) -> ScannerStatus {
        ScannerStatus {
            state: self.coordinator.state().label(),
            scanning: self.coordinator.is_scanning(),
            pending_payload: self.coordinator.pending_payload().map(str::to_string),
            confirmation_visible: self.confirmation_visible,
            saved: self.saved,
        }
    }

    fn abort_tasks(&mut self) {
        for task in [self.capture_task.take(), self.confirmation_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn publish(&self, update: ScanUpdate) {
        if self.updates.send(update).is_err() {
            trace!("No status subscribers");
        }
    }
}
