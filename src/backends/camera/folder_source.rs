// SPDX-License-Identifier: GPL-3.0-only

//! Image files replayed as a camera feed
//!
//! Each file becomes one frame, emitted at a fixed interval. Frames are
//! published to a [`FrameSlot`] for still capture and run through the QR
//! detector; decoded payloads go to the coordinator's detection sink.

use super::types::{CameraFrame, FrameSlot};
use crate::backends::FrameSource;
use crate::constants::{file_formats, timing};
use crate::coordinator::DetectionSink;
use crate::errors::CameraError;
use crate::frame_processor::tasks::QrDetector;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Frame source over a list of image files
pub struct FolderFrameSource {
    files: Vec<PathBuf>,
    interval: Duration,
    detector: QrDetector,
    slot: FrameSlot,
    worker: Mutex<Option<JoinHandle<()>>>,
    finished: watch::Sender<bool>,
}

impl std::fmt::Debug for FolderFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderFrameSource")
            .field("files", &self.files.len())
            .field("interval", &self.interval)
            .finish()
    }
}

impl FolderFrameSource {
    /// Build a source from files and/or directories
    ///
    /// Directories contribute their image files in name order.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self, CameraError> {
        let files = collect_image_paths(paths)?;
        if files.is_empty() {
            return Err(CameraError::NoFramesFound(
                "no supported image files in input".into(),
            ));
        }
        info!(count = files.len(), "Frame files collected");

        let (finished, _) = watch::channel(false);
        Ok(Self {
            files,
            interval: timing::FRAME_INTERVAL,
            detector: QrDetector::new(),
            slot: FrameSlot::new(),
            worker: Mutex::new(None),
            finished,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_detector(mut self, detector: QrDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Slot receiving every frame this source emits
    pub fn frame_slot(&self) -> FrameSlot {
        self.slot.clone()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Flips to `true` once the last file has been emitted
    pub fn finished(&self) -> watch::Receiver<bool> {
        self.finished.subscribe()
    }
}

#[async_trait]
impl FrameSource for FolderFrameSource {
    async fn start(&self, sink: DetectionSink) -> Result<(), CameraError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = worker.as_ref()
            && !handle.is_finished()
        {
            debug!("Frame replay already running");
            return Ok(());
        }

        self.finished.send_replace(false);
        *worker = Some(tokio::spawn(replay(
            self.files.clone(),
            self.interval,
            self.detector.clone(),
            self.slot.clone(),
            sink,
            self.finished.clone(),
        )));
        info!(interval_ms = self.interval.as_millis(), "Frame replay started");
        Ok(())
    }

    async fn stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Frame replay stopped");
        }
        self.slot.clear();
    }
}

async fn replay(
    files: Vec<PathBuf>,
    interval: Duration,
    detector: QrDetector,
    slot: FrameSlot,
    sink: DetectionSink,
    finished: watch::Sender<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    for path in files {
        ticker.tick().await;

        let load_path = path.clone();
        let frame = match tokio::task::spawn_blocking(move || CameraFrame::load(&load_path)).await
        {
            Ok(Ok(frame)) => Arc::new(frame),
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Frame load task failed");
                continue;
            }
        };

        slot.publish(Arc::clone(&frame));

        for detection in detector.detect(frame).await {
            if !sink.deliver(detection.content) {
                debug!("Coordinator has shut down, ending replay");
                return;
            }
        }
    }

    info!("Reached end of frame files");
    finished.send_replace(true);
}

/// Collect image paths from files or directories
pub fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, CameraError> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| {
                CameraError::NoFramesFound(format!("{}: {}", path.display(), e))
            })?;
            let mut dir_paths: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| is_supported_image(p))
                .collect();
            // Sort by filename for consistent ordering
            dir_paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            paths.extend(dir_paths);
        } else if is_supported_image(path) {
            paths.push(path.clone());
        } else {
            warn!(path = %path.display(), "Ignoring unsupported input");
        }
    }

    Ok(paths)
}

fn is_supported_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| file_formats::is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::runner::Command;
    use tokio::sync::mpsc;

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(16, 16, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn copy_fixture(dir: &Path, name: &str) -> PathBuf {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("qr_a_test.png");
        let path = dir.join(name);
        std::fs::copy(fixture, &path).unwrap();
        path
    }

    #[test]
    fn test_collect_sorts_directory_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png");
        write_png(dir.path(), "a.png");
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let paths = collect_image_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_empty_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FolderFrameSource::from_paths(&[dir.path().to_path_buf()]),
            Err(CameraError::NoFramesFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_publishes_frames_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "01.png");
        write_png(dir.path(), "02.png");

        let source = FolderFrameSource::from_paths(&[dir.path().to_path_buf()])
            .unwrap()
            .with_interval(Duration::from_millis(5));
        let slot = source.frame_slot();
        let mut finished = source.finished();

        let (tx, mut rx) = mpsc::channel::<Command>(8);
        source.start(DetectionSink::new(tx)).await.unwrap();

        finished.wait_for(|done| *done).await.unwrap();
        let latest = slot.latest().expect("frame published");
        assert_eq!(
            latest.source.as_ref().and_then(|p| p.file_name()),
            Some(std::ffi::OsStr::new("02.png"))
        );
        // Blank frames decode to nothing
        assert!(rx.try_recv().is_err());

        source.stop().await;
        assert!(slot.latest().is_none());
    }

    #[tokio::test]
    async fn test_replay_delivers_decoded_payload() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "01.png");
        copy_fixture(dir.path(), "02.png");

        let source = FolderFrameSource::from_paths(&[dir.path().to_path_buf()])
            .unwrap()
            .with_interval(Duration::from_millis(5));
        let mut finished = source.finished();

        let (tx, mut rx) = mpsc::channel::<Command>(8);
        source.start(DetectionSink::new(tx)).await.unwrap();
        finished.wait_for(|done| *done).await.unwrap();

        match rx.try_recv() {
            Ok(Command::Detection { payload, .. }) => assert_eq!(payload, "https://a.test"),
            other => panic!("expected a detection, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        source.stop().await;
    }
}
