// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning and managing the scan history
//!
//! This module provides command-line functionality for:
//! - Scanning a folder of images as a camera feed
//! - Decoding a single image
//! - Listing, showing and clearing stored scans
//! - Exporting the history

use chrono::Local;
use qrscan::backends::camera::{CameraFrame, FolderFrameSource, FrameGrabCapture};
use qrscan::backends::location::FixedLocation;
use qrscan::config::Config;
use qrscan::coordinator::{CoordinatorSettings, ScanServices, ScanUpdate, ScannerHandle};
use qrscan::errors::{AppResult, ExportError};
use qrscan::export;
use qrscan::frame_processor::qr_detector::{self, QrDetector};
use qrscan::frame_processor::PayloadKind;
use qrscan::model::{Coordinate, ScanEvent};
use qrscan::storage::{MemoryScanStore, ScanStore, SqliteScanStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Payloads longer than this are shortened in listings
const LIST_PAYLOAD_WIDTH: usize = 48;

/// Options for [`scan`]
pub struct ScanOptions {
    pub paths: Vec<PathBuf>,
    pub interval_ms: Option<u64>,
    /// (latitude, longitude)
    pub location: Option<(f64, f64)>,
    pub duration: Option<u64>,
    pub memory: bool,
}

/// Load the configuration, applying command-line overrides
pub fn load_config(path: Option<&Path>, database: Option<PathBuf>) -> AppResult<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(database) = database {
        config.database_path = database;
    }
    Ok(config)
}

/// Replay image files as a camera feed through the scan coordinator
pub fn scan(config: Config, options: ScanOptions) -> CliResult {
    let fixed_location = match options.location {
        Some((latitude, longitude)) => Some(Coordinate::new(latitude, longitude)?),
        None => config.fixed_location,
    };
    let interval = options
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.frame_interval());

    let source = Arc::new(
        FolderFrameSource::from_paths(&options.paths)?
            .with_interval(interval)
            .with_detector(QrDetector::with_max_dimension(
                config.max_detection_dimension,
            )),
    );
    println!("Frames: {} image(s)", source.files().len());
    match fixed_location {
        Some(coordinate) => println!("Location: {}", coordinate),
        None => println!("Location: unavailable"),
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        stop_tx.send_replace(true);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store: Arc<dyn ScanStore> = if options.memory {
            Arc::new(MemoryScanStore::new())
        } else {
            println!("Database: {}", config.database_path.display());
            Arc::new(SqliteScanStore::open(&config.database_path).await?)
        };

        let capture = FrameGrabCapture::new(source.frame_slot()).with_quality(config.capture_quality);
        let services = ScanServices {
            frames: source.clone(),
            capture: Arc::new(capture),
            location: Arc::new(FixedLocation::new(fixed_location)),
            store: Arc::clone(&store),
        };
        let handle = ScannerHandle::spawn(services, CoordinatorSettings::from(&config));
        let printer = tokio::spawn(print_updates(handle.subscribe()));

        let mut finished = source.finished();
        handle.start().await?;
        println!();
        println!("Scanning... (press Ctrl+C to stop early)");

        let deadline = async {
            match options.duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = finished.wait_for(|done| *done) => {}
            _ = stop_rx.wait_for(|stopped| *stopped) => {
                println!();
                println!("Stopping early...");
            }
            _ = deadline => {}
        }

        wait_for_pending_capture(&handle, config.capture_timeout()).await?;
        handle.stop().await?;
        let status = handle.status().await?;
        handle.shutdown().await?;
        drop(handle);
        let _ = printer.await;

        println!();
        println!("Saved {} scan(s)", status.saved);
        if options.memory {
            print_scan_table(&store.list_all().await?);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Give a capture issued for the last frame the chance to complete
async fn wait_for_pending_capture(handle: &ScannerHandle, timeout: Duration) -> AppResult<()> {
    let start = Instant::now();
    while handle.status().await?.pending_payload.is_some() && start.elapsed() < timeout {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

async fn print_updates(mut updates: broadcast::Receiver<ScanUpdate>) {
    loop {
        match updates.recv().await {
            Ok(ScanUpdate::Saved(summary)) => {
                println!(
                    "  ✓ {}  {}",
                    summary.captured_at.with_timezone(&Local).format("%H:%M:%S"),
                    summary.payload
                );
            }
            Ok(ScanUpdate::CaptureFailed(msg)) => println!("  ✗ capture failed: {}", msg),
            Ok(ScanUpdate::PersistFailed(msg)) => println!("  ✗ not saved: {}", msg),
            Ok(ScanUpdate::SourceFailed(msg)) => println!("  ✗ feed failed: {}", msg),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Status output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Decode and print the QR codes in one image
pub fn decode(config: &Config, image: &Path) -> CliResult {
    let frame = CameraFrame::load(image)?;
    let detections = qr_detector::detect_sync(&frame, config.max_detection_dimension);

    if detections.is_empty() {
        println!("No QR codes found.");
        return Ok(());
    }

    for (index, detection) in detections.iter().enumerate() {
        let kind = PayloadKind::classify(&detection.content);
        println!("[{}] {}: {}", index, kind.label(), detection.content);
        println!(
            "    at {:.0}%, {:.0}% ({:.0}% x {:.0}%)",
            detection.bounds.x * 100.0,
            detection.bounds.y * 100.0,
            detection.bounds.width * 100.0,
            detection.bounds.height * 100.0
        );
    }
    Ok(())
}

/// List stored scans, newest first
pub fn history(config: &Config) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    let events = rt.block_on(async {
        let store = SqliteScanStore::open(&config.database_path).await?;
        store.list_all().await
    })?;

    if events.is_empty() {
        println!("No scans yet.");
        return Ok(());
    }
    print_scan_table(&events);
    Ok(())
}

fn print_scan_table(events: &[ScanEvent]) {
    for event in events {
        let location = event
            .location
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:<width$}  {}",
            event.id,
            event
                .captured_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            shorten(&event.payload, LIST_PAYLOAD_WIDTH),
            location,
            width = LIST_PAYLOAD_WIDTH
        );
    }
    println!();
    println!("{} scan(s)", events.len());
}

/// Show one scan in detail
pub fn show(config: &Config, id: Uuid, image_out: Option<PathBuf>) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    let event = rt
        .block_on(async {
            let store = SqliteScanStore::open(&config.database_path).await?;
            store.get(id).await
        })?
        .ok_or_else(|| format!("No scan with id {}", id))?;

    let kind = PayloadKind::classify(&event.payload);
    println!("Payload:  {}", event.payload);
    match &kind {
        PayloadKind::Wifi { ssid } if !ssid.is_empty() => {
            println!("Kind:     {} ({})", kind.label(), ssid)
        }
        _ => println!("Kind:     {}", kind.label()),
    }
    println!(
        "Scanned:  {}",
        event
            .captured_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    match event.location {
        Some(location) => println!("Location: {}", location),
        None => println!("Location: unavailable"),
    }
    match &event.image {
        Some(bytes) => println!("Image:    {} bytes", bytes.len()),
        None => println!("Image:    none"),
    }

    if let Some(path) = image_out {
        let bytes = event
            .image
            .as_ref()
            .ok_or("This scan has no stored image")?;
        std::fs::write(&path, bytes)?;
        println!("Image written: {}", path.display());
    }
    Ok(())
}

/// Delete every stored scan
pub fn clear(config: &Config, yes: bool) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = SqliteScanStore::open(&config.database_path).await?;
        let count = store.count().await?;
        if count == 0 {
            println!("No scans to delete.");
            return Ok(());
        }

        if !yes && !confirm(&format!("Delete all {} scan(s)?", count))? {
            println!("Cancelled.");
            return Ok(());
        }

        let removed = store.delete_all().await?;
        println!("Deleted {} scan(s)", removed);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn confirm(question: &str) -> std::io::Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Export the whole history
pub fn export(config: &Config, output: Option<PathBuf>) -> CliResult {
    let root = output.unwrap_or_else(|| config.export_dir.clone());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = SqliteScanStore::open(&config.database_path).await?;
        let events = store.list_all().await?;

        match export::export_scans(events, root).await {
            Ok(summary) => {
                println!("Exported {} scan(s)", summary.rows);
                println!("  CSV:    {}", summary.csv_path.display());
                println!("  Images: {}", summary.images);
            }
            Err(ExportError::NothingToExport) => println!("No scans to export."),
            Err(e) => return Err(e.into()),
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn shorten(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut shortened: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}
