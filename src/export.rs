// SPDX-License-Identifier: MPL-2.0

//! Scan history export
//!
//! An export is a self-contained directory:
//!
//! ```text
//! qr_export_20250318_142501/
//! ├── scans.csv          id,payload,timestamp,latitude,longitude,image
//! └── images/
//!     └── <id>.jpg
//! ```
//!
//! Every export gets a fresh directory so sharing one never races with
//! writing the next.

use crate::constants::export::{CSV_FILE_NAME, DIR_PREFIX, IMAGES_DIR_NAME};
use crate::errors::ExportError;
use crate::model::ScanEvent;
use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a finished export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// The export directory
    pub directory: PathBuf,
    pub csv_path: PathBuf,
    /// Rows written to the CSV
    pub rows: usize,
    /// Image files written
    pub images: usize,
}

/// One CSV line
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: String,
    payload: &'a str,
    timestamp: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Path of the image relative to the export directory
    image: Option<String>,
}

/// Write `events` into a new export directory under `root`
///
/// Runs the file I/O on the blocking pool.
pub async fn export_scans(
    events: Vec<ScanEvent>,
    root: PathBuf,
) -> Result<ExportSummary, ExportError> {
    tokio::task::spawn_blocking(move || export_scans_at(&events, &root, Local::now()))
        .await
        .map_err(|e| ExportError::Io(format!("export task failed: {}", e)))?
}

/// Synchronous export with an explicit clock, used for deterministic naming
pub fn export_scans_at(
    events: &[ScanEvent],
    root: &Path,
    now: DateTime<Local>,
) -> Result<ExportSummary, ExportError> {
    if events.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    std::fs::create_dir_all(root)?;
    let directory = create_export_dir(root, &now)?;

    match write_export(events, &directory) {
        Ok((rows, images)) => {
            let csv_path = directory.join(CSV_FILE_NAME);
            info!(
                path = %directory.display(),
                rows,
                images,
                "Export written"
            );
            Ok(ExportSummary {
                directory,
                csv_path,
                rows,
                images,
            })
        }
        Err(e) => {
            // Leave no half-written export behind
            if let Err(cleanup) = std::fs::remove_dir_all(&directory) {
                warn!(path = %directory.display(), error = %cleanup, "Failed to remove partial export");
            }
            Err(e)
        }
    }
}

fn create_export_dir(root: &Path, now: &DateTime<Local>) -> Result<PathBuf, ExportError> {
    let base = format!("{}{}", DIR_PREFIX, now.format("%Y%m%d_%H%M%S"));
    let mut candidate = root.join(&base);
    let mut suffix = 0u32;

    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                suffix += 1;
                candidate = root.join(format!("{}_{}", base, suffix));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn write_export(events: &[ScanEvent], directory: &Path) -> Result<(usize, usize), ExportError> {
    let images_dir = directory.join(IMAGES_DIR_NAME);
    let mut writer = csv::Writer::from_path(directory.join(CSV_FILE_NAME))?;
    let mut images = 0;

    for event in events {
        let image = match &event.image {
            Some(bytes) => {
                if images == 0 {
                    std::fs::create_dir_all(&images_dir)?;
                }
                let file_name = format!("{}.{}", event.id, image_extension(bytes));
                std::fs::write(images_dir.join(&file_name), bytes)?;
                images += 1;
                Some(format!("{}/{}", IMAGES_DIR_NAME, file_name))
            }
            None => None,
        };

        writer.serialize(CsvRow {
            id: event.id.to_string(),
            payload: &event.payload,
            timestamp: event
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            latitude: event.location.map(|l| l.latitude),
            longitude: event.location.map(|l| l.longitude),
            image,
        })?;
    }

    writer.flush()?;
    Ok((events.len(), images))
}

/// File extension matching the encoded image bytes
fn image_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
}

fn is_export_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(DIR_PREFIX))
            .unwrap_or(false)
}

/// Newest export directory under `root`, if any
///
/// Directory names embed the creation time, so name order is age order.
pub fn latest_export(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_export_dir(path))
        .max_by(|a, b| a.file_name().cmp(&b.file_name()))
}

/// Remove an export directory (the user cancelled sharing it)
///
/// Refuses to touch anything that is not an export directory.
pub fn discard_export(directory: &Path) -> Result<(), ExportError> {
    if !is_export_dir(directory) {
        return Err(ExportError::NotAnExport(directory.to_path_buf()));
    }
    std::fs::remove_dir_all(directory)?;
    debug!(path = %directory.display(), "Export discarded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;
    use chrono::{TimeZone, Utc};

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 18, 14, 25, 1).unwrap()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut buffer = Vec::new();
        image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
            .write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageFormat::Jpeg,
            )
            .unwrap();
        buffer
    }

    fn sample_events() -> Vec<ScanEvent> {
        let at = Utc.with_ymd_and_hms(2025, 3, 18, 13, 0, 0).unwrap();
        vec![
            ScanEvent::new(
                "https://example.com/a,b",
                at,
                Some(Coordinate::new(51.5074, -0.1278).unwrap()),
                Some(jpeg_bytes()),
            ),
            ScanEvent::new("plain text", at, None, None),
        ]
    }

    #[test]
    fn test_empty_history_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            export_scans_at(&[], root.path(), fixed_now()),
            Err(ExportError::NothingToExport)
        ));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_writes_csv_and_images() {
        let root = tempfile::tempdir().unwrap();
        let events = sample_events();

        let summary = export_scans_at(&events, root.path(), fixed_now()).unwrap();
        assert_eq!(
            summary.directory.file_name().unwrap(),
            "qr_export_20250318_142501"
        );
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.images, 1);

        let mut reader = csv::Reader::from_path(&summary.csv_path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec!["id", "payload", "timestamp", "latitude", "longitude", "image"]
        );
        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);

        // Commas in the payload survive quoting
        assert_eq!(&records[0][1], "https://example.com/a,b");
        assert_eq!(&records[0][2], "2025-03-18T13:00:00.000Z");
        assert_eq!(&records[0][3], "51.5074");
        let image_rel = &records[0][5];
        assert_eq!(image_rel, format!("images/{}.jpg", events[0].id));
        assert_eq!(
            std::fs::read(summary.directory.join(image_rel)).unwrap(),
            events[0].image.clone().unwrap()
        );

        // Missing location and image are empty cells
        assert_eq!(&records[1][3], "");
        assert_eq!(&records[1][4], "");
        assert_eq!(&records[1][5], "");
    }

    #[test]
    fn test_same_second_exports_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let events = sample_events();

        let first = export_scans_at(&events, root.path(), fixed_now()).unwrap();
        let second = export_scans_at(&events, root.path(), fixed_now()).unwrap();
        assert_ne!(first.directory, second.directory);
        assert_eq!(
            second.directory.file_name().unwrap(),
            "qr_export_20250318_142501_1"
        );
    }

    #[test]
    fn test_latest_export_and_discard() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("unrelated")).unwrap();
        assert!(latest_export(root.path()).is_none());

        let events = sample_events();
        export_scans_at(&events, root.path(), fixed_now()).unwrap();
        let later = Local.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap();
        let newest = export_scans_at(&events, root.path(), later).unwrap();

        assert_eq!(latest_export(root.path()), Some(newest.directory.clone()));

        discard_export(&newest.directory).unwrap();
        assert!(!newest.directory.exists());
        assert!(matches!(
            discard_export(&root.path().join("unrelated")),
            Err(ExportError::NotAnExport(_))
        ));
        assert!(root.path().join("unrelated").exists());
    }

    #[tokio::test]
    async fn test_async_export() {
        let root = tempfile::tempdir().unwrap();
        let summary = export_scans(sample_events(), root.path().to_path_buf())
            .await
            .unwrap();
        assert!(summary.csv_path.is_file());
        assert_eq!(latest_export(root.path()), Some(summary.directory));
    }
}
