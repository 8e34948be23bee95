// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use qrscan::constants::{CaptureQuality, export, timing};

#[test]
fn test_capture_quality_values() {
    // Test that all presets exist (Low, Medium, High, Maximum)
    assert_eq!(CaptureQuality::ALL.len(), 4);
    assert_eq!(CaptureQuality::default(), CaptureQuality::High);
}

#[test]
fn test_capture_quality_ordering() {
    // Test that presets are ordered from lowest to highest quality
    let mut prev_quality = 0u8;
    for preset in CaptureQuality::ALL {
        let quality = preset.jpeg_quality();
        assert!(
            quality > prev_quality,
            "Presets should be ordered from lowest to highest"
        );
        assert!(quality <= 100);
        prev_quality = quality;
    }
}

#[test]
fn test_capture_quality_display_names() {
    // Test that all presets have non-empty display names
    for preset in CaptureQuality::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_scan_timing() {
    assert_eq!(timing::SCAN_COOLDOWN.as_millis(), 3000);
    assert_eq!(timing::CONFIRMATION_DISPLAY.as_millis(), 2000);
    assert!(timing::CAPTURE_TIMEOUT > std::time::Duration::ZERO);
}

#[test]
fn test_export_prefix() {
    assert_eq!(export::DIR_PREFIX, "qr_export_");
    assert!(export::CSV_FILE_NAME.ends_with(".csv"));
}
