// SPDX-License-Identifier: MPL-2.0

//! Scan history domain types

use crate::errors::LocationError;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sub-second digits kept on scan timestamps (microseconds, as in SQLite)
const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Truncate a timestamp to the precision every store keeps
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS)
}

/// Geographic position in decimal degrees (WGS84)
///
/// Deserialization goes through [`Coordinate::new`], so out-of-range values
/// in config files are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    /// Latitude (-90.0 to 90.0)
    pub latitude: f64,
    /// Longitude (-180.0 to 180.0)
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the valid ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LocationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A persisted record of one accepted QR decode
///
/// Created only by the scan coordinator once a debounced detection has
/// completed its capture cycle. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    /// Unique identifier
    pub id: Uuid,
    /// Decoded text content (never empty)
    pub payload: String,
    /// When the code was detected
    pub captured_at: DateTime<Utc>,
    /// Position at detection time, if positioning was available
    pub location: Option<Coordinate>,
    /// Encoded still frame, if capture succeeded
    pub image: Option<Vec<u8>>,
}

impl ScanEvent {
    /// Create a new scan event with a fresh id
    ///
    /// `captured_at` is truncated to microseconds.
    pub fn new(
        payload: impl Into<String>,
        captured_at: DateTime<Utc>,
        location: Option<Coordinate>,
        image: Option<Vec<u8>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            captured_at: stored_precision(captured_at),
            location,
            image,
        }
    }

    /// Lightweight view without the image bytes
    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from(self)
    }
}

/// Image-less view of a scan, cheap to clone into status updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub id: Uuid,
    pub payload: String,
    pub captured_at: DateTime<Utc>,
    pub location: Option<Coordinate>,
    /// Size of the stored image in bytes, if any
    pub image_size: Option<usize>,
}

impl From<&ScanEvent> for ScanSummary {
    fn from(event: &ScanEvent) -> Self {
        Self {
            id: event.id,
            payload: event.payload.clone(),
            captured_at: event.captured_at,
            location: event.location,
            image_size: event.image.as_ref().map(Vec::len),
        }
    }
}
