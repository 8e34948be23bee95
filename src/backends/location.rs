// SPDX-License-Identifier: GPL-3.0-only

//! Location providers

use super::LocationProvider;
use crate::errors::LocationError;
use crate::model::Coordinate;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Reports a configured position while started
///
/// Stands in for a positioning service on machines without one. With no
/// coordinate configured it behaves as unavailable.
#[derive(Debug)]
pub struct FixedLocation {
    coordinate: Option<Coordinate>,
    active: AtomicBool,
}

impl FixedLocation {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self {
            coordinate,
            active: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn start(&self) -> Result<(), LocationError> {
        let coordinate = self.coordinate.ok_or(LocationError::Unavailable)?;
        self.active.store(true, Ordering::SeqCst);
        info!(%coordinate, "Fixed location active");
        Ok(())
    }

    async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Fixed location inactive");
    }

    fn latest(&self) -> Option<Coordinate> {
        if self.active.load(Ordering::SeqCst) {
            self.coordinate
        } else {
            None
        }
    }
}

/// Positioning is not available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn start(&self) -> Result<(), LocationError> {
        Err(LocationError::Unavailable)
    }

    async fn stop(&self) {}

    fn latest(&self) -> Option<Coordinate> {
        None
    }
}
