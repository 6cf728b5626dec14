use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{MAX_MARKERS, METERS_PER_KM, REFERENCE_SCALE};
use crate::encoder::{color_for, is_usable_scale, size_for, Rgba};
use crate::record::EarthquakeRecord;

/// Geographic position with elevation relative to the surface (negative is underground)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub elevation_meters: f64,
}

impl Position {
    pub fn elevation_for_depth(depth_km: f64) -> f64 {
        -depth_km * METERS_PER_KM
    }

    pub fn of_record(record: &EarthquakeRecord) -> Self {
        Self {
            lat: record.latitude,
            lon: record.longitude,
            elevation_meters: Self::elevation_for_depth(record.depth_km),
        }
    }
}

/// Popup attributes attached to a rendered marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerAttributes {
    pub magnitude: f64,
    pub depth_km: f64,
    pub location: String,
}

/// Visual state of one earthquake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Position,
    pub size: f64,
    pub color: Rgba,
    pub source_magnitude: f64,
    pub source_depth_km: f64,
}

impl Marker {
    pub fn attributes(&self) -> MarkerAttributes {
        MarkerAttributes {
            magnitude: self.source_magnitude,
            depth_km: self.source_depth_km,
            location: format!("{}, {}", self.position.lat, self.position.lon),
        }
    }

    /// Recomputes size for `viewing_scale` and re-derives elevation from the
    /// source depth. Color and lat/lon are left alone.
    pub fn rescale(&mut self, viewing_scale: f64) {
        self.size = size_for(self.source_magnitude, viewing_scale);
        self.position.elevation_meters = Position::elevation_for_depth(self.source_depth_km);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("marker capacity of {capacity} reached")]
pub struct CapacityReached {
    pub capacity: usize,
}

/// Builds markers from records and enforces the capacity bound
#[derive(Debug, Clone)]
pub struct MarkerFactory {
    capacity: usize,
    live: usize,
}

impl Default for MarkerFactory {
    fn default() -> Self {
        Self::new(MAX_MARKERS)
    }
}

impl MarkerFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, live: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn is_full(&self) -> bool {
        self.live >= self.capacity
    }

    /// Builds a marker sized for `viewing_scale`, counting it as live.
    /// An unusable scale sizes the marker at `REFERENCE_SCALE`.
    pub fn build(
        &mut self,
        record: &EarthquakeRecord,
        viewing_scale: f64,
    ) -> Result<Marker, CapacityReached> {
        if self.is_full() {
            return Err(CapacityReached {
                capacity: self.capacity,
            });
        }

        let scale = if is_usable_scale(viewing_scale) {
            viewing_scale
        } else {
            REFERENCE_SCALE
        };

        self.live += 1;
        Ok(Marker {
            position: Position::of_record(record),
            size: size_for(record.magnitude, scale),
            color: color_for(record.magnitude),
            source_magnitude: record.magnitude,
            source_depth_km: record.depth_km,
        })
    }

    /// Gives back the slot of a marker that never made it onto the view
    pub(crate) fn release(&mut self) {
        self.live = self.live.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.live = 0;
    }
}
