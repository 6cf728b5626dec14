use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::encoder::Rgba;
use crate::marker::{MarkerAttributes, Position};

/// Opaque handle of a primitive registered with the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("view rejected marker: {0}")]
    Rejected(String),
    #[error("unknown marker handle {0:?}")]
    UnknownHandle(MarkerHandle),
    #[error("view is unavailable")]
    Unavailable,
}

/// In-place change to an existing primitive; `None` fields are left as is
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarkerUpdate {
    pub size: Option<f64>,
    pub position: Option<Position>,
}

/// Receives viewing-scale changes. Only the latest scale is kept, so a
/// subscriber that falls behind sees the newest value, not every step.
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct ScaleSubscription {
    rx: watch::Receiver<f64>,
}

impl ScaleSubscription {
    pub fn new(rx: watch::Receiver<f64>) -> Self {
        Self { rx }
    }

    /// Returns the new scale if it changed since the last call
    pub fn take_change(&mut self) -> Option<f64> {
        match self.rx.has_changed() {
            Ok(true) => Some(*self.rx.borrow_and_update()),
            _ => None,
        }
    }

    /// Waits for the next change. `None` once the view is gone.
    pub async fn changed(&mut self) -> Option<f64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// What the marker pipeline needs from the rendering engine
pub trait ViewAdapter {
    fn add_marker(
        &mut self,
        position: Position,
        size: f64,
        color: Rgba,
        attributes: &MarkerAttributes,
    ) -> Result<MarkerHandle, AdapterError>;

    fn update_marker(&mut self, handle: MarkerHandle, update: MarkerUpdate) -> Result<(), AdapterError>;

    /// Removes every primitive this pipeline added
    fn clear_markers(&mut self) -> Result<(), AdapterError>;

    /// Positive, larger means the camera is farther away
    fn current_viewing_scale(&self) -> f64;

    fn on_viewing_scale_changed(&self) -> ScaleSubscription;
}
