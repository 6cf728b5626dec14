use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{MAX_MARKERS, REFERENCE_SCALE};
use crate::encoder::is_usable_scale;
use crate::marker::{Marker, MarkerFactory};
use crate::record;
use crate::view::{MarkerHandle, MarkerUpdate, ScaleSubscription, ViewAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    /// Empty, waiting for an ingest pass
    Loading,
    /// Ingest done; only rescale updates happen
    Steady,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("earthquake source unavailable: {0}")]
    SourceUnavailable(#[source] std::io::Error),
    #[error("registry already holds generation {generation}; reset before ingesting again")]
    AlreadyLoaded { generation: u64 },
}

/// Outcome of one ingest pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub generation: u64,
    /// Data rows read from the source
    pub rows: usize,
    pub created: usize,
    /// Malformed rows
    pub skipped: usize,
    /// Valid rows past capacity
    pub dropped: usize,
    /// Markers the view refused to add
    pub adapter_failures: usize,
}

/// Outcome of one rescale pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RescaleReport {
    pub scale: f64,
    pub updated: usize,
    pub adapter_failures: usize,
}

/// Reads a whole source into memory. Bytes are kept as is; rows that are
/// not valid text are skipped later by the parser.
pub fn read_source<R: Read>(mut source: R) -> Result<Vec<u8>, IngestError> {
    let mut raw = Vec::new();
    source
        .read_to_end(&mut raw)
        .map_err(IngestError::SourceUnavailable)?;
    Ok(raw)
}

pub fn read_source_file(path: &Path) -> Result<Vec<u8>, IngestError> {
    info!("Loading earthquake data from {}", path.display());
    let file = File::open(path).map_err(IngestError::SourceUnavailable)?;
    read_source(file)
}

/// A marker that is on the view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMarker {
    pub handle: MarkerHandle,
    pub marker: Marker,
}

/// Owns the live markers of one dataset and keeps them sized for the
/// current viewing scale.
pub struct MarkerRegistry<V: ViewAdapter> {
    view: V,
    factory: MarkerFactory,
    markers: Vec<LiveMarker>,
    state: RegistryState,
    generation: u64,
    subscription: Option<ScaleSubscription>,
    last_ingest: Option<IngestReport>,
    last_scale: Option<f64>,
}

impl<V: ViewAdapter> MarkerRegistry<V> {
    pub fn new(view: V) -> Self {
        Self::with_capacity(view, MAX_MARKERS)
    }

    pub fn with_capacity(view: V, capacity: usize) -> Self {
        Self {
            view,
            factory: MarkerFactory::new(capacity),
            markers: Vec::new(),
            state: RegistryState::Loading,
            generation: 0,
            subscription: None,
            last_ingest: None,
            last_scale: None,
        }
    }

    /// Parses `raw` and puts a marker on the view for each accepted record,
    /// in source order, until capacity is reached. Moves the registry to
    /// `Steady` and subscribes to scale changes.
    pub fn ingest(&mut self, raw: impl AsRef<[u8]>) -> Result<IngestReport, IngestError> {
        if self.state == RegistryState::Steady {
            return Err(IngestError::AlreadyLoaded {
                generation: self.generation,
            });
        }

        // Subscribe before reading the scale so a change during ingest is
        // still pending afterwards
        let subscription = self.view.on_viewing_scale_changed();
        let mut scale = self.view.current_viewing_scale();
        if !is_usable_scale(scale) {
            warn!("View reported unusable scale {}, sizing at reference scale", scale);
            scale = REFERENCE_SCALE;
        }

        let parsed = record::parse(raw);
        let mut report = IngestReport {
            generation: self.generation,
            rows: parsed.rows,
            skipped: parsed.skipped,
            ..Default::default()
        };

        for record in &parsed.records {
            let marker = match self.factory.build(record, scale) {
                Ok(marker) => marker,
                Err(_) => {
                    report.dropped += 1;
                    continue;
                }
            };

            let attributes = marker.attributes();
            match self
                .view
                .add_marker(marker.position, marker.size, marker.color, &attributes)
            {
                Ok(handle) => self.markers.push(LiveMarker { handle, marker }),
                Err(e) => {
                    warn!("View rejected marker at {}: {}", attributes.location, e);
                    self.factory.release();
                    report.adapter_failures += 1;
                }
            }
        }

        report.created = self.markers.len();
        self.state = RegistryState::Steady;
        self.subscription = Some(subscription);
        self.last_scale = Some(scale);
        self.last_ingest = Some(report.clone());

        info!(
            "Ingest complete (generation {}): {} markers, {} skipped, {} dropped over capacity, {} adapter failures",
            report.generation, report.created, report.skipped, report.dropped, report.adapter_failures
        );
        Ok(report)
    }

    /// Reads the whole source, then ingests it. A read failure leaves the
    /// registry untouched.
    pub fn ingest_reader<R: Read>(&mut self, source: R) -> Result<IngestReport, IngestError> {
        let raw = read_source(source)?;
        self.ingest(raw)
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<IngestReport, IngestError> {
        let raw = read_source_file(path)?;
        self.ingest(raw)
    }

    /// Drops every marker, unsubscribes from scale changes and starts a new
    /// generation in `Loading` state.
    pub fn reset(&mut self) {
        if let Err(e) = self.view.clear_markers() {
            warn!("Failed to clear view markers: {}", e);
        }
        self.subscription = None;
        self.markers.clear();
        self.factory.reset();
        self.state = RegistryState::Loading;
        self.generation += 1;
        self.last_ingest = None;
        self.last_scale = None;
        info!("Registry reset, now at generation {}", self.generation);
    }

    pub fn current_marker_count(&self) -> usize {
        self.factory.live_count()
    }

    /// Resizes every live marker for `scale`. Returns `None` without
    /// touching anything when not `Steady` or when `scale` is not positive.
    /// A marker the view fails to update is logged and the pass continues.
    pub fn rescale(&mut self, scale: f64) -> Option<RescaleReport> {
        if self.state != RegistryState::Steady {
            debug!("Ignoring scale {} while loading", scale);
            return None;
        }
        if !is_usable_scale(scale) {
            warn!("Ignoring unusable viewing scale {}", scale);
            return None;
        }

        let mut report = RescaleReport {
            scale,
            ..Default::default()
        };
        for live in &mut self.markers {
            live.marker.rescale(scale);
            let update = MarkerUpdate {
                size: Some(live.marker.size),
                position: Some(live.marker.position),
            };
            match self.view.update_marker(live.handle, update) {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!("Failed to update marker {:?}: {}", live.handle, e);
                    report.adapter_failures += 1;
                }
            }
        }
        self.last_scale = Some(scale);

        debug!(
            "Rescaled {} markers for scale {:.0} ({} failures)",
            report.updated, scale, report.adapter_failures
        );
        Some(report)
    }

    /// Applies the latest scale change seen by this registry's subscription,
    /// if any. Changes from before a reset are never applied.
    pub fn apply_pending_rescale(&mut self) -> Option<RescaleReport> {
        let scale = self.subscription.as_mut()?.take_change()?;
        self.rescale(scale)
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capacity(&self) -> usize {
        self.factory.capacity()
    }

    pub fn markers(&self) -> &[LiveMarker] {
        &self.markers
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn last_ingest(&self) -> Option<&IngestReport> {
        self.last_ingest.as_ref()
    }

    /// Scale the markers are currently sized for
    pub fn last_scale(&self) -> Option<f64> {
        self.last_scale
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }
}
