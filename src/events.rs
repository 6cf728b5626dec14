use serde::{Deserialize, Serialize};

use crate::registry::{IngestReport, RescaleReport};

// SSE event types
pub const INGEST_COMPLETE: &str = "ingest_complete";
pub const INGEST_ERROR: &str = "ingest_error";
pub const REGISTRY_RESET: &str = "registry_reset";
pub const MARKERS_RESCALED: &str = "markers_rescaled";
pub const HEARTBEAT: &str = "heartbeat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobeEvent {
    pub event_type: String,
    pub timestamp: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EventData {
    pub generation: Option<u64>,
    pub marker_count: Option<usize>,
    pub created: Option<usize>,
    pub skipped: Option<usize>,
    pub dropped: Option<usize>,
    pub updated: Option<usize>,
    pub adapter_failures: Option<usize>,
    pub scale: Option<f64>,
    pub message: Option<String>,
}

impl GlobeEvent {
    pub fn new(event_type: &str, data: EventData) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    pub fn ingest_complete(report: &IngestReport) -> Self {
        Self::new(
            INGEST_COMPLETE,
            EventData {
                generation: Some(report.generation),
                marker_count: Some(report.created),
                created: Some(report.created),
                skipped: Some(report.skipped),
                dropped: Some(report.dropped),
                adapter_failures: Some(report.adapter_failures),
                message: Some(format!(
                    "Loaded {} earthquakes ({} skipped, {} over capacity)",
                    report.created, report.skipped, report.dropped
                )),
                ..Default::default()
            },
        )
    }

    pub fn ingest_error(message: impl Into<String>) -> Self {
        Self::new(
            INGEST_ERROR,
            EventData {
                message: Some(message.into()),
                ..Default::default()
            },
        )
    }

    pub fn registry_reset(generation: u64) -> Self {
        Self::new(
            REGISTRY_RESET,
            EventData {
                generation: Some(generation),
                marker_count: Some(0),
                ..Default::default()
            },
        )
    }

    pub fn markers_rescaled(generation: u64, report: &RescaleReport) -> Self {
        Self::new(
            MARKERS_RESCALED,
            EventData {
                generation: Some(generation),
                updated: Some(report.updated),
                adapter_failures: Some(report.adapter_failures),
                scale: Some(report.scale),
                ..Default::default()
            },
        )
    }

    pub fn heartbeat() -> Self {
        Self::new(
            HEARTBEAT,
            EventData {
                message: Some("SSE connection alive".to_string()),
                ..Default::default()
            },
        )
    }
}
