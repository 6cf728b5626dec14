use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{sse::Event as SseEvent, Html, IntoResponse, Json, Response, Sse},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::TryLockError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{error, info, warn};

use super::state::AppState;
use crate::constants::{SSE_HEARTBEAT_SECS, SSE_KEEPALIVE_SECS};
use crate::encoder::{is_usable_scale, MagnitudeBand};
use crate::events::GlobeEvent;
use crate::registry::{read_source_file, IngestReport, RegistryState};
use crate::scene::ScenePrimitive;
use crate::settings::Settings;
use crate::view::ViewAdapter;

#[derive(RustEmbed)]
#[folder = "frontend/"]
struct Asset;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: RegistryState,
    pub generation: u64,
    pub marker_count: usize,
    pub capacity: usize,
    pub viewing_scale: f64,
    pub sized_for_scale: Option<f64>,
    pub last_ingest: Option<IngestReport>,
}

#[derive(Debug, Serialize)]
pub struct LegendEntry {
    pub band: MagnitudeBand,
    pub label: &'static str,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    pub scale: f64,
}

// All markers currently on the globe
pub async fn get_markers(State(state): State<AppState>) -> Json<Vec<ScenePrimitive>> {
    Json(state.scene.primitives())
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    // A reload holds the lock while it rebuilds; report busy rather than
    // block the runtime
    let registry = state.registry.try_lock().map_err(|e| match e {
        TryLockError::WouldBlock => StatusCode::SERVICE_UNAVAILABLE,
        TryLockError::Poisoned(_) => {
            error!("Marker registry lock poisoned");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    Ok(Json(StatusResponse {
        state: registry.state(),
        generation: registry.generation(),
        marker_count: registry.current_marker_count(),
        capacity: registry.capacity(),
        viewing_scale: registry.view().current_viewing_scale(),
        sized_for_scale: registry.last_scale(),
        last_ingest: registry.last_ingest().cloned(),
    }))
}

pub async fn get_legend() -> Json<Vec<LegendEntry>> {
    let legend = MagnitudeBand::ALL
        .iter()
        .map(|&band| LegendEntry {
            band,
            label: band.label(),
            min: band.lower_bound(),
            max: band.upper_bound(),
            color: band.color().to_hex(),
        })
        .collect();
    Json(legend)
}

// Camera scale reported by the browser; the rescale controller picks it up
pub async fn set_viewing_scale(
    State(state): State<AppState>,
    Json(request): Json<ScaleRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !is_usable_scale(request.scale) {
        warn!("Rejected viewing scale {}", request.scale);
        return Err(StatusCode::BAD_REQUEST);
    }

    let changed = state.scene.set_viewing_scale(request.scale);
    Ok(Json(serde_json::json!({
        "status": "success",
        "scale": request.scale,
        "changed": changed
    })))
}

// Replace the loaded dataset with a fresh ingest of the configured file
pub async fn reload_data(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let data_file = {
        let settings = state.settings.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        PathBuf::from(&settings.data_file)
    };

    let registry = state.registry.clone();
    let event_sender = state.event_sender.clone();

    let result = tokio::task::spawn_blocking(move || {
        // Read before touching the registry so a bad path keeps the current globe
        let raw = match read_source_file(&data_file) {
            Ok(raw) => raw,
            Err(e) => {
                let message = format!("Failed to load {}: {}", data_file.display(), e);
                let _ = event_sender.send(GlobeEvent::ingest_error(message.clone()));
                return Err(message);
            }
        };

        let mut registry = registry.lock().map_err(|_| "Marker registry lock poisoned".to_string())?;
        registry.reset();
        let _ = event_sender.send(GlobeEvent::registry_reset(registry.generation()));

        match registry.ingest(&raw) {
            Ok(report) => {
                let _ = event_sender.send(GlobeEvent::ingest_complete(&report));
                Ok(report)
            }
            Err(e) => {
                let message = format!("Failed to ingest {}: {}", data_file.display(), e);
                let _ = event_sender.send(GlobeEvent::ingest_error(message.clone()));
                Err(message)
            }
        }
    })
    .await
    .map_err(|e| {
        error!("Reload task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match result {
        Ok(report) => Ok(Json(serde_json::json!({
            "status": "success",
            "report": report
        }))),
        Err(message) => {
            warn!("{}", message);
            Ok(Json(serde_json::json!({
                "status": "error",
                "message": message
            })))
        }
    }
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, StatusCode> {
    let settings = state.settings.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(settings.clone()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(new_settings): Json<Settings>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut settings = state.settings.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    *settings = new_settings;

    if let Err(e) = settings.save() {
        error!("Failed to save settings: {:#}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    info!("Settings updated");

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Settings updated successfully, capacity and port apply on restart"
    })))
}

// SSE endpoint for ingest and rescale notifications
pub async fn events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);
    let mut event_receiver = state.event_sender.subscribe();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                received = event_receiver.recv() => match received {
                    Ok(event) => event,
                    // A slow client only needs the newest state
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(SSE_HEARTBEAT_SECS)) => GlobeEvent::heartbeat(),
            };

            let sse_event = SseEvent::default()
                .json_data(&event)
                .unwrap_or_else(|_| SseEvent::default().data("Error serializing event"));

            if tx.send(Ok(sse_event)).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive-message"),
    )
}

pub async fn index_html() -> Response {
    match Asset::get("index.html") {
        Some(file) => Html(file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn style_css() -> Response {
    embedded_asset("style.css", "text/css")
}

pub async fn script_js() -> Response {
    embedded_asset("script.js", "application/javascript")
}

fn embedded_asset(name: &str, content_type: &'static str) -> Response {
    match Asset::get(name) {
        Some(file) => ([(header::CONTENT_TYPE, content_type)], file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
