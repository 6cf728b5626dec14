use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quakeglobe::constants::EVENT_CHANNEL_CAPACITY;
use quakeglobe::controller::run_rescale_controller;
use quakeglobe::server::{start_server, AppState};
use quakeglobe::settings::Settings;
use quakeglobe::view::ViewAdapter;
use quakeglobe::{GlobeScene, MarkerRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("QuakeGlobe v{} starting", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load().context("Failed to load settings")?;
    // First argument overrides the configured data file
    if let Some(data_file) = std::env::args().nth(1) {
        settings.data_file = data_file;
    }

    let scene = GlobeScene::new(settings.initial_viewing_scale);
    let mut registry = MarkerRegistry::with_capacity(scene.clone(), settings.max_markers);

    match registry.ingest_file(Path::new(&settings.data_file)) {
        Ok(report) => info!(
            "{} earthquakes on the globe ({} rows read)",
            report.created, report.rows
        ),
        Err(e) => {
            warn!("{}", e);
            warn!("Starting with an empty globe; fix data_file and use reload");
        }
    }

    let registry = Arc::new(Mutex::new(registry));
    let (event_sender, _event_receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(run_rescale_controller(
        registry.clone(),
        scene.on_viewing_scale_changed(),
        Duration::from_millis(settings.rescale_debounce_ms),
        event_sender.clone(),
    ));

    let port = settings.port;
    let app_state = AppState {
        registry,
        scene,
        settings: Arc::new(Mutex::new(settings)),
        event_sender,
    };

    start_server(app_state, port).await
}
