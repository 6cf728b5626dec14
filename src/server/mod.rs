use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use tracing::info;

pub mod handlers;
pub mod state;

pub use self::state::AppState;
use handlers::{
    events_stream, get_legend, get_markers, get_settings, get_status, index_html, reload_data,
    script_js, set_viewing_scale, style_css, update_settings,
};

// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_html))
        .route("/style.css", get(style_css))
        .route("/script.js", get(script_js))
        .route("/api/markers", get(get_markers))
        .route("/api/status", get(get_status))
        .route("/api/legend", get(get_legend))
        .route("/api/view/scale", post(set_viewing_scale))
        .route("/api/reload", post(reload_data))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/events", get(events_stream))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Globe available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
