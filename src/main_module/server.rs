//! HTTP server initialization and routing

use axum::{
    routing::{get, post},
    Router,
};
use log::{error, info};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::cors::create_cors_layer;

use super::{health_check, health_check_simple, receive_client_errors, shutdown_signal};

/// Every API route, without the SPA fallback or middleware.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::HEALTH, get(health_check_simple))
        .route(ApiUrls::API_HEALTH, get(health_check))
        .route(ApiUrls::CLIENT_ERRORS, post(receive_client_errors))
        .merge(crate::directory::configure())
        .merge(crate::projects::configure())
        .merge(crate::jobs::configure())
        .merge(crate::finance::configure())
        .merge(crate::messaging::configure())
        .merge(crate::tasks::configure())
        .merge(crate::announcements::configure())
        .merge(crate::dashboard::configure())
}

/// The full application: API routes, the built SPA with an `index.html`
/// fallback for client-side routing, CORS and request tracing.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let server = &app_state.config.server;
    let ui_path = Path::new(&server.ui_path);

    let mut router = api_router();
    if ui_path.is_dir() {
        info!("Serving UI from {}", ui_path.display());
        let spa = ServeDir::new(ui_path).fallback(ServeFile::new(ui_path.join("index.html")));
        router = router.fallback_service(spa);
    } else {
        info!(
            "UI directory {} not found, serving the API only",
            ui_path.display()
        );
    }

    router
        .layer(create_cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        app_state.config.server.host, app_state.config.server.port
    )
    .parse()
    .map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid listen address: {e}"),
        )
    })?;

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(
            "Failed to bind to {}: {} - is another instance running?",
            addr, e
        );
        e
    })?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}
