//! Axum-based HTTP server.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::routes;
use crate::state::AppState;

/// Build the router with CORS and request tracing applied.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins());

    let router = Router::new()
        .route("/health", get(routes::health))
        .route("/plan", post(routes::plan))
        .route("/plan/stream", post(routes::plan_stream))
        .route("/plan/preview", post(routes::plan_preview));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(routes::render_metrics));

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP server on the configured bind address.
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.server_bind();
    let app = build_router(state);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Wayfarer listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for CTRL+C; shutdown only by termination");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
