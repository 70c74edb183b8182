mod handlers;
mod state;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::linking::PostalCodeIndex;

pub use state::AppState;

pub fn build_router(index: PostalCodeIndex, threshold: f64) -> Router {
    let state = Arc::new(AppState { index, threshold });

    Router::new()
        .route("/api/resolve", get(handlers::resolve))
        .route("/api/candidates", get(handlers::candidates))
        .route("/api/stats", get(handlers::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(
    index: PostalCodeIndex,
    threshold: f64,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let app = build_router(index, threshold);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot bind to {}: {}", addr, e))?;

    tracing::info!("citylink server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
