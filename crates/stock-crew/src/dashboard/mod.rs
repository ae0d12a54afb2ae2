//! Web dashboard
//!
//! A sidebar form (free-text ticker plus a multi-select), a result page with
//! the chart and the newsletter, a JSON endpoint and a health check.

pub mod routes;
pub mod state;
pub mod templates;

pub use routes::DashboardError;
pub use state::AppState;

use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Dashboard listening");
    axum::serve(listener, router(state)).await
}
