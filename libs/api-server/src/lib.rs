//! HTTP + WebSocket surface over the transaction engine.
//!
//! REST for paging and annotations, `/ws` for live updates.

mod http;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use txwatch_api::{EventSubscriber, OverflowPolicy};
use txwatch_engine::Coordinator;

pub use http::{ApiError, PRINCIPAL_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub subscriber: Arc<dyn EventSubscriber>,
    pub ws_buffer: usize,
    pub ws_overflow: OverflowPolicy,
    /// Бюджет на каждый внешний вызов в рамках одного запроса.
    pub request_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/indices", get(http::handle_list_indices))
        .route("/api/transactions", get(http::handle_fetch_page))
        .route(
            "/api/transactions/{index}/{id}/tickbox",
            post(http::handle_set_tickbox),
        )
        .route(
            "/api/transactions/{index}/{id}/remark",
            post(http::handle_set_remark),
        )
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
}

/// Слушать `0.0.0.0:port`, пока не отменён `shutdown`.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    tracing::info!(port, "api server listening");
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), String> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    tracing::info!("api server stopped");
    Ok(())
}
