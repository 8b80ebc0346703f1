use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use storage_elasticsearch::ElasticsearchIndex;
use storage_memory::MemoryIndex;
use txwatch_api::{EventPublisher, SearchIndex};
use txwatch_api_server::AppState;
use txwatch_engine::{Broadcaster, Coordinator, Notifier, StaticAuthorizer, WatermarkTracker};

use crate::config::{IndexConfig, ServeArgs, ServerConfig};
use crate::error::ServerError;

/// How long in-flight requests get to finish after Ctrl+C.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn build_index(config: &IndexConfig) -> Result<Arc<dyn SearchIndex>, ServerError> {
    let index: Arc<dyn SearchIndex> = match config {
        IndexConfig::Memory(mem) => Arc::new(MemoryIndex::from_config(mem)?),
        IndexConfig::Elasticsearch(es) => {
            tracing::info!(url = %es.url, user = ?es.user, "using elasticsearch index");
            Arc::new(ElasticsearchIndex::new(es)?)
        }
    };
    Ok(index)
}

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("txwatch-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Collaborators ---
    let index = build_index(&config.index)?;
    let annotations = config.annotations.build(index.clone());
    tracing::info!(annotations = ?config.annotations, "annotation store ready");

    if config.principals.is_empty() {
        tracing::warn!("no [[principals]] configured, every request will be denied");
    }
    let authorizer = Arc::new(StaticAuthorizer::new(&config.principals));

    let timeout = Duration::from_millis(config.request_timeout_ms);
    // Публикация идёт внутри запроса на запись: ждать медленного WS клиента
    // можно только коротко, а не весь request_timeout.
    let send_timeout = Duration::from_millis(config.ws_send_timeout_ms);
    let broadcaster = Arc::new(Broadcaster::new(send_timeout));
    let publisher: Arc<dyn EventPublisher> = broadcaster.clone();

    let coordinator = Coordinator::new(
        index,
        annotations,
        authorizer,
        Arc::new(WatermarkTracker::new()),
        Notifier::new(publisher),
    );

    // --- API server (HTTP + WS) ---
    let state = AppState {
        coordinator: Arc::new(coordinator),
        subscriber: broadcaster,
        ws_buffer: config.ws_buffer,
        ws_overflow: config.ws_overflow,
        request_timeout: timeout,
    };
    let api_port = config.api_port;
    let api_token = token.clone();
    let mut api_handle =
        tokio::spawn(async move { txwatch_api_server::run(api_port, state, api_token).await });

    tracing::info!(
        port = api_port,
        timeout_ms = config.request_timeout_ms,
        ws_buffer = config.ws_buffer,
        ws_overflow = ?config.ws_overflow,
        "server ready"
    );

    // --- Wait for Ctrl+C, or an early API failure (e.g. port in use) ---
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
        }
        res = &mut api_handle => {
            token.cancel();
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Api(e)),
                Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
            };
        }
    }

    token.cancel();

    match tokio::time::timeout(DRAIN_TIMEOUT, &mut api_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "api server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "api task failed"),
        Err(_) => {
            tracing::warn!("api server did not drain in time, aborting");
            api_handle.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
