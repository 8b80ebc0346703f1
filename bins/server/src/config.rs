use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use storage_elasticsearch::ElasticsearchConfig;
use storage_memory::MemoryIndexConfig;
use txwatch_api::OverflowPolicy;
use txwatch_engine::{AnnotationBackend, PrincipalConfig};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "txwatch-server", about = "Transaction review service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Дедлайн каждого внешнего вызова (index, annotations, authorization).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Размер канала WS подписчика.
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    #[serde(default = "default_ws_overflow")]
    pub ws_overflow: OverflowPolicy,
    /// Сколько публикация ждёт заполненного `back_pressure` подписчика.
    #[serde(default = "default_ws_send_timeout_ms")]
    pub ws_send_timeout_ms: u64,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub annotations: AnnotationBackend,
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

/// `[index]` table, selected by `backend`.
#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum IndexConfig {
    Memory(MemoryIndexConfig),
    Elasticsearch(ElasticsearchConfig),
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig::Memory(MemoryIndexConfig::default())
    }
}

fn default_api_port() -> u16 {
    9200
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_ws_buffer() -> usize {
    4096
}
fn default_ws_overflow() -> OverflowPolicy {
    OverflowPolicy::Drop
}
fn default_ws_send_timeout_ms() -> u64 {
    250
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content).map_err(|e| ServerError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        for (key, value) in [
            ("request_timeout_ms", config.request_timeout_ms),
            ("ws_send_timeout_ms", config.ws_send_timeout_ms),
        ] {
            if value == 0 {
                return Err(ServerError::Config {
                    context: "validate",
                    detail: format!("{key} must be positive"),
                });
            }
        }
        Ok(config)
    }
}
