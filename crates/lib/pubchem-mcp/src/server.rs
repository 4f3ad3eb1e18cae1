//! Runners exposing [`PubchemMcp`] over stdio or streamable HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use pubchem_core::batch::BatchOrchestrator;
use pubchem_core::upstream::CompoundSource;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::PubchemMcp;

pub const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4030";
pub const MCP_PATH: &str = "/mcp";
pub const HEALTH_PATH: &str = "/health";

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
const SSE_RETRY: Duration = Duration::from_secs(3);

pub type ServeError = Box<dyn std::error::Error + Send + Sync>;

/// Streamable HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServeConfig {
    pub addr: SocketAddr,
    /// Keep per-client sessions between requests.
    pub stateful: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl HttpServeConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful: true,
            sse_keep_alive: Some(SSE_KEEP_ALIVE),
            sse_retry: Some(SSE_RETRY),
        }
    }

    #[must_use]
    pub const fn stateless(mut self) -> Self {
        self.stateful = false;
        self
    }

    fn session_config(&self) -> StreamableHttpServerConfig {
        StreamableHttpServerConfig {
            sse_keep_alive: self.sse_keep_alive,
            sse_retry: self.sse_retry,
            stateful_mode: self.stateful,
            ..Default::default()
        }
    }
}

/// Where the MCP protocol is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runner {
    Stdio,
    Http(HttpServeConfig),
}

/// Serves lookups through `runner` until the peer or listener stops.
///
/// # Errors
/// Returns any transport, listener or server error.
pub async fn serve<S: CompoundSource>(
    lookup: Arc<BatchOrchestrator<S>>,
    runner: Runner,
) -> Result<(), ServeError> {
    match runner {
        Runner::Stdio => serve_stdio(lookup).await,
        Runner::Http(config) => serve_streamable_http(lookup, &config).await,
    }
}

/// Serves a single MCP session over stdin/stdout.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: CompoundSource>(
    lookup: Arc<BatchOrchestrator<S>>,
) -> Result<(), ServeError> {
    info!("serving MCP over stdio");
    let running = serve_server(PubchemMcp::with_orchestrator(lookup), stdio()).await?;
    let reason = running.waiting().await?;
    info!(?reason, "stdio session ended");
    Ok(())
}

/// Serves MCP sessions over streamable HTTP under [`MCP_PATH`].
///
/// Every session shares `lookup`; batches from different sessions still pace
/// independently.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<S: CompoundSource>(
    lookup: Arc<BatchOrchestrator<S>>,
    config: &HttpServeConfig,
) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("pubchem-mcp listening on http://{}{MCP_PATH}", config.addr);
    axum::serve(listener, http_router(lookup, config)).await?;
    Ok(())
}

fn http_router<S: CompoundSource>(
    lookup: Arc<BatchOrchestrator<S>>,
    config: &HttpServeConfig,
) -> Router {
    let sessions: StreamableHttpService<PubchemMcp<S>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(PubchemMcp::with_orchestrator(lookup.clone())),
            Arc::new(LocalSessionManager::default()),
            config.session_config(),
        );

    Router::new()
        .route(HEALTH_PATH, get(|| async { "ok" }))
        .nest_service(MCP_PATH, sessions)
}
