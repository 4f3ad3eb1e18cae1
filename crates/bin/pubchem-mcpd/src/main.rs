//! Daemon entry point for the PubChem MCP server.
//!
//! Loads configuration from the environment, opens the log file, builds the
//! outbound transport from the persisted proxy settings, and serves the MCP
//! protocol over stdio or streamable HTTP.

mod config;
mod logging;

use std::sync::Arc;

use pubchem_core::batch::BatchOrchestrator;
use pubchem_core::resolver::Resolver;
use pubchem_core::transport;
use pubchem_core::upstream::PugRestClient;
use pubchem_mcp::server::{ServeError, serve};
use tracing::info;

use crate::config::PubchemConfig;

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    let config = PubchemConfig::from_args()?;
    let log_path = logging::init(&config.log_dir)?;
    info!(
        log = %log_path.display(),
        settings = %config.settings_path.display(),
        "pubchem-mcpd starting"
    );

    let transport = transport::configure(&config.settings_path, &config.transport).await?;
    let source = Arc::new(PugRestClient::from_transport(&transport, &config.base_url)?);
    let resolver = Resolver::new(source, config.retry)
        .with_connection_label(transport.config().connection_label());
    let lookup = Arc::new(BatchOrchestrator::new(resolver, config.pacing));

    serve(lookup, config.runner).await
}
