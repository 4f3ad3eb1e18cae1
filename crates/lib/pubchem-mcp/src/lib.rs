//! MCP server implementation for pubchem-mcp.
//!
//! This crate wires the batch lookup pipeline into rmcp tool handlers and
//! exposes the stdio and streamable HTTP runners.

mod tools;
pub mod server;

use std::sync::Arc;

use pubchem_core::batch::BatchOrchestrator;
use pubchem_core::upstream::CompoundSource;
use pubchem_model::LookupOutcome;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use tools::search::SearchCompoundsParams;

const SERVER_INSTRUCTIONS: &str = r"pubchem-mcp looks up chemical compounds in PubChem by name.

Tools:
- `search_compounds_by_name` takes `names`, an ordered list of compound names
  (e.g. [`Aspirin`, `Hydroxocobalamin`]). Names are searched one at a time with a pause
  between them, so large batches take a while.
- `health` returns `ok`.

Results:
- One result per input name, in input order.
- A found compound carries `cid`, `iupac_name`, `molecular_formula`, `molecular_weight`,
  `monoisotopic_mass`, `synonyms`, `charge` and the original `search_term`. Missing
  attributes are null.
- A failed lookup carries `error` and the original `compound_name`. Retry just the
  failed names if needed; busy-service failures are usually temporary.";

/// MCP server wrapper around the batch lookup pipeline.
pub struct PubchemMcp<S: CompoundSource> {
    tool_router: ToolRouter<Self>,
    lookup: Arc<BatchOrchestrator<S>>,
}

impl<S: CompoundSource> Clone for PubchemMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            lookup: self.lookup.clone(),
        }
    }
}

impl<S: CompoundSource> PubchemMcp<S> {
    /// Creates a new server owning the orchestrator.
    #[must_use]
    pub fn new(lookup: BatchOrchestrator<S>) -> Self {
        Self::with_orchestrator(Arc::new(lookup))
    }

    /// Creates a new server using a shared orchestrator handle.
    #[must_use]
    pub fn with_orchestrator(lookup: Arc<BatchOrchestrator<S>>) -> Self {
        let tool_router = Self::tool_router_core() + Self::tool_router_search();
        Self {
            tool_router,
            lookup,
        }
    }

    /// Runs one batch lookup; outcomes follow the order of `names`.
    pub async fn search(&self, names: &[String]) -> Vec<LookupOutcome> {
        self.lookup.run(names).await
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<S: CompoundSource> PubchemMcp<S> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl<S: CompoundSource> ServerHandler for PubchemMcp<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
