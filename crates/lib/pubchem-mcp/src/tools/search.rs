use pubchem_core::upstream::CompoundSource;
use pubchem_model::LookupOutcome;
use rmcp::{
    ErrorData,
    RoleServer,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    service::RequestContext,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::PubchemMcp;

/// Parameters for a batch compound search.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchCompoundsParams {
    /// Compound names, looked up in this order. Example: ["Aspirin", "Hydroxocobalamin"]
    pub names: Vec<String>,
}

#[tool_router(router = tool_router_search, vis = "pub")]
impl<S: CompoundSource> PubchemMcp<S> {
    #[tool(description = "Searches PubChem for multiple compounds by name, one at a time with pauses and retries. Falls back from the compound domain to the substance domain. Returns one result per name, in order: either the compound record (cid, iupac_name, molecular_formula, molecular_weight, monoisotopic_mass, synonyms, charge, search_term) or an object with error and compound_name.")]
    async fn search_compounds_by_name(
        &self,
        Parameters(params): Parameters<SearchCompoundsParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcomes = tokio::select! {
            () = context.ct.cancelled() => {
                warn!(count = params.names.len(), "compound search cancelled by caller");
                return Err(ErrorData::internal_error("compound search cancelled", None));
            }
            outcomes = self.search(&params.names) => outcomes,
        };
        outcomes_result(&outcomes)
    }
}

pub fn outcomes_result(outcomes: &[LookupOutcome]) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(outcomes)?]))
}
