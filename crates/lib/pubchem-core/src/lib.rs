//! Core lookup services for pubchem-mcp.
//!
//! This crate owns the persisted proxy settings, the outbound transport and its
//! identity check, the PubChem PUG REST collaborator, and the resolve, fetch and
//! batch pipeline that turns compound names into ordered lookup outcomes.

pub mod batch;
pub mod fetcher;
pub mod policy;
pub mod resolver;
pub mod settings;
pub mod transport;
pub mod upstream;
