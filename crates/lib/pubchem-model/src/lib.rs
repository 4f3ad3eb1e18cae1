//! Compound records and lookup outcomes for pubchem-mcp.
//!
//! This crate defines the canonical record shape returned to tool callers and
//! the upstream naming constants shared by the core and the MCP surface.

pub mod models;
pub mod schema;

pub use models::*;
