//! MCP tool modules.
//!
//! Compound search is the only domain tool; the health probe lives with the
//! server type.

pub mod search;
