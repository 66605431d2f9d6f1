//! MCP tool modules.
//!
//! Tools are grouped by domain: the two retrieval operations and contextual
//! help describing them.

pub mod retrieval;
mod context;
