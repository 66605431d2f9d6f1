//! Boundary models and schema helpers for spgraph-mcp.
//!
//! This crate defines the typed records that external payloads are decoded
//! into (library property bags, vector matches, graph neighborhood rows) and
//! the canonical relationship key used to deduplicate graph edges.

pub mod models;
pub mod schema;

pub use models::*;
