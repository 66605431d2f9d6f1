//! Core services for spgraph-mcp.
//!
//! This crate owns the HTTP clients for the three external collaborators
//! (SharePoint document library, Neo4j graph database, Azure `OpenAI`
//! embeddings) behind small traits, and the control plane that turns their
//! responses into text for an LLM prompt.

pub mod control;
pub mod services;
