//! repo-knowledge — incremental code indexing and hybrid retrieval.
//!
//! Turns a source tree into a queryable knowledge store (SQLite metadata +
//! FTS5 + sqlite-vec embeddings + a ranked symbol graph) and serves
//! token-budgeted context excerpts to language-model agents.

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod graph;
pub mod indexer;
pub mod retriever;
pub mod store;
pub mod summary;
pub mod types;
