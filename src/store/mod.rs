//! Persistence layer.
//!
//! - [`schema`] — DDL and initialization for the metadata database.
//! - [`metadata`] — typed CRUD over files, symbols, chunks, edges, and FTS.
//! - [`vector`] — sqlite-vec chunk-embedding store.

pub mod metadata;
pub mod schema;
pub mod vector;

pub use metadata::MetadataStore;
pub use vector::{VectorHit, VectorRow, VectorStore};
