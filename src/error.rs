//! Unified error type for the knowledge store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("knowledge store not initialized at {0} (run `init` first)")]
    NotInitialized(String),

    #[error("knowledge store already initialized at {0} (use --force to recreate)")]
    AlreadyInitialized(String),

    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: model produced {actual}, config declares {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
