//! Project configuration: the `config.json` stored under the data directory.
//!
//! The data directory (default `<projectRoot>/.repo-knowledge/`) holds the
//! config, the metadata database, and the vector store. `init` creates it;
//! every other entry point loads it and fails fast when it is absent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// Directory created under the project root to hold all index state.
pub const DATA_DIR_NAME: &str = ".repo-knowledge";

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

const CONFIG_FILE: &str = "config.json";
const DEFAULT_EMBEDDING_MODEL: &str = "Xenova/all-MiniLM-L6-v2";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
const DEFAULT_CHUNK_MAX_TOKENS: usize = 512;

// ---------------------------------------------------------------------------
// IndexConfig
// ---------------------------------------------------------------------------

/// Persistent configuration, serialized as camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    pub version: u32,
}

fn default_chunk_max_tokens() -> usize {
    DEFAULT_CHUNK_MAX_TOKENS
}

impl IndexConfig {
    /// Build the default configuration for a project root.
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            data_dir: project_root.join(DATA_DIR_NAME),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chunk_max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
            ignore_patterns: Vec::new(),
            version: SCHEMA_VERSION,
        }
    }

    /// Path of the metadata database.
    pub fn metadata_db_path(&self) -> PathBuf {
        self.data_dir.join("metadata.db")
    }

    /// Directory of the vector store.
    pub fn vectors_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    fn config_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Create the data directory and write a fresh config.
    ///
    /// Fails with [`KnowledgeError::AlreadyInitialized`] if a config already
    /// exists and `force` is not set. With `force`, the existing data
    /// directory is removed and recreated.
    pub fn initialize(project_root: &Path, force: bool) -> Result<Self> {
        let config = Self::new(project_root);
        let config_path = Self::config_path(&config.data_dir);

        if config_path.exists() {
            if !force {
                return Err(KnowledgeError::AlreadyInitialized(
                    config.data_dir.display().to_string(),
                ));
            }
            fs::remove_dir_all(&config.data_dir)?;
        }

        fs::create_dir_all(config.vectors_dir())?;
        config.save()?;
        Ok(config)
    }

    /// Load the config from an initialized data directory.
    ///
    /// Fails with [`KnowledgeError::NotInitialized`] when the directory or
    /// the config file is missing.
    pub fn load(project_root: &Path) -> Result<Self> {
        let data_dir = project_root.join(DATA_DIR_NAME);
        let config_path = Self::config_path(&data_dir);
        if !config_path.exists() {
            return Err(KnowledgeError::NotInitialized(
                data_dir.display().to_string(),
            ));
        }
        let raw = fs::read_to_string(&config_path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Persist the config as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(Self::config_path(&self.data_dir), raw)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
