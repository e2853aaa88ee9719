//! Content-addressed diff between discovered files and persisted records.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::indexer::walker::DiscoveredFile;

/// SHA-256 of raw bytes, hex-encoded.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Source text plus its hash, cached so the pipeline reads each file once.
#[derive(Debug, Clone)]
pub struct CachedContent {
    pub content: String,
    pub hash: String,
}

/// Partition of the discovered set against the persisted set.
#[derive(Debug, Default)]
pub struct FileDiff {
    pub added: Vec<DiscoveredFile>,
    pub modified: Vec<DiscoveredFile>,
    pub unchanged: Vec<DiscoveredFile>,
    /// Persisted paths absent from discovery.
    pub removed: Vec<String>,
}

/// Classify every discovered file as added, modified, or unchanged, and
/// collect persisted paths that no longer exist on disk.
///
/// Fast path: a size mismatch against the persisted record classifies the
/// file as modified without reading it. Otherwise the file is read and
/// hashed, and the `{content, hash}` pair lands in `content_cache` so the
/// parse phase does not re-read it.
pub fn compute_diff(
    root: &Path,
    discovered: &[DiscoveredFile],
    existing_hashes: &HashMap<String, String>,
    existing_sizes: &HashMap<String, u64>,
    content_cache: &mut HashMap<String, CachedContent>,
) -> Result<FileDiff> {
    let mut diff = FileDiff::default();

    for file in discovered {
        let Some(stored_hash) = existing_hashes.get(&file.relative_path) else {
            diff.added.push(file.clone());
            continue;
        };

        if existing_sizes
            .get(&file.relative_path)
            .is_some_and(|&size| size != file.size_bytes)
        {
            diff.modified.push(file.clone());
            continue;
        }

        let content = fs::read_to_string(root.join(&file.relative_path))?;
        let hash = hash_content(content.as_bytes());
        let changed = &hash != stored_hash;
        content_cache.insert(
            file.relative_path.clone(),
            CachedContent { content, hash },
        );
        if changed {
            diff.modified.push(file.clone());
        } else {
            diff.unchanged.push(file.clone());
        }
    }

    let discovered_paths: std::collections::HashSet<&str> = discovered
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    diff.removed = existing_hashes
        .keys()
        .filter(|path| !discovered_paths.contains(path.as_str()))
        .cloned()
        .collect();
    diff.removed.sort();

    Ok(diff)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
