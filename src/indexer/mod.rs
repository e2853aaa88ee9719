//! The indexing pipeline.
//!
//! Phased and idempotent: discover, diff, parse/extract, chunk, persist,
//! embed, store vectors, build graph, rank, summarize, record state. Every
//! per-file mutation is transactional, so an aborted run re-converges on
//! the next one. Parsing and chunking run in parallel via rayon with a
//! fresh tree-sitter parser per task and no store access inside the
//! parallel section.

pub mod diff;
pub mod parser;
pub mod walker;

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::chunker;
use crate::config::IndexConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{KnowledgeError, Result};
use crate::extract;
use crate::graph::{GraphBuilder, ParsedFile};
use crate::indexer::diff::{compute_diff, hash_content, CachedContent};
use crate::indexer::parser::SourceParser;
use crate::indexer::walker::{discover_files, DiscoveredFile};
use crate::store::{MetadataStore, VectorRow, VectorStore};
use crate::summary::generate_summaries;
use crate::types::{Chunk, ExtractedSymbol, ImportDecl};

/// Chunks embedded per provider call.
const EMBED_BATCH_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Wipe everything and re-index from scratch.
    pub full: bool,
    /// Generate file/directory/project summaries at the end.
    pub with_summaries: bool,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub added: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub total_files: usize,
    pub total_chunks: usize,
    pub duration_ms: u128,
}

impl std::fmt::Display for IndexReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "indexed {} added, {} modified, {} removed, {} unchanged ({} files, {} chunks) in {}ms",
            self.added,
            self.modified,
            self.removed,
            self.unchanged,
            self.total_files,
            self.total_chunks,
            self.duration_ms,
        )
    }
}

/// Per-file output of the parse phase.
struct FileWork {
    file: DiscoveredFile,
    content: String,
    hash: String,
    symbols: Vec<ExtractedSymbol>,
    imports: Vec<ImportDecl>,
    chunks: Vec<Chunk>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    config: &'a IndexConfig,
    meta: &'a MetadataStore,
    vectors: &'a VectorStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a IndexConfig, meta: &'a MetadataStore, vectors: &'a VectorStore) -> Self {
        Self {
            config,
            meta,
            vectors,
        }
    }

    /// Run the full pipeline.
    ///
    /// `progress` receives (embedded, total) chunk counts during the
    /// embedding phase.
    pub fn run(
        &self,
        provider: &mut dyn EmbeddingProvider,
        options: PipelineOptions,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<IndexReport> {
        let started = Instant::now();
        let mut report = IndexReport::default();

        // ---- Phase 1: discover -----------------------------------------
        let discovered = discover_files(&self.config.project_root, &self.config.ignore_patterns);
        info!(files = discovered.len(), "discovery complete");

        // ---- Phase 2: diff and eviction --------------------------------
        let mut content_cache: HashMap<String, CachedContent> = HashMap::new();
        let to_index: Vec<DiscoveredFile>;

        if options.full {
            self.meta.clear_all()?;
            to_index = discovered.clone();
            report.added = discovered.len();
        } else {
            let file_diff = compute_diff(
                &self.config.project_root,
                &discovered,
                &self.meta.existing_hashes()?,
                &self.meta.existing_sizes()?,
                &mut content_cache,
            )?;
            report.added = file_diff.added.len();
            report.modified = file_diff.modified.len();
            report.unchanged = file_diff.unchanged.len();
            report.removed = file_diff.removed.len();

            for file in &file_diff.modified {
                if let Some(file_id) = self.meta.file_id_by_path(&file.relative_path)? {
                    self.meta.delete_file_data(file_id)?;
                }
                self.vectors.delete_by_file_path(&file.relative_path)?;
            }
            for path in &file_diff.removed {
                self.meta.delete_file(path)?;
                self.vectors.delete_by_file_path(path)?;
            }
            // FTS rebuild is deferred to one pass over the whole batch.
            self.meta.rebuild_fts()?;

            to_index = file_diff
                .added
                .into_iter()
                .chain(file_diff.modified)
                .collect();
        }

        // ---- Phases 3-4: read, parse, extract, chunk -------------------
        let work = self.parse_and_chunk(&to_index, &mut content_cache)?;
        drop(content_cache);

        // ---- Phase 5: persist metadata ---------------------------------
        let mut parsed_files: Vec<ParsedFile> = Vec::new();
        let mut pending_vectors: Vec<VectorRow> = Vec::new();
        for item in &work {
            let (file_id, symbol_ids, chunk_ids) = self.persist_file(item)?;
            let symbol_bodies = symbol_ids
                .iter()
                .zip(&item.symbols)
                .map(|(&id, s)| (id, s.body.clone()))
                .collect();
            parsed_files.push(ParsedFile {
                file_id,
                path: item.file.relative_path.clone(),
                imports: item.imports.clone(),
                symbol_bodies,
            });

            for (chunk, &chunk_id) in item.chunks.iter().zip(&chunk_ids) {
                pending_vectors.push(VectorRow {
                    chunk_id,
                    file_id,
                    file_path: item.file.relative_path.clone(),
                    language: item.file.language.map(|l| l.as_str().to_string()),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    symbol_names: chunk.symbol_names.join(" "),
                    content: chunk.content.clone(),
                    embedding: Vec::new(),
                });
            }
        }
        self.meta.rebuild_fts()?;

        // ---- Phase 6: embed --------------------------------------------
        if !pending_vectors.is_empty() {
            provider.initialize()?;
            if provider.dimensions() != self.config.embedding_dimensions {
                return Err(KnowledgeError::DimensionMismatch {
                    expected: self.config.embedding_dimensions,
                    actual: provider.dimensions(),
                });
            }

            let total = pending_vectors.len();
            let mut embedded = 0usize;
            for batch in pending_vectors.chunks_mut(EMBED_BATCH_SIZE) {
                let texts: Vec<String> = batch.iter().map(|row| row.content.clone()).collect();
                let vectors = provider.embed(&texts).map_err(|e| {
                    KnowledgeError::Embedding(format!(
                        "batch {}..{} failed: {e}",
                        embedded,
                        embedded + texts.len()
                    ))
                })?;
                for (row, vector) in batch.iter_mut().zip(vectors) {
                    row.embedding = vector;
                }
                embedded += texts.len();
                progress(embedded, total);
            }
        }

        // ---- Phase 7: store vectors ------------------------------------
        if options.full {
            self.vectors.recreate_table()?;
        }
        if !pending_vectors.is_empty() {
            self.vectors.insert(&pending_vectors)?;
        }

        // ---- Phase 8: graph --------------------------------------------
        GraphBuilder::new(self.meta).build(&parsed_files)?;

        // ---- Phase 9: rank ---------------------------------------------
        crate::graph::ranker::rank_symbols(self.meta)?;

        // ---- Phase 10: summaries ---------------------------------------
        if options.with_summaries {
            generate_summaries(self.meta)?;
        }

        // ---- Phase 11: state -------------------------------------------
        let stats = self.meta.stats()?;
        report.total_files = stats.files;
        report.total_chunks = stats.chunks;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_string();
        self.meta
            .set_state(crate::store::metadata::STATE_LAST_INDEXED, &now)?;
        if options.full {
            self.meta
                .set_state(crate::store::metadata::STATE_LAST_FULL_INDEX, &now)?;
        }
        self.meta.set_state(
            crate::store::metadata::STATE_EMBEDDING_MODEL,
            &self.config.embedding_model,
        )?;
        self.meta.set_state(
            crate::store::metadata::STATE_TOTAL_FILES,
            &stats.files.to_string(),
        )?;
        self.meta.set_state(
            crate::store::metadata::STATE_TOTAL_CHUNKS,
            &stats.chunks.to_string(),
        )?;

        report.duration_ms = started.elapsed().as_millis();
        info!("{report}");
        Ok(report)
    }

    /// Read every file to index (cache first), then parse, extract, and
    /// chunk in parallel. Parse failures are logged and leave the file
    /// text-searchable without symbols.
    fn parse_and_chunk(
        &self,
        to_index: &[DiscoveredFile],
        content_cache: &mut HashMap<String, CachedContent>,
    ) -> Result<Vec<FileWork>> {
        // Sequential reads (the diff already cached most modified files).
        let mut inputs: Vec<(DiscoveredFile, CachedContent)> = Vec::new();
        for file in to_index {
            let cached = match content_cache.remove(&file.relative_path) {
                Some(cached) => cached,
                None => {
                    let path = self.config.project_root.join(&file.relative_path);
                    match std::fs::read_to_string(&path) {
                        Ok(content) => {
                            let hash = hash_content(content.as_bytes());
                            CachedContent { content, hash }
                        }
                        Err(e) => {
                            warn!("skipping {}: {e}", file.relative_path);
                            continue;
                        }
                    }
                }
            };
            inputs.push((file.clone(), cached));
        }

        let max_tokens = self.config.chunk_max_tokens;
        let work: Vec<FileWork> = inputs
            .into_par_iter()
            .map(|(file, cached)| {
                let mut symbols = Vec::new();
                let mut imports = Vec::new();

                if let Some(language) = file.language.filter(|l| l.is_code()) {
                    // One parser per rayon task; tree-sitter parsers are not
                    // Send.
                    let parser = SourceParser::new();
                    match parser.parse(&cached.content, language) {
                        Ok(Some(tree)) => {
                            let extraction = extract::extract(&tree, &cached.content, language);
                            symbols = extraction.symbols;
                            imports = extraction.imports;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("parse failed for {}: {e}", file.relative_path);
                        }
                    }
                }

                let chunks =
                    chunker::chunk_file(&cached.content, &file.relative_path, &symbols, max_tokens);

                FileWork {
                    file,
                    content: cached.content,
                    hash: cached.hash,
                    symbols,
                    imports,
                    chunks,
                }
            })
            .collect();

        Ok(work)
    }

    /// Upsert one file's record, symbols (with parent resolution), and
    /// chunks. Returns the file id plus symbol and chunk ids in order.
    fn persist_file(&self, item: &FileWork) -> Result<(i64, Vec<i64>, Vec<i64>)> {
        let file_id = self.meta.upsert_file(
            &item.file.relative_path,
            item.file.language,
            item.file.size_bytes,
            &item.hash,
            line_count(&item.content),
        )?;
        let symbol_ids = self.meta.insert_symbols(file_id, &item.symbols)?;
        self.meta.resolve_parents(&item.symbols, &symbol_ids)?;
        let chunk_ids = self.meta.insert_chunks(file_id, &item.chunks)?;
        Ok((file_id, symbol_ids, chunk_ids))
    }
}

/// Number of lines: split on `\n`, minus the trailing empty segment when
/// the file ends with a newline.
fn line_count(content: &str) -> u32 {
    let mut count = content.split('\n').count();
    if content.ends_with('\n') {
        count -= 1;
    }
    count as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
