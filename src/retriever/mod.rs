//! Hybrid retrieval: vector, keyword, and symbol search fused by
//! reciprocal-rank fusion under a deterministic ordering.
//!
//! Retrieval errors are never fatal: a failing source degrades to an empty
//! result list with a warning, and hostile query syntax yields empty
//! results rather than errors.

pub mod budget;

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::store::{MetadataStore, VectorStore};
use crate::types::{Language, MatchType, SearchResult};

/// RRF rank constant.
const RRF_K: f64 = 60.0;
/// Source weights in hybrid mode.
const WEIGHT_VECTOR: f64 = 0.5;
const WEIGHT_KEYWORD: f64 = 0.3;
const WEIGHT_SYMBOL: f64 = 0.2;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Hybrid,
    Vector,
    Keyword,
    Symbol,
}

impl SearchMode {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hybrid" => Some(Self::Hybrid),
            "vector" | "semantic" => Some(Self::Vector),
            "keyword" | "text" => Some(Self::Keyword),
            "symbol" => Some(Self::Symbol),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub limit: usize,
    pub token_budget: usize,
    pub language_filter: Option<String>,
    pub file_filter: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            limit: 10,
            token_budget: 4000,
            language_filter: None,
            file_filter: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

pub struct Retriever<'a> {
    meta: &'a MetadataStore,
    vectors: &'a VectorStore,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> Retriever<'a> {
    pub fn new(
        meta: &'a MetadataStore,
        vectors: &'a VectorStore,
        provider: &'a dyn EmbeddingProvider,
    ) -> Self {
        Self {
            meta,
            vectors,
            provider,
        }
    }

    /// Run a search and return ranked, deduplicated results.
    ///
    /// Token budget enforcement happens in the formatting caller (see
    /// [`budget::apply_token_budget`]); this returns up to `limit` results.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        // Give fusion room to merge before the final cut.
        let fetch_limit = (3 * options.limit).max(30);

        let mut results = match options.mode {
            SearchMode::Vector => {
                rank_single(self.vector_search(query, fetch_limit, options.language_filter.as_deref()))
            }
            SearchMode::Keyword => rank_single(self.keyword_search(query, fetch_limit)),
            SearchMode::Symbol => rank_single(self.symbol_search(query, fetch_limit)),
            SearchMode::Hybrid => {
                let vector = self.vector_search(query, fetch_limit, options.language_filter.as_deref());
                let keyword = self.keyword_search(query, fetch_limit);
                let symbol = self.symbol_search(query, fetch_limit);
                fuse(&[
                    (WEIGHT_VECTOR, vector),
                    (WEIGHT_KEYWORD, keyword),
                    (WEIGHT_SYMBOL, symbol),
                ])
            }
        };

        if let Some(pattern) = options.file_filter.as_deref() {
            if let Some(regex) = glob_to_regex(pattern) {
                results.retain(|r| regex.is_match(&r.file_path));
            }
            // An invalid pattern degrades to "no filter".
        }

        let mut deduped = dedup_overlaps(results);
        deduped.truncate(options.limit);
        deduped
    }

    // -------------------------------------------------------------------
    // Sources
    // -------------------------------------------------------------------

    fn vector_search(
        &self,
        query: &str,
        limit: usize,
        language: Option<&str>,
    ) -> Vec<SearchResult> {
        let embedding = match self.provider.embed_query(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("vector search unavailable: {e}");
                return Vec::new();
            }
        };
        let hits = match self.vectors.query(&embedding, limit, language) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("vector query failed: {e}");
                return Vec::new();
            }
        };
        hits.into_iter()
            .map(|hit| SearchResult {
                file_path: hit.file_path,
                start_line: hit.start_line,
                end_line: hit.end_line,
                content: hit.content,
                score: if hit.distance >= 0.0 {
                    1.0 / (1.0 + hit.distance)
                } else {
                    0.0
                },
                match_type: MatchType::Vector,
                symbols: split_names(&hit.symbol_names),
                language: hit.language.as_deref().and_then(Language::from_str_loose),
            })
            .collect()
    }

    fn keyword_search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let Some(expression) = build_fts_expression(query) else {
            return Vec::new();
        };
        let hits = match self.meta.search_chunks(&expression, limit) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("keyword search failed: {e}");
                return Vec::new();
            }
        };

        // Batch-load the referenced files once instead of per hit.
        let file_ids: Vec<i64> = hits.iter().map(|h| h.chunk.file_id).collect();
        let files = match self.meta.files_by_ids(&file_ids) {
            Ok(files) => files,
            Err(e) => {
                warn!("file lookup failed: {e}");
                return Vec::new();
            }
        };

        hits.into_iter()
            .filter_map(|hit| {
                let file = files.get(&hit.chunk.file_id)?;
                Some(SearchResult {
                    file_path: file.path.clone(),
                    start_line: hit.chunk.start_line,
                    end_line: hit.chunk.end_line,
                    content: hit.chunk.content,
                    score: 1.0 / (1.0 + hit.rank.abs()),
                    match_type: MatchType::Keyword,
                    symbols: split_names(&hit.chunk.symbol_names),
                    language: file.language,
                })
            })
            .collect()
    }

    fn symbol_search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let Some(expression) = build_fts_expression(query) else {
            return Vec::new();
        };
        let hits = match self.meta.search_symbols(&expression, limit) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("symbol search failed: {e}");
                return Vec::new();
            }
        };

        let file_ids: Vec<i64> = hits.iter().map(|h| h.symbol.file_id).collect();
        let files = match self.meta.files_by_ids(&file_ids) {
            Ok(files) => files,
            Err(e) => {
                warn!("file lookup failed: {e}");
                return Vec::new();
            }
        };

        hits.into_iter()
            .filter_map(|hit| {
                let file = files.get(&hit.symbol.file_id)?;
                let content = hit
                    .symbol
                    .signature
                    .clone()
                    .unwrap_or_else(|| hit.symbol.name.clone());
                Some(SearchResult {
                    file_path: file.path.clone(),
                    start_line: hit.symbol.start_line,
                    end_line: hit.symbol.end_line,
                    content,
                    score: (hit.symbol.importance + 0.1).min(1.0),
                    match_type: MatchType::Symbol,
                    symbols: vec![hit.symbol.name.clone()],
                    language: file.language,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Fusion and ranking
// ---------------------------------------------------------------------------

fn split_names(names: &str) -> Vec<String> {
    names.split_whitespace().map(str::to_string).collect()
}

/// Sort a single source's results by its native score, descending.
fn rank_single(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    results
}

/// Reciprocal-rank fusion across weighted sources.
///
/// Rank `r` (0-based) in a source of weight `w` contributes
/// `w / (k + r + 1)` to the key `"<filePath>:<startLine>-<endLine>"`.
/// Duplicate keys accumulate scores and keep the longer-content
/// representative.
pub fn fuse(sources: &[(f64, Vec<SearchResult>)]) -> Vec<SearchResult> {
    let mut fused: HashMap<String, (SearchResult, f64)> = HashMap::new();

    for (weight, results) in sources {
        for (rank, result) in results.iter().enumerate() {
            let contribution = weight / (RRF_K + rank as f64 + 1.0);
            let key = format!(
                "{}:{}-{}",
                result.file_path, result.start_line, result.end_line
            );
            match fused.get_mut(&key) {
                Some((existing, total)) => {
                    *total += contribution;
                    if result.content.len() > existing.content.len() {
                        let score = *total;
                        *existing = result.clone();
                        existing.score = score;
                    }
                }
                None => {
                    fused.insert(key, (result.clone(), contribution));
                }
            }
        }
    }

    let mut results: Vec<SearchResult> = fused
        .into_values()
        .map(|(mut result, score)| {
            result.score = score;
            result
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.start_line.cmp(&b.start_line))
    });
    results
}

/// Drop any result whose line interval overlaps an already-kept result in
/// the same file. Must run on score-sorted input; order is preserved.
pub fn dedup_overlaps(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::new();
    for candidate in results {
        let overlaps = kept.iter().any(|existing| {
            existing.file_path == candidate.file_path
                && existing.start_line <= candidate.end_line
                && existing.end_line >= candidate.start_line
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

// ---------------------------------------------------------------------------
// Query preparation
// ---------------------------------------------------------------------------

/// Build an FTS5 OR-expression from free text.
///
/// FTS5 operator characters are replaced with spaces, tokens shorter than
/// two characters are dropped, and survivors are joined with ` OR `.
/// Returns `None` when nothing survives.
pub fn build_fts_expression(query: &str) -> Option<String> {
    const STRIP: &[char] = &[
        '\'', '"', '(', ')', '{', '}', '[', ']', '^', '~', '*', '?', ':', '\\', '!',
    ];
    let cleaned: String = query
        .chars()
        .map(|c| if STRIP.contains(&c) { ' ' } else { c })
        .collect();
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| token.len() >= 2)
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(
            tokens
                .iter()
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(" OR "),
        )
    }
}

/// Convert a file glob to an anchored regex.
///
/// `**` crosses directory separators, `*` does not, `?` matches one
/// non-separator character. Returns `None` for patterns that fail to
/// compile; the caller treats that as "no filter".
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
