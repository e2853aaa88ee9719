//! Symbol-aware chunking.
//!
//! Splits a source file along symbol boundaries into chunks that fit a
//! per-chunk token budget, each prefixed with a context header line naming
//! the file, line range, and contained symbols. Token counts use the
//! ~3.5-characters-per-token estimate; a real tokenizer is not worth the
//! dependency for budget bookkeeping.

use crate::types::{Chunk, ExtractedSymbol, SymbolKind};

/// Tokens reserved for the header line when sizing a region.
pub const HEADER_OVERHEAD_TOKENS: usize = 20;

/// Default per-chunk token budget.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Estimated token count of a text: ⌈len / 3.5⌉.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() as f64 / 3.5).ceil() as u32
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// A contiguous line span scheduled for chunking: either one top-level
/// symbol (with its children's names attached) or the gap text between
/// symbols.
struct Region {
    start_line: u32,
    end_line: u32,
    names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split `source` into chunks under `max_tokens`, honoring symbol
/// boundaries where possible.
pub fn chunk_file(
    source: &str,
    path: &str,
    symbols: &[ExtractedSymbol],
    max_tokens: usize,
) -> Vec<Chunk> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }
    let total_lines = lines.len() as u32;

    // Whole-file fast path.
    if estimate_tokens(source) as usize <= max_tokens {
        let names: Vec<String> = symbols.iter().map(|s| s.name.clone()).collect();
        return vec![build_chunk(path, &lines, 1, total_lines, names)];
    }

    let regions = build_regions(symbols, total_lines);
    if regions.is_empty() {
        // No symbols: pure line slicing.
        return slice_lines(path, &lines, 1, total_lines, Vec::new(), max_tokens);
    }

    let mut chunks = Vec::new();
    for region in regions {
        let text = join_lines(&lines, region.start_line, region.end_line);
        if text.trim().is_empty() {
            continue;
        }
        if (estimate_tokens(&text) as usize) <= max_tokens.saturating_sub(HEADER_OVERHEAD_TOKENS) {
            chunks.push(build_chunk(
                path,
                &lines,
                region.start_line,
                region.end_line,
                region.names,
            ));
        } else {
            chunks.extend(slice_lines(
                path,
                &lines,
                region.start_line,
                region.end_line,
                region.names,
                max_tokens,
            ));
        }
    }
    chunks
}

/// Alternate gap and symbol regions across the whole file.
///
/// Top-level symbols (no parent) and classes are the split points, sorted
/// by start line; a symbol overlapping an already-consumed range is
/// skipped. Child symbol names ride along with their parent's region.
fn build_regions(symbols: &[ExtractedSymbol], total_lines: u32) -> Vec<Region> {
    let mut anchors: Vec<&ExtractedSymbol> = symbols
        .iter()
        .filter(|s| s.parent_name.is_none() || s.kind == SymbolKind::Class)
        .collect();
    anchors.sort_by_key(|s| s.start_line);

    let mut regions = Vec::new();
    let mut consumed: u32 = 0;
    for anchor in anchors {
        if anchor.start_line <= consumed {
            continue;
        }
        if anchor.start_line > consumed + 1 {
            regions.push(Region {
                start_line: consumed + 1,
                end_line: anchor.start_line - 1,
                names: Vec::new(),
            });
        }

        let mut names = vec![anchor.name.clone()];
        names.extend(
            symbols
                .iter()
                .filter(|s| s.parent_name.as_deref() == Some(anchor.name.as_str()))
                .map(|s| s.name.clone()),
        );
        let end_line = anchor.end_line.min(total_lines);
        regions.push(Region {
            start_line: anchor.start_line,
            end_line,
            names,
        });
        consumed = end_line;
    }

    if regions.is_empty() {
        return regions;
    }
    if consumed < total_lines {
        regions.push(Region {
            start_line: consumed + 1,
            end_line: total_lines,
            names: Vec::new(),
        });
    }
    regions
}

/// Greedy line slicing: fill each slice up to the budget without splitting
/// a line. Every slice carries the region's symbol names.
fn slice_lines(
    path: &str,
    lines: &[&str],
    start_line: u32,
    end_line: u32,
    names: Vec<String>,
    max_tokens: usize,
) -> Vec<Chunk> {
    let budget = max_tokens.saturating_sub(HEADER_OVERHEAD_TOKENS).max(1);
    let mut chunks = Vec::new();

    let mut slice_start = start_line;
    let mut slice_tokens: usize = 0;
    let mut cursor = start_line;
    while cursor <= end_line {
        let line = lines[(cursor - 1) as usize];
        let line_tokens = estimate_tokens(line) as usize + 1;
        if slice_tokens > 0 && slice_tokens + line_tokens > budget {
            chunks.push(build_chunk(path, lines, slice_start, cursor - 1, names.clone()));
            slice_start = cursor;
            slice_tokens = 0;
        }
        slice_tokens += line_tokens;
        cursor += 1;
    }
    if slice_start <= end_line {
        chunks.push(build_chunk(path, lines, slice_start, end_line, names));
    }
    chunks
}

fn join_lines(lines: &[&str], start_line: u32, end_line: u32) -> String {
    lines[(start_line - 1) as usize..end_line as usize].join("\n")
}

/// Assemble a chunk: header line, then the covered source lines.
fn build_chunk(
    path: &str,
    lines: &[&str],
    start_line: u32,
    end_line: u32,
    names: Vec<String>,
) -> Chunk {
    let header = if names.is_empty() {
        format!("// File: {path} | Lines: {start_line}-{end_line}")
    } else {
        format!(
            "// File: {path} | Lines: {start_line}-{end_line} | Symbols: {}",
            names.join(", ")
        )
    };
    let body = join_lines(lines, start_line, end_line);
    let content = format!("{header}\n{body}");
    let token_count = estimate_tokens(&content);
    Chunk {
        content,
        start_line,
        end_line,
        symbol_names: names,
        token_count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
