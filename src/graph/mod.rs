//! Symbol graph construction.
//!
//! Derives file-to-file dependencies from import declarations and
//! symbol-to-symbol `imports`/`calls` edges by matching names against
//! symbol bodies and chunk text. Call detection is regex over stripped
//! chunk text, which can match occurrences inside strings and comments;
//! that over-approximation is accepted. Only relative import specifiers
//! resolve — there is no package-resolution config.

pub mod ranker;

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::store::MetadataStore;
use crate::types::{EdgeKind, EdgeRecord, ImportDecl, SymbolKind};

/// Weight of an `imports` edge.
const IMPORT_EDGE_WEIGHT: f64 = 0.5;
/// Weight of a `calls` edge.
const CALL_EDGE_WEIGHT: f64 = 1.0;
/// Symbol names shorter than this generate too many false calls to match.
const MIN_CALL_NAME_LEN: usize = 2;

/// A freshly indexed file handed to the graph builder.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_id: i64,
    pub path: String,
    pub imports: Vec<ImportDecl>,
    /// (symbol id, body text) pairs in source order. Bodies live only for
    /// the pipeline run; they drive import-edge attribution.
    pub symbol_bodies: Vec<(i64, String)>,
}

#[derive(Debug, Clone, Copy)]
struct SymbolRef {
    id: i64,
    file_id: i64,
    #[allow(dead_code)]
    kind: SymbolKind,
}

/// Builds the symbol graph for a batch of parsed files against the already
/// populated metadata store.
pub struct GraphBuilder<'a> {
    store: &'a MetadataStore,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }

    /// Derive and persist all edges for `files` in one batched transaction.
    pub fn build(&self, files: &[ParsedFile]) -> Result<usize> {
        // Name -> all symbols with that name, and path -> file id, over the
        // whole store (cross-file edges need the global table).
        let all_symbols = self.store.all_symbols()?;
        let mut by_name: HashMap<&str, Vec<SymbolRef>> = HashMap::new();
        for symbol in &all_symbols {
            by_name.entry(symbol.name.as_str()).or_default().push(SymbolRef {
                id: symbol.id,
                file_id: symbol.file_id,
                kind: symbol.kind,
            });
        }
        let path_to_file: HashMap<String, i64> = self
            .store
            .all_files()?
            .into_iter()
            .map(|f| (f.path, f.id))
            .collect();

        let mut edges: Vec<EdgeRecord> = Vec::new();
        let mut seen: HashSet<(i64, i64, EdgeKind)> = HashSet::new();

        for file in files {
            self.build_import_edges(file, &by_name, &path_to_file, &mut edges, &mut seen)?;
        }
        self.build_call_edges(files, &all_symbols, &by_name, &mut edges, &mut seen)?;

        let inserted = self.store.insert_edges(&edges)?;
        debug!(edges = inserted, "graph edges inserted");
        Ok(inserted)
    }

    // -------------------------------------------------------------------
    // Imports
    // -------------------------------------------------------------------

    fn build_import_edges(
        &self,
        file: &ParsedFile,
        by_name: &HashMap<&str, Vec<SymbolRef>>,
        path_to_file: &HashMap<String, i64>,
        edges: &mut Vec<EdgeRecord>,
        seen: &mut HashSet<(i64, i64, EdgeKind)>,
    ) -> Result<()> {
        for import in &file.imports {
            let Some(target_path) = resolve_import(&file.path, &import.source, path_to_file)
            else {
                continue;
            };
            let target_file_id = path_to_file[&target_path];
            if target_file_id != file.file_id {
                self.store
                    .insert_file_dependency(file.file_id, target_file_id, "imports")?;
            }

            for name in &import.names {
                let Some(candidates) = by_name.get(name.as_str()) else {
                    continue;
                };
                let targets: Vec<&SymbolRef> = candidates
                    .iter()
                    .filter(|t| t.file_id == target_file_id)
                    .collect();
                if targets.is_empty() {
                    continue;
                }

                // Attribute the edge to the symbols whose bodies use the
                // imported name; fall back to the file's first symbol.
                let word = match Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
                    Ok(re) => re,
                    Err(_) => continue,
                };
                let mut sources: Vec<i64> = file
                    .symbol_bodies
                    .iter()
                    .filter(|(_, body)| word.is_match(body))
                    .map(|&(id, _)| id)
                    .collect();
                if sources.is_empty() {
                    sources = file.symbol_bodies.first().map(|&(id, _)| vec![id]).unwrap_or_default();
                }

                for &source_id in &sources {
                    for target in &targets {
                        if seen.insert((source_id, target.id, EdgeKind::Imports)) {
                            edges.push(EdgeRecord {
                                source_symbol_id: source_id,
                                target_symbol_id: target.id,
                                edge_type: EdgeKind::Imports,
                                weight: IMPORT_EDGE_WEIGHT,
                                source_file_id: file.file_id,
                                target_file_id,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------

    fn build_call_edges(
        &self,
        files: &[ParsedFile],
        all_symbols: &[crate::types::SymbolRecord],
        by_name: &HashMap<&str, Vec<SymbolRef>>,
        edges: &mut Vec<EdgeRecord>,
        seen: &mut HashSet<(i64, i64, EdgeKind)>,
    ) -> Result<()> {
        // Pre-compile one call pattern per known symbol name.
        let mut patterns: Vec<(&str, Regex)> = Vec::new();
        for &name in by_name.keys() {
            if name.len() < MIN_CALL_NAME_LEN {
                continue;
            }
            if let Ok(re) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))) {
                patterns.push((name, re));
            }
        }

        for file in files {
            let file_symbols: Vec<&crate::types::SymbolRecord> = all_symbols
                .iter()
                .filter(|s| s.file_id == file.file_id)
                .collect();
            let chunks = self.store.chunks_for_file(file.file_id)?;

            for chunk in &chunks {
                let text = strip_chunk_header(&chunk.content);
                for (name, pattern) in &patterns {
                    if !pattern.is_match(&text) {
                        continue;
                    }
                    let Some(targets) = by_name.get(*name) else {
                        continue;
                    };

                    // The callers are the symbols overlapping the matching
                    // chunk; without overlap, the file's first symbol.
                    let mut sources: Vec<i64> = file_symbols
                        .iter()
                        .filter(|s| s.start_line <= chunk.end_line && s.end_line >= chunk.start_line)
                        .map(|s| s.id)
                        .collect();
                    if sources.is_empty() {
                        sources = file_symbols.first().map(|s| vec![s.id]).unwrap_or_default();
                    }

                    for &source_id in &sources {
                        for target in targets {
                            if target.file_id == file.file_id {
                                continue; // intra-file calls are skipped
                            }
                            if target.id == source_id {
                                continue; // no self-edges
                            }
                            if seen.insert((source_id, target.id, EdgeKind::Calls)) {
                                edges.push(EdgeRecord {
                                    source_symbol_id: source_id,
                                    target_symbol_id: target.id,
                                    edge_type: EdgeKind::Calls,
                                    weight: CALL_EDGE_WEIGHT,
                                    source_file_id: file.file_id,
                                    target_file_id: target.file_id,
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Drop chunk header lines before call matching.
fn strip_chunk_header(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.starts_with("// File: "))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Import path resolution
// ---------------------------------------------------------------------------

/// Resolve a relative import specifier against the indexed file table.
///
/// Only specifiers starting with `.` or `/` resolve. Candidates are tried
/// in a fixed order; the first path present in the index wins.
pub fn resolve_import(
    importer_path: &str,
    specifier: &str,
    path_to_file: &HashMap<String, i64>,
) -> Option<String> {
    if !specifier.starts_with('.') && !specifier.starts_with('/') {
        return None;
    }

    let raw = if let Some(rooted) = specifier.strip_prefix('/') {
        normalize_path(rooted)
    } else {
        let dir = match importer_path.rfind('/') {
            Some(pos) => &importer_path[..pos],
            None => "",
        };
        normalize_path(&format!("{dir}/{specifier}"))
    };

    let mut candidates: Vec<String> = vec![raw.clone()];
    for ext in [".ts", ".tsx", ".js", ".jsx"] {
        candidates.push(format!("{raw}{ext}"));
    }
    for index in ["/index.ts", "/index.tsx", "/index.js", "/index.jsx"] {
        candidates.push(format!("{raw}{index}"));
    }
    for ext in [".py", ".rs", ".go"] {
        candidates.push(format!("{raw}{ext}"));
    }
    if let Some(stem) = raw.strip_suffix(".js").or_else(|| raw.strip_suffix(".jsx")) {
        candidates.push(format!("{stem}.ts"));
        candidates.push(format!("{stem}.tsx"));
        candidates.push(format!("{stem}/index.ts"));
        candidates.push(format!("{stem}/index.tsx"));
    }

    candidates.into_iter().find(|c| path_to_file.contains_key(c))
}

/// Collapse `.` and `..` segments and repeated separators.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let normalized = path.replace('\\', "/");
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedSymbol, Language};

    fn make_symbol(name: &str, start: u32, end: u32) -> ExtractedSymbol {
        ExtractedSymbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
            signature: Some(format!("export function {name}()")),
            start_line: start,
            end_line: end,
            start_column: 0,
            end_column: 0,
            parent_name: None,
            docstring: None,
            exported: true,
            body: String::new(),
        }
    }

    fn index_file(
        store: &MetadataStore,
        path: &str,
        symbols: &[ExtractedSymbol],
        chunk_text: &str,
    ) -> (i64, Vec<(i64, String)>) {
        let file_id = store
            .upsert_file(path, Some(Language::TypeScript), 100, "hash", 10)
            .unwrap();
        let ids = store.insert_symbols(file_id, symbols).unwrap();
        store.resolve_parents(symbols, &ids).unwrap();
        store
            .insert_chunks(
                file_id,
                &[crate::types::Chunk {
                    content: format!("// File: {path} | Lines: 1-10\n{chunk_text}"),
                    start_line: 1,
                    end_line: 10,
                    symbol_names: symbols.iter().map(|s| s.name.clone()).collect(),
                    token_count: 10,
                }],
            )
            .unwrap();
        let bodies = ids
            .iter()
            .zip(symbols)
            .map(|(&id, s)| (id, s.body.clone()))
            .collect();
        (file_id, bodies)
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize_path("src/./a/../b.ts"), "src/b.ts");
        assert_eq!(normalize_path("./x.ts"), "x.ts");
        assert_eq!(normalize_path("a//b"), "a/b");
    }

    #[test]
    fn resolve_tries_extension_ladder() {
        let mut files = HashMap::new();
        files.insert("src/utils.ts".to_string(), 1i64);
        assert_eq!(
            resolve_import("src/app.ts", "./utils", &files),
            Some("src/utils.ts".to_string())
        );
    }

    #[test]
    fn resolve_js_specifier_falls_back_to_ts() {
        let mut files = HashMap::new();
        files.insert("src/b.ts".to_string(), 1i64);
        assert_eq!(
            resolve_import("src/a.ts", "./b.js", &files),
            Some("src/b.ts".to_string())
        );
    }

    #[test]
    fn resolve_index_barrel() {
        let mut files = HashMap::new();
        files.insert("src/lib/index.ts".to_string(), 1i64);
        assert_eq!(
            resolve_import("src/app.ts", "./lib", &files),
            Some("src/lib/index.ts".to_string())
        );
    }

    #[test]
    fn package_imports_do_not_resolve() {
        let mut files = HashMap::new();
        files.insert("react.ts".to_string(), 1i64);
        assert_eq!(resolve_import("src/app.ts", "react", &files), None);
    }

    #[test]
    fn import_and_call_edges_across_files() {
        let store = MetadataStore::in_memory().unwrap();

        let (b_id, b_bodies) = index_file(
            &store,
            "b.ts",
            &[make_symbol("foo", 1, 3)],
            "export function foo() {}",
        );
        let mut caller = make_symbol("caller", 1, 5);
        caller.body = "export function caller() { foo(); }".to_string();
        let (a_id, a_bodies) = index_file(
            &store,
            "a.ts",
            &[caller],
            "import { foo } from \"./b.js\";\nexport function caller() { foo(); }",
        );
        store.rebuild_fts().unwrap();

        let builder = GraphBuilder::new(&store);
        builder
            .build(&[
                ParsedFile {
                    file_id: a_id,
                    path: "a.ts".to_string(),
                    imports: vec![ImportDecl {
                        source: "./b.js".to_string(),
                        names: vec!["foo".to_string()],
                        line: 1,
                    }],
                    symbol_bodies: a_bodies,
                },
                ParsedFile {
                    file_id: b_id,
                    path: "b.ts".to_string(),
                    imports: vec![],
                    symbol_bodies: b_bodies,
                },
            ])
            .unwrap();

        // File dependency a -> b.
        assert_eq!(store.dependencies_of(a_id).unwrap(), vec![b_id]);

        let edges = store.all_edges().unwrap();
        let imports: Vec<&EdgeRecord> = edges
            .iter()
            .filter(|e| e.edge_type == EdgeKind::Imports)
            .collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].weight, 0.5);
        assert_eq!(imports[0].source_file_id, a_id);
        assert_eq!(imports[0].target_file_id, b_id);

        let calls: Vec<&EdgeRecord> = edges
            .iter()
            .filter(|e| e.edge_type == EdgeKind::Calls)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].weight, 1.0);
        assert_eq!(calls[0].source_file_id, a_id);
        assert_eq!(calls[0].target_file_id, b_id);
    }

    #[test]
    fn intra_file_calls_are_skipped() {
        let store = MetadataStore::in_memory().unwrap();
        let (file_id, bodies) = index_file(
            &store,
            "solo.ts",
            &[make_symbol("first", 1, 3), make_symbol("second", 5, 8)],
            "export function first() { second(); }\nexport function second() {}",
        );

        let builder = GraphBuilder::new(&store);
        builder
            .build(&[ParsedFile {
                file_id,
                path: "solo.ts".to_string(),
                imports: vec![],
                symbol_bodies: bodies,
            }])
            .unwrap();

        let calls = store
            .all_edges()
            .unwrap()
            .into_iter()
            .filter(|e| e.edge_type == EdgeKind::Calls)
            .count();
        assert_eq!(calls, 0);
    }

    #[test]
    fn short_names_produce_no_call_patterns() {
        let store = MetadataStore::in_memory().unwrap();
        let (b_id, b_bodies) =
            index_file(&store, "b.ts", &[make_symbol("f", 1, 3)], "export function f() {}");
        let (a_id, a_bodies) = index_file(
            &store,
            "a.ts",
            &[make_symbol("g", 1, 3)],
            "export function g() { f(); }",
        );

        let builder = GraphBuilder::new(&store);
        builder
            .build(&[
                ParsedFile {
                    file_id: a_id,
                    path: "a.ts".into(),
                    imports: vec![],
                    symbol_bodies: a_bodies,
                },
                ParsedFile {
                    file_id: b_id,
                    path: "b.ts".into(),
                    imports: vec![],
                    symbol_bodies: b_bodies,
                },
            ])
            .unwrap();

        assert!(store.all_edges().unwrap().is_empty());
    }
}
