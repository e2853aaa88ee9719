//! AST-driven symbol and import extraction.
//!
//! One strategy per language family behind a single dispatch point; adding a
//! language means one strategy module and one extension-table entry. Each
//! strategy walks the tree-sitter AST directly and emits
//! [`ExtractedSymbol`]s in source order plus the file's import declarations.

use tree_sitter::{Node, Tree};

use crate::types::{ExtractedSymbol, ImportDecl, Language, SymbolKind};

mod go;
mod java;
mod python;
mod rust;
mod typescript;

/// Maximum signature length stored per symbol.
const MAX_SIGNATURE_LEN: usize = 200;

/// Everything extracted from one parsed file.
#[derive(Debug, Default)]
pub struct Extraction {
    pub symbols: Vec<ExtractedSymbol>,
    pub imports: Vec<ImportDecl>,
}

/// Extract symbols and imports from a parsed file.
///
/// Text-only languages produce an empty extraction.
pub fn extract(tree: &Tree, source: &str, language: Language) -> Extraction {
    let mut out = Extraction::default();
    let root = tree.root_node();
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            typescript::extract(root, source, &mut out)
        }
        Language::Python => python::extract(root, source, &mut out),
        Language::Rust => rust::extract(root, source, &mut out),
        Language::Go => go::extract(root, source, &mut out),
        Language::Java => java::extract(root, source, &mut out),
        _ => {}
    }
    out
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// The source text covered by a node.
pub(crate) fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Inclusive 1-based line range of a node.
pub(crate) fn line_range(node: Node<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// Build a symbol from a node with the shared positional fields filled in.
pub(crate) fn make_symbol(
    node: Node<'_>,
    source: &str,
    name: &str,
    kind: SymbolKind,
    parent_name: Option<&str>,
    exported: bool,
) -> ExtractedSymbol {
    let (start_line, end_line) = line_range(node);
    let body = node_text(node, source);
    ExtractedSymbol {
        name: name.to_string(),
        kind,
        signature: Some(signature_of(body, kind == SymbolKind::Type)),
        start_line,
        end_line,
        start_column: node.start_position().column as u32,
        end_column: node.end_position().column as u32,
        parent_name: parent_name.map(str::to_string),
        docstring: doc_before(node, source),
        exported,
        body: body.to_string(),
    }
}

/// Truncate node text at the first body opener (`{` or `=>`; also the first
/// newline for type aliases), capped at [`MAX_SIGNATURE_LEN`] characters.
pub(crate) fn signature_of(text: &str, stop_at_newline: bool) -> String {
    let mut cut = text.len();
    if let Some(pos) = text.find('{') {
        cut = cut.min(pos);
    }
    if let Some(pos) = text.find("=>") {
        cut = cut.min(pos);
    }
    if stop_at_newline {
        if let Some(pos) = text.find('\n') {
            cut = cut.min(pos);
        }
    }
    let mut signature = text[..cut].trim().to_string();
    if signature.len() > MAX_SIGNATURE_LEN {
        let boundary = (0..=MAX_SIGNATURE_LEN)
            .rev()
            .find(|&i| signature.is_char_boundary(i))
            .unwrap_or(0);
        signature.truncate(boundary);
    }
    signature
}

/// The comment block immediately preceding a node, markers stripped.
///
/// Contiguous comment siblings directly above the node (no blank line in
/// between) are merged, so multi-line `///` runs come back as one docstring.
pub(crate) fn doc_before(node: Node<'_>, source: &str) -> Option<String> {
    // Exported declarations are often wrapped (e.g. `export_statement`); the
    // doc comment sits before the wrapper.
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };

    let mut lines: Vec<String> = Vec::new();
    let mut expected_row = anchor.start_position().row;
    let mut current = anchor.prev_sibling();
    while let Some(sibling) = current {
        if !is_comment_kind(sibling.kind()) {
            break;
        }
        // Stop at the first gap: only comments touching the declaration (or
        // each other) count.
        if sibling.end_position().row + 1 < expected_row {
            break;
        }
        lines.push(strip_comment_markers(node_text(sibling, source)));
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn is_comment_kind(kind: &str) -> bool {
    matches!(kind, "comment" | "line_comment" | "block_comment" | "doc_comment")
}

/// Remove `//`, `///`, `#`, and `/* ... */` decoration, line by line.
pub(crate) fn strip_comment_markers(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("/**").unwrap_or(line);
            let line = line.strip_prefix("/*").unwrap_or(line);
            let line = line.strip_suffix("*/").unwrap_or(line);
            let line = line.trim();
            let line = line
                .strip_prefix("///")
                .or_else(|| line.strip_prefix("//"))
                .unwrap_or(line);
            let line = line.strip_prefix('*').unwrap_or(line);
            let line = line.strip_prefix('#').unwrap_or(line);
            line.trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Unwrap the surrounding quotes of a string-literal node's text.
pub(crate) fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
