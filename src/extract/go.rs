//! Symbol extraction for Go.
//!
//! Type declarations specialize on the underlying type: struct maps to
//! class, interface to interface, anything else to a type alias. Exported
//! follows Go's capitalization rule.

use tree_sitter::Node;

use crate::extract::{make_symbol, node_text, strip_quotes, Extraction};
use crate::types::{ImportDecl, SymbolKind};

pub(crate) fn extract(root: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name) = name_of(child, source) {
                    out.symbols.push(make_symbol(
                        child,
                        source,
                        &name,
                        SymbolKind::Function,
                        None,
                        is_exported(&name),
                    ));
                }
            }
            "method_declaration" => extract_method(child, source, out),
            "type_declaration" => extract_types(child, source, out),
            "import_declaration" => extract_imports(child, source, out),
            _ => {}
        }
    }
}

fn extract_method(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(name) = name_of(node, source) else {
        return;
    };
    let parent = node
        .child_by_field_name("receiver")
        .map(|receiver| receiver_type_name(receiver, source));
    out.symbols.push(make_symbol(
        node,
        source,
        &name,
        SymbolKind::Method,
        parent.as_deref(),
        is_exported(&name),
    ));
}

/// `func (s *Server) Run()` — the receiver type is `Server`, stripped of
/// pointer and parentheses.
fn receiver_type_name(receiver: Node<'_>, source: &str) -> String {
    node_text(receiver, source)
        .trim_matches(['(', ')'])
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_matches(['*', '(', ')'])
        .to_string()
}

fn extract_types(node: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if !matches!(spec.kind(), "type_spec" | "type_alias") {
            continue;
        }
        let Some(name) = name_of(spec, source) else {
            continue;
        };
        let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
            Some("struct_type") => SymbolKind::Class,
            Some("interface_type") => SymbolKind::Interface,
            _ => SymbolKind::Type,
        };
        let mut symbol = make_symbol(spec, source, &name, kind, None, is_exported(&name));
        // A doc comment on `type Foo struct` sits before the declaration
        // node, not the inner spec.
        if symbol.docstring.is_none() {
            symbol.docstring = crate::extract::doc_before(node, source);
        }
        out.symbols.push(symbol);
    }
}

fn extract_imports(node: Node<'_>, source: &str, out: &mut Extraction) {
    let mut specs = Vec::new();
    collect_import_specs(node, &mut specs);
    for spec in specs {
        let Some(path_node) = spec.child_by_field_name("path") else {
            continue;
        };
        let path = strip_quotes(node_text(path_node, source));
        let name = spec
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .or_else(|| path.rsplit('/').next().map(str::to_string));
        out.imports.push(ImportDecl {
            source: path,
            names: name.into_iter().collect(),
            line: spec.start_position().row as u32 + 1,
        });
    }
}

fn collect_import_specs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "import_spec" {
            out.push(child);
        } else if child.kind() == "import_spec_list" {
            collect_import_specs(child, out);
        }
    }
}

fn name_of(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
