//! Symbol extraction for Rust.
//!
//! Struct items map to class, enum items to enum, trait items to interface.
//! Functions inside an `impl` block become methods with the impl target type
//! as parent. Exported means a visibility modifier is present.

use tree_sitter::Node;

use crate::extract::{make_symbol, node_text, Extraction};
use crate::types::{ImportDecl, SymbolKind};

pub(crate) fn extract(root: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        visit(child, source, out);
    }
}

fn visit(node: Node<'_>, source: &str, out: &mut Extraction) {
    match node.kind() {
        "function_item" => {
            if let Some(name) = name_of(node, source) {
                out.symbols.push(make_symbol(
                    node,
                    source,
                    &name,
                    SymbolKind::Function,
                    None,
                    has_visibility(node),
                ));
            }
        }
        "struct_item" => {
            if let Some(name) = name_of(node, source) {
                out.symbols.push(make_symbol(
                    node,
                    source,
                    &name,
                    SymbolKind::Class,
                    None,
                    has_visibility(node),
                ));
            }
        }
        "enum_item" => {
            if let Some(name) = name_of(node, source) {
                out.symbols.push(make_symbol(
                    node,
                    source,
                    &name,
                    SymbolKind::Enum,
                    None,
                    has_visibility(node),
                ));
            }
        }
        "trait_item" => {
            if let Some(name) = name_of(node, source) {
                out.symbols.push(make_symbol(
                    node,
                    source,
                    &name,
                    SymbolKind::Interface,
                    None,
                    has_visibility(node),
                ));
            }
        }
        "impl_item" => extract_impl(node, source, out),
        "use_declaration" => extract_use(node, source, out),
        "mod_item" => {
            // Inline modules: recurse into the body so nested items are seen.
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    visit(child, source, out);
                }
            }
        }
        _ => {}
    }
}

/// Functions of an impl block are methods parented by the impl target type.
fn extract_impl(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let target = impl_target_name(node_text(type_node, source));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "function_item" {
            continue;
        }
        if let Some(name) = name_of(member, source) {
            out.symbols.push(make_symbol(
                member,
                source,
                &name,
                SymbolKind::Method,
                Some(&target),
                has_visibility(member),
            ));
        }
    }
}

fn extract_use(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    let path = node_text(argument, source);
    out.imports.push(ImportDecl {
        source: path.to_string(),
        names: use_leaf_names(path),
        line: node.start_position().row as u32 + 1,
    });
}

fn name_of(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

fn has_visibility(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .any(|child| child.kind() == "visibility_modifier");
    result
}

/// `Foo<T>` -> `Foo`, `&mut Foo` -> `Foo`.
fn impl_target_name(text: &str) -> String {
    let text = text.trim_start_matches(['&', ' ']).trim_start_matches("mut ");
    match text.find('<') {
        Some(pos) => text[..pos].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Leaf identifiers of a use path: `a::b::{C, D}` -> [C, D],
/// `a::b::C` -> [C], `a::B as Alias` -> [Alias], `a::*` -> [].
fn use_leaf_names(path: &str) -> Vec<String> {
    let path = path.trim().trim_end_matches(';');

    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        return path[open + 1..close]
            .split(',')
            .flat_map(use_leaf_names)
            .collect();
    }

    if let Some(alias) = path.rsplit(" as ").next().filter(|_| path.contains(" as ")) {
        return vec![alias.trim().to_string()];
    }

    let leaf = path.rsplit("::").next().unwrap_or(path).trim();
    if leaf.is_empty() || leaf == "*" || leaf == "self" {
        return Vec::new();
    }
    vec![leaf.to_string()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
