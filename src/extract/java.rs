//! Symbol extraction for Java.
//!
//! Classes carry their methods and fields as children. Exported means a
//! `public` modifier is present.

use tree_sitter::Node;

use crate::extract::{make_symbol, node_text, Extraction};
use crate::types::{ImportDecl, SymbolKind};

pub(crate) fn extract(root: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "class_declaration" => extract_class(child, source, out),
            "interface_declaration" => {
                if let Some(name) = name_of(child, source) {
                    out.symbols.push(make_symbol(
                        child,
                        source,
                        &name,
                        SymbolKind::Interface,
                        None,
                        is_public(child, source),
                    ));
                }
            }
            "enum_declaration" => {
                if let Some(name) = name_of(child, source) {
                    out.symbols.push(make_symbol(
                        child,
                        source,
                        &name,
                        SymbolKind::Enum,
                        None,
                        is_public(child, source),
                    ));
                }
            }
            "import_declaration" => extract_import(child, source, out),
            _ => {}
        }
    }
}

fn extract_class(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(class_name) = name_of(node, source) else {
        return;
    };
    out.symbols.push(make_symbol(
        node,
        source,
        &class_name,
        SymbolKind::Class,
        None,
        is_public(node, source),
    ));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = name_of(member, source) {
                    out.symbols.push(make_symbol(
                        member,
                        source,
                        &name,
                        SymbolKind::Method,
                        Some(&class_name),
                        is_public(member, source),
                    ));
                }
            }
            "field_declaration" => {
                // One field declaration may declare several variables.
                let mut field_cursor = member.walk();
                for declarator in member.named_children(&mut field_cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    if let Some(name) = name_of(declarator, source) {
                        out.symbols.push(make_symbol(
                            member,
                            source,
                            &name,
                            SymbolKind::Property,
                            Some(&class_name),
                            is_public(member, source),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

fn extract_import(node: Node<'_>, source: &str, out: &mut Extraction) {
    // `import java.util.List;` — the scoped identifier is the only named
    // child besides optional `static`.
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(child.kind(), "scoped_identifier" | "identifier") {
            let path = node_text(child, source).to_string();
            // `import java.io.*;` keeps `java.io` as the scoped identifier
            // with a separate asterisk token.
            let wildcard = node_text(node, source).contains('*');
            let leaf = path.rsplit('.').next().unwrap_or(&path);
            let names = if wildcard || leaf == "*" {
                Vec::new()
            } else {
                vec![leaf.to_string()]
            };
            out.imports.push(ImportDecl {
                source: path,
                names,
                line: node.start_position().row as u32 + 1,
            });
            return;
        }
    }
}

fn name_of(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

fn is_public(node: Node<'_>, source: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|child| {
        child.kind() == "modifiers" && node_text(child, source).contains("public")
    });
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
