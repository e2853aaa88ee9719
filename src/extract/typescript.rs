//! Symbol extraction for TypeScript, TSX, and JavaScript.

use tree_sitter::Node;

use crate::extract::{make_symbol, node_text, strip_quotes, Extraction};
use crate::types::{ImportDecl, SymbolKind};

pub(crate) fn extract(root: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        visit_top_level(child, source, false, out);
    }
}

fn visit_top_level(node: Node<'_>, source: &str, exported: bool, out: &mut Extraction) {
    match node.kind() {
        "export_statement" => {
            // `export function foo` / `export default class Bar` wrap the
            // declaration; unwrap and mark exported.
            if let Some(declaration) = node.child_by_field_name("declaration") {
                visit_top_level(declaration, source, true, out);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.symbols
                    .push(make_symbol(node, source, &name, SymbolKind::Function, None, exported));
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            extract_declarators(node, source, exported, out);
        }
        "class_declaration" => extract_class(node, source, exported, out),
        "interface_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.symbols.push(make_symbol(
                    node,
                    source,
                    &name,
                    SymbolKind::Interface,
                    None,
                    exported,
                ));
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.symbols
                    .push(make_symbol(node, source, &name, SymbolKind::Type, None, exported));
            }
        }
        "enum_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.symbols
                    .push(make_symbol(node, source, &name, SymbolKind::Enum, None, exported));
            }
        }
        "import_statement" => extract_import(node, source, out),
        _ => {}
    }
}

/// Arrow-function-valued declarators become function symbols.
fn extract_declarators(node: Node<'_>, source: &str, exported: bool, out: &mut Extraction) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(value) = declarator.child_by_field_name("value") else {
            continue;
        };
        if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
            continue;
        }
        if let Some(name) = name_of(declarator, source) {
            out.symbols
                .push(make_symbol(node, source, &name, SymbolKind::Function, None, exported));
        }
    }
}

fn extract_class(node: Node<'_>, source: &str, exported: bool, out: &mut Extraction) {
    let Some(class_name) = name_of(node, source) else {
        return;
    };
    out.symbols.push(make_symbol(
        node,
        source,
        &class_name,
        SymbolKind::Class,
        None,
        exported,
    ));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_definition" => {
                if let Some(name) = name_of(member, source) {
                    out.symbols.push(make_symbol(
                        member,
                        source,
                        &name,
                        SymbolKind::Method,
                        Some(&class_name),
                        exported,
                    ));
                }
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                if let Some(name) = name_of(member, source) {
                    out.symbols.push(make_symbol(
                        member,
                        source,
                        &name,
                        SymbolKind::Property,
                        Some(&class_name),
                        exported,
                    ));
                }
            }
            _ => {}
        }
    }
}

fn extract_import(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = strip_quotes(node_text(source_node, source));

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.named_children(&mut clause_cursor) {
            match clause_child.kind() {
                // `import foo from "./x"`
                "identifier" => names.push(node_text(clause_child, source).to_string()),
                // `import * as ns from "./x"`
                "namespace_import" => {
                    let mut ns_cursor = clause_child.walk();
                    for ns_child in clause_child.named_children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            names.push(node_text(ns_child, source).to_string());
                        }
                    }
                }
                // `import { a, b as c } from "./x"`
                "named_imports" => {
                    let mut named_cursor = clause_child.walk();
                    for spec in clause_child.named_children(&mut named_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name_node) = spec.child_by_field_name("name") {
                            names.push(node_text(name_node, source).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    out.imports.push(ImportDecl {
        source: specifier,
        names,
        line: node.start_position().row as u32 + 1,
    });
}

fn name_of(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::extract::extract;
    use crate::indexer::parser::SourceParser;
    use crate::types::{Language, SymbolKind};

    fn run(source: &str) -> crate::extract::Extraction {
        let parser = SourceParser::new();
        let tree = parser
            .parse(source, Language::TypeScript)
            .unwrap()
            .expect("typescript grammar");
        extract(&tree, source, Language::TypeScript)
    }

    #[test]
    fn extracts_exported_function() {
        let out = run("export function foo() { return 1; }\n");
        assert_eq!(out.symbols.len(), 1);
        let foo = &out.symbols[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.kind, SymbolKind::Function);
        assert!(foo.exported);
        assert_eq!(foo.start_line, 1);
        // The export wrapper is unwrapped before extraction; the signature
        // covers the declaration itself.
        assert_eq!(foo.signature.as_deref(), Some("function foo()"));
    }

    #[test]
    fn unexported_function_is_not_exported() {
        let out = run("function helper() {}\n");
        assert_eq!(out.symbols.len(), 1);
        assert!(!out.symbols[0].exported);
    }

    #[test]
    fn arrow_function_declarator_is_a_function() {
        let out = run("export const add = (a: number, b: number) => a + b;\n");
        assert_eq!(out.symbols.len(), 1);
        assert_eq!(out.symbols[0].name, "add");
        assert_eq!(out.symbols[0].kind, SymbolKind::Function);
        assert!(out.symbols[0].exported);
    }

    #[test]
    fn plain_const_is_not_extracted() {
        let out = run("const limit = 10;\n");
        assert!(out.symbols.is_empty());
    }

    #[test]
    fn class_members_have_class_parent() {
        let source = r#"
export class UserService {
    cache: Map<string, string> = new Map();

    getUser(id: number) {
        return this.cache.get(String(id));
    }
}
"#;
        let out = run(source);
        let names: Vec<(&str, SymbolKind, Option<&str>)> = out
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.parent_name.as_deref()))
            .collect();
        assert!(names.contains(&("UserService", SymbolKind::Class, None)));
        assert!(names.contains(&("getUser", SymbolKind::Method, Some("UserService"))));
        assert!(names.contains(&("cache", SymbolKind::Property, Some("UserService"))));
    }

    #[test]
    fn interface_type_and_enum() {
        let source = "\
export interface User { id: number; }
export type UserId = number;
export enum Color { Red, Green }
";
        let out = run(source);
        let kinds: Vec<(&str, SymbolKind)> = out
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert!(kinds.contains(&("User", SymbolKind::Interface)));
        assert!(kinds.contains(&("UserId", SymbolKind::Type)));
        assert!(kinds.contains(&("Color", SymbolKind::Enum)));
    }

    #[test]
    fn type_alias_signature_stops_at_line_end() {
        let out = run("type Pair = [number, number]\nconst other = 1;\n");
        let pair = out.symbols.iter().find(|s| s.name == "Pair").unwrap();
        assert_eq!(pair.signature.as_deref(), Some("type Pair = [number, number]"));
    }

    #[test]
    fn named_imports_are_collected() {
        let out = run("import { foo, bar as baz } from \"./utils.js\";\n");
        assert_eq!(out.imports.len(), 1);
        let import = &out.imports[0];
        assert_eq!(import.source, "./utils.js");
        assert_eq!(import.names, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(import.line, 1);
    }

    #[test]
    fn default_and_namespace_imports() {
        let out = run("import React from \"react\";\nimport * as path from \"./path\";\n");
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].names, vec!["React".to_string()]);
        assert_eq!(out.imports[1].names, vec!["path".to_string()]);
    }

    #[test]
    fn doc_comment_is_attached() {
        let source = "\
/** Greets a user by name. */
export function greet(name: string) { return name; }
";
        let out = run(source);
        assert_eq!(
            out.symbols[0].docstring.as_deref(),
            Some("Greets a user by name.")
        );
    }

    #[test]
    fn javascript_dialect_works_too() {
        let parser = SourceParser::new();
        let source = "export function foo() {}\nconst bar = () => 2;\n";
        let tree = parser
            .parse(source, Language::JavaScript)
            .unwrap()
            .expect("javascript grammar");
        let out = extract(&tree, source, Language::JavaScript);
        let names: Vec<&str> = out.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }
}
