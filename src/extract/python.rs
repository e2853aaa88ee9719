//! Symbol extraction for Python.
//!
//! Exported means "name does not start with an underscore". Docstrings come
//! from the first string expression of a definition's body, not from
//! preceding comments.

use tree_sitter::Node;

use crate::extract::{line_range, node_text, signature_of, Extraction};
use crate::types::{ExtractedSymbol, ImportDecl, SymbolKind};

pub(crate) fn extract(root: Node<'_>, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        visit(child, source, None, out);
    }
}

fn visit(node: Node<'_>, source: &str, class_name: Option<&str>, out: &mut Extraction) {
    match node.kind() {
        "function_definition" => {
            extract_function(node, source, class_name, out);
        }
        "class_definition" => extract_class(node, source, out),
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                visit(definition, source, class_name, out);
            }
        }
        "import_statement" => extract_import(node, source, out),
        "import_from_statement" => extract_from_import(node, source, out),
        _ => {}
    }
}

fn extract_function(
    node: Node<'_>,
    source: &str,
    class_name: Option<&str>,
    out: &mut Extraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let kind = if class_name.is_some() {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    out.symbols.push(make_python_symbol(
        node,
        source,
        &name,
        kind,
        class_name,
        body_docstring(node, source),
    ));
}

fn extract_class(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = node_text(name_node, source).to_string();
    out.symbols.push(make_python_symbol(
        node,
        source,
        &class_name,
        SymbolKind::Class,
        None,
        body_docstring(node, source),
    ));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "function_definition" => extract_function(member, source, Some(&class_name), out),
            "decorated_definition" => {
                if let Some(definition) = member.child_by_field_name("definition") {
                    if definition.kind() == "function_definition" {
                        extract_function(definition, source, Some(&class_name), out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn make_python_symbol(
    node: Node<'_>,
    source: &str,
    name: &str,
    kind: SymbolKind,
    parent_name: Option<&str>,
    docstring: Option<String>,
) -> ExtractedSymbol {
    let (start_line, end_line) = line_range(node);
    let body = node_text(node, source);
    ExtractedSymbol {
        name: name.to_string(),
        kind,
        // Python has no brace opener; the def/class header line is the
        // signature.
        signature: Some(signature_of(body, true)),
        start_line,
        end_line,
        start_column: node.start_position().column as u32,
        end_column: node.end_position().column as u32,
        parent_name: parent_name.map(str::to_string),
        docstring,
        exported: !name.starts_with('_'),
        body: body.to_string(),
    }
}

/// The string expression that is the first statement of a definition body.
fn body_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = node_text(expr, source);
    let stripped = raw
        .trim_start_matches(['r', 'b', 'f', 'u', 'R', 'B', 'F', 'U'])
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// `import a.b, c` — one declaration per dotted name.
fn extract_import(node: Node<'_>, source: &str, out: &mut Extraction) {
    let line = node.start_position().row as u32 + 1;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let dotted = node_text(child, source);
                out.imports.push(ImportDecl {
                    source: dotted.to_string(),
                    names: dotted.rsplit('.').next().map(str::to_string).into_iter().collect(),
                    line,
                });
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, source).to_string());
                out.imports.push(ImportDecl {
                    source: node_text(name_node, source).to_string(),
                    names: alias.into_iter().collect(),
                    line,
                });
            }
            _ => {}
        }
    }
}

/// `from a.b import c, d as e` — one declaration listing the imported names.
fn extract_from_import(node: Node<'_>, source: &str, out: &mut Extraction) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return;
    };
    let module_name = node_text(module, source).to_string();

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        // The module itself is also a dotted_name child; skip it.
        if child.id() == module.id() {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => {
                names.push(node_text(child, source).to_string());
            }
            "aliased_import" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    names.push(node_text(name_node, source).to_string());
                }
            }
            "wildcard_import" => {}
            _ => {}
        }
    }

    out.imports.push(ImportDecl {
        source: module_name,
        names,
        line: node.start_position().row as u32 + 1,
    });
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
            .parse(source, Language::Python)
            .unwrap()
            .expect("python grammar");
        extract(&tree, source, Language::Python)
    }

    #[test]
    fn extracts_top_level_function() {
        let out = run("def greet(name):\n    return name\n");
        assert_eq!(out.symbols.len(), 1);
        let greet = &out.symbols[0];
        assert_eq!(greet.name, "greet");
        assert_eq!(greet.kind, SymbolKind::Function);
        assert!(greet.exported);
        assert_eq!(greet.signature.as_deref(), Some("def greet(name):"));
    }

    #[test]
    fn underscore_names_are_private() {
        let out = run("def _helper():\n    pass\n");
        assert!(!out.symbols[0].exported);
    }

    #[test]
    fn class_methods_get_class_parent() {
        let source = "\
class Calculator:
    def add(self, a, b):
        return a + b

    def _internal(self):
        pass
";
        let out = run(source);
        let calc = out.symbols.iter().find(|s| s.name == "Calculator").unwrap();
        assert_eq!(calc.kind, SymbolKind::Class);

        let add = out.symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Method);
        assert_eq!(add.parent_name.as_deref(), Some("Calculator"));

        let internal = out.symbols.iter().find(|s| s.name == "_internal").unwrap();
        assert!(!internal.exported);
    }

    #[test]
    fn docstring_is_first_body_string() {
        let source = "\
def process(data):
    \"\"\"Normalize and validate the payload.\"\"\"
    return data
";
        let out = run(source);
        assert_eq!(
            out.symbols[0].docstring.as_deref(),
            Some("Normalize and validate the payload.")
        );
    }

    #[test]
    fn function_without_docstring_has_none() {
        let out = run("def f():\n    x = 'not a docstring in assignment'\n    return x\n");
        assert_eq!(out.symbols[0].docstring, None);
    }

    #[test]
    fn decorated_function_is_extracted() {
        let source = "\
@cached
def expensive():
    return 42
";
        let out = run(source);
        assert_eq!(out.symbols.len(), 1);
        assert_eq!(out.symbols[0].name, "expensive");
    }

    #[test]
    fn plain_imports() {
        let out = run("import os\nimport os.path\n");
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].source, "os");
        assert_eq!(out.imports[1].source, "os.path");
        assert_eq!(out.imports[1].names, vec!["path".to_string()]);
    }

    #[test]
    fn from_imports_list_names() {
        let out = run("from collections import OrderedDict, defaultdict\n");
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].source, "collections");
        assert_eq!(
            out.imports[0].names,
            vec!["OrderedDict".to_string(), "defaultdict".to_string()]
        );
    }
}
