//! Native tree-sitter parser wrapper.
//!
//! Grammars for the code languages are statically linked, so there is no
//! runtime grammar loading to fail. `SourceParser` carries no state:
//! tree-sitter's `Parser` is `!Send + !Sync`, so a fresh one is created per
//! call — `Parser::new()` is a single allocation and `set_language` is a
//! pointer swap.

use crate::error::{KnowledgeError, Result};
use crate::types::Language;

/// Thin wrapper around native tree-sitter parsing.
pub struct SourceParser;

impl SourceParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The statically-linked grammar for a language, or `None` for
    /// text-only languages that have no symbol extraction.
    #[must_use]
    pub fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::Css
            | Language::Json
            | Language::Html
            | Language::Yaml
            | Language::Markdown => None,
        }
    }

    /// Parse `content` with the grammar for `language`.
    ///
    /// Returns `Ok(None)` when the language has no grammar (the file stays
    /// text-searchable without symbols); `Err` on a genuine parse failure.
    pub fn parse(&self, content: &str, language: Language) -> Result<Option<tree_sitter::Tree>> {
        let Some(grammar) = Self::grammar_for(language) else {
            return Ok(None);
        };

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| KnowledgeError::Parse(format!("grammar version mismatch: {e}")))?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            KnowledgeError::Parse("tree-sitter returned no tree (timeout or cancellation)".into())
        })?;
        Ok(Some(tree))
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_typescript_returns_valid_tree() {
        let parser = SourceParser::new();
        let source = r#"
            export function greet(name: string): string {
                return `Hello, ${name}!`;
            }

            interface User {
                id: number;
            }
        "#;
        let tree = parser
            .parse(source, Language::TypeScript)
            .unwrap()
            .expect("typescript has a grammar");
        let root = tree.root_node();
        assert_eq!(root.kind(), "program");
        assert!(!root.has_error());
    }

    #[test]
    fn parse_python_returns_valid_tree() {
        let parser = SourceParser::new();
        let source = "def greet(name):\n    return f\"Hello, {name}!\"\n";
        let tree = parser
            .parse(source, Language::Python)
            .unwrap()
            .expect("python has a grammar");
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn parse_rust_returns_valid_tree() {
        let parser = SourceParser::new();
        let source = "pub fn add(a: i32, b: i32) -> i32 { a + b }\n";
        let tree = parser
            .parse(source, Language::Rust)
            .unwrap()
            .expect("rust has a grammar");
        assert_eq!(tree.root_node().kind(), "source_file");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn parse_go_returns_valid_tree() {
        let parser = SourceParser::new();
        let source = "package main\n\nfunc Add(a int, b int) int { return a + b }\n";
        let tree = parser
            .parse(source, Language::Go)
            .unwrap()
            .expect("go has a grammar");
        assert_eq!(tree.root_node().kind(), "source_file");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn parse_java_returns_valid_tree() {
        let parser = SourceParser::new();
        let source = "public class Main { public static void main(String[] args) {} }\n";
        let tree = parser
            .parse(source, Language::Java)
            .unwrap()
            .expect("java has a grammar");
        assert_eq!(tree.root_node().kind(), "program");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn text_languages_have_no_grammar() {
        let parser = SourceParser::new();
        for lang in [
            Language::Css,
            Language::Json,
            Language::Html,
            Language::Yaml,
            Language::Markdown,
        ] {
            assert!(parser.parse("anything", lang).unwrap().is_none());
        }
    }

    #[test]
    fn parse_empty_source_returns_tree() {
        let parser = SourceParser::new();
        let tree = parser.parse("", Language::TypeScript).unwrap().unwrap();
        assert_eq!(tree.root_node().child_count(), 0);
    }
}
