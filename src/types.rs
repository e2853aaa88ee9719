//! Core domain types shared across the indexing pipeline and retriever.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Languages the indexer recognizes by file extension.
///
/// Only the subset for which [`Language::is_code`] returns `true` goes
/// through symbol extraction; the rest are indexed for text search only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Css,
    Json,
    Html,
    Yaml,
    Markdown,
}

impl Language {
    /// Map a lowercase file extension (without the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" | "pyw" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "css" => Some(Self::Css),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            "yml" | "yaml" => Some(Self::Yaml),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect the language for a relative path.
    ///
    /// Takes the lowercase suffix after the last dot of the basename. A
    /// basename that starts with a dot and has no further dot (`.gitignore`)
    /// has no extension and detects as `None`.
    pub fn detect(path: &str) -> Option<Self> {
        let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let dot = basename.rfind('.')?;
        if dot == 0 {
            return None;
        }
        Self::from_extension(&basename[dot + 1..].to_ascii_lowercase())
    }

    /// Whether this language goes through AST parsing and symbol extraction.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::TypeScript
                | Self::Tsx
                | Self::JavaScript
                | Self::Python
                | Self::Rust
                | Self::Go
                | Self::Java
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::Css => "css",
            Self::Json => "json",
            Self::Html => "html",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
        }
    }

    /// Parse from the stored string form.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "typescript" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "javascript" | "jsx" => Some(Self::JavaScript),
            "python" => Some(Self::Python),
            "rust" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            "java" => Some(Self::Java),
            "css" => Some(Self::Css),
            "json" => Some(Self::Json),
            "html" => Some(Self::Html),
            "yaml" | "yml" => Some(Self::Yaml),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SymbolKind
// ---------------------------------------------------------------------------

/// Kinds of symbols the extractor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Method,
    Property,
    Variable,
    Enum,
    Module,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Method => "method",
            Self::Property => "property",
            Self::Variable => "variable",
            Self::Enum => "enum",
            Self::Module => "module",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "type" => Some(Self::Type),
            "method" => Some(Self::Method),
            "property" | "field" => Some(Self::Property),
            "variable" => Some(Self::Variable),
            "enum" => Some(Self::Enum),
            "module" => Some(Self::Module),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

/// Kinds of edges in the symbol graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Calls,
    Imports,
    Extends,
    Implements,
    References,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::Imports => "imports",
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::References => "references",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(Self::Calls),
            "imports" => Some(Self::Imports),
            "extends" => Some(Self::Extends),
            "implements" => Some(Self::Implements),
            "references" => Some(Self::References),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Persistent records
// ---------------------------------------------------------------------------

/// A row of the `files` table.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub language: Option<Language>,
    pub size_bytes: u64,
    pub content_hash: String,
    pub last_indexed: i64,
    pub line_count: u32,
    pub purpose: Option<String>,
}

/// A row of the `symbols` table.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub id: i64,
    pub file_id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub parent_id: Option<i64>,
    pub docstring: Option<String>,
    pub exported: bool,
    pub importance: f64,
}

/// A row of the `chunks` table.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: i64,
    pub file_id: i64,
    pub chunk_index: u32,
    pub content: String,
    pub content_hash: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_names: String,
    pub token_count: u32,
}

/// A row of the `graph_edges` table.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub source_symbol_id: i64,
    pub target_symbol_id: i64,
    pub edge_type: EdgeKind,
    pub weight: f64,
    pub source_file_id: i64,
    pub target_file_id: i64,
}

/// Scope of a stored summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryScope {
    File,
    Directory,
    Project,
}

impl SummaryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Project => "project",
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction output (pre-persistence)
// ---------------------------------------------------------------------------

/// A symbol produced by the extractor, before it is assigned a database id.
#[derive(Debug, Clone)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub parent_name: Option<String>,
    pub docstring: Option<String>,
    pub exported: bool,
    /// Full body text, used for import-edge attribution. Not persisted.
    pub body: String,
}

/// An import declaration found in a source file.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// The module specifier as written (`./utils`, `fmt`, `os.path`).
    pub source: String,
    /// Names brought into scope, if the syntax lists them.
    pub names: Vec<String>,
    pub line: u32,
}

/// A chunk produced by the chunker, before it is assigned a database id.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_names: Vec<String>,
    pub token_count: u32,
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// Which underlying source produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Vector,
    Keyword,
    Symbol,
    Graph,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Symbol => "symbol",
            Self::Graph => "graph",
        }
    }
}

/// A ranked context excerpt returned to callers and formatters.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f64,
    pub match_type: MatchType,
    pub symbols: Vec<String>,
    pub language: Option<Language>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
