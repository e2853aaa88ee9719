//! SQLite schema for the metadata store.
//!
//! DDL statements are kept as separate constants so each can be executed
//! individually with clear error reporting.

use rusqlite::Connection;

use crate::config::SCHEMA_VERSION;

// ---------------------------------------------------------------------------
// Core tables
// ---------------------------------------------------------------------------

const CREATE_SCHEMA_VERSION: &str = "\
CREATE TABLE IF NOT EXISTS schema_version (
  version INTEGER NOT NULL
)";

const CREATE_FILES: &str = "\
CREATE TABLE IF NOT EXISTS files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  path TEXT NOT NULL UNIQUE,
  language TEXT,
  size_bytes INTEGER NOT NULL DEFAULT 0,
  content_hash TEXT NOT NULL,
  last_indexed INTEGER NOT NULL DEFAULT (strftime('%s','now')),
  line_count INTEGER NOT NULL DEFAULT 0,
  purpose TEXT
)";

const CREATE_SYMBOLS: &str = "\
CREATE TABLE IF NOT EXISTS symbols (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  kind TEXT NOT NULL,
  signature TEXT,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL,
  start_column INTEGER NOT NULL DEFAULT 0,
  end_column INTEGER NOT NULL DEFAULT 0,
  parent_id INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
  docstring TEXT,
  exported INTEGER NOT NULL DEFAULT 0,
  importance REAL NOT NULL DEFAULT 0
)";

const CREATE_CHUNKS: &str = "\
CREATE TABLE IF NOT EXISTS chunks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
  chunk_index INTEGER NOT NULL,
  content TEXT NOT NULL,
  content_hash TEXT NOT NULL,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL,
  symbol_names TEXT NOT NULL DEFAULT '',
  token_count INTEGER NOT NULL DEFAULT 0
)";

const CREATE_GRAPH_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS graph_edges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source_symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
  target_symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
  edge_type TEXT NOT NULL,
  weight REAL NOT NULL DEFAULT 1.0,
  source_file_id INTEGER NOT NULL,
  target_file_id INTEGER NOT NULL,
  UNIQUE (source_symbol_id, target_symbol_id, edge_type)
)";

const CREATE_FILE_DEPENDENCIES: &str = "\
CREATE TABLE IF NOT EXISTS file_dependencies (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source_file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
  target_file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
  dependency_type TEXT NOT NULL DEFAULT 'imports',
  UNIQUE (source_file_id, target_file_id, dependency_type)
)";

const CREATE_SUMMARIES: &str = "\
CREATE TABLE IF NOT EXISTS summaries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  scope_type TEXT NOT NULL,
  scope_id TEXT NOT NULL,
  content TEXT NOT NULL,
  token_count INTEGER NOT NULL DEFAULT 0,
  UNIQUE (scope_type, scope_id)
)";

const CREATE_INDEX_STATE: &str = "\
CREATE TABLE IF NOT EXISTS index_state (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
)";

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_files_language ON files(language)",
    "CREATE INDEX IF NOT EXISTS idx_files_hash ON files(content_hash)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(content_hash)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON graph_edges(source_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON graph_edges(target_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type)",
];

// ---------------------------------------------------------------------------
// FTS5
// ---------------------------------------------------------------------------

// Both indexes are standalone FTS5 tables whose rowids mirror the base-table
// ids. They are repopulated by [`rebuild`] once per mutation batch instead of
// trigger-per-row, so bulk deletes stay cheap.

const CREATE_CHUNKS_FTS: &str = "\
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
  content, file_path, symbol_names,
  tokenize = 'porter unicode61'
)";

const CREATE_SYMBOLS_FTS: &str = "\
CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
  name, signature, docstring,
  tokenize = 'unicode61'
)";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the metadata database at `db_path` and apply the schema.
///
/// The returned connection has WAL mode, foreign keys, and synchronous
/// NORMAL already configured.
pub fn initialize_metadata_db(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_SCHEMA_VERSION)?;
    conn.execute_batch(CREATE_FILES)?;
    conn.execute_batch(CREATE_SYMBOLS)?;
    conn.execute_batch(CREATE_CHUNKS)?;
    conn.execute_batch(CREATE_GRAPH_EDGES)?;
    conn.execute_batch(CREATE_FILE_DEPENDENCIES)?;
    conn.execute_batch(CREATE_SUMMARIES)?;
    conn.execute_batch(CREATE_INDEX_STATE)?;

    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    conn.execute_batch(CREATE_CHUNKS_FTS)?;
    conn.execute_batch(CREATE_SYMBOLS_FTS)?;

    let existing: i64 =
        conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if existing == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    }

    Ok(conn)
}

/// Rebuild both full-text indexes from their base tables.
///
/// Called once after each mutation batch. After this, rows in
/// `chunks_fts`/`symbols_fts` reflect exactly the rows of `chunks`/`symbols`.
pub fn rebuild_fts(conn: &Connection) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "DELETE FROM chunks_fts;
         INSERT INTO chunks_fts (rowid, content, file_path, symbol_names)
         SELECT c.id, c.content, f.path, c.symbol_names
         FROM chunks c JOIN files f ON f.id = c.file_id;
         DELETE FROM symbols_fts;
         INSERT INTO symbols_fts (rowid, name, signature, docstring)
         SELECT s.id, s.name, COALESCE(s.signature, ''), COALESCE(s.docstring, '')
         FROM symbols s;",
    )?;
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
