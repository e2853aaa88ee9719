//! Typed CRUD layer over the metadata database.
//!
//! Every query goes through [`rusqlite::Connection::prepare_cached`], so the
//! first call compiles the statement and subsequent calls reuse it. Multi-row
//! mutations run inside `unchecked_transaction` batches; full-text index
//! rebuilds are deferred to one [`MetadataStore::rebuild_fts`] call per batch.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::store::schema::{initialize_metadata_db, rebuild_fts};
use crate::types::{
    Chunk, ChunkRecord, EdgeKind, EdgeRecord, ExtractedSymbol, FileRecord, Language, SummaryScope,
    SymbolKind, SymbolRecord,
};

// ---------------------------------------------------------------------------
// State keys
// ---------------------------------------------------------------------------

pub const STATE_LAST_INDEXED: &str = "last_indexed";
pub const STATE_LAST_FULL_INDEX: &str = "last_full_index";
pub const STATE_EMBEDDING_MODEL: &str = "embedding_model";
pub const STATE_TOTAL_FILES: &str = "total_files";
pub const STATE_TOTAL_CHUNKS: &str = "total_chunks";

// ---------------------------------------------------------------------------
// Row shapes used by the retriever
// ---------------------------------------------------------------------------

/// A chunk row joined with its ranked FTS score.
#[derive(Debug, Clone)]
pub struct ChunkFtsHit {
    pub chunk: ChunkRecord,
    pub rank: f64,
}

/// A symbol row joined with its ranked FTS score.
#[derive(Debug, Clone)]
pub struct SymbolFtsHit {
    pub symbol: SymbolRecord,
    pub rank: f64,
}

/// Aggregate table counts for `stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub files: usize,
    pub symbols: usize,
    pub chunks: usize,
    pub edges: usize,
    pub dependencies: usize,
}

// ---------------------------------------------------------------------------
// MetadataStore
// ---------------------------------------------------------------------------

/// The authoritative structured store: files, symbols, chunks, graph edges,
/// dependencies, summaries, state, and the two full-text indexes.
pub struct MetadataStore {
    pub conn: Connection,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore").finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = initialize_metadata_db(db_path)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Close the underlying connection, suppressing errors.
    pub fn close(self) {
        let _ = self.conn.close();
    }

    // -------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------

    /// Insert or update a file record, returning its id.
    pub fn upsert_file(
        &self,
        path: &str,
        language: Option<Language>,
        size_bytes: u64,
        content_hash: &str,
        line_count: u32,
    ) -> Result<i64> {
        self.conn
            .prepare_cached(
                "INSERT INTO files (path, language, size_bytes, content_hash, last_indexed, line_count)
                 VALUES (?1, ?2, ?3, ?4, strftime('%s','now'), ?5)
                 ON CONFLICT(path) DO UPDATE SET
                   language = excluded.language,
                   size_bytes = excluded.size_bytes,
                   content_hash = excluded.content_hash,
                   last_indexed = excluded.last_indexed,
                   line_count = excluded.line_count",
            )?
            .execute(params![
                path,
                language.map(|l| l.as_str()),
                size_bytes,
                content_hash,
                line_count,
            ])?;
        let id: i64 = self
            .conn
            .prepare_cached("SELECT id FROM files WHERE path = ?1")?
            .query_row([path], |row| row.get(0))?;
        Ok(id)
    }

    pub fn file_id_by_path(&self, path: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .prepare_cached("SELECT id FROM files WHERE path = ?1")?
            .query_row([path], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let record = self
            .conn
            .prepare_cached(
                "SELECT id, path, language, size_bytes, content_hash, last_indexed, line_count, purpose
                 FROM files WHERE id = ?1",
            )?
            .query_row([id], row_to_file)
            .optional()?;
        Ok(record)
    }

    pub fn all_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, path, language, size_bytes, content_hash, last_indexed, line_count, purpose
             FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], row_to_file)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Batch-load file records by id. Used by retrieval to avoid N+1 lookups.
    pub fn files_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, FileRecord>> {
        let mut map = HashMap::new();
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, path, language, size_bytes, content_hash, last_indexed, line_count, purpose
             FROM files WHERE id = ?1",
        )?;
        for &id in ids {
            if map.contains_key(&id) {
                continue;
            }
            if let Some(record) = stmt.query_row([id], row_to_file).optional()? {
                map.insert(id, record);
            }
        }
        Ok(map)
    }

    /// Map of path -> content hash for every persisted file.
    pub fn existing_hashes(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path, content_hash FROM files")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }

    /// Map of path -> size in bytes for every persisted file.
    pub fn existing_sizes(&self) -> Result<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path, size_bytes FROM files")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }

    /// Remove a file and everything hanging off it (cascade).
    ///
    /// Full-text rebuild is deferred; call [`Self::rebuild_fts`] after the
    /// batch. Vector rows are the caller's responsibility.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.conn
            .prepare_cached("DELETE FROM files WHERE path = ?1")?
            .execute([path])?;
        Ok(())
    }

    /// Clear a modified file's derived rows (symbols, chunks, edges,
    /// dependencies) while keeping the file row for upsert.
    pub fn delete_file_data(&self, file_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        // Edge endpoints cascade from symbols, but edges denormalize file ids
        // on both sides; clear edges touching this file explicitly.
        tx.execute(
            "DELETE FROM graph_edges WHERE source_file_id = ?1 OR target_file_id = ?1",
            [file_id],
        )?;
        tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM chunks WHERE file_id = ?1", [file_id])?;
        tx.execute(
            "DELETE FROM file_dependencies WHERE source_file_id = ?1 OR target_file_id = ?1",
            [file_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Wipe every table for a `--full` re-index.
    pub fn clear_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM graph_edges;
             DELETE FROM file_dependencies;
             DELETE FROM chunks;
             DELETE FROM symbols;
             DELETE FROM files;
             DELETE FROM summaries;
             DELETE FROM index_state;
             DELETE FROM chunks_fts;
             DELETE FROM symbols_fts;",
        )?;
        tx.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Symbols
    // -------------------------------------------------------------------

    /// Insert a file's symbols in one transaction, returning their new ids
    /// in input order. Parent links are resolved separately by
    /// [`Self::resolve_parents`] once all ids are known.
    pub fn insert_symbols(&self, file_id: i64, symbols: &[ExtractedSymbol]) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(symbols.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO symbols
                   (file_id, name, kind, signature, start_line, end_line,
                    start_column, end_column, docstring, exported)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for symbol in symbols {
                stmt.execute(params![
                    file_id,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.signature,
                    symbol.start_line,
                    symbol.end_line,
                    symbol.start_column,
                    symbol.end_column,
                    symbol.docstring,
                    symbol.exported as i64,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Resolve `parent_name` references against the file's top-level symbols.
    ///
    /// Only symbols without a parent of their own are candidate parents, so
    /// a nested sibling sharing the name cannot win.
    pub fn resolve_parents(
        &self,
        symbols: &[ExtractedSymbol],
        ids: &[i64],
    ) -> Result<()> {
        debug_assert_eq!(symbols.len(), ids.len());

        let mut top_level: HashMap<&str, i64> = HashMap::new();
        for (symbol, &id) in symbols.iter().zip(ids) {
            if symbol.parent_name.is_none() {
                top_level.entry(symbol.name.as_str()).or_insert(id);
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("UPDATE symbols SET parent_id = ?1 WHERE id = ?2")?;
            for (symbol, &id) in symbols.iter().zip(ids) {
                if let Some(parent_name) = symbol.parent_name.as_deref() {
                    if let Some(&parent_id) = top_level.get(parent_name) {
                        if parent_id != id {
                            stmt.execute(params![parent_id, id])?;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn symbols_for_file(&self, file_id: i64) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_id, name, kind, signature, start_line, end_line,
                    start_column, end_column, parent_id, docstring, exported, importance
             FROM symbols WHERE file_id = ?1 ORDER BY start_line, id",
        )?;
        let rows = stmt.query_map([file_id], row_to_symbol)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn all_symbols(&self) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_id, name, kind, signature, start_line, end_line,
                    start_column, end_column, parent_id, docstring, exported, importance
             FROM symbols ORDER BY file_id, start_line, id",
        )?;
        let rows = stmt.query_map([], row_to_symbol)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Batch-update importance scores inside one transaction.
    pub fn update_importance(&self, scores: &[(i64, f64)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("UPDATE symbols SET importance = ?1 WHERE id = ?2")?;
            for &(id, score) in scores {
                stmt.execute(params![score, id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Chunks
    // -------------------------------------------------------------------

    /// Insert a file's chunks in one per-file transaction, returning ids in
    /// chunk-index order.
    pub fn insert_chunks(&self, file_id: i64, chunks: &[Chunk]) -> Result<Vec<i64>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(chunks.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chunks
                   (file_id, chunk_index, content, content_hash, start_line, end_line,
                    symbol_names, token_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (index, chunk) in chunks.iter().enumerate() {
                stmt.execute(params![
                    file_id,
                    index as i64,
                    chunk.content,
                    crate::indexer::diff::hash_content(chunk.content.as_bytes()),
                    chunk.start_line,
                    chunk.end_line,
                    chunk.symbol_names.join(" "),
                    chunk.token_count,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn chunks_for_file(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_id, chunk_index, content, content_hash, start_line, end_line,
                    symbol_names, token_count
             FROM chunks WHERE file_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map([file_id], row_to_chunk)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -------------------------------------------------------------------
    // Graph edges and dependencies
    // -------------------------------------------------------------------

    /// Insert edges in a single batched transaction; duplicates on
    /// (source, target, type) are ignored.
    pub fn insert_edges(&self, edges: &[EdgeRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO graph_edges
                   (source_symbol_id, target_symbol_id, edge_type, weight,
                    source_file_id, target_file_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for edge in edges {
                inserted += stmt.execute(params![
                    edge.source_symbol_id,
                    edge.target_symbol_id,
                    edge.edge_type.as_str(),
                    edge.weight,
                    edge.source_file_id,
                    edge.target_file_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn all_edges(&self) -> Result<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT source_symbol_id, target_symbol_id, edge_type, weight,
                    source_file_id, target_file_id
             FROM graph_edges",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(2)?;
            Ok(EdgeRecord {
                source_symbol_id: row.get(0)?,
                target_symbol_id: row.get(1)?,
                edge_type: EdgeKind::from_str_loose(&kind).unwrap_or(EdgeKind::References),
                weight: row.get(3)?,
                source_file_id: row.get(4)?,
                target_file_id: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_file_dependency(
        &self,
        source_file_id: i64,
        target_file_id: i64,
        dependency_type: &str,
    ) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT OR IGNORE INTO file_dependencies
                   (source_file_id, target_file_id, dependency_type)
                 VALUES (?1, ?2, ?3)",
            )?
            .execute(params![source_file_id, target_file_id, dependency_type])?;
        Ok(())
    }

    pub fn dependencies_of(&self, source_file_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT target_file_id FROM file_dependencies WHERE source_file_id = ?1",
        )?;
        let rows = stmt.query_map([source_file_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Outgoing edges of a symbol, for dependency walks from the retriever.
    pub fn edges_from_symbol(&self, symbol_id: i64) -> Result<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT source_symbol_id, target_symbol_id, edge_type, weight,
                    source_file_id, target_file_id
             FROM graph_edges WHERE source_symbol_id = ?1",
        )?;
        let rows = stmt.query_map([symbol_id], |row| {
            let kind: String = row.get(2)?;
            Ok(EdgeRecord {
                source_symbol_id: row.get(0)?,
                target_symbol_id: row.get(1)?,
                edge_type: EdgeKind::from_str_loose(&kind).unwrap_or(EdgeKind::References),
                weight: row.get(3)?,
                source_file_id: row.get(4)?,
                target_file_id: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -------------------------------------------------------------------
    // Full-text search
    // -------------------------------------------------------------------

    /// Rebuild both FTS indexes from their base tables.
    pub fn rebuild_fts(&self) -> Result<()> {
        rebuild_fts(&self.conn)?;
        Ok(())
    }

    /// Query the chunk full-text index with a prebuilt MATCH expression.
    ///
    /// FTS5 syntax errors from hostile input are swallowed: the caller gets
    /// an empty result set, never an `Err`.
    pub fn search_chunks(&self, match_expr: &str, limit: usize) -> Result<Vec<ChunkFtsHit>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT c.id, c.file_id, c.chunk_index, c.content, c.content_hash,
                    c.start_line, c.end_line, c.symbol_names, c.token_count, f.rank
             FROM chunks_fts f
             JOIN chunks c ON c.id = f.rowid
             WHERE chunks_fts MATCH ?1
             ORDER BY f.rank
             LIMIT ?2",
        )?;
        let query = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok(ChunkFtsHit {
                chunk: row_to_chunk(row)?,
                rank: row.get(9)?,
            })
        });
        let rows = match query {
            Ok(rows) => rows,
            Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut hits = Vec::new();
        for row in rows {
            match row {
                Ok(hit) => hits.push(hit),
                Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(hits)
    }

    /// Query the symbol full-text index with a prebuilt MATCH expression.
    pub fn search_symbols(&self, match_expr: &str, limit: usize) -> Result<Vec<SymbolFtsHit>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.id, s.file_id, s.name, s.kind, s.signature, s.start_line, s.end_line,
                    s.start_column, s.end_column, s.parent_id, s.docstring, s.exported,
                    s.importance, f.rank
             FROM symbols_fts f
             JOIN symbols s ON s.id = f.rowid
             WHERE symbols_fts MATCH ?1
             ORDER BY f.rank
             LIMIT ?2",
        )?;
        let query = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok(SymbolFtsHit {
                symbol: row_to_symbol(row)?,
                rank: row.get(13)?,
            })
        });
        let rows = match query {
            Ok(rows) => rows,
            Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut hits = Vec::new();
        for row in rows {
            match row {
                Ok(hit) => hits.push(hit),
                Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(hits)
    }

    // -------------------------------------------------------------------
    // Summaries and state
    // -------------------------------------------------------------------

    pub fn upsert_summary(
        &self,
        scope: SummaryScope,
        scope_id: &str,
        content: &str,
        token_count: u32,
    ) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO summaries (scope_type, scope_id, content, token_count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(scope_type, scope_id) DO UPDATE SET
                   content = excluded.content,
                   token_count = excluded.token_count",
            )?
            .execute(params![scope.as_str(), scope_id, content, token_count])?;
        Ok(())
    }

    pub fn get_summary(&self, scope: SummaryScope, scope_id: &str) -> Result<Option<String>> {
        let content = self
            .conn
            .prepare_cached(
                "SELECT content FROM summaries WHERE scope_type = ?1 AND scope_id = ?2",
            )?
            .query_row(params![scope.as_str(), scope_id], |row| row.get(0))
            .optional()?;
        Ok(content)
    }

    pub fn set_file_purpose(&self, file_id: i64, purpose: &str) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE files SET purpose = ?1 WHERE id = ?2")?
            .execute(params![purpose, file_id])?;
        Ok(())
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO index_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?
            .execute(params![key, value])?;
        Ok(())
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .prepare_cached("SELECT value FROM index_state WHERE key = ?1")?
            .query_row([key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    // -------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.prepare_cached(sql)?.query_row([], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            files: count("SELECT COUNT(*) FROM files")?,
            symbols: count("SELECT COUNT(*) FROM symbols")?,
            chunks: count("SELECT COUNT(*) FROM chunks")?,
            edges: count("SELECT COUNT(*) FROM graph_edges")?,
            dependencies: count("SELECT COUNT(*) FROM file_dependencies")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let language: Option<String> = row.get(2)?;
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: language.as_deref().and_then(Language::from_str_loose),
        size_bytes: row.get(3)?,
        content_hash: row.get(4)?,
        last_indexed: row.get(5)?,
        line_count: row.get(6)?,
        purpose: row.get(7)?,
    })
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRecord> {
    let kind: String = row.get(3)?;
    Ok(SymbolRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        kind: SymbolKind::from_str_loose(&kind).unwrap_or(SymbolKind::Variable),
        signature: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        start_column: row.get(7)?,
        end_column: row.get(8)?,
        parent_id: row.get(9)?,
        docstring: row.get(10)?,
        exported: row.get::<_, i64>(11)? != 0,
        importance: row.get(12)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        chunk_index: row.get::<_, i64>(2)? as u32,
        content: row.get(3)?,
        content_hash: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        symbol_names: row.get(7)?,
        token_count: row.get::<_, i64>(8)? as u32,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;

    fn setup() -> MetadataStore {
        MetadataStore::in_memory().unwrap()
    }

    fn make_symbol(name: &str, kind: SymbolKind, start: u32, end: u32) -> ExtractedSymbol {
        ExtractedSymbol {
            name: name.to_string(),
            kind,
            signature: Some(format!("{kind} {name}")),
            start_line: start,
            end_line: end,
            start_column: 0,
            end_column: 1,
            parent_name: None,
            docstring: None,
            exported: true,
            body: format!("{name}() {{}}"),
        }
    }

    fn make_chunk(content: &str, start: u32, end: u32, names: &[&str]) -> Chunk {
        Chunk {
            content: content.to_string(),
            start_line: start,
            end_line: end,
            symbol_names: names.iter().map(|s| s.to_string()).collect(),
            token_count: (content.len() as f64 / 3.5).ceil() as u32,
        }
    }

    #[test]
    fn upsert_file_is_idempotent_on_path() {
        let store = setup();
        let id1 = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h1", 3)
            .unwrap();
        let id2 = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 12, "h2", 4)
            .unwrap();
        assert_eq!(id1, id2);

        let record = store.file_by_id(id1).unwrap().unwrap();
        assert_eq!(record.content_hash, "h2");
        assert_eq!(record.size_bytes, 12);
        assert_eq!(record.line_count, 4);
    }

    #[test]
    fn insert_symbols_returns_ids_in_order() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        let symbols = vec![
            make_symbol("foo", SymbolKind::Function, 1, 5),
            make_symbol("Bar", SymbolKind::Class, 7, 15),
        ];
        let ids = store.insert_symbols(file_id, &symbols).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let stored = store.symbols_for_file(file_id).unwrap();
        assert_eq!(stored[0].name, "foo");
        assert_eq!(stored[1].name, "Bar");
        assert_eq!(stored[1].kind, SymbolKind::Class);
    }

    #[test]
    fn resolve_parents_uses_top_level_symbols_only() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.py", Some(Language::Python), 10, "h", 30)
            .unwrap();

        let mut outer = make_symbol("Outer", SymbolKind::Class, 1, 20);
        outer.exported = true;
        // A method nested in Outer that shares a class name. It must not be
        // chosen as a parent.
        let mut decoy = make_symbol("Outer", SymbolKind::Method, 5, 8);
        decoy.parent_name = Some("Outer".to_string());
        let mut method = make_symbol("run", SymbolKind::Method, 10, 14);
        method.parent_name = Some("Outer".to_string());

        let symbols = vec![outer, decoy, method];
        let ids = store.insert_symbols(file_id, &symbols).unwrap();
        store.resolve_parents(&symbols, &ids).unwrap();

        let stored = store.symbols_for_file(file_id).unwrap();
        let outer_id = stored.iter().find(|s| s.kind == SymbolKind::Class).unwrap().id;
        let run = stored.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.parent_id, Some(outer_id));
        let decoy = stored
            .iter()
            .find(|s| s.kind == SymbolKind::Method && s.name == "Outer")
            .unwrap();
        assert_eq!(decoy.parent_id, Some(outer_id));
    }

    #[test]
    fn insert_chunks_orders_by_index() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        let chunks = vec![
            make_chunk("first", 1, 10, &["foo"]),
            make_chunk("second", 11, 20, &[]),
        ];
        let ids = store.insert_chunks(file_id, &chunks).unwrap();
        assert_eq!(ids.len(), 2);

        let stored = store.chunks_for_file(file_id).unwrap();
        assert_eq!(stored[0].chunk_index, 0);
        assert_eq!(stored[0].symbol_names, "foo");
        assert_eq!(stored[1].chunk_index, 1);
        assert_eq!(stored[1].symbol_names, "");
    }

    #[test]
    fn edges_are_unique_by_source_target_type() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        let ids = store
            .insert_symbols(
                file_id,
                &[
                    make_symbol("a", SymbolKind::Function, 1, 5),
                    make_symbol("b", SymbolKind::Function, 7, 10),
                ],
            )
            .unwrap();

        let edge = EdgeRecord {
            source_symbol_id: ids[0],
            target_symbol_id: ids[1],
            edge_type: EdgeKind::Calls,
            weight: 1.0,
            source_file_id: file_id,
            target_file_id: file_id,
        };
        let inserted = store.insert_edges(&[edge.clone(), edge]).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.all_edges().unwrap().len(), 1);
    }

    #[test]
    fn fts_search_finds_chunks_after_rebuild() {
        let store = setup();
        let file_id = store
            .upsert_file("src/auth.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        store
            .insert_chunks(
                file_id,
                &[make_chunk("function validateToken() { return true; }", 1, 3, &["validateToken"])],
            )
            .unwrap();
        store.rebuild_fts().unwrap();

        let hits = store.search_chunks("\"validateToken\"", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.file_id, file_id);
        // BM25 rank is negative (better = more negative).
        assert!(hits[0].rank <= 0.0);
    }

    #[test]
    fn fts_search_swallows_syntax_errors() {
        let store = setup();
        store.rebuild_fts().unwrap();
        // Unbalanced quote is an FTS5 syntax error.
        let hits = store.search_chunks("\"unterminated", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn delete_file_data_clears_derived_rows_but_keeps_file() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        let ids = store
            .insert_symbols(file_id, &[make_symbol("a", SymbolKind::Function, 1, 5)])
            .unwrap();
        store
            .insert_chunks(file_id, &[make_chunk("x", 1, 5, &[])])
            .unwrap();
        store
            .insert_edges(&[EdgeRecord {
                source_symbol_id: ids[0],
                target_symbol_id: ids[0],
                edge_type: EdgeKind::References,
                weight: 1.0,
                source_file_id: file_id,
                target_file_id: file_id,
            }])
            .unwrap();

        store.delete_file_data(file_id).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.symbols, 0);
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.edges, 0);
    }

    #[test]
    fn state_roundtrip() {
        let store = setup();
        store.set_state(STATE_TOTAL_FILES, "42").unwrap();
        assert_eq!(store.get_state(STATE_TOTAL_FILES).unwrap().as_deref(), Some("42"));
        store.set_state(STATE_TOTAL_FILES, "43").unwrap();
        assert_eq!(store.get_state(STATE_TOTAL_FILES).unwrap().as_deref(), Some("43"));
        assert_eq!(store.get_state("missing").unwrap(), None);
    }

    #[test]
    fn summary_upsert_replaces_content() {
        let store = setup();
        store
            .upsert_summary(SummaryScope::File, "src/a.ts", "first", 2)
            .unwrap();
        store
            .upsert_summary(SummaryScope::File, "src/a.ts", "second", 2)
            .unwrap();
        assert_eq!(
            store.get_summary(SummaryScope::File, "src/a.ts").unwrap().as_deref(),
            Some("second")
        );
    }

    #[test]
    fn update_importance_batch() {
        let store = setup();
        let file_id = store
            .upsert_file("src/a.ts", Some(Language::TypeScript), 10, "h", 20)
            .unwrap();
        let ids = store
            .insert_symbols(
                file_id,
                &[
                    make_symbol("a", SymbolKind::Function, 1, 5),
                    make_symbol("b", SymbolKind::Function, 7, 10),
                ],
            )
            .unwrap();
        store
            .update_importance(&[(ids[0], 1.0), (ids[1], 0.25)])
            .unwrap();

        let symbols = store.symbols_for_file(file_id).unwrap();
        assert_eq!(symbols[0].importance, 1.0);
        assert_eq!(symbols[1].importance, 0.25);
    }
}
