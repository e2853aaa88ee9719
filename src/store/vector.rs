//! Dense-vector store backed by sqlite-vec.
//!
//! Lives in its own database file under `<dataDir>/vectors/` with a single
//! `chunks` virtual table. The metadata store is authoritative; vector rows
//! are a cache keyed by chunk id, evicted per file on re-index or removal.

use std::path::Path;
use std::sync::Once;

use rusqlite::{params, Connection};

use crate::error::{KnowledgeError, Result};

static LOAD_VEC_EXTENSION: Once = Once::new();

/// Register sqlite-vec via `sqlite3_auto_extension` so every connection
/// opened afterwards has vec0 available. Must run before the first open.
#[allow(clippy::missing_transmute_annotations)]
fn load_sqlite_vec_extension() {
    LOAD_VEC_EXTENSION.call_once(|| {
        use rusqlite::ffi::sqlite3_auto_extension;
        use sqlite_vec::sqlite3_vec_init;

        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
        }
    });
}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

/// A chunk embedding staged for insertion.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub chunk_id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_names: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor hit. `distance` is non-negative; smaller is closer.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_names: String,
    pub content: String,
    pub distance: f64,
}

// ---------------------------------------------------------------------------
// VectorStore
// ---------------------------------------------------------------------------

/// Long-lived connection to the vector database, reused across retrieval
/// calls and closed on teardown.
pub struct VectorStore {
    conn: Connection,
    dimensions: usize,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open (or create) the vector database inside `dir`.
    pub fn open(dir: &Path, dimensions: usize) -> Result<Self> {
        load_sqlite_vec_extension();
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join("vectors.db"))?;
        let store = Self { conn, dimensions };
        store.ensure_table()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        load_sqlite_vec_extension();
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, dimensions };
        store.ensure_table()?;
        Ok(store)
    }

    /// Close the underlying connection, suppressing errors.
    pub fn close(self) {
        let _ = self.conn.close();
    }

    fn table_ddl(&self) -> String {
        // chunk_id / file_id / file_path / language are metadata columns so
        // they can appear in KNN predicates and deletes; the rest are
        // auxiliary (retrieval-only) columns.
        format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks USING vec0(
               embedding float[{}],
               chunk_id integer,
               file_id integer,
               file_path text,
               language text,
               +start_line integer,
               +end_line integer,
               +symbol_names text,
               +content text
             )",
            self.dimensions
        )
    }

    fn ensure_table(&self) -> Result<()> {
        self.conn.execute_batch(&self.table_ddl())?;
        Ok(())
    }

    /// Drop and recreate the table. Used by full re-indexing.
    pub fn recreate_table(&self) -> Result<()> {
        self.conn.execute_batch("DROP TABLE IF EXISTS chunks")?;
        self.ensure_table()
    }

    /// Append a batch of rows inside one transaction.
    pub fn insert(&self, rows: &[VectorRow]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chunks
                   (embedding, chunk_id, file_id, file_path, language,
                    start_line, end_line, symbol_names, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                if row.embedding.len() != self.dimensions {
                    return Err(KnowledgeError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: row.embedding.len(),
                    });
                }
                let vec_json = serde_json::to_string(&row.embedding)?;
                stmt.execute(params![
                    vec_json,
                    row.chunk_id,
                    row.file_id,
                    row.file_path,
                    row.language.as_deref().unwrap_or(""),
                    row.start_line,
                    row.end_line,
                    row.symbol_names,
                    row.content,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Evict every row belonging to a file path.
    pub fn delete_by_file_path(&self, file_path: &str) -> Result<usize> {
        let deleted = self
            .conn
            .prepare_cached("DELETE FROM chunks WHERE file_path = ?1")?
            .execute([file_path])?;
        Ok(deleted)
    }

    /// K-nearest-neighbor query, optionally restricted to a language.
    ///
    /// The language value is interpolated into the predicate (sqlite-vec
    /// metadata filters), so it is sanitized to `[A-Za-z0-9_-]` first.
    pub fn query(
        &self,
        embedding: &[f32],
        k: usize,
        language: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        if embedding.len() != self.dimensions {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        let vec_json = serde_json::to_string(embedding)?;

        let mut sql = String::from(
            "SELECT chunk_id, file_id, file_path, language,
                    start_line, end_line, symbol_names, content, distance
             FROM chunks
             WHERE embedding MATCH ?1 AND k = ?2",
        );
        if let Some(lang) = language {
            sql.push_str(" AND language = ");
            sql.push_str(&sanitize_language(lang));
        }
        sql.push_str(" ORDER BY distance");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![vec_json, k as i64], |row| {
            let language: String = row.get(3)?;
            Ok(VectorHit {
                chunk_id: row.get(0)?,
                file_id: row.get(1)?,
                file_path: row.get(2)?,
                language: if language.is_empty() { None } else { Some(language) },
                start_line: row.get::<_, i64>(4)? as u32,
                end_line: row.get::<_, i64>(5)? as u32,
                symbol_names: row.get(6)?,
                content: row.get(7)?,
                distance: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM chunks")?
            .query_row([], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Strip everything outside `[A-Za-z0-9_-]` and wrap in single quotes.
fn sanitize_language(language: &str) -> String {
    let clean: String = language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("'{clean}'")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: usize = 4;

    fn make_row(chunk_id: i64, file_path: &str, language: &str, embedding: [f32; 4]) -> VectorRow {
        VectorRow {
            chunk_id,
            file_id: 1,
            file_path: file_path.to_string(),
            language: Some(language.to_string()),
            start_line: 1,
            end_line: 10,
            symbol_names: "foo".to_string(),
            content: "function foo() {}".to_string(),
            embedding: embedding.to_vec(),
        }
    }

    #[test]
    fn sanitize_language_strips_hostile_chars() {
        assert_eq!(sanitize_language("typescript"), "'typescript'");
        assert_eq!(sanitize_language("ty' OR 1=1 --"), "'tyOR11--'");
        assert_eq!(sanitize_language(""), "''");
    }

    #[test]
    fn insert_and_query_returns_nearest_first() {
        let store = VectorStore::in_memory(DIMS).unwrap();
        store
            .insert(&[
                make_row(1, "a.ts", "typescript", [1.0, 0.0, 0.0, 0.0]),
                make_row(2, "b.ts", "typescript", [0.0, 1.0, 0.0, 0.0]),
            ])
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, 1);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[0].distance >= 0.0);
    }

    #[test]
    fn language_predicate_filters_results() {
        let store = VectorStore::in_memory(DIMS).unwrap();
        store
            .insert(&[
                make_row(1, "a.ts", "typescript", [1.0, 0.0, 0.0, 0.0]),
                make_row(2, "b.py", "python", [1.0, 0.1, 0.0, 0.0]),
            ])
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0, 0.0, 0.0], 5, Some("python"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, 2);
    }

    #[test]
    fn delete_by_file_path_evicts_rows() {
        let store = VectorStore::in_memory(DIMS).unwrap();
        store
            .insert(&[
                make_row(1, "a.ts", "typescript", [1.0, 0.0, 0.0, 0.0]),
                make_row(2, "a.ts", "typescript", [0.0, 1.0, 0.0, 0.0]),
                make_row(3, "b.ts", "typescript", [0.0, 0.0, 1.0, 0.0]),
            ])
            .unwrap();

        let deleted = store.delete_by_file_path("a.ts").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn recreate_table_drops_all_rows() {
        let store = VectorStore::in_memory(DIMS).unwrap();
        store
            .insert(&[make_row(1, "a.ts", "typescript", [1.0, 0.0, 0.0, 0.0])])
            .unwrap();
        store.recreate_table().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let store = VectorStore::in_memory(DIMS).unwrap();
        let mut row = make_row(1, "a.ts", "typescript", [1.0, 0.0, 0.0, 0.0]);
        row.embedding = vec![1.0, 0.0];
        let err = store.insert(&[row]).unwrap_err();
        assert!(matches!(err, KnowledgeError::DimensionMismatch { .. }));

        let err = store.query(&[1.0], 3, None).unwrap_err();
        assert!(matches!(err, KnowledgeError::DimensionMismatch { .. }));
    }
}
