//! End-to-end: init on disk, index a small mixed-language repo, search,
//! modify, re-index.

use std::fs;

use repo_knowledge::chunker::estimate_tokens;
use repo_knowledge::config::IndexConfig;
use repo_knowledge::embedding::EmbeddingProvider;
use repo_knowledge::error::Result;
use repo_knowledge::indexer::{Pipeline, PipelineOptions};
use repo_knowledge::retriever::budget::apply_token_budget;
use repo_knowledge::retriever::{Retriever, SearchMode, SearchOptions};
use repo_knowledge::store::{MetadataStore, VectorStore};

const DIMS: usize = 384;

/// Deterministic embedding provider so tests never touch a real model.
struct HashProvider {
    dims: usize,
}

impl EmbeddingProvider for HashProvider {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dims];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % self.dims] += byte as f32 / 255.0;
                }
                let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut vector {
                        *v /= norm;
                    }
                }
                vector
            })
            .collect())
    }

    fn dispose(&mut self) {}

    fn model_id(&self) -> &str {
        "test/hash-provider"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

struct Workspace {
    _tmp: tempfile::TempDir,
    config: IndexConfig,
    meta: MetadataStore,
    vectors: VectorStore,
    provider: HashProvider,
}

impl Workspace {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexConfig::initialize(tmp.path(), false).unwrap();
        let meta = MetadataStore::open(&config.metadata_db_path().to_string_lossy()).unwrap();
        let vectors = VectorStore::open(&config.vectors_dir(), DIMS).unwrap();
        Self {
            _tmp: tmp,
            config,
            meta,
            vectors,
            provider: HashProvider { dims: DIMS },
        }
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.config.project_root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    fn index(&mut self, options: PipelineOptions) -> repo_knowledge::indexer::IndexReport {
        let pipeline = Pipeline::new(&self.config, &self.meta, &self.vectors);
        pipeline
            .run(&mut self.provider, options, &mut |_, _| {})
            .unwrap()
    }
}

fn sample_repo(ws: &Workspace) {
    ws.write(
        "src/auth.ts",
        r#"import { hashPassword } from "./crypto.js";

/** Validates a login attempt against stored credentials. */
export function authenticate(user: string, password: string): boolean {
    return hashPassword(password) === lookup(user);
}

function lookup(user: string): string {
    return user;
}
"#,
    );
    ws.write(
        "src/crypto.ts",
        r#"export function hashPassword(input: string): string {
    return input.split("").reverse().join("");
}
"#,
    );
    ws.write(
        "tools/report.py",
        r#"class ReportBuilder:
    """Accumulates rows and renders a text report."""

    def add_row(self, row):
        self.rows.append(row)

    def render(self):
        return "\n".join(self.rows)
"#,
    );
    ws.write("README.md", "# Sample\n\nA tiny fixture repository.\n");
}

#[test]
fn full_cycle_index_and_search() {
    let mut ws = Workspace::new();
    sample_repo(&ws);

    let report = ws.index(PipelineOptions::default());
    assert_eq!(report.added, 4);
    assert_eq!(report.total_files, 4);
    assert!(report.total_chunks >= 4);

    // Keyword search lands on the auth chunk.
    let retriever = Retriever::new(&ws.meta, &ws.vectors, &ws.provider);
    let results = retriever.search(
        "authenticate password",
        &SearchOptions {
            mode: SearchMode::Keyword,
            ..Default::default()
        },
    );
    assert!(!results.is_empty());
    assert!(results.iter().any(|r| r.file_path == "src/auth.ts"));

    // Symbol search knows the python method.
    let results = retriever.search(
        "add_row",
        &SearchOptions {
            mode: SearchMode::Symbol,
            ..Default::default()
        },
    );
    assert!(results.iter().any(|r| r.file_path == "tools/report.py"));

    // Hybrid returns something under a budget.
    let results = retriever.search("hash password reverse", &SearchOptions::default());
    let budgeted = apply_token_budget(results, 4000, 10);
    let total: usize = budgeted
        .iter()
        .map(|r| estimate_tokens(&r.content) as usize + 20)
        .sum();
    assert!(total <= 4000);
}

#[test]
fn cross_file_graph_and_importance() {
    let mut ws = Workspace::new();
    sample_repo(&ws);
    ws.index(PipelineOptions::default());

    let auth_id = ws.meta.file_id_by_path("src/auth.ts").unwrap().unwrap();
    let crypto_id = ws.meta.file_id_by_path("src/crypto.ts").unwrap().unwrap();
    assert_eq!(ws.meta.dependencies_of(auth_id).unwrap(), vec![crypto_id]);

    let edges = ws.meta.all_edges().unwrap();
    assert!(
        edges
            .iter()
            .any(|e| e.source_file_id == auth_id && e.target_file_id == crypto_id),
        "expected at least one auth -> crypto edge, got {edges:?}"
    );

    // hashPassword is called from another file, so ranking should find a
    // maximum of exactly 1.0 somewhere.
    let symbols = ws.meta.all_symbols().unwrap();
    let max = symbols.iter().map(|s| s.importance).fold(f64::MIN, f64::max);
    assert!((max - 1.0).abs() < 1e-9);
}

#[test]
fn incremental_reindex_only_touches_changes() {
    let mut ws = Workspace::new();
    sample_repo(&ws);
    ws.index(PipelineOptions::default());

    // Unchanged rerun: nothing re-indexed.
    let report = ws.index(PipelineOptions::default());
    assert_eq!(report.added, 0);
    assert_eq!(report.modified, 0);
    assert_eq!(report.removed, 0);
    assert_eq!(report.unchanged, 4);

    // Touch one file.
    ws.write(
        "src/crypto.ts",
        r#"export function hashPassword(input: string): string {
    return input.split("").reverse().join("");
}

export function compareDigests(a: string, b: string): boolean {
    return a === b;
}
"#,
    );
    let report = ws.index(PipelineOptions::default());
    assert_eq!(report.modified, 1);
    assert_eq!(report.unchanged, 3);

    let crypto_id = ws.meta.file_id_by_path("src/crypto.ts").unwrap().unwrap();
    let names: Vec<String> = ws
        .meta
        .symbols_for_file(crypto_id)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert!(names.contains(&"compareDigests".to_string()));
    assert_eq!(names.iter().filter(|n| *n == "hashPassword").count(), 1);
}

#[test]
fn summaries_on_demand() {
    let mut ws = Workspace::new();
    sample_repo(&ws);
    ws.index(PipelineOptions {
        with_summaries: true,
        ..Default::default()
    });

    use repo_knowledge::types::SummaryScope;
    let file_summary = ws
        .meta
        .get_summary(SummaryScope::File, "src/auth.ts")
        .unwrap()
        .unwrap();
    assert!(file_summary.contains("authenticate"));

    let project = ws
        .meta
        .get_summary(SummaryScope::Project, "project")
        .unwrap()
        .unwrap();
    assert!(project.contains("4 files"));
}

#[test]
fn init_twice_requires_force() {
    let tmp = tempfile::tempdir().unwrap();
    IndexConfig::initialize(tmp.path(), false).unwrap();
    assert!(IndexConfig::initialize(tmp.path(), false).is_err());
    assert!(IndexConfig::initialize(tmp.path(), true).is_ok());
}
