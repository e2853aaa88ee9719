//! File discovery: walk the project root honoring ignore rules.
//!
//! Built on the `ignore` crate, which handles `.gitignore`, `.ignore`, and
//! hidden files. Config-supplied patterns are layered on top as override
//! globs. Files over 1 MiB and empty files are excluded, as are extensions
//! outside the known-language table. Results are sorted by path so every
//! phase downstream is deterministic.

use std::path::Path;

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::warn;

use crate::types::Language;

/// Per-file cap: anything larger is generated or vendored, not source.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Directories skipped regardless of gitignore contents.
const DEFAULT_IGNORES: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".git",
    ".repo-knowledge",
];

/// A file selected for indexing.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the project root, `/`-separated.
    pub relative_path: String,
    pub language: Option<Language>,
    pub size_bytes: u64,
}

/// Discover every indexable file under `root`.
pub fn discover_files(root: &Path, ignore_patterns: &[String]) -> Vec<DiscoveredFile> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(true);
    // Honor .gitignore even when the project is not a git checkout.
    builder.require_git(false);

    // Config patterns become whitelist-negated overrides: `!pattern` means
    // "ignore what matches pattern".
    let mut overrides = OverrideBuilder::new(root);
    for dir in DEFAULT_IGNORES {
        let _ = overrides.add(&format!("!{dir}/"));
    }
    for pattern in ignore_patterns {
        if let Err(e) = overrides.add(&format!("!{pattern}")) {
            warn!("invalid ignore pattern {pattern:?}: {e}");
        }
    }
    if let Ok(built) = overrides.build() {
        builder.overrides(built);
    }

    let mut files = Vec::new();
    for entry in builder.build().flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative_path = relative
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");

        let Some(language) = Language::detect(&relative_path) else {
            continue;
        };

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let size_bytes = metadata.len();
        if size_bytes == 0 || size_bytes > MAX_FILE_SIZE {
            continue;
        }

        files.push(DiscoveredFile {
            relative_path,
            language: Some(language),
            size_bytes,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths(files: &[DiscoveredFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn finds_known_extensions_only() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.ts"), "export const a = 1;").unwrap();
        fs::write(tmp.path().join("b.py"), "x = 1").unwrap();
        fs::write(tmp.path().join("noext"), "skip me").unwrap();
        fs::write(tmp.path().join("c.xyz"), "skip me too").unwrap();

        let files = discover_files(tmp.path(), &[]);
        assert_eq!(paths(&files), vec!["a.ts", "b.py"]);
    }

    #[test]
    fn results_are_sorted_by_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("zz.ts"), "z").unwrap();
        fs::write(tmp.path().join("src/aa.ts"), "a").unwrap();
        fs::write(tmp.path().join("mm.ts"), "m").unwrap();

        let files = discover_files(tmp.path(), &[]);
        let got = paths(&files);
        let mut sorted = got.clone();
        sorted.sort();
        assert_eq!(got, sorted);
    }

    #[test]
    fn empty_and_oversized_files_are_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("empty.ts"), "").unwrap();
        fs::write(tmp.path().join("big.ts"), "x".repeat(MAX_FILE_SIZE as usize + 1)).unwrap();
        fs::write(tmp.path().join("ok.ts"), "const x = 1;").unwrap();

        let files = discover_files(tmp.path(), &[]);
        assert_eq!(paths(&files), vec!["ok.ts"]);
    }

    #[test]
    fn gitignore_is_honored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".gitignore"), "generated.ts\n").unwrap();
        fs::write(tmp.path().join("generated.ts"), "const g = 1;").unwrap();
        fs::write(tmp.path().join("kept.ts"), "const k = 1;").unwrap();

        let files = discover_files(tmp.path(), &[]);
        assert_eq!(paths(&files), vec!["kept.ts"]);
    }

    #[test]
    fn default_ignored_dirs_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(tmp.path().join("app.js"), "const a = 1;").unwrap();

        let files = discover_files(tmp.path(), &[]);
        assert_eq!(paths(&files), vec!["app.js"]);
    }

    #[test]
    fn config_patterns_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("vendor")).unwrap();
        fs::write(tmp.path().join("vendor/lib.ts"), "const v = 1;").unwrap();
        fs::write(tmp.path().join("main.ts"), "const m = 1;").unwrap();

        let files = discover_files(tmp.path(), &["vendor/**".to_string()]);
        assert_eq!(paths(&files), vec!["main.ts"]);
    }
}
