//! Token-budget enforcement for formatted output.
//!
//! The retriever returns ranked results; the caller that renders them is
//! responsible for the budget. Each result costs its content estimate plus
//! a fixed per-result overhead for framing.

use crate::chunker::estimate_tokens;
use crate::types::SearchResult;

/// Per-result framing overhead, in tokens.
pub const RESULT_OVERHEAD_TOKENS: usize = 20;

/// Minimum leftover budget worth spending on a truncated tail.
const MIN_TRUNCATION_BUDGET: usize = 100;

const TRUNCATION_MARKER: &str = "\n// ... (truncated)";

/// Cut `results` down so total estimated tokens stay within `token_budget`,
/// then slice to `limit`.
///
/// When the next result would overflow and more than
/// [`MIN_TRUNCATION_BUDGET`] tokens remain, a truncated version of it is
/// included as the final entry.
pub fn apply_token_budget(
    results: Vec<SearchResult>,
    token_budget: usize,
    limit: usize,
) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::new();
    let mut used: usize = 0;

    for mut result in results {
        let cost = estimate_tokens(&result.content) as usize + RESULT_OVERHEAD_TOKENS;
        if used + cost > token_budget {
            let remaining = token_budget.saturating_sub(used);
            if remaining > MIN_TRUNCATION_BUDGET {
                let cut = 3 * remaining;
                let boundary = (0..=cut.min(result.content.len()))
                    .rev()
                    .find(|&i| result.content.is_char_boundary(i))
                    .unwrap_or(0);
                result.content.truncate(boundary);
                result.content.push_str(TRUNCATION_MARKER);
                kept.push(result);
            }
            break;
        }
        used += cost;
        kept.push(result);
    }

    kept.truncate(limit);
    kept
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
