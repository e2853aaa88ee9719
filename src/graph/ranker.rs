//! PageRank over the symbol graph.
//!
//! Power iteration on in-memory adjacency built from the persisted edge
//! list. Rank mass on dangling nodes (zero out-degree) is redistributed
//! uniformly each iteration so the total stays a probability distribution.
//! Final scores are divided by the maximum, so importance lands in [0, 1]
//! with at least one symbol at exactly 1.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::store::MetadataStore;

/// Damping factor of the random walk.
pub const DAMPING: f64 = 0.85;
/// Fixed number of power iterations.
pub const ITERATIONS: usize = 20;

/// Compute and persist importance scores for every symbol.
///
/// Returns the number of symbols ranked.
pub fn rank_symbols(store: &MetadataStore) -> Result<usize> {
    let symbols = store.all_symbols()?;
    if symbols.is_empty() {
        return Ok(0);
    }

    let index_of: HashMap<i64, usize> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id, i))
        .collect();
    let n = symbols.len();

    // Incoming adjacency plus out-degrees, from the persisted edges.
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut out_degree: Vec<usize> = vec![0; n];
    for edge in store.all_edges()? {
        let (Some(&source), Some(&target)) = (
            index_of.get(&edge.source_symbol_id),
            index_of.get(&edge.target_symbol_id),
        ) else {
            continue;
        };
        incoming[target].push(source);
        out_degree[source] += 1;
    }

    let scores = page_rank(&incoming, &out_degree, DAMPING, ITERATIONS);

    let max = scores.iter().cloned().fold(f64::MIN, f64::max);
    let updates: Vec<(i64, f64)> = symbols
        .iter()
        .zip(&scores)
        .map(|(symbol, &score)| (symbol.id, if max > 0.0 { score / max } else { 0.0 }))
        .collect();
    store.update_importance(&updates)?;

    debug!(symbols = n, "importance scores updated");
    Ok(n)
}

/// Raw power-iteration PageRank; scores sum to ~1 each iteration.
pub(crate) fn page_rank(
    incoming: &[Vec<usize>],
    out_degree: &[usize],
    damping: f64,
    iterations: usize,
) -> Vec<f64> {
    let n = incoming.len();
    if n == 0 {
        return Vec::new();
    }

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0_f64; n];
    let base = (1.0 - damping) / n as f64;

    for _ in 0..iterations {
        let dangling_mass: f64 = (0..n)
            .filter(|&i| out_degree[i] == 0)
            .map(|i| scores[i])
            .sum();

        for (i, slot) in next.iter_mut().enumerate() {
            let incoming_mass: f64 = incoming[i]
                .iter()
                .map(|&source| scores[source] / out_degree[source] as f64)
                .sum();
            *slot = base + damping * (incoming_mass + dangling_mass / n as f64);
        }

        std::mem::swap(&mut scores, &mut next);
    }

    scores
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
