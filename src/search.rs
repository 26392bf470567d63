//! Lexical keyword scoring over document chunks.
//!
//! # Scoring Algorithm
//!
//! 1. Derive query terms: lowercase, split on whitespace, keep terms longer
//!    than 3 characters, strip `. , ? ! ; : ( ) " '`.
//! 2. For every chunk, count non-overlapping case-insensitive occurrences of
//!    each term as a raw substring (so `"cat"` also matches `"category"`).
//! 3. Sum the counts. Repeated query terms are counted once per repetition.
//! 4. [`rank`] drops zero scores, sorts by score (desc) with ties kept in
//!    document order, and truncates to `top_k`.
//!
//! Terms are always matched as literal text; no pattern syntax is
//! interpreted.

use crate::models::ScoredChunk;

/// Minimum term length (exclusive) for a query word to be searched.
const MIN_TERM_CHARS: usize = 3;

/// Characters removed from query terms before matching.
const STRIPPED_PUNCTUATION: &[char] = &['.', ',', '?', '!', ';', ':', '(', ')', '"', '\''];

// ============ Query terms ============

/// Derive the searchable terms of a query.
///
/// The length filter runs before punctuation stripping, so `"cat?"` yields
/// the term `"cat"`. Terms left empty by stripping are dropped. Duplicates
/// are kept in query order.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.chars().count() > MIN_TERM_CHARS)
        .map(|term| term.replace(STRIPPED_PUNCTUATION, ""))
        .filter(|term| !term.is_empty())
        .collect()
}

// ============ Scoring ============

/// Count non-overlapping occurrences of `term` in `haystack`.
///
/// Both arguments are expected to be lowercased already.
fn count_occurrences(haystack: &str, term: &str) -> usize {
    haystack.matches(term).count()
}

/// Score every chunk against the query.
///
/// Returns one [`ScoredChunk`] per input chunk, in input order, including
/// chunks that scored zero. Returns an empty vector when the query yields
/// no usable terms.
pub fn score_chunks<S: AsRef<str>>(chunks: &[S], query: &str) -> Vec<ScoredChunk> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let chunk = chunk.as_ref();
            let chunk_lower = chunk.to_lowercase();
            let score = terms
                .iter()
                .map(|term| count_occurrences(&chunk_lower, term))
                .sum();
            ScoredChunk {
                index,
                text: chunk.to_string(),
                score,
            }
        })
        .collect()
}

// ============ Ranking ============

/// Keep the `top_k` best-scoring chunks.
///
/// Zero-score chunks are discarded. The sort is stable, so equal scores
/// keep their document order.
pub fn rank(mut scored: Vec<ScoredChunk>, top_k: usize) -> Vec<ScoredChunk> {
    scored.retain(|c| c.score > 0);
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top_k);
    scored
}
