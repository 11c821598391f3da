//! Fuzzy subsequence search over executed commands.
//!
//! Candidates are the deduplicated set of previously executed commands,
//! newest occurrence wins. Scoring favors contiguous character runs and
//! short candidates, with a flat bonus for literal substring hits.

use std::time::SystemTime;

use collections::FxHashSet;

/// One executed command, as recorded by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub command: String,
    pub executed_at: SystemTime,
}

impl HistoryEntry {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            executed_at: SystemTime::now(),
        }
    }
}

/// Score one candidate against a query.
///
/// Zero when any query character cannot be found, in order, within the
/// candidate. Otherwise: 2 points per character found immediately after the
/// previous match (1 otherwise), a `50 / candidate length` bonus so short
/// commands outrank long ones, and a flat 10 when the query is a literal
/// substring. Matching is case-insensitive.
pub fn fuzzy_score(candidate: &str, query: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let candidate_lower = candidate.to_lowercase();
    let query_lower = query.to_lowercase();

    let candidate_chars: Vec<char> = candidate_lower.chars().collect();
    let mut score = 0.0;
    let mut previous_match: Option<usize> = None;

    for query_char in query_lower.chars() {
        let start = previous_match.map_or(0, |index| index + 1);
        let Some(offset) = candidate_chars[start..]
            .iter()
            .position(|&candidate_char| candidate_char == query_char)
        else {
            return 0.0;
        };
        score += if previous_match.is_some() && offset == 0 {
            2.0
        } else {
            1.0
        };
        previous_match = Some(start + offset);
    }

    score += 50.0 / candidate_chars.len() as f64;
    if candidate_lower.contains(&query_lower) {
        score += 10.0;
    }
    score
}

/// Search the history for commands fuzzily matching `query`.
///
/// Entries are deduplicated by command text with the most recent occurrence
/// winning, scored, and returned best-first, capped at `max_results`. Ties
/// keep the newest command first.
pub fn search(entries: &[HistoryEntry], query: &str, max_results: usize) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut scored: Vec<(String, f64)> = entries
        .iter()
        .rev()
        .filter(|entry| seen.insert(entry.command.as_str()))
        .filter_map(|entry| {
            let score = fuzzy_score(&entry.command, query);
            (score > 0.0).then(|| (entry.command.clone(), score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(max_results);
    scored.into_iter().map(|(command, _)| command).collect()
}
