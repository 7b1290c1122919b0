//! Result post-processing
//!
//! Both passes keep the incoming order, so index ranking is preserved.

use crate::retrieve::SearchResult;
use std::collections::HashSet;

/// Drop results scoring below `min_score`
pub fn filter_by_score(results: Vec<SearchResult>, min_score: f32) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.score >= min_score)
        .collect()
}

/// Keep only the best-ranked chunk of each document
pub fn dedupe_by_document(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.filename.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(filename: &str, score: f32) -> SearchResult {
        SearchResult {
            filename: filename.to_string(),
            chunk_text: format!("chunk of {}", filename),
            score,
            content: String::new(),
        }
    }

    #[test]
    fn test_filter_by_score() {
        let results = vec![result("a", 0.9), result("b", 0.4), result("c", 0.5)];
        let filtered = filter_by_score(results, 0.5);

        let names: Vec<_> = filtered.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let results = vec![
            result("a", 0.9),
            result("b", 0.8),
            result("a", 0.7),
            result("c", 0.6),
        ];
        let deduped = dedupe_by_document(results);

        let names: Vec<_> = deduped.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(deduped[0].score, 0.9);
    }
}
