// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relevance ordering of candidate items against a query.
//!
//! Scores are cosine similarities between term-frequency vectors of the query
//! and each item's text projection. Sorting is stable, so equal scores keep
//! their input order and identical inputs always produce identical output.

use std::collections::HashMap;

use volera_core::ProductRecord;

/// Words that carry no shopping intent.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "best", "by", "for", "from", "in", "is", "it",
    "of", "on", "or", "the", "to", "with", "under", "over",
];

/// An item that can be reranked.
pub trait Rankable {
    /// Text the query is compared against.
    fn rank_text(&self) -> String;

    /// Receives the computed score.
    fn set_score(&mut self, _score: f64) {}
}

impl Rankable for ProductRecord {
    fn rank_text(&self) -> String {
        self.text_projection()
    }

    fn set_score(&mut self, score: f64) {
        self.relevance_score = score;
    }
}

impl Rankable for String {
    fn rank_text(&self) -> String {
        self.clone()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in tokenize(text) {
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|w| w * w).sum::<f64>().sqrt();
    dot / (norm(a) * norm(b))
}

/// Similarity of `text` to `query` in [0, 1].
pub fn score(query: &str, text: &str) -> f64 {
    cosine(&term_frequencies(query), &term_frequencies(text))
}

/// Orders `items` by descending similarity to `query`, recording each score.
pub fn rerank<T: Rankable>(query: &str, items: Vec<T>) -> Vec<T> {
    let query_tf = term_frequencies(query);
    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .map(|mut item| {
            let s = cosine(&query_tf, &term_frequencies(&item.rank_text()));
            item.set_score(s);
            (s, item)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

/// Splits `text` into windows of `window_words` words and orders them by
/// similarity to `query`.
pub fn chunk_rerank(query: &str, text: &str, window_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let windows = words
        .chunks(window_words.max(1))
        .map(|chunk| chunk.join(" "))
        .collect();
    rerank(query, windows)
}
