//! BM25+ document scoring
//!
//! Okapi BM25 with the BM25+ floor term `delta`, which keeps single-term
//! matches in long documents from scoring zero. Documents are indexed once
//! per candidate set; queries run against the in-memory index.

use std::collections::{HashMap, HashSet};

use crate::results::{ScoredResult, sort_by_score_desc};

use super::porter::PorterStemmer;
use super::tokenize::{TokenizerOptions, tokenize};

/// Multiplier applied when every query token matches a document
const COVERAGE_BONUS_FACTOR: f32 = 1.15;

/// Contribution multiplier for matches appearing in the title field
const TITLE_BOOST: f32 = 1.5;

/// Contribution multiplier for matches appearing in tags
const TAG_BOOST: f32 = 1.3;

/// BM25+ parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f32,
    /// Document-length normalization
    pub b: f32,
    /// BM25+ floor term
    pub delta: f32,
    /// Dampen raw term frequency with `1 + ln(tf)`
    pub sublinear_tf: bool,
    /// Multiply the score when every query token matches
    pub coverage_bonus: bool,
    /// Boost matches in title and tag fields
    pub field_boosting: bool,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            delta: 0.5,
            sublinear_tf: true,
            coverage_bonus: true,
            field_boosting: false,
        }
    }
}

/// A document handed to the indexer
#[derive(Debug, Clone, Default)]
pub struct Bm25Document {
    /// Document identifier (the chunk hash)
    pub id: u32,
    /// Body text
    pub text: String,
    /// Optional title field
    pub title: Option<String>,
    /// Optional tag field
    pub tags: Vec<String>,
}

impl Bm25Document {
    /// Body-only document
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            ..Self::default()
        }
    }
}

struct IndexedDocument {
    id: u32,
    term_freq: HashMap<String, usize>,
    length: f32,
    title_terms: HashSet<String>,
    tag_terms: HashSet<String>,
}

/// BM25+ scorer over an indexed document set
pub struct Bm25Scorer {
    params: Bm25Params,
    stemmer: PorterStemmer,
    documents: Vec<IndexedDocument>,
    by_id: HashMap<u32, usize>,
    document_freq: HashMap<String, usize>,
    avg_doc_len: f32,
}

impl Bm25Scorer {
    /// Index a document set with the given parameters
    pub fn new(documents: &[Bm25Document], params: Bm25Params) -> Self {
        let stemmer = PorterStemmer::new();
        let token_opts = TokenizerOptions::default();

        let mut indexed = Vec::with_capacity(documents.len());
        let mut document_freq: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0.0f32;

        for doc in documents {
            // Term frequency needs raw counts, so tokenize without dedup here
            let tokens = raw_tokens(&doc.text, token_opts, &stemmer);
            let length = tokens.len() as f32;
            total_length += length;

            let mut term_freq: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token).or_insert(0) += 1;
            }
            for term in term_freq.keys() {
                *document_freq.entry(term.clone()).or_insert(0) += 1;
            }

            let title_terms = doc
                .title
                .as_deref()
                .map(|t| tokenize(t, token_opts, &stemmer).into_iter().collect())
                .unwrap_or_default();
            let tag_terms = doc
                .tags
                .iter()
                .flat_map(|t| tokenize(t, token_opts, &stemmer))
                .collect();

            indexed.push(IndexedDocument {
                id: doc.id,
                term_freq,
                length,
                title_terms,
                tag_terms,
            });
        }

        let avg_doc_len = if indexed.is_empty() {
            0.0
        } else {
            total_length / indexed.len() as f32
        };

        let by_id = indexed
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id, i))
            .collect();

        Self {
            params,
            stemmer,
            documents: indexed,
            by_id,
            document_freq,
            avg_doc_len,
        }
    }

    /// Number of indexed documents
    pub fn total_docs(&self) -> usize {
        self.documents.len()
    }

    /// Average indexed document length in tokens
    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Smoothed inverse document frequency of a term
    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = *self.document_freq.get(term).unwrap_or(&0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score a document (by its id) against a query.
    ///
    /// Returns `None` for unknown ids; 0.0 for empty queries.
    pub fn score(&self, id: u32, query: &str) -> Option<f32> {
        let doc = &self.documents[*self.by_id.get(&id)?];
        let query_tokens = tokenize(query, TokenizerOptions::default(), &self.stemmer);
        if query_tokens.is_empty() {
            return Some(0.0);
        }

        let mut score = 0.0f32;
        let mut matched = 0usize;

        for token in &query_tokens {
            let mut raw_tf = *doc.term_freq.get(token).unwrap_or(&0) as f32;
            let mut field_mult = 1.0f32;

            if self.params.field_boosting {
                if doc.title_terms.contains(token) {
                    field_mult = TITLE_BOOST;
                    raw_tf = raw_tf.max(1.0);
                } else if doc.tag_terms.contains(token) {
                    field_mult = TAG_BOOST;
                    raw_tf = raw_tf.max(1.0);
                }
            }
            if raw_tf == 0.0 {
                continue;
            }
            matched += 1;

            let tf = if self.params.sublinear_tf {
                1.0 + raw_tf.ln()
            } else {
                raw_tf
            };

            let norm = if self.avg_doc_len > 0.0 {
                1.0 - self.params.b + self.params.b * (doc.length / self.avg_doc_len)
            } else {
                1.0
            };
            let contribution = self.idf(token)
                * ((tf * (self.params.k1 + 1.0)) / (tf + self.params.k1 * norm)
                    + self.params.delta)
                * field_mult;

            score += contribution;
        }

        if self.params.coverage_bonus && matched == query_tokens.len() {
            score *= COVERAGE_BONUS_FACTOR;
        }

        Some(score)
    }
}

/// Tokenize keeping duplicates, for term-frequency counting
fn raw_tokens(text: &str, options: TokenizerOptions, stemmer: &PorterStemmer) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.to_lowercase().split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .collect();
        let cleaned = cleaned.trim_matches('\'');
        if cleaned.is_empty() {
            continue;
        }
        if options.remove_stop_words && crate::keywords::stopwords::is_stop_word(cleaned) {
            continue;
        }
        let token = if options.stem {
            stemmer.stem(cleaned)
        } else {
            cleaned.to_string()
        };
        if token.chars().count() >= options.min_length {
            tokens.push(token);
        }
    }
    tokens
}

/// Re-rank retrieval results by a weighted blend of dense similarity and
/// BM25 over the candidate texts.
///
/// Normalizes both components to `[0, 1]` via min-max, computes
/// `combined = alpha * vector + beta * bm25`, attaches the components, and
/// re-sorts descending. Empty queries and empty result sets pass through
/// untouched.
pub fn apply_bm25_scoring(
    results: &mut Vec<ScoredResult>,
    query: &str,
    alpha: f32,
    beta: f32,
    params: Bm25Params,
) {
    if results.is_empty() || query.trim().is_empty() {
        return;
    }

    let documents: Vec<Bm25Document> = results
        .iter()
        .map(|r| Bm25Document::new(r.hash, r.text.clone()))
        .collect();
    let scorer = Bm25Scorer::new(&documents, params);

    let bm25_scores: Vec<f32> = results
        .iter()
        .map(|r| scorer.score(r.hash, query).unwrap_or(0.0))
        .collect();

    let dense_norm = min_max_normalize(&results.iter().map(|r| r.score).collect::<Vec<_>>());
    let bm25_norm = min_max_normalize(&bm25_scores);

    for (i, result) in results.iter_mut().enumerate() {
        let combined = alpha * dense_norm[i] + beta * bm25_norm[i];
        result.vector_score = Some(dense_norm[i]);
        result.bm25_score = Some(bm25_scores[i]);
        result.combined_score = Some(combined);
        result.score = combined;
    }

    sort_by_score_desc(results);
}

/// Min-max normalize into `[0, 1]`. Constant inputs map to 1.0 so that a
/// uniform list keeps its full weight in the blend.
fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Bm25Document> {
        vec![
            Bm25Document::new(1, "The quick brown fox jumps over the lazy dog"),
            Bm25Document::new(2, "A fast brown fox leaps across the sleeping hound"),
            Bm25Document::new(3, "The lazy cat sleeps all day long"),
            Bm25Document::new(4, "Dogs and cats are popular pets worldwide"),
            Bm25Document::new(5, "The fox is a cunning and quick animal"),
        ]
    }

    #[test]
    fn full_match_ranks_first() {
        let scorer = Bm25Scorer::new(&corpus(), Bm25Params::default());
        let query = "quick brown fox";

        let mut scored: Vec<(u32, f32)> = (1..=5)
            .map(|id| (id, scorer.score(id, query).unwrap()))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        assert_eq!(scored[0].0, 1, "D1 must rank first, got {scored:?}");
        assert!(scored[0].1 > 0.0);
    }

    #[test]
    fn delta_keeps_single_term_matches_positive() {
        let scorer = Bm25Scorer::new(&corpus(), Bm25Params::default());
        let score = scorer.score(3, "cat").unwrap();
        assert!(score > 0.0);
    }

    #[test]
    fn empty_query_scores_zero() {
        let scorer = Bm25Scorer::new(&corpus(), Bm25Params::default());
        assert_eq!(scorer.score(1, "").unwrap(), 0.0);
    }

    #[test]
    fn unknown_document_is_none() {
        let scorer = Bm25Scorer::new(&corpus(), Bm25Params::default());
        assert!(scorer.score(99, "fox").is_none());
    }

    #[test]
    fn coverage_bonus_rewards_full_matches() {
        let mut with = Bm25Params::default();
        with.coverage_bonus = true;
        let mut without = Bm25Params::default();
        without.coverage_bonus = false;

        let bonus = Bm25Scorer::new(&corpus(), with).score(1, "quick brown fox").unwrap();
        let plain = Bm25Scorer::new(&corpus(), without)
            .score(1, "quick brown fox")
            .unwrap();
        assert!(bonus > plain);
    }

    #[test]
    fn field_boosting_lifts_title_matches() {
        let mut doc_with_title = Bm25Document::new(1, "some unrelated body text here");
        doc_with_title.title = Some("dragon chronicle".to_string());
        let plain_doc = Bm25Document::new(2, "dragon dragon body text words here");
        let docs = vec![doc_with_title, plain_doc];

        let mut params = Bm25Params::default();
        params.field_boosting = true;
        let boosted = Bm25Scorer::new(&docs, params);
        assert!(boosted.score(1, "dragon").unwrap() > 0.0);
        assert!(boosted.score(2, "dragon").unwrap() > 0.0);
    }

    #[test]
    fn apply_scoring_attaches_components_and_sorts() {
        let mut results = vec![
            {
                let mut r = ScoredResult::new(1, 0.2);
                r.text = "The quick brown fox jumps over the lazy dog".to_string();
                r
            },
            {
                let mut r = ScoredResult::new(3, 0.9);
                r.text = "The lazy cat sleeps all day long".to_string();
                r
            },
        ];

        apply_bm25_scoring(&mut results, "quick brown fox", 0.5, 0.5, Bm25Params::default());

        for r in &results {
            assert!(r.vector_score.is_some());
            assert!(r.bm25_score.is_some());
            assert!(r.combined_score.is_some());
        }
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn apply_scoring_ignores_empty_query() {
        let mut results = vec![ScoredResult::new(1, 0.4)];
        apply_bm25_scoring(&mut results, "  ", 0.5, 0.5, Bm25Params::default());
        assert_eq!(results[0].score, 0.4);
        assert!(results[0].bm25_score.is_none());
    }
}
