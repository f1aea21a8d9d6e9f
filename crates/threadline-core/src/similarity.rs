//! Suggestion-to-document similarity matching.
//!
//! Scores a corpus of [`DocumentRecord`]s against the query vectors derived
//! from one suggestion's inquiry terms, then deduplicates and ranks them.
//!
//! # Matching Algorithm
//!
//! 1. Skip documents with no stored embeddings.
//! 2. For each query vector and each document, score the document as the
//!    maximum cosine similarity over its embeddings (best fact wins).
//! 3. Flatten in query-vector order: one candidate per (query, document).
//! 4. Deduplicate by document id ([`DedupPolicy`]).
//! 5. Sort by similarity descending; `NaN` sorts last.
//! 6. Truncate to `limit`.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::error::Result;
use crate::models::{DocumentRecord, RankedCandidate, Suggestion};

/// Number of candidates kept per suggestion unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// How repeated documents across query vectors are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep the first occurrence in query-vector order, whatever its score.
    #[default]
    FirstSeen,
    /// Keep the highest similarity seen for each document.
    MaxSimilarity,
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub limit: usize,
    pub dedup: DedupPolicy,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_K,
            dedup: DedupPolicy::FirstSeen,
        }
    }
}

/// Order two similarities descending, with `NaN` below every real number.
pub fn compare_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Best similarity of `query` against any of the document's embeddings.
///
/// Returns `None` for documents without embeddings. `NaN` scores only win
/// when no embedding produced a real score.
pub fn document_similarity(query: &[f32], doc: &DocumentRecord) -> Option<f32> {
    doc.embeddings
        .iter()
        .map(|e| cosine_similarity(query, e))
        .reduce(|best, s| {
            if compare_desc(s, best) == Ordering::Less {
                s
            } else {
                best
            }
        })
}

/// One (query vector, document) score; `doc` indexes the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub doc: usize,
    pub similarity: f32,
}

/// Score every (query vector, document) pair, flattened in query order.
pub fn score_pairs(query_vectors: &[Vec<f32>], corpus: &[DocumentRecord]) -> Vec<ScoredPair> {
    query_vectors
        .iter()
        .flat_map(|q| {
            corpus.iter().enumerate().filter_map(move |(doc, record)| {
                document_similarity(q, record).map(|similarity| ScoredPair { doc, similarity })
            })
        })
        .collect()
}

/// Deduplicate by document id, sort descending, and truncate. Only the
/// surviving documents are cloned out of the corpus.
///
/// The sort is stable, so equal scores keep first-seen order.
pub fn dedup_and_rank(
    pairs: Vec<ScoredPair>,
    corpus: &[DocumentRecord],
    options: &MatchOptions,
) -> Vec<RankedCandidate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut kept: Vec<ScoredPair> = Vec::new();

    for pair in pairs {
        let id = corpus[pair.doc].id.as_str();
        match index.get(id) {
            Some(&pos) => {
                if options.dedup == DedupPolicy::MaxSimilarity
                    && compare_desc(pair.similarity, kept[pos].similarity) == Ordering::Less
                {
                    kept[pos].similarity = pair.similarity;
                }
            }
            None => {
                index.insert(id, kept.len());
                kept.push(pair);
            }
        }
    }

    kept.sort_by(|a, b| compare_desc(a.similarity, b.similarity));
    kept.truncate(options.limit);
    kept.into_iter()
        .map(|pair| RankedCandidate {
            document: corpus[pair.doc].clone(),
            similarity: pair.similarity,
        })
        .collect()
}

/// Rank a corpus against one suggestion's query vectors.
pub fn match_candidates(
    query_vectors: &[Vec<f32>],
    corpus: &[DocumentRecord],
    options: &MatchOptions,
) -> Vec<RankedCandidate> {
    dedup_and_rank(score_pairs(query_vectors, corpus), corpus, options)
}

/// Embed a suggestion's inquiry terms and rank the corpus against them.
pub async fn find_candidates<E: Embedder + ?Sized>(
    embedder: &E,
    suggestion: &Suggestion,
    corpus: &[DocumentRecord],
    options: &MatchOptions,
) -> Result<Vec<RankedCandidate>> {
    let texts = suggestion.inquiry_texts();
    if texts.is_empty() || corpus.iter().all(|d| d.embeddings.is_empty()) {
        return Ok(Vec::new());
    }

    let vectors = embed_query(embedder, &texts).await?;
    let ranked = match_candidates(&vectors, corpus, options);
    debug!(
        title = %suggestion.title,
        queries = vectors.len(),
        candidates = ranked.len(),
        "ranked candidate documents"
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, embeddings: Vec<Vec<f32>>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            embeddings,
            ..Default::default()
        }
    }

    fn corpus_of(n: usize) -> Vec<DocumentRecord> {
        (0..n).map(|i| doc(&format!("d{}", i), vec![vec![1.0]])).collect()
    }

    fn pair(doc: usize, similarity: f32) -> ScoredPair {
        ScoredPair { doc, similarity }
    }

    fn ids(ranked: &[RankedCandidate]) -> Vec<&str> {
        ranked.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_compare_desc_puts_nan_last() {
        let mut scores = vec![0.2, f32::NAN, 0.9, -0.5, f32::NAN, 0.4];
        scores.sort_by(|a, b| compare_desc(*a, *b));
        assert_eq!(&scores[..4], &[0.9, 0.4, 0.2, -0.5]);
        assert!(scores[4].is_nan() && scores[5].is_nan());
    }

    #[test]
    fn test_document_without_embeddings_excluded() {
        let corpus = vec![doc("empty", vec![]), doc("d1", vec![vec![1.0, 0.0]])];
        let ranked = match_candidates(&[vec![1.0, 0.0]], &corpus, &MatchOptions::default());
        assert_eq!(ids(&ranked), vec!["d1"]);
    }

    #[test]
    fn test_best_fact_wins() {
        let corpus = vec![doc("d1", vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]])];
        let ranked = match_candidates(&[vec![1.0, 0.0]], &corpus, &MatchOptions::default());
        assert!((ranked[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_fact_does_not_mask_real_score() {
        let d = doc("d1", vec![vec![0.0, 0.0], vec![0.6, 0.8]]);
        let sim = document_similarity(&[0.6, 0.8], &d).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_document_sorts_last() {
        let corpus = vec![
            doc("zero", vec![vec![0.0, 0.0]]),
            doc("low", vec![vec![-1.0, 0.1]]),
            doc("high", vec![vec![1.0, 0.1]]),
        ];
        let ranked = match_candidates(&[vec![1.0, 0.0]], &corpus, &MatchOptions::default());
        assert_eq!(ids(&ranked), vec!["high", "low", "zero"]);
        assert!(ranked[2].similarity.is_nan());
    }

    #[test]
    fn test_first_seen_dedup_keeps_earlier_score() {
        // d1 scores 0.9 against q1 and 0.95 against q2.
        let d1 = doc("d1", vec![vec![0.9, 0.435_889_9], vec![0.312_249_9, 0.95]]);
        let queries = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let ranked = match_candidates(&queries, &[d1], &MatchOptions::default());
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].similarity - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_max_similarity_dedup_keeps_best_score() {
        let d1 = doc("d1", vec![vec![0.9, 0.435_889_9], vec![0.312_249_9, 0.95]]);
        let queries = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let options = MatchOptions {
            dedup: DedupPolicy::MaxSimilarity,
            ..Default::default()
        };
        let ranked = match_candidates(&queries, &[d1], &options);
        assert!((ranked[0].similarity - 0.95).abs() < 1e-4);
    }

    #[test]
    fn test_dedup_then_rank_uses_first_seen_score() {
        let corpus = corpus_of(3);
        let flattened = vec![pair(1, 0.9), pair(2, 0.92), pair(1, 0.95)];
        let ranked = dedup_and_rank(flattened, &corpus, &MatchOptions::default());
        assert_eq!(ids(&ranked), vec!["d2", "d1"]);
        assert!((ranked[1].similarity - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_ids_in_corpus_collapse() {
        let corpus = vec![doc("same", vec![vec![1.0]]), doc("same", vec![vec![1.0]])];
        let ranked = dedup_and_rank(vec![pair(0, 0.4), pair(1, 0.8)], &corpus, &MatchOptions::default());
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].similarity - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_top_five_truncation() {
        let scores = [0.11, 0.85, 0.42, 0.67, 0.93, 0.05, 0.58, 0.31];
        let corpus = corpus_of(scores.len());
        let flattened: Vec<_> = scores.iter().enumerate().map(|(i, s)| pair(i, *s)).collect();
        let ranked = dedup_and_rank(flattened, &corpus, &MatchOptions::default());
        let got: Vec<f32> = ranked.iter().map(|c| c.similarity).collect();
        assert_eq!(got, vec![0.93, 0.85, 0.67, 0.58, 0.42]);
        assert_eq!(ids(&ranked), vec!["d4", "d1", "d3", "d6", "d2"]);
    }

    #[test]
    fn test_pairs_flatten_in_query_order() {
        let corpus = vec![doc("a", vec![vec![1.0, 0.0]]), doc("b", vec![vec![0.0, 1.0]])];
        let pairs = score_pairs(&[vec![1.0, 0.0], vec![0.0, 1.0]], &corpus);
        let docs: Vec<usize> = pairs.iter().map(|p| p.doc).collect();
        assert_eq!(docs, vec![0, 1, 0, 1]);
    }
}
