//! Okapi BM25 lexical search over an in-memory corpus
//!
//! Provides keyword-based search with ranking

use super::{RetrievalMode, Retriever};
use lexroute_common::errors::{AppError, Result};
use lexroute_common::models::{Document, RankedList};
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// BM25 retriever holding its own inverted statistics
pub struct BM25Retriever {
    documents: Vec<Document>,
    term_frequencies: Vec<HashMap<String, u32>>,
    lengths: Vec<usize>,
    average_length: f64,
    document_frequency: HashMap<String, usize>,
    limit: usize,
}

impl BM25Retriever {
    /// Index the corpus; each query returns at most `limit` documents
    pub fn new(documents: Vec<Document>, limit: usize) -> Result<Self> {
        if documents.is_empty() {
            return Err(AppError::EmptyCorpus {
                message: "cannot build a BM25 index without documents".to_string(),
            });
        }

        let mut term_frequencies = Vec::with_capacity(documents.len());
        let mut lengths = Vec::with_capacity(documents.len());
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for document in &documents {
            let tokens = tokenize(document.content());
            lengths.push(tokens.len());

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for term in frequencies.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            term_frequencies.push(frequencies);
        }

        let average_length = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;

        tracing::debug!(
            documents = documents.len(),
            vocabulary = document_frequency.len(),
            "BM25 index built"
        );

        Ok(Self {
            documents,
            term_frequencies,
            lengths,
            average_length,
            document_frequency,
            limit,
        })
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.documents.len() as f64;
        let df = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25 score of every document, in corpus order
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        let average_length = self.average_length.max(1.0);

        self.term_frequencies
            .iter()
            .zip(&self.lengths)
            .map(|(frequencies, &length)| {
                terms
                    .iter()
                    .filter_map(|term| frequencies.get(term).map(|&tf| (term, tf as f64)))
                    .map(|(term, tf)| {
                        let norm = K1 * (1.0 - B + B * length as f64 / average_length);
                        self.idf(term) * tf * (K1 + 1.0) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Retriever for BM25Retriever {
    async fn retrieve(&self, query: &str) -> Result<RankedList> {
        let scores = self.scores(query);

        let mut ranked: Vec<usize> = (0..self.documents.len()).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        Ok(ranked
            .into_iter()
            .take(self.limit)
            .map(|index| self.documents[index].clone())
            .collect())
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Lexical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("A marriage is void if either party has a living spouse."),
            Document::new("Notice of intended marriage shall be given to the Marriage Officer."),
            Document::new("The Marriage Officer shall publish the notice for thirty days."),
            Document::new("Appeals lie to the district court within thirty days."),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Section 15(b), Hindu-Marriage"), vec!["section", "15", "b", "hindu", "marriage"]);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(matches!(
            BM25Retriever::new(vec![], 10),
            Err(AppError::EmptyCorpus { .. })
        ));
    }

    #[tokio::test]
    async fn test_best_match_first() {
        let retriever = BM25Retriever::new(corpus(), 10).unwrap();
        let results = retriever.retrieve("living spouse void").await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results[0].content().contains("living spouse"));
    }

    #[test]
    fn test_limit_and_rare_terms() {
        let retriever = BM25Retriever::new(corpus(), 2).unwrap();
        let results = tokio_test::block_on(retriever.retrieve("publish notice")).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content().contains("publish"));
        assert!(results[1].content().contains("Notice"));
    }

    #[test]
    fn test_unknown_terms_score_zero() {
        let retriever = BM25Retriever::new(corpus(), 10).unwrap();
        assert!(retriever.scores("trademark").iter().all(|&s| s == 0.0));
    }
}
