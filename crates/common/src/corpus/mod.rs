//! Pre-chunked corpus loading
//!
//! The corpus is a JSON Lines file with one `{"content", "metadata"}`
//! object per line. Chunking happens upstream; this only reads it.

use crate::errors::{AppError, Result};
use crate::models::Document;
use std::path::Path;

/// Load every document from a JSON Lines file.
///
/// A missing or empty file is reported as [`AppError::EmptyCorpus`];
/// a malformed line is an [`AppError::InvalidFormat`] naming the line.
pub async fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| AppError::EmptyCorpus {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;

    let documents = parse_corpus(&raw)?;
    if documents.is_empty() {
        return Err(AppError::EmptyCorpus {
            message: format!("{} contains no documents", path.display()),
        });
    }

    tracing::info!(path = %path.display(), documents = documents.len(), "Corpus loaded");
    Ok(documents)
}

/// Parse JSON Lines text, skipping blank lines
pub fn parse_corpus(raw: &str) -> Result<Vec<Document>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Document>(line).map_err(|e| AppError::InvalidFormat {
                message: format!("corpus line {}: {}", index + 1, e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_blank_lines() {
        let raw = "{\"content\": \"a\", \"metadata\": {\"page\": 1}}\n\n{\"content\": \"b\"}\n";
        let docs = parse_corpus(raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content(), "b");
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse_corpus("{\"content\": \"a\"}\nnot json\n").unwrap_err();
        match err {
            AppError::InvalidFormat { message } => assert!(message.starts_with("corpus line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_missing_or_empty_file() {
        let err = load_corpus("/nonexistent/corpus.jsonl").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus { .. }));

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_corpus(file.path()).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus { .. }));
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"content\": \"Section 5 lists the conditions of a Hindu marriage.\"}}").unwrap();

        let docs = load_corpus(file.path()).await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
