//! Internal knowledge retrieval.
//!
//! [`DirectoryKnowledgeBase`] indexes the plain-text and markdown documents of one
//! directory into overlapping word chunks and ranks chunks by how many query terms
//! they contain. [`StaticKnowledgeBase`] serves a handful of built-in internal notes
//! when no document directory is configured.

use async_trait::async_trait;
use opportunity_core::{KnowledgeHit, KnowledgeRetriever, SourceError};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_CHUNK_WORDS: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 30;

/// Splits text into overlapping windows of words
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_WORDS, DEFAULT_CHUNK_OVERLAP)
    }
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    source: String,
    terms: HashSet<String>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Lexical retriever over the `.txt` / `.md` files of one directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryKnowledgeBase {
    chunks: Vec<IndexedChunk>,
}

impl DirectoryKnowledgeBase {
    /// Index every `.txt` and `.md` file directly under `dir`
    pub fn load(dir: &Path, chunker: &TextChunker) -> std::io::Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
            })
            .collect();
        paths.sort();

        let mut base = Self::default();
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(text) => base.add_document(&path.display().to_string(), &text, chunker),
                Err(e) => tracing::warn!("Skipping knowledge file {}: {}", path.display(), e),
            }
        }
        tracing::info!(
            "Indexed {} knowledge chunks from {}",
            base.chunks.len(),
            dir.display()
        );
        Ok(base)
    }

    pub fn add_document(&mut self, source: &str, text: &str, chunker: &TextChunker) {
        for chunk in chunker.chunk(text) {
            self.chunks.push(IndexedChunk {
                terms: terms(&chunk),
                text: chunk,
                source: source.to_string(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn search(&self, query: &str, k: usize) -> Vec<KnowledgeHit> {
        let query_terms = terms(query);
        let mut scored: Vec<(usize, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|c| (c.terms.intersection(&query_terms).count(), c))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        // Stable: equal overlap keeps document order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, c)| KnowledgeHit {
                text: c.text.clone(),
                source: c.source.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeRetriever for DirectoryKnowledgeBase {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeHit>, SourceError> {
        Ok(self.search(query, k))
    }
}

const STATIC_SOURCE: &str = "Internal Knowledge Base";

/// Built-in internal notes keyed by disease
#[derive(Debug, Clone)]
pub struct StaticKnowledgeBase {
    notes: Vec<(&'static str, &'static str)>,
}

impl Default for StaticKnowledgeBase {
    fn default() -> Self {
        Self {
            notes: vec![
                ("COPD", "Internal research shows COPD is a strategic priority area with ongoing R&D initiatives in novel bronchodilators."),
                ("ILD", "Recent internal memo highlighted ILD as an underserved market with high unmet need. Limited competition noted."),
                ("Asthma", "Asthma program is well-established. Focus is on next-gen inhalers and biologics for severe asthma."),
                ("Tuberculosis", "TB program aligned with government partnerships. Focus on drug-resistant TB formulations."),
                ("Pneumonia", "Pneumonia vaccines under development. Market analysis shows strong demand in pediatric segment."),
            ],
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for StaticKnowledgeBase {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeHit>, SourceError> {
        let query = query.to_lowercase();
        Ok(self
            .notes
            .iter()
            .filter(|(disease, _)| query.contains(&disease.to_lowercase()))
            .take(k)
            .map(|(_, note)| KnowledgeHit {
                text: note.to_string(),
                source: STATIC_SOURCE.to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_overlap() {
        let chunker = TextChunker::new(4, 1);
        let chunks = chunker.chunk("a b c d e f g");
        assert_eq!(chunks, vec!["a b c d", "d e f g"]);
    }

    #[test]
    fn test_chunker_short_text() {
        let chunker = TextChunker::new(10, 3);
        assert_eq!(chunker.chunk("only three words"), vec!["only three words"]);
        assert!(chunker.chunk("   ").is_empty());
    }

    #[test]
    fn test_chunker_clamps_overlap() {
        // overlap >= size would never advance
        let chunker = TextChunker::new(2, 5);
        assert_eq!(chunker.chunk("a b c"), vec!["a b", "b c"]);
    }

    #[tokio::test]
    async fn test_directory_search_ranks_by_overlap() {
        let chunker = TextChunker::new(50, 5);
        let mut base = DirectoryKnowledgeBase::default();
        base.add_document("memo.md", "ILD antifibrotic pipeline review, past research summary", &chunker);
        base.add_document("notes.txt", "COPD device strategy", &chunker);
        base.add_document("ild.txt", "ILD research", &chunker);

        let hits = base.retrieve("past research on ILD", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "memo.md");
        assert_eq!(hits[1].source, "ild.txt");
    }

    #[tokio::test]
    async fn test_directory_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "Asthma biologics note").unwrap();
        std::fs::write(dir.path().join("b.csv"), "ignored,asthma").unwrap();

        let base = DirectoryKnowledgeBase::load(dir.path(), &TextChunker::default()).unwrap();
        assert_eq!(base.len(), 1);
        let hits = base.retrieve("asthma", 3).await.unwrap();
        assert!(hits[0].source.ends_with("a.md"));
    }

    #[tokio::test]
    async fn test_directory_load_skips_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("latin1.txt"), [0x43, 0x4f, 0xff, 0xfe, 0x50, 0x44]).unwrap();
        std::fs::write(dir.path().join("copd.md"), "COPD inhaler adherence study").unwrap();

        let base = DirectoryKnowledgeBase::load(dir.path(), &TextChunker::default()).unwrap();
        assert_eq!(base.len(), 1);
        let hits = base.retrieve("COPD inhaler", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].source.ends_with("copd.md"));
    }

    #[tokio::test]
    async fn test_static_notes_match_disease_in_query() {
        let base = StaticKnowledgeBase::default();
        let hits = base.retrieve("past research on ILD", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("underserved"));
        assert!(base.retrieve("past research on Bronchiectasis", 5).await.unwrap().is_empty());
    }
}
