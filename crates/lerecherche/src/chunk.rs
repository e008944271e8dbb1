// Context chunks and page chunking

use serde::{Deserialize, Serialize};

/// Default chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A passage of a tender document with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextChunk {
    /// Content hash identity (16 hex chars)
    pub chunk_id: String,

    /// Passage text
    pub content: String,

    /// Document the passage came from
    pub source_document: String,

    /// 1-based page number
    pub page_number: u32,

    /// Similarity assigned by the retriever
    #[serde(default)]
    pub retrieval_score: f32,

    /// Relevance assigned by the grader; `None` until graded
    #[serde(default)]
    pub relevance_score: Option<f32>,
}

impl ContextChunk {
    /// Create an ungraded chunk; the id is derived from source, page and content.
    pub fn new(source_document: impl Into<String>, page_number: u32, content: impl Into<String>) -> Self {
        let source_document = source_document.into();
        let content = content.into();
        let chunk_id = chunk_id(&source_document, page_number, &content);
        Self {
            chunk_id,
            content,
            source_document,
            page_number,
            retrieval_score: 0.0,
            relevance_score: None,
        }
    }

    /// Set the retrieval score
    pub fn with_retrieval_score(mut self, score: f32) -> Self {
        self.retrieval_score = score;
        self
    }

    /// Copy of this chunk marked with a relevance score
    pub fn graded(&self, score: f32) -> Self {
        Self {
            relevance_score: Some(score.clamp(0.0, 1.0)),
            ..self.clone()
        }
    }
}

fn chunk_id(source: &str, page: u32, content: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    hasher.update(&page.to_le_bytes());
    hasher.update(&[0]);
    hasher.update(content.as_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// Splits page text into overlapping character windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Create a chunker. Zero sizes fall back to defaults and the overlap is
    /// kept below half the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        let overlap = overlap.min(chunk_size / 2);
        Self { chunk_size, overlap }
    }

    /// Chunk size in characters
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap in characters
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document given as one string per page (page numbers start at 1).
    pub fn split_pages<S: AsRef<str>>(&self, source: &str, pages: &[S]) -> Vec<ContextChunk> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| {
                let page_number = u32::try_from(i + 1).unwrap_or(u32::MAX);
                self.split_page(page.as_ref())
                    .into_iter()
                    .map(move |window| ContextChunk::new(source, page_number, window))
            })
            .collect()
    }

    /// Chunk a whole document where pages are separated by form feeds.
    pub fn split_text(&self, source: &str, text: &str) -> Vec<ContextChunk> {
        let pages: Vec<&str> = text.split('\u{c}').collect();
        self.split_pages(source, &pages)
    }

    fn split_page(&self, page: &str) -> Vec<String> {
        let chars: Vec<char> = page.trim().chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end < chars.len() {
                soft_break(&chars, start + self.chunk_size / 2, hard_end)
            } else {
                hard_end
            };

            let window: String = chars[start..end].iter().collect();
            let window = window.trim();
            if !window.is_empty() {
                windows.push(window.to_string());
            }

            if end >= chars.len() {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
        windows
    }
}

/// Last whitespace position in `[min, max)`, or `max` when there is none.
fn soft_break(chars: &[char], min: usize, max: usize) -> usize {
    (min..max)
        .rev()
        .find(|&i| chars[i].is_whitespace())
        .map_or(max, |i| i + 1)
}
