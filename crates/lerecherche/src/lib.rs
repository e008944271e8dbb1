// lerecherche - Passage Retrieval & Grading
//
// *La Recherche* (The Search) - Tender passage retrieval with relevance grading

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Retrieval side of the question answering pipeline: chunking tender text,
//! ranking chunks against a question, and filtering them with a relevance
//! judge.

/// Context chunks and the page chunker
pub mod chunk;

/// Relevance judges and the document grader
pub mod grade;

/// Retriever contract and in-memory snapshot index
pub mod index;

/// Lexical hybrid scoring
pub mod ranking;

/// Accent folding, tokenisation and data detection
pub mod text;

pub use chunk::{Chunker, ContextChunk, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use grade::{
    DocumentGrader, GradeError, Judgement, LexicalJudge, ModelJudge, RelevanceJudge, SafetyNet,
};
pub use index::{InMemoryIndex, IndexStats, RetrievalError, Retriever};
pub use ranking::{HybridScorer, Score};
