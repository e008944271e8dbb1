// Relevance judges and the document grader

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use lemodele::{complete_within, CompletionRequest, LanguageModel, LlmError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::ContextChunk;
use crate::ranking::HybridScorer;
use crate::text::{fold, has_structured_data, is_data_heavy};

/// Grading failures
#[derive(Debug, Error)]
pub enum GradeError {
    /// The model-backed judge failed
    #[error("relevance judge failed: {0}")]
    Model(#[from] LlmError),

    /// Any other judge failure
    #[error("relevance judge failed: {message}")]
    Judge {
        /// Failure description
        message: String,
    },
}

impl GradeError {
    /// Create a generic judge error
    pub fn judge(message: impl Into<String>) -> Self {
        GradeError::Judge {
            message: message.into(),
        }
    }
}

/// Verdict on one chunk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Judgement {
    /// Keep the chunk
    pub relevant: bool,
    /// Confidence in `[0, 1]`
    pub score: f32,
}

impl Judgement {
    /// A relevant verdict
    pub fn relevant(score: f32) -> Self {
        Self {
            relevant: true,
            score,
        }
    }

    /// An irrelevant verdict
    pub fn irrelevant(score: f32) -> Self {
        Self {
            relevant: false,
            score,
        }
    }
}

/// Per-chunk relevance collaborator.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Judge one chunk against the question
    async fn judge(&self, question: &str, chunk: &ContextChunk) -> Result<Judgement, GradeError>;

    /// Convenience wrapper returning only the verdict
    async fn is_relevant(&self, question: &str, chunk: &ContextChunk) -> Result<bool, GradeError> {
        Ok(self.judge(question, chunk).await?.relevant)
    }

    /// Judge name for logs
    fn name(&self) -> &'static str;
}

/// Deterministic token-overlap judge.
///
/// Structured passages (dates, amounts, tables) are always kept for
/// data-heavy questions.
#[derive(Debug, Clone, Copy)]
pub struct LexicalJudge {
    min_overlap: f32,
    scorer: HybridScorer,
}

impl LexicalJudge {
    /// Create a judge requiring `min_overlap` of the question terms
    pub fn new(min_overlap: f32) -> Self {
        Self {
            min_overlap: min_overlap.clamp(0.0, 1.0),
            scorer: HybridScorer::new(),
        }
    }
}

impl Default for LexicalJudge {
    fn default() -> Self {
        Self::new(0.2)
    }
}

#[async_trait]
impl RelevanceJudge for LexicalJudge {
    async fn judge(&self, question: &str, chunk: &ContextChunk) -> Result<Judgement, GradeError> {
        let score = self.scorer.score(question, &chunk.content);

        if score.coverage > 0.0 && score.coverage >= self.min_overlap {
            return Ok(Judgement::relevant(score.overall));
        }
        if is_data_heavy(question) && has_structured_data(&chunk.content) {
            return Ok(Judgement::relevant(score.overall.max(0.5)));
        }
        Ok(Judgement::irrelevant(score.overall))
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

const JUDGE_SYSTEM: &str = "You grade document fragments for public tender (RFP) analysis. \
Decide whether the fragment helps answer the question. \
Reply with exactly one word: relevant or not_relevant.";

/// Judge that asks the language model for a binary verdict.
pub struct ModelJudge {
    model: Arc<dyn LanguageModel>,
    max_chunk_chars: usize,
    timeout: Duration,
}

impl std::fmt::Debug for ModelJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelJudge")
            .field("model", &self.model.model_name())
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ModelJudge {
    /// Create a judge sending at most `max_chunk_chars` of each chunk
    pub fn new(model: Arc<dyn LanguageModel>, max_chunk_chars: usize, timeout: Duration) -> Self {
        Self {
            model,
            max_chunk_chars,
            timeout,
        }
    }

    fn prompt(&self, question: &str, chunk: &ContextChunk) -> String {
        let excerpt: String = chunk.content.chars().take(self.max_chunk_chars).collect();
        format!(
            "Question: {question}\n\nFragment (page {} of {}):\n{excerpt}",
            chunk.page_number, chunk.source_document
        )
    }
}

/// Read a relevant / not_relevant verdict. Unrecognised replies are `None`.
fn parse_verdict(reply: &str) -> Option<bool> {
    let folded = fold(reply);
    let negative = ["not_relevant", "not relevant", "irrelevant", "no relevante", "no_relevante"];
    if negative.iter().any(|n| folded.contains(n)) {
        Some(false)
    } else if folded.contains("relevant") {
        Some(true)
    } else {
        None
    }
}

#[async_trait]
impl RelevanceJudge for ModelJudge {
    async fn judge(&self, question: &str, chunk: &ContextChunk) -> Result<Judgement, GradeError> {
        let request = CompletionRequest::new(JUDGE_SYSTEM, self.prompt(question, chunk));
        let reply = complete_within(self.model.as_ref(), &request, self.timeout).await?;
        match parse_verdict(&reply) {
            Some(true) => Ok(Judgement::relevant(1.0)),
            Some(false) => Ok(Judgement::irrelevant(0.0)),
            None => {
                tracing::warn!(chunk = %chunk.chunk_id, reply = %reply.trim(), "unrecognised relevance verdict");
                Ok(Judgement::irrelevant(0.0))
            }
        }
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

/// Fallback used when grading keeps too little.
///
/// Disabled when `fallback_docs` is 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyNet {
    /// Number of leading retrieved chunks used as fallback
    pub fallback_docs: usize,
    /// Minimum kept chunks for data-heavy questions
    pub min_docs: usize,
}

impl Default for SafetyNet {
    fn default() -> Self {
        Self {
            fallback_docs: 0,
            min_docs: 2,
        }
    }
}

impl SafetyNet {
    fn engages(&self, question: &str, kept: usize) -> bool {
        if self.fallback_docs == 0 {
            return false;
        }
        kept == 0 || (kept < self.min_docs && is_data_heavy(question))
    }
}

/// Filters retrieved chunks through a [`RelevanceJudge`].
#[derive(Clone)]
pub struct DocumentGrader {
    judge: Arc<dyn RelevanceJudge>,
    safety_net: SafetyNet,
}

impl DocumentGrader {
    /// Create a grader without safety net
    pub fn new(judge: Arc<dyn RelevanceJudge>) -> Self {
        Self {
            judge,
            safety_net: SafetyNet::default(),
        }
    }

    /// Enable the safety net
    pub fn with_safety_net(mut self, safety_net: SafetyNet) -> Self {
        self.safety_net = safety_net;
        self
    }

    /// Judge every chunk concurrently and keep the relevant ones in retrieval order.
    ///
    /// The result is always an ordered subsequence of `retrieved`.
    pub async fn grade(
        &self,
        question: &str,
        retrieved: &[ContextChunk],
    ) -> Result<Vec<ContextChunk>, GradeError> {
        let judgements = try_join_all(
            retrieved
                .iter()
                .map(|chunk| self.judge.judge(question, chunk)),
        )
        .await?;

        let kept: Vec<ContextChunk> = retrieved
            .iter()
            .zip(&judgements)
            .filter(|(_, j)| j.relevant)
            .map(|(chunk, j)| chunk.graded(j.score))
            .collect();

        if self.safety_net.engages(question, kept.len()) {
            tracing::warn!(
                kept = kept.len(),
                fallback = self.safety_net.fallback_docs,
                "grading safety net engaged"
            );
            return Ok(retrieved
                .iter()
                .zip(&judgements)
                .take(self.safety_net.fallback_docs)
                .map(|(chunk, j)| chunk.graded(j.score))
                .collect());
        }

        tracing::debug!(
            judge = self.judge.name(),
            kept = kept.len(),
            total = retrieved.len(),
            "documents graded"
        );
        Ok(kept)
    }
}

impl std::fmt::Debug for DocumentGrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentGrader")
            .field("judge", &self.judge.name())
            .field("safety_net", &self.safety_net)
            .finish()
    }
}
