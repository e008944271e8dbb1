use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which relevance judge grades retrieved chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JudgeKind {
    /// Deterministic token overlap.
    #[default]
    Lexical,
    /// One model call per chunk.
    Model,
}

impl JudgeKind {
    /// Parse judge kind from string.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lexical" => Some(Self::Lexical),
            "model" => Some(Self::Model),
            _ => None,
        }
    }
}

/// Which quality auditor runs in the audit phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Deterministic rubric only.
    #[default]
    Rubric,
    /// Rubric plus a model compliance review.
    Model,
}

impl AuditMode {
    /// Parse audit mode from string.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rubric" => Some(Self::Rubric),
            "model" => Some(Self::Model),
            _ => None,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Chunks requested from the retriever.
    pub k: usize,
    /// Retrieval budget in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            k: 10,
            timeout_ms: 10_000,
        }
    }
}

/// Grading settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraderOptions {
    /// Judge implementation.
    pub judge: JudgeKind,
    /// Minimum share of question terms for the lexical judge.
    pub min_overlap: f32,
    /// Safety-net fallback size; 0 disables the safety net.
    pub fallback_docs: usize,
    /// Kept chunks below which a data-heavy question engages the safety net.
    pub safety_net_min_docs: usize,
    /// Characters of each chunk shown to the model judge.
    pub max_chunk_chars: usize,
}

impl Default for GraderOptions {
    fn default() -> Self {
        Self {
            judge: JudgeKind::Lexical,
            min_overlap: 0.2,
            fallback_docs: 0,
            safety_net_min_docs: 2,
            max_chunk_chars: 1_500,
        }
    }
}

/// Routing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouterOptions {
    /// Ask the model when no keyword matches.
    pub model_fallback: bool,
}

/// Generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationOptions {
    /// Temperature for first answers.
    pub temperature: f32,
    /// Temperature for refinements.
    pub refine_temperature: f32,
    /// Context characters sent to the model.
    pub context_max_chars: usize,
    /// Model call budget in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            refine_temperature: 0.2,
            context_max_chars: 12_000,
            timeout_ms: 30_000,
        }
    }
}

impl GenerationOptions {
    /// Model call budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Audit and risk gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditOptions {
    /// Maximum refinements per question.
    pub max_revisions: usize,
    /// Auditor implementation.
    pub mode: AuditMode,
    /// Minimum risk score for GO.
    pub go_threshold: f64,
    /// Minimum risk score for REVIEW.
    pub review_threshold: f64,
    /// Answer characters sent to the model auditor.
    pub answer_max_chars: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            max_revisions: 2,
            mode: AuditMode::Rubric,
            go_threshold: lerisque::GO_THRESHOLD,
            review_threshold: lerisque::REVIEW_THRESHOLD,
            answer_max_chars: 4_000,
        }
    }
}

/// Quantitative branch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuantOptions {
    /// Run the branch at all.
    pub enabled: bool,
    /// Also run it for numeric questions outside the quantitative domain.
    pub on_numeric_intent: bool,
}

impl Default for QuantOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            on_numeric_intent: true,
        }
    }
}

/// Complete pipeline configuration (the `[pipeline]` table).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Retrieval.
    pub retrieval: RetrievalOptions,
    /// Grading.
    pub grader: GraderOptions,
    /// Routing.
    pub router: RouterOptions,
    /// Generation.
    pub generation: GenerationOptions,
    /// Audit.
    pub audit: AuditOptions,
    /// Quantitative branch.
    pub quant: QuantOptions,
}

impl PipelineConfig {
    /// Replace zero sizes and budgets with defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = PipelineConfig::default();

        if self.retrieval.k == 0 {
            self.retrieval.k = defaults.retrieval.k;
        }
        if self.retrieval.timeout_ms == 0 {
            self.retrieval.timeout_ms = defaults.retrieval.timeout_ms;
        }
        if self.grader.max_chunk_chars == 0 {
            self.grader.max_chunk_chars = defaults.grader.max_chunk_chars;
        }
        if self.generation.context_max_chars == 0 {
            self.generation.context_max_chars = defaults.generation.context_max_chars;
        }
        if self.generation.timeout_ms == 0 {
            self.generation.timeout_ms = defaults.generation.timeout_ms;
        }
        if self.audit.answer_max_chars == 0 {
            self.audit.answer_max_chars = defaults.audit.answer_max_chars;
        }

        self
    }

    /// Reject inconsistent values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.grader.min_overlap) {
            return Err(format!(
                "grader.min_overlap must be within [0, 1], got {}",
                self.grader.min_overlap
            ));
        }
        for (name, value) in [
            ("generation.temperature", self.generation.temperature),
            ("generation.refine_temperature", self.generation.refine_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(format!("{name} must be within [0, 2], got {value}"));
            }
        }
        for (name, value) in [
            ("audit.go_threshold", self.audit.go_threshold),
            ("audit.review_threshold", self.audit.review_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{name} must be within [0, 100], got {value}"));
            }
        }
        if self.audit.review_threshold > self.audit.go_threshold {
            return Err(format!(
                "audit.review_threshold ({}) must not exceed audit.go_threshold ({})",
                self.audit.review_threshold, self.audit.go_threshold
            ));
        }
        if self.grader.fallback_docs > self.retrieval.k {
            return Err(format!(
                "grader.fallback_docs ({}) must not exceed retrieval.k ({})",
                self.grader.fallback_docs, self.retrieval.k
            ));
        }
        Ok(())
    }
}
