use std::fmt;

use lerecherche::ContextChunk;
use lerisque::RiskAssessment;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::PipelineError;
use crate::quant::QuantAnalysis;

/// Pipeline phases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fetching candidate chunks
    Retrieving,
    /// Judging chunk relevance
    Grading,
    /// Classifying the question
    Routing,
    /// First specialist answer
    Generating,
    /// Quality audit and risk gate
    Auditing,
    /// Specialist answer with feedback
    Refining,
    /// Terminal
    Done,
}

impl Phase {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Retrieving => "retrieving",
            Phase::Grading => "grading",
            Phase::Routing => "routing",
            Phase::Generating => "generating",
            Phase::Auditing => "auditing",
            Phase::Refining => "refining",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one audit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    /// Accepted
    Pass,
    /// Rejected by quality or risk
    #[default]
    Fail,
}

impl AuditResult {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            AuditResult::Pass => "pass",
            AuditResult::Fail => "fail",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition out of [`Phase::Auditing`].
pub fn next_after_audit(result: AuditResult, revision_count: usize, max_revisions: usize) -> Phase {
    match result {
        AuditResult::Pass => Phase::Done,
        AuditResult::Fail if revision_count < max_revisions => Phase::Refining,
        AuditResult::Fail => Phase::Done,
    }
}

/// State of one question. Created per request and dropped with the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Short id carried by every log line of the request
    pub trace_id: String,
    /// Question, trimmed
    pub question: String,
    /// Retrieval output in rank order
    pub retrieved: Vec<ContextChunk>,
    /// Ordered subset of `retrieved` kept by grading
    pub filtered: Vec<ContextChunk>,
    /// Routed domain
    pub domain: Domain,
    /// Current answer
    pub answer: String,
    /// Latest audit result
    pub audit_result: AuditResult,
    /// Refinements performed
    pub revision_count: usize,
    /// Latest risk assessment
    pub risk_assessment: Option<RiskAssessment>,
    /// Latest rejection reasons
    pub audit_reasons: Vec<String>,
    /// Latest audit issues
    pub issues: Vec<String>,
    /// Quantitative analysis, when the branch ran
    pub quant: Option<QuantAnalysis>,
    /// Current phase
    pub phase: Phase,
    /// Every phase entered, in order
    pub history: Vec<Phase>,
}

impl PipelineState {
    /// Fresh state; blank questions are rejected.
    pub fn new(question: &str) -> Result<Self, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidQuestion);
        }
        let trace_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        Ok(Self {
            trace_id,
            question: question.to_string(),
            retrieved: Vec::new(),
            filtered: Vec::new(),
            domain: Domain::General,
            answer: String::new(),
            audit_result: AuditResult::Fail,
            revision_count: 0,
            risk_assessment: None,
            audit_reasons: Vec::new(),
            issues: Vec::new(),
            quant: None,
            phase: Phase::Retrieving,
            history: vec![Phase::Retrieving],
        })
    }

    /// Move to `phase`
    pub fn enter(&mut self, phase: Phase) {
        tracing::debug!(trace_id = %self.trace_id, from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
        self.history.push(phase);
    }

    /// Number of times `phase` was entered
    pub fn visits(&self, phase: Phase) -> usize {
        self.history.iter().filter(|p| **p == phase).count()
    }

    /// Completed without a passing audit
    pub fn is_degraded(&self) -> bool {
        self.phase == Phase::Done && self.audit_result == AuditResult::Fail
    }
}
