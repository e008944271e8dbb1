//! Query request and response contract

use lerisque::{RiskAssessment, RiskFactor};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::orchestrate::AuditResult;
use crate::quant::QuantAnalysis;

/// One question, optionally with caller-supplied risk factors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// Natural-language question
    pub question: String,
    /// Risks known to the caller, scored during audit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_factors: Vec<RiskFactor>,
}

impl QueryRequest {
    /// Request without risk factors
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            risk_factors: Vec::new(),
        }
    }

    /// Attach risk factors
    pub fn with_risk_factors(mut self, risk_factors: Vec<RiskFactor>) -> Self {
        self.risk_factors = risk_factors;
        self
    }
}

/// Risk gate summary exposed in the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    /// Viability score, rounded
    pub score: u8,
    /// GO, REVIEW or NO_GO
    pub recommendation: String,
    /// Audit issues, including the score summary
    pub issues: Vec<String>,
    /// Recommendation is not NO_GO
    pub gate_passed: bool,
    /// Descriptions of critical risks
    pub critical_flags: Vec<String>,
    /// Recommendation reason
    pub reason: String,
}

impl RiskSummary {
    /// Summarise an assessment with the audit issues
    pub fn from_assessment(assessment: &RiskAssessment, issues: &[String]) -> Self {
        Self {
            score: assessment.score_int(),
            recommendation: assessment.recommendation.as_str().to_string(),
            issues: issues.to_vec(),
            gate_passed: assessment.gate_passed(),
            critical_flags: assessment.critical_flags.clone(),
            reason: assessment.reason.clone(),
        }
    }
}

/// Diagnostics attached to every answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMetadata {
    /// Request trace id
    pub trace_id: String,
    /// Routed domain
    pub domain: Domain,
    /// Specialist that produced the answer
    pub specialist_used: String,
    /// Chunks returned by retrieval
    pub documents_retrieved: usize,
    /// Chunks kept by grading
    pub documents_filtered: usize,
    /// Refinements performed
    pub revision_count: usize,
    /// Last audit result
    pub audit_result: AuditResult,
    /// Returned after exhausting refinements
    pub degraded: bool,
    /// Risk gate summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskSummary>,
    /// Quantitative analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quant_analysis: Option<QuantAnalysis>,
}

/// Answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// Final answer
    pub answer: String,
    /// Source documents of the context, in rank order without duplicates
    pub sources: Vec<String>,
    /// Diagnostics
    pub agent_metadata: AgentMetadata,
}
