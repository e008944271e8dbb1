//! Quality audit and risk gate
//!
//! The audit phase combines a [`QualityAuditor`] verdict with the
//! deterministic risk score from `lerisque`. An answer passes only when the
//! verdict passes and the risk recommendation (if any) is not NO_GO.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lemodele::{complete_within, parse_json_block, CompletionRequest, LanguageModel, LlmError};
use lerecherche::text::{figures, fold};
use lerecherche::ContextChunk;
use lerisque::{Recommendation, RiskAssessment, RiskCategory, RiskFactor, RiskScorer, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Domain;
use crate::format::truncate;
use crate::orchestrate::AuditResult;
use crate::specialist::{profile, AnswerConstraint, INSUFFICIENT_CONTEXT_ANSWER};

static REFUSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:lo siento[,.]?\s*|sorry[,.]?\s*)?(?:no (?:lo )?se[.!]?$|no puedo (?:responder|ayudar|contestar)|no tengo (?:esa )?informacion|i (?:cannot|can't|can not) (?:answer|help)|i (?:don't|do not) know|(?:i am )?unable to answer)",
    )
    .expect("refusal pattern is valid")
});

const REASON_MARKERS: &[&str] = &[
    "porque", "ya que", "debido", "because", "since", "contexto", "context", "document",
];

const BARE_REFUSAL_MAX_CHARS: usize = 120;

/// Smallest figure length checked by the fabrication check.
const FABRICATION_MIN_DIGITS: usize = 4;

/// Answer under audit together with what it was generated from.
#[derive(Debug, Clone, Copy)]
pub struct AuditInput<'a> {
    /// User question
    pub question: &'a str,
    /// Candidate answer
    pub answer: &'a str,
    /// Graded context the answer was generated from
    pub context: &'a [ContextChunk],
    /// Routed domain
    pub domain: Domain,
}

impl AuditInput<'_> {
    /// Context as plain text with provenance, used by text checks.
    pub fn context_text(&self) -> String {
        self.context
            .iter()
            .map(|c| format!("{} p.{}\n{}", c.source_document, c.page_number, c.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Outcome of a quality audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityVerdict {
    /// Answer is acceptable
    pub passed: bool,
    /// Rejection reasons (may be non-empty on pass as remarks)
    pub reasons: Vec<String>,
    /// Risks spotted while auditing
    pub risk_factors: Vec<RiskFactor>,
}

impl QualityVerdict {
    /// A passing verdict without remarks
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    /// A failing verdict
    pub fn fail(reasons: Vec<String>) -> Self {
        Self {
            passed: false,
            reasons,
            risk_factors: Vec::new(),
        }
    }
}

/// Quality audit collaborator.
#[async_trait]
pub trait QualityAuditor: Send + Sync {
    /// Audit one candidate answer
    async fn audit(&self, input: &AuditInput<'_>) -> Result<QualityVerdict, LlmError>;

    /// Auditor name for logs
    fn name(&self) -> &'static str;
}

/// Deterministic rubric auditor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricAuditor;

impl RubricAuditor {
    /// Create the rubric auditor
    pub fn new() -> Self {
        Self
    }

    /// Apply the rubric
    pub fn verdict(&self, input: &AuditInput<'_>) -> QualityVerdict {
        let answer = input.answer.trim();
        if answer.is_empty() {
            return QualityVerdict::fail(vec!["the answer is empty".to_string()]);
        }

        if input.context.is_empty() {
            return if answer == INSUFFICIENT_CONTEXT_ANSWER {
                QualityVerdict::pass()
            } else {
                QualityVerdict::fail(vec![
                    "no relevant context was found but the answer does not say so".to_string(),
                ])
            };
        }

        let mut reasons = Vec::new();

        if is_bare_refusal(answer) {
            reasons.push("the answer refuses without explaining what is missing".to_string());
        }

        let context = input.context_text();
        let constraint = profile(input.domain).constraint;
        if let Some(violation) = constraint.check(answer, input.question, &context) {
            reasons.push(violation);
        }

        if constraint != AnswerConstraint::SourcedFigures {
            let mut known = figures(&context);
            known.extend(figures(input.question));
            let invented: Vec<String> = figures(answer)
                .into_iter()
                .filter(|f| f.len() >= FABRICATION_MIN_DIGITS && !known.contains(f))
                .collect();
            if !invented.is_empty() {
                reasons.push(format!(
                    "the answer contains figures absent from the context: {}",
                    invented.join(", ")
                ));
            }
        }

        if reasons.is_empty() {
            QualityVerdict::pass()
        } else {
            QualityVerdict::fail(reasons)
        }
    }
}

fn is_bare_refusal(answer: &str) -> bool {
    let folded = fold(answer);
    folded.chars().count() <= BARE_REFUSAL_MAX_CHARS
        && REFUSAL.is_match(&folded)
        && !REASON_MARKERS.iter().any(|m| folded.contains(m))
}

#[async_trait]
impl QualityAuditor for RubricAuditor {
    async fn audit(&self, input: &AuditInput<'_>) -> Result<QualityVerdict, LlmError> {
        Ok(self.verdict(input))
    }

    fn name(&self) -> &'static str {
        "rubric"
    }
}

const AUDITOR_SYSTEM: &str = "You are a compliance auditor for answers about public tender documents. \
Check that the answer is supported by the context, complete for the question, and flag any business \
risk the context reveals (penalties, guarantees, impossible deadlines, exclusion clauses). \
Reply with JSON only: {\"verdict\": \"pass\" | \"fail\", \"issues\": [string], \"risk_factors\": \
[{\"description\": string, \"category\": \"financial\" | \"legal\" | \"technical\" | \"reputational\", \
\"severity\": \"low\" | \"medium\" | \"high\" | \"critical\", \"probability\": number, \
\"evidence\": string, \"page_reference\": number}]}";

/// Model-backed compliance auditor. The rubric runs first.
#[derive(Clone)]
pub struct ModelAuditor {
    model: Arc<dyn LanguageModel>,
    rubric: RubricAuditor,
    answer_max_chars: usize,
    context_max_chars: usize,
    timeout: Duration,
}

impl std::fmt::Debug for ModelAuditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAuditor")
            .field("model", &self.model.model_name())
            .field("answer_max_chars", &self.answer_max_chars)
            .field("context_max_chars", &self.context_max_chars)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ModelAuditor {
    /// Create an auditor with default prompt limits
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            rubric: RubricAuditor,
            answer_max_chars: 4_000,
            context_max_chars: 12_000,
            timeout,
        }
    }

    /// Set how much of the answer and context the model sees
    pub fn with_limits(mut self, answer_max_chars: usize, context_max_chars: usize) -> Self {
        self.answer_max_chars = answer_max_chars;
        self.context_max_chars = context_max_chars;
        self
    }
}

#[async_trait]
impl QualityAuditor for ModelAuditor {
    async fn audit(&self, input: &AuditInput<'_>) -> Result<QualityVerdict, LlmError> {
        let rubric = self.rubric.verdict(input);
        if !rubric.passed || input.context.is_empty() {
            return Ok(rubric);
        }

        let prompt = format!(
            "DOMAIN: {}\n\nQUESTION: {}\n\nCONTEXT:\n{}\n\nANSWER:\n{}",
            input.domain,
            input.question,
            truncate(&input.context_text(), self.context_max_chars),
            truncate(input.answer, self.answer_max_chars),
        );
        let request = CompletionRequest::new(AUDITOR_SYSTEM, prompt).json();
        let reply = complete_within(self.model.as_ref(), &request, self.timeout).await?;

        match parse_model_verdict(&reply) {
            Some(verdict) => Ok(verdict),
            None => {
                tracing::warn!(
                    auditor = self.name(),
                    "malformed audit verdict, keeping rubric verdict"
                );
                Ok(rubric)
            }
        }
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

fn parse_model_verdict(reply: &str) -> Option<QualityVerdict> {
    let value = parse_json_block(reply)?;
    let passed = match value.get("verdict")?.as_str()?.trim().to_ascii_lowercase().as_str() {
        "pass" | "approved" | "ok" => true,
        "fail" | "rejected" => false,
        _ => return None,
    };

    let reasons = value
        .get("issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let risk_factors = value
        .get("risk_factors")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_factor).collect())
        .unwrap_or_default();

    Some(QualityVerdict {
        passed,
        reasons,
        risk_factors,
    })
}

fn parse_factor(entry: &Value) -> Option<RiskFactor> {
    let description = entry
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let Some(description) = description else {
        tracing::warn!(entry = %entry, "skipping risk factor without description");
        return None;
    };

    let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default();
    let category = RiskCategory::parse(text("category")).unwrap_or(RiskCategory::Financial);
    let severity = Severity::parse(text("severity")).unwrap_or(Severity::Medium);

    let mut factor = RiskFactor::new(description, category, severity).with_source("model_auditor");
    factor.probability = entry.get("probability").and_then(Value::as_f64);
    factor.evidence = entry
        .get("evidence")
        .and_then(Value::as_str)
        .map(str::to_string);
    factor.page_reference = entry
        .get("page_reference")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok());
    Some(factor)
}

/// Result of the audit phase.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditOutcome {
    /// Gate decision
    pub result: AuditResult,
    /// Reasons handed to refinement on failure
    pub reasons: Vec<String>,
    /// Risk assessment, when any factor was supplied or found
    pub risk: Option<RiskAssessment>,
    /// Issues reported in the response metadata
    pub issues: Vec<String>,
}

/// Quality auditor plus deterministic risk scorer.
#[derive(Clone)]
pub struct AuditGate {
    auditor: Arc<dyn QualityAuditor>,
    scorer: RiskScorer,
}

impl std::fmt::Debug for AuditGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditGate")
            .field("auditor", &self.auditor.name())
            .field("scorer", &self.scorer)
            .finish()
    }
}

impl AuditGate {
    /// Create a gate
    pub fn new(auditor: Arc<dyn QualityAuditor>, scorer: RiskScorer) -> Self {
        Self { auditor, scorer }
    }

    /// Name of the quality auditor
    pub fn auditor_name(&self) -> &'static str {
        self.auditor.name()
    }

    /// Audit an answer and score the risks known for the request.
    pub async fn evaluate(
        &self,
        input: &AuditInput<'_>,
        request_factors: &[RiskFactor],
    ) -> Result<AuditOutcome, LlmError> {
        let verdict = self.auditor.audit(input).await?;

        let mut factors = request_factors.to_vec();
        factors.extend(verdict.risk_factors.iter().cloned());
        let risk = (!factors.is_empty()).then(|| self.scorer.assess(&factors));

        let vetoed = risk
            .as_ref()
            .is_some_and(|r| r.recommendation == Recommendation::NoGo);
        let result = if verdict.passed && !vetoed {
            AuditResult::Pass
        } else {
            AuditResult::Fail
        };

        let mut reasons = verdict.reasons.clone();
        let mut issues = verdict.reasons;
        if let Some(risk) = &risk {
            issues.push(risk.summary());
            if risk.kill_switch_activated {
                issues.push(risk.reason.clone());
            }
            if vetoed {
                reasons.push(format!("risk gate vetoed the answer: {}", risk.reason));
            }
        }

        tracing::debug!(
            auditor = self.auditor.name(),
            passed = verdict.passed,
            vetoed,
            risks = factors.len(),
            "audit evaluated"
        );

        Ok(AuditOutcome {
            result,
            reasons,
            risk,
            issues,
        })
    }
}
