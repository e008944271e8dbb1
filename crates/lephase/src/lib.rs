#![warn(missing_docs)]

//! lephase - question answering pipeline for tender documents.
//!
//! One question runs through a fixed sequence of phases:
//! retrieval, grading, routing, specialist generation, then an audit loop
//! that refines the answer a bounded number of times.

/// Quality audit and risk gate.
pub mod audit;
/// Question domains.
pub mod domain;
/// Pipeline error taxonomy.
pub mod error;
/// Context and answer formatting helpers.
pub mod format;
/// Pipeline configuration.
pub mod options;
/// Pipeline state machine and engine.
pub mod orchestrate;
/// Quantitative analysis branch.
pub mod quant;
/// Request and response contract.
pub mod report;
/// Keyword domain router.
pub mod router;
/// Specialist dispatch table.
pub mod specialist;

pub use audit::{AuditGate, AuditInput, AuditOutcome, ModelAuditor, QualityAuditor, QualityVerdict, RubricAuditor};
pub use domain::Domain;
pub use error::PipelineError;
pub use options::{
    AuditMode, AuditOptions, GenerationOptions, GraderOptions, JudgeKind, PipelineConfig,
    QuantOptions, RetrievalOptions, RouterOptions,
};
pub use orchestrate::{next_after_audit, AuditResult, Phase, PipelineEngine, PipelineReport, PipelineState};
pub use quant::{ChartType, DataQuality, QuantAnalysis, QuantAnalyst, QuantData};
pub use report::{AgentMetadata, QueryRequest, QueryResponse, RiskSummary};
pub use router::{has_numeric_intent, DomainRouter};
pub use specialist::{
    AnswerConstraint, Feedback, SpecialistDispatch, SpecialistProfile, INSUFFICIENT_CONTEXT_ANSWER,
};
