//! Orchestration layer: one question through the phase state machine.

/// Pipeline engine and run report.
pub mod engine;
/// Refinement step.
pub mod refine;
/// Per-request state and phase transitions.
pub mod state;

pub use engine::{PipelineEngine, PipelineReport};
pub use refine::refine;
pub use state::{next_after_audit, AuditResult, Phase, PipelineState};
