use lemodele::LlmError;

use crate::specialist::{Feedback, SpecialistDispatch};

use super::state::{Phase, PipelineState};

/// Refine the rejected answer once.
///
/// `revision_count` is incremented before the specialist is called, so a
/// failing model call still counts as a spent revision.
pub async fn refine(state: &mut PipelineState, specialists: &SpecialistDispatch) -> Result<(), LlmError> {
    state.enter(Phase::Refining);
    state.revision_count += 1;

    let feedback = Feedback {
        previous_answer: std::mem::take(&mut state.answer),
        reasons: state.audit_reasons.clone(),
    };

    tracing::info!(
        trace_id = %state.trace_id,
        revision = state.revision_count,
        reasons = feedback.reasons.len(),
        "refining answer"
    );

    match specialists
        .generate(state.domain, &state.question, &state.filtered, Some(&feedback))
        .await
    {
        Ok(answer) => {
            state.answer = answer;
            Ok(())
        }
        Err(err) => {
            state.answer = feedback.previous_answer;
            Err(err)
        }
    }
}
