use std::future::Future;
use std::sync::Arc;

use lemodele::LanguageModel;
use lerecherche::{DocumentGrader, LexicalJudge, ModelJudge, RelevanceJudge, Retriever, SafetyNet};
use lerisque::{RiskFactor, RiskScorer};
use tracing::Instrument;

use crate::audit::{AuditGate, AuditInput, ModelAuditor, QualityAuditor, RubricAuditor};
use crate::domain::Domain;
use crate::error::PipelineError;
use crate::options::{AuditMode, JudgeKind, PipelineConfig};
use crate::quant::QuantAnalyst;
use crate::report::{AgentMetadata, QueryRequest, QueryResponse, RiskSummary};
use crate::router::{has_numeric_intent, DomainRouter};
use crate::specialist::{profile, SpecialistDispatch};

use super::refine::refine;
use super::state::{next_after_audit, AuditResult, Phase, PipelineState};

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Final state
    pub state: PipelineState,
    /// Completed without a passing audit
    pub degraded: bool,
}

impl PipelineReport {
    /// Build the API response
    pub fn to_response(&self) -> QueryResponse {
        let state = &self.state;
        let mut sources: Vec<String> = Vec::new();
        for chunk in &state.filtered {
            if !sources.contains(&chunk.source_document) {
                sources.push(chunk.source_document.clone());
            }
        }

        QueryResponse {
            answer: state.answer.clone(),
            sources,
            agent_metadata: AgentMetadata {
                trace_id: state.trace_id.clone(),
                domain: state.domain,
                specialist_used: profile(state.domain).name.to_string(),
                documents_retrieved: state.retrieved.len(),
                documents_filtered: state.filtered.len(),
                revision_count: state.revision_count,
                audit_result: state.audit_result,
                degraded: self.degraded,
                risk_assessment: state
                    .risk_assessment
                    .as_ref()
                    .map(|assessment| RiskSummary::from_assessment(assessment, &state.issues)),
                quant_analysis: state.quant.clone(),
            },
        }
    }
}

/// Runs questions through retrieval, grading, routing, generation and the
/// bounded audit loop.
///
/// Cloning is cheap; every clone shares the same collaborators and each run
/// owns a fresh [`PipelineState`].
#[derive(Clone)]
pub struct PipelineEngine {
    retriever: Arc<dyn Retriever>,
    grader: DocumentGrader,
    router: DomainRouter,
    specialists: SpecialistDispatch,
    gate: AuditGate,
    quant: Option<QuantAnalyst>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("grader", &self.grader)
            .field("router", &self.router)
            .field("gate", &self.gate)
            .field("quant", &self.quant.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineEngine {
    /// Build an engine from configuration.
    ///
    /// The configuration is normalized and validated first.
    pub fn new(
        config: PipelineConfig,
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, PipelineError> {
        let config = config.normalized();
        config.validate().map_err(PipelineError::config)?;
        let timeout = config.generation.timeout();

        let judge: Arc<dyn RelevanceJudge> = match config.grader.judge {
            JudgeKind::Lexical => Arc::new(LexicalJudge::new(config.grader.min_overlap)),
            JudgeKind::Model => Arc::new(ModelJudge::new(
                model.clone(),
                config.grader.max_chunk_chars,
                timeout,
            )),
        };

        let router = if config.router.model_fallback {
            DomainRouter::with_model_fallback(model.clone(), timeout)
        } else {
            DomainRouter::keyword_only()
        };

        let auditor: Arc<dyn QualityAuditor> = match config.audit.mode {
            AuditMode::Rubric => Arc::new(RubricAuditor::new()),
            AuditMode::Model => Arc::new(
                ModelAuditor::new(model.clone(), timeout)
                    .with_limits(config.audit.answer_max_chars, config.generation.context_max_chars),
            ),
        };
        let scorer = RiskScorer::with_thresholds(config.audit.go_threshold, config.audit.review_threshold);

        let quant = config
            .quant
            .enabled
            .then(|| QuantAnalyst::new(model.clone(), timeout));

        Ok(Self {
            retriever,
            grader: Self::grader_for(&config, judge),
            router,
            specialists: SpecialistDispatch::new(model, config.generation.clone()),
            gate: AuditGate::new(auditor, scorer),
            quant,
            config: Arc::new(config),
        })
    }

    fn grader_for(config: &PipelineConfig, judge: Arc<dyn RelevanceJudge>) -> DocumentGrader {
        DocumentGrader::new(judge).with_safety_net(SafetyNet {
            fallback_docs: config.grader.fallback_docs,
            min_docs: config.grader.safety_net_min_docs,
        })
    }

    /// Replace the relevance judge, keeping the configured safety net
    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.grader = Self::grader_for(&self.config, judge);
        self
    }

    /// Replace the quality auditor, keeping the configured thresholds
    pub fn with_auditor(mut self, auditor: Arc<dyn QualityAuditor>) -> Self {
        let scorer = RiskScorer::with_thresholds(
            self.config.audit.go_threshold,
            self.config.audit.review_threshold,
        );
        self.gate = AuditGate::new(auditor, scorer);
        self
    }

    /// Effective configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer a bare question
    pub async fn ask(&self, question: &str) -> Result<PipelineReport, PipelineError> {
        self.run(&QueryRequest::new(question)).await
    }

    /// Run a request until it completes or `cancel` resolves.
    ///
    /// Partial state is discarded on cancellation.
    pub async fn run_until<F>(&self, request: &QueryRequest, cancel: F) -> Result<PipelineReport, PipelineError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::info!("pipeline run cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.run(request) => result,
        }
    }

    /// Run one request to completion.
    pub async fn run(&self, request: &QueryRequest) -> Result<PipelineReport, PipelineError> {
        let mut state = PipelineState::new(&request.question)?;
        let span = tracing::info_span!("pipeline", trace_id = %state.trace_id);

        self.drive(&mut state, &request.risk_factors)
            .instrument(span)
            .await?;

        let degraded = state.is_degraded();
        if degraded {
            tracing::warn!(
                trace_id = %state.trace_id,
                revisions = state.revision_count,
                reasons = ?state.audit_reasons,
                "returning degraded answer after exhausting refinements"
            );
        } else {
            tracing::info!(
                trace_id = %state.trace_id,
                domain = %state.domain,
                revisions = state.revision_count,
                "answer accepted"
            );
        }

        Ok(PipelineReport { state, degraded })
    }

    async fn drive(&self, state: &mut PipelineState, risk_factors: &[RiskFactor]) -> Result<(), PipelineError> {
        let config = &self.config;

        let budget = std::time::Duration::from_millis(config.retrieval.timeout_ms);
        state.retrieved = match tokio::time::timeout(
            budget,
            self.retriever.retrieve(&state.question, config.retrieval.k),
        )
        .await
        {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "retrieval failed");
                return Err(err.into());
            }
            Err(_) => {
                tracing::error!(budget_ms = config.retrieval.timeout_ms, "retrieval timed out");
                return Err(PipelineError::Timeout {
                    stage: "retrieval",
                    after: budget,
                });
            }
        };

        state.enter(Phase::Grading);
        state.filtered = self
            .grader
            .grade(&state.question, &state.retrieved)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "grading failed");
                PipelineError::from(err)
            })?;

        state.enter(Phase::Routing);
        state.domain = self.router.route(&state.question).await;
        tracing::info!(
            domain = %state.domain,
            retrieved = state.retrieved.len(),
            filtered = state.filtered.len(),
            "question routed"
        );

        state.enter(Phase::Generating);
        state.answer = self
            .specialists
            .generate(state.domain, &state.question, &state.filtered, None)
            .await
            .map_err(log_model_error)?;

        if let Some(analyst) = &self.quant {
            let numeric = config.quant.on_numeric_intent && has_numeric_intent(&state.question);
            if state.domain == Domain::Quantitative || numeric {
                state.quant = Some(analyst.analyze(&state.question, &state.filtered).await);
            }
        }

        loop {
            state.enter(Phase::Auditing);
            let input = AuditInput {
                question: &state.question,
                answer: &state.answer,
                context: &state.filtered,
                domain: state.domain,
            };
            let outcome = self
                .gate
                .evaluate(&input, risk_factors)
                .await
                .map_err(log_model_error)?;

            state.audit_result = outcome.result;
            state.audit_reasons = outcome.reasons;
            state.issues = outcome.issues;
            state.risk_assessment = outcome.risk;

            tracing::debug!(
                result = %state.audit_result,
                revision = state.revision_count,
                "audit finished"
            );

            match next_after_audit(state.audit_result, state.revision_count, config.audit.max_revisions) {
                Phase::Refining => {
                    refine(state, &self.specialists)
                        .await
                        .map_err(log_model_error)?;
                }
                _ => {
                    state.enter(Phase::Done);
                    return Ok(());
                }
            }
        }
    }
}

fn log_model_error(err: lemodele::LlmError) -> PipelineError {
    tracing::error!(error = %err, "model call failed");
    PipelineError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::QualityVerdict;
    use crate::specialist::INSUFFICIENT_CONTEXT_ANSWER;
    use async_trait::async_trait;
    use lemodele::{CompletionRequest, LlmError};
    use lerecherche::{ContextChunk, RetrievalError};
    use lerisque::{Recommendation, RiskCategory, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedRetriever(Result<Vec<ContextChunk>, RetrievalError>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<ContextChunk>, RetrievalError> {
            self.0.clone().map(|chunks| chunks.into_iter().take(k).collect())
        }
    }

    struct StuckRetriever;

    #[async_trait]
    impl Retriever for StuckRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<ContextChunk>, RetrievalError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct CountingModel {
        reply: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl CountingModel {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        async fn complete(&self, _request: &CompletionRequest) -> lemodele::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .map_err(|_| LlmError::transport("connection refused"))
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl QualityAuditor for AlwaysFail {
        async fn audit(&self, _input: &AuditInput<'_>) -> Result<QualityVerdict, LlmError> {
            Ok(QualityVerdict::fail(vec!["incomplete answer".to_string()]))
        }

        fn name(&self) -> &'static str {
            "always_fail"
        }
    }

    fn tender() -> Vec<ContextChunk> {
        vec![
            ContextChunk::new("pliego.pdf", 3, "El plazo de entrega es de 90 días corridos."),
            ContextChunk::new("pliego.pdf", 7, "La garantía de oferta debe presentarse en sobre cerrado."),
        ]
    }

    const GOOD_ANSWER: &str = "El plazo de entrega es de 90 días corridos (pliego.pdf p.3).";

    fn engine(model: Arc<CountingModel>, retriever: FixedRetriever) -> PipelineEngine {
        PipelineEngine::new(PipelineConfig::default(), Arc::new(retriever), model).expect("engine")
    }

    #[tokio::test]
    async fn grounded_answer_passes_first_audit() {
        let model = CountingModel::replying(GOOD_ANSWER);
        let engine = engine(model.clone(), FixedRetriever(Ok(tender())));

        let report = engine.ask("¿Cuál es el plazo de entrega?").await.expect("report");
        let state = &report.state;

        assert_eq!(state.domain, Domain::Timeline);
        assert_eq!(state.audit_result, AuditResult::Pass);
        assert_eq!(state.revision_count, 0);
        assert!(!report.degraded);
        assert_eq!(state.filtered.len(), 1);
        assert_eq!(model.calls(), 1);
        assert_eq!(
            state.history,
            vec![
                Phase::Retrieving,
                Phase::Grading,
                Phase::Routing,
                Phase::Generating,
                Phase::Auditing,
                Phase::Done
            ]
        );

        let response = report.to_response();
        assert_eq!(response.sources, vec!["pliego.pdf"]);
        assert_eq!(response.agent_metadata.specialist_used, "specialist_timeline");
        assert_eq!(response.agent_metadata.documents_retrieved, 2);
        assert!(response.agent_metadata.risk_assessment.is_none());
    }

    #[tokio::test]
    async fn exhausted_refinements_return_degraded_answer() {
        let model = CountingModel::replying(GOOD_ANSWER);
        let engine = engine(model.clone(), FixedRetriever(Ok(tender()))).with_auditor(Arc::new(AlwaysFail));

        let report = engine.ask("¿Cuál es el plazo de entrega?").await.expect("report");

        assert!(report.degraded);
        assert_eq!(report.state.phase, Phase::Done);
        assert_eq!(report.state.audit_result, AuditResult::Fail);
        assert_eq!(report.state.revision_count, 2);
        assert_eq!(report.state.visits(Phase::Refining), 2);
        assert_eq!(report.state.visits(Phase::Auditing), 3);
        // one generation plus two refinements
        assert_eq!(model.calls(), 3);
        assert!(report.to_response().agent_metadata.degraded);
    }

    #[tokio::test]
    async fn empty_context_gives_insufficient_answer_without_model() {
        let model = CountingModel::replying("unused");
        let engine = engine(model.clone(), FixedRetriever(Ok(tender())));

        let report = engine.ask("Tell me about the weather").await.expect("report");

        assert!(report.state.filtered.is_empty());
        assert_eq!(report.state.answer, INSUFFICIENT_CONTEXT_ANSWER);
        assert_eq!(report.state.audit_result, AuditResult::Pass);
        assert_eq!(model.calls(), 0);
        assert!(report.to_response().sources.is_empty());
    }

    #[tokio::test]
    async fn critical_request_risk_vetoes_every_attempt() {
        let model = CountingModel::replying(GOOD_ANSWER);
        let engine = engine(model.clone(), FixedRetriever(Ok(tender())));
        let request = QueryRequest::new("¿Cuál es el plazo de entrega?").with_risk_factors(vec![
            RiskFactor::new("Delivery deadline is unachievable", RiskCategory::Technical, Severity::Critical),
        ]);

        let report = engine.run(&request).await.expect("report");
        let risk = report.state.risk_assessment.as_ref().expect("risk");

        assert_eq!(risk.recommendation, Recommendation::NoGo);
        assert!(report.degraded);
        assert_eq!(report.state.revision_count, 2);

        let summary = report
            .to_response()
            .agent_metadata
            .risk_assessment
            .expect("summary");
        assert_eq!(summary.score, 0);
        assert!(!summary.gate_passed);
        assert_eq!(summary.critical_flags, vec!["Delivery deadline is unachievable"]);
    }

    #[tokio::test]
    async fn non_critical_risks_pass_with_assessment() {
        let model = CountingModel::replying(GOOD_ANSWER);
        let engine = engine(model, FixedRetriever(Ok(tender())));
        let request = QueryRequest::new("¿Cuál es el plazo de entrega?").with_risk_factors(vec![
            RiskFactor::new("Tight schedule", RiskCategory::Technical, Severity::High).with_probability(0.9),
            RiskFactor::new("Penalties", RiskCategory::Legal, Severity::Medium).with_probability(0.7),
        ]);

        let report = engine.run(&request).await.expect("report");
        let summary = report
            .to_response()
            .agent_metadata
            .risk_assessment
            .expect("summary");
        assert_eq!(report.state.audit_result, AuditResult::Pass);
        assert_eq!(summary.score, 83);
        assert_eq!(summary.recommendation, "GO");
        assert!(summary.issues[0].starts_with("[RiskScore] Score: 83.0/100"));
    }

    #[tokio::test]
    async fn blank_question_is_invalid() {
        let engine = engine(CountingModel::replying("x"), FixedRetriever(Ok(tender())));
        assert!(matches!(engine.ask("   ").await, Err(PipelineError::InvalidQuestion)));
    }

    #[tokio::test]
    async fn empty_index_is_reported() {
        let engine = engine(CountingModel::replying("x"), FixedRetriever(Err(RetrievalError::IndexEmpty)));
        let err = engine.ask("¿Plazo?").await.expect_err("must fail");
        assert!(matches!(err, PipelineError::IndexEmpty));
    }

    #[tokio::test]
    async fn model_failure_aborts_the_run() {
        let engine = engine(CountingModel::failing(), FixedRetriever(Ok(tender())));
        let err = engine.ask("¿Cuál es el plazo de entrega?").await.expect_err("must fail");
        assert_eq!(err.code(), "MODEL_UNAVAILABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_retriever_times_out() {
        let engine = PipelineEngine::new(
            PipelineConfig::default(),
            Arc::new(StuckRetriever),
            CountingModel::replying("x"),
        )
        .expect("engine");
        let err = engine.ask("¿Plazo?").await.expect_err("must time out");
        assert!(matches!(err, PipelineError::Timeout { stage: "retrieval", .. }));
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_stuck_run() {
        let engine = PipelineEngine::new(
            PipelineConfig::default(),
            Arc::new(StuckRetriever),
            CountingModel::replying("x"),
        )
        .expect("engine");
        let err = engine
            .run_until(&QueryRequest::new("¿Plazo?"), std::future::ready(()))
            .await
            .expect_err("must cancel");
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn quantitative_branch_runs_on_numeric_intent() {
        let model = CountingModel::replying("no json");
        let engine = engine(model.clone(), FixedRetriever(Ok(tender())));

        let report = engine.ask("¿Cuánto es la garantía de oferta del presupuesto?").await.expect("report");
        let quant = report.state.quant.as_ref().expect("quant ran");
        // the scripted reply is not JSON, so extraction fails without aborting
        assert_eq!(quant.data_quality, crate::quant::DataQuality::Incomplete);
        assert!(quant.data.notes.contains("extraction failed"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.audit.review_threshold = 90.0;
        let err = PipelineEngine::new(
            config,
            Arc::new(FixedRetriever(Ok(Vec::new()))),
            CountingModel::replying("x"),
        )
        .expect_err("must fail");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
