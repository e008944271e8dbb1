//! Specialist dispatch table
//!
//! Every domain maps to one [`SpecialistProfile`]. Profiles differ only in
//! their role prompt and the [`AnswerConstraint`] the audit enforces; the
//! generation contract is shared by [`SpecialistDispatch::generate`].

use std::sync::Arc;

use lemodele::{complete_within, CompletionRequest, LanguageModel, LlmError};
use lerecherche::text::{figures, fold};
use lerecherche::ContextChunk;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::format::context_block;
use crate::options::GenerationOptions;

/// Answer returned without a model call when grading kept no context.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str = "The uploaded documents do not contain enough \
information to answer this question. Upload the relevant tender sections or rephrase the question.";

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b
        | \b\d{4}-\d{2}-\d{2}\b
        | \b\d{1,2}\s+de\s+(?:enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)\b
        | \b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}\b
        | \b\d{1,2}\s+(?:january|february|march|april|may|june|july|august|september|october|november|december)\b
        | \b\d+\s+(?:dias|days|semanas|weeks|meses|months|anos|years)\b
        ",
    )
    .expect("date pattern is valid")
});

static PROVISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:articulo|art\.|article|clausula|clause|seccion|section|inciso|ley|law|decreto|decree)\s*(?:n[o°º]\.?\s*)?\d+",
    )
    .expect("provision pattern is valid")
});

static QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["“«][^"”»]{15,}["”»]"#).expect("quote pattern is valid"));

/// Domain-specific check applied to generated answers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerConstraint {
    /// No extra check
    None,
    /// The answer must state dates or durations when the context has them
    SurfaceDates,
    /// Every figure in the answer must occur in the context or the question
    SourcedFigures,
    /// The answer must cite or quote a provision when the context has one
    CiteProvisions,
}

impl AnswerConstraint {
    /// Extra instruction appended to the generation prompt
    pub fn instruction(self) -> Option<&'static str> {
        match self {
            AnswerConstraint::None => None,
            AnswerConstraint::SurfaceDates => Some(
                "State every relevant date, deadline and duration exactly as written in the context. \
                 Do NOT invent dates.",
            ),
            AnswerConstraint::SourcedFigures => Some(
                "Only use figures that appear in the context, with their currency or unit. \
                 Do NOT compute or invent amounts.",
            ),
            AnswerConstraint::CiteProvisions => Some(
                "Cite the article, clause or section for every statement and quote the key text literally.",
            ),
        }
    }

    /// Check an answer; returns the violation, if any.
    pub fn check(self, answer: &str, question: &str, context: &str) -> Option<String> {
        match self {
            AnswerConstraint::None => None,
            AnswerConstraint::SurfaceDates => {
                let context_dates = DATE.is_match(&fold(context));
                if context_dates && !DATE.is_match(&fold(answer)) {
                    Some("the context states dates or deadlines but the answer gives none".to_string())
                } else {
                    None
                }
            }
            AnswerConstraint::SourcedFigures => {
                let mut known = figures(context);
                known.extend(figures(question));
                let unsourced: Vec<String> = figures(answer)
                    .into_iter()
                    .filter(|figure| !known.contains(figure))
                    .collect();
                if unsourced.is_empty() {
                    None
                } else {
                    Some(format!(
                        "figures not found in the context: {}",
                        unsourced.join(", ")
                    ))
                }
            }
            AnswerConstraint::CiteProvisions => {
                let context_provisions = PROVISION.is_match(&fold(context));
                let cited = PROVISION.is_match(&fold(answer)) || QUOTE.is_match(answer);
                if context_provisions && !cited {
                    Some("the answer does not cite or quote any provision of the context".to_string())
                } else {
                    None
                }
            }
        }
    }
}

/// One entry of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialistProfile {
    /// Domain served
    pub domain: Domain,
    /// Name reported in response metadata
    pub name: &'static str,
    /// System prompt
    pub role: &'static str,
    /// Check enforced by the audit
    pub constraint: AnswerConstraint,
}

const PROFILES: [SpecialistProfile; 7] = [
    SpecialistProfile {
        domain: Domain::Legal,
        name: "specialist_legal",
        role: "You are a public procurement lawyer reviewing tender documents. Identify the applicable \
               laws, contractual obligations, sanctions and penalties. Cite articles and clauses and \
               quote the relevant text literally.",
        constraint: AnswerConstraint::CiteProvisions,
    },
    SpecialistProfile {
        domain: Domain::Financial,
        name: "specialist_financial",
        role: "You are a financial analyst reviewing tender documents. Report budgets, payment terms, \
               guarantees and price adjustment rules with their exact amounts and currencies.",
        constraint: AnswerConstraint::SourcedFigures,
    },
    SpecialistProfile {
        domain: Domain::Technical,
        name: "specialist_technical",
        role: "You are a solutions architect reviewing tender documents. Describe the technical \
               requirements, service levels, integrations and infrastructure that are requested.",
        constraint: AnswerConstraint::None,
    },
    SpecialistProfile {
        domain: Domain::Timeline,
        name: "specialist_timeline",
        role: "You are a project planner reviewing tender documents. List the events, deadlines, \
               milestones and durations in chronological order, as a table when there are several.",
        constraint: AnswerConstraint::SurfaceDates,
    },
    SpecialistProfile {
        domain: Domain::Requirements,
        name: "specialist_requirements",
        role: "You are a bid manager reviewing tender documents. List the eligibility criteria, \
               experience, certifications and key personnel the bidder must provide.",
        constraint: AnswerConstraint::None,
    },
    SpecialistProfile {
        domain: Domain::Quantitative,
        name: "quant",
        role: "You are a quantitative analyst reviewing tender documents. Extract the figures the \
               question asks about, compare them and state totals only when the context gives them.",
        constraint: AnswerConstraint::SourcedFigures,
    },
    SpecialistProfile {
        domain: Domain::General,
        name: "specialist_general",
        role: "You are an assistant answering questions about tender documents.",
        constraint: AnswerConstraint::None,
    },
];

const COMMON_RULES: &str = "Answer only from the provided context. Mention the source document and \
page of every fact. If the context does not contain the answer, say so and explain what is missing. \
Answer in the language of the question.";

/// Profile serving `domain`.
pub fn profile(domain: Domain) -> &'static SpecialistProfile {
    PROFILES
        .iter()
        .find(|p| p.domain == domain)
        .unwrap_or(&PROFILES[PROFILES.len() - 1])
}

/// Rejected answer handed back to the specialist on refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// Answer that failed the audit
    pub previous_answer: String,
    /// Why it failed
    pub reasons: Vec<String>,
}

/// Shared generation contract over the dispatch table.
#[derive(Clone)]
pub struct SpecialistDispatch {
    model: Arc<dyn LanguageModel>,
    options: GenerationOptions,
}

impl std::fmt::Debug for SpecialistDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistDispatch")
            .field("model", &self.model.model_name())
            .field("options", &self.options)
            .finish()
    }
}

impl SpecialistDispatch {
    /// Create a dispatcher over `model`
    pub fn new(model: Arc<dyn LanguageModel>, options: GenerationOptions) -> Self {
        Self { model, options }
    }

    /// Profile serving `domain`
    pub fn profile(&self, domain: Domain) -> &'static SpecialistProfile {
        profile(domain)
    }

    /// Generate (or refine, when `feedback` is present) an answer.
    ///
    /// An empty context yields [`INSUFFICIENT_CONTEXT_ANSWER`] without a model call.
    pub async fn generate(
        &self,
        domain: Domain,
        question: &str,
        context: &[ContextChunk],
        feedback: Option<&Feedback>,
    ) -> Result<String, LlmError> {
        if context.is_empty() {
            tracing::debug!(domain = %domain, "no context, returning insufficient-context answer");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let profile = profile(domain);
        let block = context_block(context, self.options.context_max_chars);
        let mut system = format!("{}\n\n{}", profile.role, COMMON_RULES);
        if let Some(extra) = profile.constraint.instruction() {
            system.push('\n');
            system.push_str(extra);
        }

        let request = match feedback {
            None => CompletionRequest::new(system, format!("CONTEXT:\n{block}\n\nQUESTION: {question}"))
                .with_temperature(self.options.temperature),
            Some(feedback) => {
                let reasons = feedback
                    .reasons
                    .iter()
                    .map(|r| format!("- {r}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                CompletionRequest::new(
                    system,
                    format!(
                        "DOMAIN: {domain}\n\nCONTEXT:\n{block}\n\nQUESTION: {question}\n\n\
                         PREVIOUS ANSWER:\n{}\n\nREVIEW ISSUES:\n{reasons}\n\n\
                         Write an improved answer that fixes the issues, based only on the context.",
                        feedback.previous_answer
                    ),
                )
                .with_temperature(self.options.refine_temperature)
            }
        };

        tracing::debug!(
            specialist = profile.name,
            fragments = context.len(),
            refining = feedback.is_some(),
            "calling specialist"
        );
        let answer = complete_within(self.model.as_ref(), &request, self.options.timeout()).await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LanguageModel for Recording {
        async fn complete(&self, request: &CompletionRequest) -> lemodele::Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok("  El plazo es de 90 días (pliego.pdf p.3).  ".to_string())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn chunks() -> Vec<ContextChunk> {
        vec![ContextChunk::new("pliego.pdf", 3, "El plazo de entrega es de 90 días corridos.")]
    }

    #[rstest]
    #[case(Domain::Timeline, AnswerConstraint::SurfaceDates)]
    #[case(Domain::Financial, AnswerConstraint::SourcedFigures)]
    #[case(Domain::Quantitative, AnswerConstraint::SourcedFigures)]
    #[case(Domain::Legal, AnswerConstraint::CiteProvisions)]
    #[case(Domain::Technical, AnswerConstraint::None)]
    #[case(Domain::Requirements, AnswerConstraint::None)]
    #[case(Domain::General, AnswerConstraint::None)]
    fn dispatch_table_constraints(#[case] domain: Domain, #[case] expected: AnswerConstraint) {
        assert_eq!(profile(domain).constraint, expected);
        assert_eq!(profile(domain).domain, domain);
    }

    #[test]
    fn quantitative_profile_is_named_quant() {
        assert_eq!(profile(Domain::Quantitative).name, "quant");
        assert_eq!(profile(Domain::Legal).name, "specialist_legal");
    }

    #[test]
    fn surface_dates_requires_dates_when_context_has_them() {
        let context = "La apertura de sobres será el 15/03/2025.";
        let violation = AnswerConstraint::SurfaceDates.check("Pronto.", "¿Cuándo?", context);
        assert!(violation.is_some());
        assert!(AnswerConstraint::SurfaceDates
            .check("El 15/03/2025.", "¿Cuándo?", context)
            .is_none());
        assert!(AnswerConstraint::SurfaceDates
            .check("No figura.", "¿Cuándo?", "Sin fechas aquí.")
            .is_none());
    }

    #[test]
    fn sourced_figures_flags_invented_amounts() {
        let context = "Presupuesto oficial: USD 1.500.000";
        assert!(AnswerConstraint::SourcedFigures
            .check("El presupuesto es USD 1,500,000.", "¿presupuesto?", context)
            .is_none());
        let violation = AnswerConstraint::SourcedFigures
            .check("El presupuesto es USD 2.000.000.", "¿presupuesto?", context)
            .expect("violation");
        assert!(violation.contains("2000000"));
    }

    #[test]
    fn cite_provisions_accepts_citation_or_quote() {
        let context = "Artículo 12: la multa por atraso es del 0,5% diario.";
        let c = AnswerConstraint::CiteProvisions;
        assert!(c.check("Hay multas.", "", context).is_some());
        assert!(c.check("Según el artículo 12, hay multas.", "", context).is_none());
        assert!(c
            .check("El pliego dice \"la multa por atraso es del 0,5% diario\".", "", context)
            .is_none());
    }

    #[tokio::test]
    async fn empty_context_skips_the_model() {
        let model = Arc::new(Recording::default());
        let dispatch = SpecialistDispatch::new(model.clone(), GenerationOptions::default());
        let answer = dispatch
            .generate(Domain::Timeline, "¿Plazo?", &[], None)
            .await
            .expect("answer");
        assert_eq!(answer, INSUFFICIENT_CONTEXT_ANSWER);
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_uses_profile_and_trims() {
        let model = Arc::new(Recording::default());
        let dispatch = SpecialistDispatch::new(model.clone(), GenerationOptions::default());
        let answer = dispatch
            .generate(Domain::Timeline, "¿Plazo de entrega?", &chunks(), None)
            .await
            .expect("answer");
        assert_eq!(answer, "El plazo es de 90 días (pliego.pdf p.3).");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("project planner"));
        assert!(requests[0].prompt.contains("[Fragment 1 | pliego.pdf p.3]"));
        assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn refinement_includes_previous_answer_and_reasons() {
        let model = Arc::new(Recording::default());
        let dispatch = SpecialistDispatch::new(model.clone(), GenerationOptions::default());
        let feedback = Feedback {
            previous_answer: "Pronto.".to_string(),
            reasons: vec!["the answer gives no dates".to_string()],
        };
        dispatch
            .generate(Domain::Timeline, "¿Plazo?", &chunks(), Some(&feedback))
            .await
            .expect("answer");

        let requests = model.requests.lock().unwrap();
        let prompt = &requests[0].prompt;
        assert!(prompt.contains("DOMAIN: timeline"));
        assert!(prompt.contains("PREVIOUS ANSWER:\nPronto."));
        assert!(prompt.contains("- the answer gives no dates"));
        assert!((requests[0].temperature - 0.2).abs() < f32::EPSILON);
    }
}
