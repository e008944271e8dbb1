//! Keyword domain router
//!
//! Questions are folded (lowercase, accents stripped) and matched against
//! English and Spanish keyword sets. Multi-word phrases weigh 2, single words
//! weigh 1. The best-scoring domain wins; ties and questions without any hit
//! resolve to [`Domain::General`].

use std::sync::Arc;
use std::time::Duration;

use lemodele::{complete_within, CompletionRequest, LanguageModel};
use lerecherche::text::fold;

use crate::domain::Domain;

const LEGAL: &[&str] = &[
    "ley", "leyes", "law", "laws", "legal", "normativa", "normativas", "regulation",
    "regulations", "decreto", "decree", "resolucion", "jurisdiccion", "jurisdiction",
    "propiedad intelectual", "intellectual property", "confidencialidad", "confidentiality",
    "proteccion de datos", "data protection", "sancion", "sanciones", "sanction", "sanctions",
    "rescision", "termination", "inhabilitacion", "debarment", "clausula", "clausulas", "clause",
    "clauses", "articulo", "articulos", "article", "articles", "litigio", "dispute", "multa",
    "multas", "fine", "fines", "penalidades por atraso", "late delivery penalties", "liability",
    "responsabilidad", "controversias", "arbitraje", "arbitration",
];

const FINANCIAL: &[&str] = &[
    "presupuesto", "budget", "monto", "montos", "amount", "amounts", "pago", "pagos", "payment",
    "payments", "garantia", "garantias", "guarantee", "guarantees", "bond", "facturacion",
    "invoicing", "billing", "patrimonio", "net worth", "precio", "precios", "price", "prices",
    "costo", "costos", "cost", "costs", "financiamiento", "financing", "anticipo", "advance",
    "garantia de cumplimiento", "garantia bancaria", "performance bond", "bank guarantee",
    "payment terms", "forma de pago", "usd", "ars", "ajuste de precios", "price adjustment",
];

const TECHNICAL: &[&str] = &[
    "sla", "slas", "disponibilidad", "availability", "uptime", "latencia", "latency",
    "rendimiento", "performance", "arquitectura", "architecture", "infraestructura",
    "infrastructure", "api", "apis", "integracion", "integraciones", "integration",
    "integrations", "seguridad", "security", "iso", "servidor", "servidores", "server",
    "servers", "cloud", "nube", "data center", "penalidades por sla", "sla penalties",
    "tiempo de respuesta", "response time", "software", "hardware", "tecnologia", "tecnologias",
    "technology", "technologies", "stack", "base de datos", "database", "cifrado", "encryption",
];

const TIMELINE: &[&str] = &[
    "cronograma", "schedule", "fecha", "fechas", "date", "dates", "plazo", "plazos", "deadline",
    "deadlines", "hito", "hitos", "milestone", "milestones", "calendario", "calendar", "duracion",
    "duration", "cuando", "when", "timeline", "fase", "fases", "phase", "phases", "fecha limite",
    "apertura de sobres", "bid opening", "vencimiento", "due date",
];

const REQUIREMENTS: &[&str] = &[
    "requisito", "requisitos", "requirement", "requirements", "experiencia", "experience",
    "elegibilidad", "eligibility", "elegible", "eligible", "personal", "staff", "certificacion",
    "certificaciones", "certification", "certifications", "cumplimos", "gap", "gaps",
    "personal clave", "key personnel", "do we meet", "do we qualify", "consorcio", "consortium",
    "oferente", "oferentes", "bidder", "bidders", "antecedentes", "qualifications",
];

const QUANTITATIVE: &[&str] = &[
    "grafico", "graficos", "grafica", "chart", "charts", "plot", "visualizacion",
    "visualizar", "visualize", "visualization", "comparar", "compara", "compare", "comparison",
    "comparacion", "tendencia", "tendencias", "trend", "trends", "estadistica", "estadisticas",
    "statistics", "porcentaje", "percentage", "promedio", "average", "distribucion",
    "distribution", "cuanto suma", "how many",
];

const NUMERIC_INTENT: &[&str] = &[
    "cuanto", "cuanta", "cuantos", "cuantas", "how much", "how many", "total", "suma", "sum",
    "promedio", "average", "porcentaje", "percentage", "%", "comparar", "compare", "comparison",
    "comparacion", "versus", "vs", "grafico", "chart", "estadistica", "statistics", "mayor que",
    "menor que", "greater than", "less than", "more than",
];

fn keywords(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Legal => LEGAL,
        Domain::Financial => FINANCIAL,
        Domain::Technical => TECHNICAL,
        Domain::Timeline => TIMELINE,
        Domain::Requirements => REQUIREMENTS,
        Domain::Quantitative => QUANTITATIVE,
        Domain::General => &[],
    }
}

/// Folded question with words separated by single spaces and padded, so that
/// ` keyword ` matches whole words and phrases.
fn padded_words(question: &str) -> String {
    let folded = fold(question);
    let words: Vec<&str> = folded
        .split(|c: char| !c.is_alphanumeric() && c != '%')
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

fn matches(padded: &str, keyword: &str) -> bool {
    padded.contains(&format!(" {keyword} "))
}

/// Keyword score of every routable domain, in [`Domain::ALL`] order.
pub fn keyword_scores(question: &str) -> Vec<(Domain, u32)> {
    let padded = padded_words(question);
    Domain::ALL
        .into_iter()
        .filter(|d| *d != Domain::General)
        .map(|domain| {
            let score = keywords(domain)
                .iter()
                .filter(|kw| matches(&padded, kw))
                .map(|kw| if kw.contains(' ') { 2 } else { 1 })
                .sum();
            (domain, score)
        })
        .collect()
}

/// Pure keyword classification.
pub fn classify(question: &str) -> Domain {
    let scores = keyword_scores(question);
    let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    if best == 0 {
        return Domain::General;
    }
    let mut leaders = scores.iter().filter(|(_, s)| *s == best);
    match (leaders.next(), leaders.next()) {
        (Some((domain, _)), None) => *domain,
        _ => Domain::General,
    }
}

/// True when the question asks for numbers, totals or comparisons.
pub fn has_numeric_intent(question: &str) -> bool {
    let padded = padded_words(question);
    NUMERIC_INTENT.iter().any(|kw| {
        if *kw == "%" {
            padded.contains('%')
        } else {
            matches(&padded, kw)
        }
    })
}

const ROUTER_SYSTEM: &str = "You classify questions about public tenders (RFPs) into one domain. \
Domains: legal, financial, technical, timeline, requirements, quantitative, general. \
Reply with the domain name only.";

/// Domain router with an optional model fallback for questions no keyword matches.
#[derive(Clone)]
pub struct DomainRouter {
    fallback: Option<(Arc<dyn LanguageModel>, Duration)>,
}

impl std::fmt::Debug for DomainRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainRouter")
            .field("model_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for DomainRouter {
    fn default() -> Self {
        Self::keyword_only()
    }
}

impl DomainRouter {
    /// Router that never calls the model
    pub fn keyword_only() -> Self {
        Self { fallback: None }
    }

    /// Router that asks `model` when the keyword pass finds nothing
    pub fn with_model_fallback(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            fallback: Some((model, timeout)),
        }
    }

    /// Route a question. Never fails; any fallback problem yields `General`.
    pub async fn route(&self, question: &str) -> Domain {
        let scores = keyword_scores(question);
        let domain = classify(question);
        let any_hit = scores.iter().any(|(_, s)| *s > 0);

        if any_hit {
            tracing::debug!(domain = %domain, "routed by keywords");
            return domain;
        }

        let Some((model, timeout)) = &self.fallback else {
            return Domain::General;
        };

        let request = CompletionRequest::new(ROUTER_SYSTEM, format!("Question: {question}"));
        match complete_within(model.as_ref(), &request, *timeout).await {
            Ok(reply) => {
                let word = reply.split_whitespace().next().unwrap_or_default();
                let domain = Domain::parse(word.trim_matches(|c: char| !c.is_alphanumeric()))
                    .unwrap_or(Domain::General);
                tracing::debug!(domain = %domain, reply = %reply.trim(), "routed by model fallback");
                domain
            }
            Err(err) => {
                tracing::warn!(error = %err, "router fallback failed, using general");
                Domain::General
            }
        }
    }
}
