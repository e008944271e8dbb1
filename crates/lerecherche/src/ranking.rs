// Lexical hybrid scoring

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::text::{fold, tokens};

/// Combined score from the lexical signals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Score {
    /// Overall score (0-1)
    pub overall: f32,

    /// Fraction of question terms present in the passage
    pub coverage: f32,

    /// Share of passage tokens that are question terms
    pub density: f32,

    /// 1.0 when the folded question appears verbatim in the passage
    pub phrase: f32,
}

impl Score {
    /// Get the overall score
    pub fn value(&self) -> f32 {
        self.overall
    }
}

/// Weighted combination of coverage, density and phrase match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridScorer {
    coverage_weight: f32,
    density_weight: f32,
    phrase_weight: f32,
}

impl HybridScorer {
    /// Create a scorer with the default weights
    pub fn new() -> Self {
        Self {
            coverage_weight: 0.7,
            density_weight: 0.2,
            phrase_weight: 0.1,
        }
    }

    /// Set custom weights
    pub fn with_weights(mut self, coverage: f32, density: f32, phrase: f32) -> Self {
        self.coverage_weight = coverage;
        self.density_weight = density;
        self.phrase_weight = phrase;
        self
    }

    /// Score one passage against a question
    pub fn score(&self, question: &str, passage: &str) -> Score {
        let terms: HashSet<String> = tokens(question).into_iter().collect();
        if terms.is_empty() {
            return Score::default();
        }
        let passage_tokens = tokens(passage);
        if passage_tokens.is_empty() {
            return Score::default();
        }

        let present: HashSet<&String> = passage_tokens.iter().filter(|t| terms.contains(*t)).collect();
        let coverage = present.len() as f32 / terms.len() as f32;

        let hits = passage_tokens.iter().filter(|t| terms.contains(*t)).count();
        // saturates once a quarter of the passage is question terms
        let density = (hits as f32 / passage_tokens.len() as f32 * 4.0).min(1.0);

        let folded_question = fold(question.trim().trim_end_matches(['?', '.', '!']));
        let phrase = if !folded_question.is_empty() && fold(passage).contains(&folded_question) {
            1.0
        } else {
            0.0
        };

        let overall = coverage * self.coverage_weight
            + density * self.density_weight
            + phrase * self.phrase_weight;

        Score {
            overall: overall.clamp(0.0, 1.0),
            coverage,
            density,
            phrase,
        }
    }
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrelated_passage_scores_zero() {
        let score = HybridScorer::new().score("plazo de entrega", "La empresa tiene oficinas");
        assert_eq!(score.overall, 0.0);
    }

    #[test]
    fn test_full_coverage_beats_partial() {
        let scorer = HybridScorer::new();
        let full = scorer.score("plazo entrega", "El plazo de entrega es de 90 días");
        let partial = scorer.score("plazo entrega", "El plazo del contrato es de 2 años");
        assert_eq!(full.coverage, 1.0);
        assert_eq!(partial.coverage, 0.5);
        assert!(full.overall > partial.overall);
    }

    #[test]
    fn test_accents_do_not_matter() {
        let score = HybridScorer::new().score("garantía", "GARANTIA de cumplimiento");
        assert_eq!(score.coverage, 1.0);
    }

    #[test]
    fn test_phrase_match() {
        let score = HybridScorer::new().score("plazo de entrega?", "Plazo de entrega: 90 días");
        assert_eq!(score.phrase, 1.0);
    }

    #[test]
    fn test_custom_weights() {
        let scorer = HybridScorer::new().with_weights(1.0, 0.0, 0.0);
        let score = scorer.score("plazo entrega", "El plazo del contrato");
        assert!((score.overall - 0.5).abs() < 1e-6);
    }
}
