use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::factor::{RiskCategory, RiskFactor, Severity};
use crate::matrix::{build_matrix, MatrixCell};

/// Score with no risks
pub const BASE_SCORE: f64 = 100.0;

/// Minimum score for a GO recommendation
pub const GO_THRESHOLD: f64 = 70.0;

/// Minimum score for a REVIEW recommendation
pub const REVIEW_THRESHOLD: f64 = 40.0;

/// Bid recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Recommendation {
    /// Bid
    #[serde(rename = "GO")]
    Go,
    /// Manual review before deciding
    #[serde(rename = "REVIEW")]
    Review,
    /// Do not bid
    #[serde(rename = "NO_GO")]
    NoGo,
}

impl Recommendation {
    /// Wire label (`GO`, `REVIEW`, `NO_GO`)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::Review => "REVIEW",
            Self::NoGo => "NO_GO",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score contribution of one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    /// Category
    pub category: RiskCategory,
    /// Category score (100 minus its penalty, clamped)
    pub score: f64,
    /// Number of factors in the category
    pub risk_count: usize,
    /// Sum of penalties in the category
    pub total_penalty: f64,
}

/// Result of scoring a set of risk factors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    /// Viability score in `[0, 100]`, rounded to 2 decimals
    pub score: f64,

    /// Recommendation derived from the unrounded score
    pub recommendation: Recommendation,

    /// Human-readable justification
    pub reason: String,

    /// Descriptions of critical factors
    pub critical_flags: Vec<String>,

    /// True when any critical factor was present
    pub kill_switch_activated: bool,

    /// Per-category scores, in [`RiskCategory::ALL`] order
    pub breakdown: Vec<CategoryBreakdown>,

    /// Number of factors scored
    pub total_risks: usize,

    /// Number of high and critical factors
    pub high_risks_count: usize,

    /// Non-empty impact x probability cells
    pub matrix: Vec<MatrixCell>,
}

impl RiskAssessment {
    /// Score rounded to the nearest integer
    pub fn score_int(&self) -> u8 {
        // score is clamped to [0, 100]
        self.score.round() as u8
    }

    /// True unless the recommendation is NO_GO
    pub fn gate_passed(&self) -> bool {
        self.recommendation != Recommendation::NoGo
    }

    /// One-line summary used in audit issues
    pub fn summary(&self) -> String {
        format!(
            "[RiskScore] Score: {:.1}/100. Rec: {}",
            self.score, self.recommendation
        )
    }
}

/// Weighted risk scorer with configurable thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScorer {
    go_threshold: f64,
    review_threshold: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            go_threshold: GO_THRESHOLD,
            review_threshold: REVIEW_THRESHOLD,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sum in ascending order so the result does not depend on input order.
fn sorted_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

impl RiskScorer {
    /// Scorer with the default 70 / 40 thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Scorer with custom thresholds.
    ///
    /// Both are clamped to `[0, 100]` and the REVIEW threshold never exceeds GO.
    pub fn with_thresholds(go_threshold: f64, review_threshold: f64) -> Self {
        let go = go_threshold.clamp(0.0, BASE_SCORE);
        let review = review_threshold.clamp(0.0, go);
        Self {
            go_threshold: go,
            review_threshold: review,
        }
    }

    /// GO threshold
    pub fn go_threshold(&self) -> f64 {
        self.go_threshold
    }

    /// REVIEW threshold
    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    /// Map a score to a recommendation
    pub fn recommend(&self, score: f64) -> Recommendation {
        if score >= self.go_threshold {
            Recommendation::Go
        } else if score >= self.review_threshold {
            Recommendation::Review
        } else {
            Recommendation::NoGo
        }
    }

    /// Score a set of factors.
    ///
    /// Total for every input. Any critical factor forces score 0 and NO_GO.
    pub fn assess(&self, factors: &[RiskFactor]) -> RiskAssessment {
        let critical_flags: Vec<String> = factors
            .iter()
            .filter(|f| f.is_critical())
            .map(|f| f.description.clone())
            .collect();
        let high_risks_count = factors
            .iter()
            .filter(|f| matches!(f.severity, Severity::High | Severity::Critical))
            .count();
        let matrix = build_matrix(factors);

        if !critical_flags.is_empty() {
            tracing::warn!(
                critical = critical_flags.len(),
                total = factors.len(),
                "kill switch activated"
            );
            let reason = format!(
                "Kill switch activated: {} critical risk(s) detected. The proposal is not viable.",
                critical_flags.len()
            );
            return RiskAssessment {
                score: 0.0,
                recommendation: Recommendation::NoGo,
                reason,
                critical_flags,
                kill_switch_activated: true,
                breakdown: killed_breakdown(factors),
                total_risks: factors.len(),
                high_risks_count,
                matrix,
            };
        }

        let penalty = sorted_sum(factors.iter().filter_map(RiskFactor::penalty).collect());
        let raw = (BASE_SCORE - penalty).clamp(0.0, BASE_SCORE);
        // thresholds apply to the exact score, rounding is for reporting only
        let recommendation = self.recommend(raw);
        let score = round2(raw);
        let reason = self.reason(score, recommendation, high_risks_count, factors.is_empty());

        tracing::debug!(
            score,
            recommendation = recommendation.as_str(),
            total = factors.len(),
            "risk score calculated"
        );

        RiskAssessment {
            score,
            recommendation,
            reason,
            critical_flags,
            kill_switch_activated: false,
            breakdown: weighted_breakdown(factors),
            total_risks: factors.len(),
            high_risks_count,
            matrix,
        }
    }

    fn reason(
        &self,
        score: f64,
        recommendation: Recommendation,
        high_risks: usize,
        no_risks: bool,
    ) -> String {
        if no_risks {
            return "No risks detected.".to_string();
        }
        match recommendation {
            Recommendation::Go if high_risks > 0 => format!(
                "Favourable score ({score:.1}), but {high_risks} high risk(s) should be reviewed."
            ),
            Recommendation::Go => format!("Viable proposal with score {score:.1}/100."),
            Recommendation::Review => format!(
                "Moderate score ({score:.1}). Manual review required before deciding."
            ),
            Recommendation::NoGo => format!(
                "Insufficient score ({score:.1}). Accumulated risks advise against bidding."
            ),
        }
    }
}

fn group_by_category(factors: &[RiskFactor]) -> BTreeMap<RiskCategory, Vec<&RiskFactor>> {
    let mut groups: BTreeMap<RiskCategory, Vec<&RiskFactor>> = BTreeMap::new();
    for factor in factors {
        groups.entry(factor.category).or_default().push(factor);
    }
    groups
}

fn weighted_breakdown(factors: &[RiskFactor]) -> Vec<CategoryBreakdown> {
    let groups = group_by_category(factors);
    RiskCategory::ALL
        .iter()
        .map(|&category| {
            let members = groups.get(&category).map(Vec::as_slice).unwrap_or(&[]);
            let total_penalty =
                round2(sorted_sum(members.iter().filter_map(|f| f.penalty()).collect()));
            CategoryBreakdown {
                category,
                score: round2((BASE_SCORE - total_penalty).clamp(0.0, BASE_SCORE)),
                risk_count: members.len(),
                total_penalty,
            }
        })
        .collect()
}

fn killed_breakdown(factors: &[RiskFactor]) -> Vec<CategoryBreakdown> {
    let groups = group_by_category(factors);
    RiskCategory::ALL
        .iter()
        .map(|&category| {
            let risk_count = groups.get(&category).map_or(0, Vec::len);
            let (score, total_penalty) = if risk_count > 0 {
                (0.0, BASE_SCORE)
            } else {
                (BASE_SCORE, 0.0)
            };
            CategoryBreakdown {
                category,
                score,
                risk_count,
                total_penalty,
            }
        })
        .collect()
}

/// Score with the default thresholds
pub fn assess(factors: &[RiskFactor]) -> RiskAssessment {
    RiskScorer::default().assess(factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn factor(severity: Severity, probability: f64) -> RiskFactor {
        RiskFactor::new(
            format!("{}-{probability}", severity.as_str()),
            RiskCategory::Financial,
            severity,
        )
        .with_probability(probability)
    }

    #[test]
    fn no_factors_is_full_score_go() {
        let assessment = assess(&[]);
        assert_eq!(assessment.score, 100.0);
        assert_eq!(assessment.recommendation, Recommendation::Go);
        assert_eq!(assessment.reason, "No risks detected.");
        assert!(assessment.matrix.is_empty());
    }

    #[rstest]
    #[case(100.0, Recommendation::Go)]
    #[case(70.0, Recommendation::Go)]
    #[case(69.99, Recommendation::Review)]
    #[case(40.0, Recommendation::Review)]
    #[case(39.99, Recommendation::NoGo)]
    #[case(0.0, Recommendation::NoGo)]
    fn default_thresholds(#[case] score: f64, #[case] expected: Recommendation) {
        assert_eq!(RiskScorer::new().recommend(score), expected);
    }

    #[test]
    fn custom_thresholds_are_ordered() {
        let scorer = RiskScorer::with_thresholds(50.0, 80.0);
        assert_eq!(scorer.go_threshold(), 50.0);
        assert_eq!(scorer.review_threshold(), 50.0);
        assert_eq!(scorer.recommend(49.0), Recommendation::NoGo);
    }

    #[test]
    fn score_clamps_at_zero() {
        let factors: Vec<_> = (0..10).map(|_| factor(Severity::High, 1.0)).collect();
        let assessment = assess(&factors);
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.recommendation, Recommendation::NoGo);
        assert!(!assessment.kill_switch_activated);
        assert_eq!(assessment.high_risks_count, 10);
    }

    #[test]
    fn breakdown_tracks_each_category() {
        let factors = vec![
            RiskFactor::new("fx", RiskCategory::Financial, Severity::High).with_probability(0.5),
            RiskFactor::new("sla", RiskCategory::Technical, Severity::Low),
        ];
        let assessment = assess(&factors);
        assert_eq!(assessment.breakdown.len(), 4);
        let financial = &assessment.breakdown[0];
        assert_eq!(financial.category, RiskCategory::Financial);
        assert_eq!(financial.total_penalty, 7.5);
        assert_eq!(financial.score, 92.5);
        let legal = &assessment.breakdown[1];
        assert_eq!(legal.risk_count, 0);
        assert_eq!(legal.score, 100.0);
    }

    #[test]
    fn kill_switch_zeroes_affected_categories() {
        let factors = vec![
            RiskFactor::new("debarred", RiskCategory::Legal, Severity::Critical),
            RiskFactor::new("fx", RiskCategory::Financial, Severity::Low),
        ];
        let assessment = assess(&factors);
        assert!(assessment.kill_switch_activated);
        assert_eq!(assessment.critical_flags, vec!["debarred".to_string()]);
        assert_eq!(assessment.breakdown[0].score, 0.0);
        assert_eq!(assessment.breakdown[2].score, 100.0);
        assert!(assessment.reason.starts_with("Kill switch activated"));
        assert!(!assessment.gate_passed());
    }

    #[test]
    fn recommendation_uses_unrounded_score() {
        // 100 - 15 - 15 - 0.004 = 69.996, reported as 70.0
        let factors = vec![
            factor(Severity::High, 1.0),
            factor(Severity::High, 1.0),
            factor(Severity::Low, 0.002),
        ];
        let assessment = assess(&factors);
        assert_eq!(assessment.score, 70.0);
        assert_eq!(assessment.score_int(), 70);
        assert_eq!(assessment.recommendation, Recommendation::Review);
        assert!(assessment.reason.starts_with("Moderate score"));
    }

    #[test]
    fn go_with_high_risks_mentions_review() {
        let assessment = assess(&[factor(Severity::High, 0.2)]);
        assert_eq!(assessment.recommendation, Recommendation::Go);
        assert!(assessment.reason.contains("1 high risk(s)"));
    }

    #[test]
    fn summary_and_int_score() {
        let assessment = assess(&[factor(Severity::Medium, 0.5), factor(Severity::Low, 0.25)]);
        assert_eq!(assessment.score, 97.0);
        assert_eq!(assessment.score_int(), 97);
        assert_eq!(assessment.summary(), "[RiskScore] Score: 97.0/100. Rec: GO");
    }

    #[test]
    fn recommendation_serializes_upper_snake() {
        assert_eq!(
            serde_json::to_string(&Recommendation::NoGo).expect("serialize"),
            "\"NO_GO\""
        );
    }
}
