use lerisque::{assess, Recommendation, RiskCategory, RiskFactor, RiskScorer, Severity};
use proptest::prelude::*;

/// Unrounded score, summed in ascending order like the scorer does.
fn exact_score(factors: &[RiskFactor]) -> f64 {
    let mut penalties: Vec<f64> = factors.iter().filter_map(RiskFactor::penalty).collect();
    penalties.sort_by(f64::total_cmp);
    let penalty = penalties.into_iter().fold(0.0, |acc, v| acc + v);
    (100.0 - penalty).clamp(0.0, 100.0)
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn non_critical_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![Just(Severity::Low), Just(Severity::Medium), Just(Severity::High)]
}

fn category_strategy() -> impl Strategy<Value = RiskCategory> {
    prop_oneof![
        Just(RiskCategory::Financial),
        Just(RiskCategory::Legal),
        Just(RiskCategory::Technical),
        Just(RiskCategory::Reputational),
    ]
}

fn factor_strategy(severity: impl Strategy<Value = Severity>) -> impl Strategy<Value = RiskFactor> {
    (
        "[a-z]{3,12}",
        category_strategy(),
        severity,
        proptest::option::of(-0.5f64..1.5),
    )
        .prop_map(|(description, category, severity, probability)| RiskFactor {
            probability,
            ..RiskFactor::new(description, category, severity)
        })
}

proptest! {
    #[test]
    fn score_is_bounded(factors in prop::collection::vec(factor_strategy(severity_strategy()), 0..20)) {
        let assessment = assess(&factors);
        prop_assert!((0.0..=100.0).contains(&assessment.score));
        prop_assert_eq!(assessment.total_risks, factors.len());
    }

    #[test]
    fn order_does_not_matter(
        factors in prop::collection::vec(factor_strategy(severity_strategy()), 0..20)
    ) {
        let mut reversed = factors.clone();
        reversed.reverse();
        let a = assess(&factors);
        let b = assess(&reversed);
        prop_assert_eq!(a.score, b.score);
        prop_assert_eq!(a.recommendation, b.recommendation);
        prop_assert_eq!(a.breakdown, b.breakdown);
    }

    #[test]
    fn critical_dominates(
        factors in prop::collection::vec(factor_strategy(severity_strategy()), 0..15),
        critical in factor_strategy(Just(Severity::Critical)),
        position in any::<prop::sample::Index>(),
    ) {
        let mut with_critical = factors;
        let at = position.index(with_critical.len() + 1);
        with_critical.insert(at, critical);
        let assessment = assess(&with_critical);
        prop_assert_eq!(assessment.score, 0.0);
        prop_assert_eq!(assessment.recommendation, Recommendation::NoGo);
        prop_assert!(assessment.kill_switch_activated);
        prop_assert!(!assessment.critical_flags.is_empty());
    }

    #[test]
    fn adding_a_risk_never_raises_score(
        factors in prop::collection::vec(factor_strategy(non_critical_strategy()), 0..15),
        extra in factor_strategy(non_critical_strategy()),
    ) {
        let before = assess(&factors).score;
        let mut more = factors;
        more.push(extra);
        prop_assert!(assess(&more).score <= before);
    }

    #[test]
    fn recommendation_respects_thresholds(
        factors in prop::collection::vec(factor_strategy(non_critical_strategy()), 0..15),
        go in 0.0f64..100.0,
        review in 0.0f64..100.0,
    ) {
        let scorer = RiskScorer::with_thresholds(go, review);
        let assessment = scorer.assess(&factors);
        let exact = exact_score(&factors);
        let expected = if exact >= scorer.go_threshold() {
            Recommendation::Go
        } else if exact >= scorer.review_threshold() {
            Recommendation::Review
        } else {
            Recommendation::NoGo
        };
        prop_assert_eq!(assessment.recommendation, expected);
    }
}

#[test]
fn medium_and_low_risks_stay_go() {
    let factors = vec![
        RiskFactor::new("Payment terms at 90 days", RiskCategory::Financial, Severity::Medium)
            .with_probability(0.4),
        RiskFactor::new("Minor reporting overhead", RiskCategory::Technical, Severity::Low)
            .with_probability(0.6),
    ];
    let assessment = assess(&factors);
    assert!((assessment.score - 96.8).abs() < 1e-9);
    assert_eq!(assessment.recommendation, Recommendation::Go);
    assert!(assessment.critical_flags.is_empty());
}

#[test]
fn any_critical_risk_is_no_go() {
    let factors = vec![
        RiskFactor::new("Bidder is debarred", RiskCategory::Legal, Severity::Critical),
        RiskFactor::new("Short deadline", RiskCategory::Technical, Severity::Low)
            .with_probability(0.1),
    ];
    let assessment = assess(&factors);
    assert_eq!(assessment.score, 0.0);
    assert_eq!(assessment.recommendation, Recommendation::NoGo);
    assert_eq!(assessment.critical_flags, vec!["Bidder is debarred".to_string()]);
}

#[test]
fn high_and_medium_risks_score_83() {
    let factors = vec![
        RiskFactor::new("Uncapped penalties", RiskCategory::Legal, Severity::High)
            .with_probability(0.9),
        RiskFactor::new("Currency exposure", RiskCategory::Financial, Severity::Medium)
            .with_probability(0.7),
    ];
    let assessment = assess(&factors);
    assert!((assessment.score - 83.0).abs() < 1e-9);
    assert_eq!(assessment.recommendation, Recommendation::Go);
    assert_eq!(assessment.high_risks_count, 1);
}

#[test]
fn missing_probability_counts_as_certain() {
    let factors = vec![RiskFactor::new("Bond required", RiskCategory::Financial, Severity::High)];
    assert!((assess(&factors).score - 85.0).abs() < 1e-9);
}

#[test]
fn score_just_below_go_threshold_is_review() {
    let factors = vec![
        RiskFactor::new("Unlimited liability clause", RiskCategory::Legal, Severity::High),
        RiskFactor::new("Penalty per day of delay", RiskCategory::Financial, Severity::High),
        RiskFactor::new("Unusual file format", RiskCategory::Technical, Severity::Low)
            .with_probability(0.002),
    ];
    let assessment = assess(&factors);
    assert_eq!(assessment.score_int(), 70);
    assert_eq!(assessment.recommendation, Recommendation::Review);
    assert!(assessment.gate_passed());
}
