// lerisque - Risk Scoring
//
// *Le Risque* (The Risk) - Deterministic bid viability scoring with kill switch

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Converts qualitative risk findings into a 0-100 viability score and a
//! GO / REVIEW / NO_GO recommendation.
//!
//! ```
//! use lerisque::{assess, Recommendation, RiskCategory, RiskFactor, Severity};
//!
//! let risks = vec![
//!     RiskFactor::new("Thin margin", RiskCategory::Financial, Severity::Medium).with_probability(0.4),
//!     RiskFactor::new("Unclear SLA", RiskCategory::Technical, Severity::Low).with_probability(0.6),
//! ];
//! let assessment = assess(&risks);
//! assert!((assessment.score - 96.8).abs() < 1e-9);
//! assert_eq!(assessment.recommendation, Recommendation::Go);
//! ```

/// Risk factor input model
pub mod factor;

/// Impact x probability matrix
pub mod matrix;

/// Weighted scoring and recommendation
pub mod score;

pub use factor::{RiskCategory, RiskFactor, Severity};
pub use matrix::{build_matrix, Level, MatrixCell, MatrixColor};
pub use score::{
    assess, CategoryBreakdown, Recommendation, RiskAssessment, RiskScorer, BASE_SCORE,
    GO_THRESHOLD, REVIEW_THRESHOLD,
};
