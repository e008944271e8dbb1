use serde::{Deserialize, Serialize};

/// Business area a risk belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    /// Budget, guarantees, payment terms
    Financial,
    /// Regulation, liability, sanctions
    Legal,
    /// Architecture, SLAs, integrations
    Technical,
    /// Image and track-record exposure
    Reputational,
}

impl RiskCategory {
    /// All categories in reporting order
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::Financial,
        RiskCategory::Legal,
        RiskCategory::Technical,
        RiskCategory::Reputational,
    ];

    /// Parse a category label, case-insensitive. `reputation` is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "financial" => Some(Self::Financial),
            "legal" => Some(Self::Legal),
            "technical" => Some(Self::Technical),
            "reputational" | "reputation" => Some(Self::Reputational),
            _ => None,
        }
    }

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Financial => "financial",
            Self::Legal => "legal",
            Self::Technical => "technical",
            Self::Reputational => "reputational",
        }
    }
}

/// Impact of a risk if it materialises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Manageable
    Low,
    /// Needs mitigation
    Medium,
    /// Can compromise the bid
    High,
    /// Showstopper: triggers the kill switch
    Critical,
}

impl Severity {
    /// Parse a severity label, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Penalty weight; `None` for critical, which bypasses the weighted sum
    pub fn weight(self) -> Option<f64> {
        match self {
            Self::Low => Some(2.0),
            Self::Medium => Some(5.0),
            Self::High => Some(15.0),
            Self::Critical => None,
        }
    }

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

fn default_source_agent() -> String {
    "unknown".to_string()
}

/// One risk finding reported by an agent or supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    /// Short description of the risk
    pub description: String,

    /// Business area
    pub category: RiskCategory,

    /// Impact level
    pub severity: Severity,

    /// Likelihood in `[0, 1]`; missing means certainty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    /// Who reported the risk
    #[serde(default = "default_source_agent")]
    pub source_agent: String,

    /// Supporting excerpt from the tender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    /// Page of the tender where the risk was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_reference: Option<u32>,
}

impl RiskFactor {
    /// Create a factor with certain probability
    pub fn new(description: impl Into<String>, category: RiskCategory, severity: Severity) -> Self {
        Self {
            description: description.into(),
            category,
            severity,
            probability: None,
            source_agent: default_source_agent(),
            evidence: None,
            page_reference: None,
        }
    }

    /// Set the probability
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Set the reporting agent
    pub fn with_source(mut self, source_agent: impl Into<String>) -> Self {
        self.source_agent = source_agent.into();
        self
    }

    /// Probability used for scoring.
    ///
    /// Missing and NaN values count as 1.0; everything else is clamped to `[0, 1]`.
    pub fn effective_probability(&self) -> f64 {
        match self.probability {
            Some(p) if p.is_nan() => 1.0,
            Some(p) => p.clamp(0.0, 1.0),
            None => 1.0,
        }
    }

    /// Weighted penalty, or `None` for critical factors
    pub fn penalty(&self) -> Option<f64> {
        self.severity
            .weight()
            .map(|weight| weight * self.effective_probability())
    }

    /// True for kill-switch factors
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
