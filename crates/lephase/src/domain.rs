use std::fmt;

use serde::{Deserialize, Serialize};

/// Question domain chosen by the router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Laws, jurisdiction, contractual sanctions
    Legal,
    /// Budget, payments, guarantees
    Financial,
    /// Architecture, SLAs, infrastructure
    Technical,
    /// Schedules, deadlines, milestones
    Timeline,
    /// Eligibility, experience, key personnel
    Requirements,
    /// Numeric comparisons and charts
    Quantitative,
    /// Anything else
    General,
}

impl Domain {
    /// All domains
    pub const ALL: [Domain; 7] = [
        Domain::Legal,
        Domain::Financial,
        Domain::Technical,
        Domain::Timeline,
        Domain::Requirements,
        Domain::Quantitative,
        Domain::General,
    ];

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Legal => "legal",
            Domain::Financial => "financial",
            Domain::Technical => "technical",
            Domain::Timeline => "timeline",
            Domain::Requirements => "requirements",
            Domain::Quantitative => "quantitative",
            Domain::General => "general",
        }
    }

    /// Parse a label, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Domain::ALL.into_iter().find(|d| d.as_str() == value)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
