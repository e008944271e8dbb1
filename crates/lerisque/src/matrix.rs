use serde::{Deserialize, Serialize};

use crate::factor::{RiskFactor, Severity};

/// Three-step level used on both matrix axes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
}

impl Level {
    const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    fn impact(severity: Severity) -> Self {
        match severity {
            Severity::Low => Level::Low,
            Severity::Medium => Level::Medium,
            Severity::High | Severity::Critical => Level::High,
        }
    }

    fn probability(p: f64) -> Self {
        if p < 0.33 {
            Level::Low
        } else if p < 0.66 {
            Level::Medium
        } else {
            Level::High
        }
    }
}

/// Traffic-light color of a matrix cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatrixColor {
    /// Acceptable
    Green,
    /// Watch
    Yellow,
    /// Act
    Red,
}

fn cell_color(impact: Level, probability: Level) -> MatrixColor {
    use Level::*;
    match (impact, probability) {
        (Low, Low) | (Low, Medium) | (Medium, Low) => MatrixColor::Green,
        (Low, High) | (Medium, Medium) | (High, Low) => MatrixColor::Yellow,
        (Medium, High) | (High, Medium) | (High, High) => MatrixColor::Red,
    }
}

/// Non-empty cell of the 3x3 impact x probability matrix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixCell {
    /// Impact row
    pub impact: Level,
    /// Probability column
    pub probability: Level,
    /// Descriptions of the risks in this cell
    pub risks: Vec<String>,
    /// Cell color
    pub color: MatrixColor,
}

/// Place every factor on the matrix; empty cells are omitted.
pub fn build_matrix(factors: &[RiskFactor]) -> Vec<MatrixCell> {
    let mut cells = Vec::new();
    for impact in Level::ALL {
        for probability in Level::ALL {
            let mut risks: Vec<String> = factors
                .iter()
                .filter(|f| {
                    Level::impact(f.severity) == impact
                        && Level::probability(f.effective_probability()) == probability
                })
                .map(|f| f.description.clone())
                .collect();
            if risks.is_empty() {
                continue;
            }
            risks.sort();
            cells.push(MatrixCell {
                impact,
                probability,
                risks,
                color: cell_color(impact, probability),
            });
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::RiskCategory;

    #[test]
    fn places_factors_in_expected_cells() {
        let factors = vec![
            RiskFactor::new("a", RiskCategory::Financial, Severity::Low).with_probability(0.1),
            RiskFactor::new("b", RiskCategory::Legal, Severity::Critical),
            RiskFactor::new("c", RiskCategory::Technical, Severity::Medium).with_probability(0.5),
        ];
        let cells = build_matrix(&factors);
        assert_eq!(cells.len(), 3);

        assert_eq!(cells[0].impact, Level::Low);
        assert_eq!(cells[0].color, MatrixColor::Green);
        assert_eq!(cells[1].probability, Level::Medium);
        assert_eq!(cells[1].color, MatrixColor::Yellow);
        assert_eq!(cells[2].risks, vec!["b".to_string()]);
        assert_eq!(cells[2].color, MatrixColor::Red);
    }

    #[test]
    fn empty_input_has_no_cells() {
        assert!(build_matrix(&[]).is_empty());
    }
}
