//! Quantitative branch: numeric extraction, chart selection, a Vega-Lite
//! chart and a short insight. Nothing in here fails the pipeline.

use std::sync::Arc;
use std::time::Duration;

use lemodele::{complete_within, parse_json_block, CompletionRequest, LanguageModel, LlmError};
use lerecherche::ContextChunk;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::format::{context_block, truncate};

const EXTRACTION_SYSTEM: &str = "You extract numeric data from tender documents. Use only figures \
present in the context. Reply with JSON only: {\"data_found\": bool, \"data_type\": \"comparison\" | \
\"timeline\" | \"distribution\" | \"single_value\" | \"table\", \"categories\": [string], \"values\": \
[number], \"unit\": string, \"data_quality\": \"clean\" | \"sanitized\" | \"incomplete\", \"notes\": string}";

const INSIGHT_SYSTEM: &str = "You are a quantitative analyst. Write 2 to 4 sentences interpreting the \
extracted data for a bid manager. Mention the largest and smallest items and anything unusual. \
Do not invent figures.";

const DEFAULT_CONTEXT_MAX_CHARS: usize = 6_000;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Chart chosen for the extracted data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Bar chart
    Bar,
    /// Line chart
    Line,
    /// Pie chart
    Pie,
    /// Tabular data, not drawn
    Table,
    /// No data
    #[default]
    None,
}

/// How trustworthy the extracted figures are.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Figures taken as written
    #[default]
    Clean,
    /// Some entries were normalised or dropped
    Sanitized,
    /// Extraction failed or data is partial
    Incomplete,
}

impl DataQuality {
    /// Parse a label, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clean" => Some(Self::Clean),
            "sanitized" => Some(Self::Sanitized),
            "incomplete" => Some(Self::Incomplete),
            _ => None,
        }
    }
}

/// Numeric data extracted from the context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuantData {
    /// Any numeric data was found
    pub data_found: bool,
    /// comparison, timeline, distribution, single_value or table
    pub data_type: String,
    /// Labels, aligned with `values`
    pub categories: Vec<String>,
    /// Values, aligned with `categories`
    pub values: Vec<f64>,
    /// Unit or currency
    pub unit: String,
    /// Extraction quality
    pub data_quality: DataQuality,
    /// Free-form remarks
    pub notes: String,
}

impl QuantData {
    fn missing(notes: impl Into<String>, quality: DataQuality) -> Self {
        Self {
            data_quality: quality,
            notes: notes.into(),
            ..Self::default()
        }
    }

    /// Build from the model's extraction JSON, repairing what can be repaired.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let mut quality = DataQuality::parse(&text("data_quality")).unwrap_or_default();
        let mut notes = vec![text("notes")];

        let categories: Vec<String> = value
            .get("categories")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let raw_values = value
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut pairs = Vec::new();
        let mut dropped = 0usize;
        for (i, raw) in raw_values.iter().enumerate() {
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_number(s),
                _ => None,
            };
            match parsed {
                Some(v) if v.is_finite() => {
                    let label = categories
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("#{}", i + 1));
                    pairs.push((label, v));
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            if quality == DataQuality::Clean {
                quality = DataQuality::Sanitized;
            }
            notes.push(format!("{dropped} unparseable value(s) dropped"));
        }
        if !categories.is_empty() && categories.len() != raw_values.len() {
            if quality == DataQuality::Clean {
                quality = DataQuality::Sanitized;
            }
            notes.push("categories and values had different lengths".to_string());
        }

        let (categories, values): (Vec<String>, Vec<f64>) = pairs.into_iter().unzip();
        let data_found = value
            .get("data_found")
            .and_then(Value::as_bool)
            .unwrap_or(!values.is_empty())
            && !values.is_empty();

        Self {
            data_found,
            data_type: text("data_type").to_ascii_lowercase(),
            categories,
            values,
            unit: text("unit"),
            data_quality: quality,
            notes: notes
                .into_iter()
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Parse a figure written with either `.` or `,` as thousands or decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (None, Some(c)) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(d), None) => {
            let decimals = cleaned.len() - d - 1;
            if cleaned.matches('.').count() == 1 && decimals != 3 {
                cleaned
            } else {
                cleaned.replace('.', "")
            }
        }
        (None, None) => cleaned,
    };
    normalized.parse().ok()
}

/// Deterministic chart selection.
pub fn select_chart(data: &QuantData) -> ChartType {
    if !data.data_found || data.values.is_empty() {
        return ChartType::None;
    }
    match data.data_type.as_str() {
        "comparison" => ChartType::Bar,
        "timeline" => ChartType::Line,
        "distribution" => ChartType::Pie,
        "table" => ChartType::Table,
        _ => ChartType::Bar,
    }
}

/// Vega-Lite chart for bar, line and pie data. Tables and empty data are not charted.
pub fn chart_spec(chart: ChartType, data: &QuantData) -> Option<Value> {
    let mark = match chart {
        ChartType::Bar => "bar",
        ChartType::Line => "line",
        ChartType::Pie => "arc",
        ChartType::Table | ChartType::None => return None,
    };
    // slices need a positive share
    let rows: Vec<Value> = data
        .values
        .iter()
        .enumerate()
        .filter(|(_, value)| chart != ChartType::Pie || **value > 0.0)
        .map(|(i, value)| {
            let category = data.categories.get(i).map(String::as_str).unwrap_or_default();
            json!({ "category": category, "value": value })
        })
        .collect();
    if rows.is_empty() {
        return None;
    }

    let title = if data.unit.is_empty() {
        data.data_type.clone()
    } else {
        format!("{} ({})", data.data_type, data.unit)
    };
    let encoding = match chart {
        ChartType::Pie => json!({
            "theta": { "field": "value", "type": "quantitative" },
            "color": { "field": "category", "type": "nominal" },
        }),
        _ => json!({
            "x": { "field": "category", "type": "ordinal", "sort": null },
            "y": { "field": "value", "type": "quantitative", "title": data.unit },
        }),
    };

    Some(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": title,
        "mark": mark,
        "data": { "values": rows },
        "encoding": encoding,
    }))
}

/// Output of the quantitative branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuantAnalysis {
    /// Selected chart
    pub chart_type: ChartType,
    /// Vega-Lite chart, when drawable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
    /// 2 to 4 sentence interpretation
    pub insights: String,
    /// Extraction quality
    pub data_quality: DataQuality,
    /// Extracted data
    pub data: QuantData,
}

impl QuantAnalysis {
    fn without_data(data: QuantData) -> Self {
        Self {
            data_quality: data.data_quality,
            data,
            ..Self::default()
        }
    }
}

/// Runs the quantitative branch against the language model.
#[derive(Clone)]
pub struct QuantAnalyst {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    context_max_chars: usize,
}

impl std::fmt::Debug for QuantAnalyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantAnalyst")
            .field("model", &self.model.model_name())
            .field("timeout", &self.timeout)
            .field("context_max_chars", &self.context_max_chars)
            .finish()
    }
}

impl QuantAnalyst {
    /// Create an analyst
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            context_max_chars: DEFAULT_CONTEXT_MAX_CHARS,
        }
    }

    /// Context characters sent for extraction
    pub fn with_context_limit(mut self, context_max_chars: usize) -> Self {
        self.context_max_chars = context_max_chars;
        self
    }

    /// Extract, chart and interpret. Failures are reported inside the analysis.
    pub async fn analyze(&self, question: &str, context: &[ContextChunk]) -> QuantAnalysis {
        if context.is_empty() {
            return QuantAnalysis::without_data(QuantData::missing(
                "no context available",
                DataQuality::Incomplete,
            ));
        }

        let data = match self.extract(question, context).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(error = %err, "quantitative extraction failed");
                return QuantAnalysis::without_data(QuantData::missing(
                    format!("extraction failed: {err}"),
                    DataQuality::Incomplete,
                ));
            }
        };

        let chart_type = select_chart(&data);
        if chart_type == ChartType::None {
            return QuantAnalysis::without_data(data);
        }
        let chart = chart_spec(chart_type, &data);

        let mut data = data;
        let insights = match self.insight(question, &data).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "quantitative insight failed");
                data.notes = [data.notes.as_str(), &format!("insight failed: {err}")]
                    .into_iter()
                    .filter(|n| !n.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                fallback_insight(&data)
            }
        };

        tracing::debug!(
            chart = ?chart_type,
            values = data.values.len(),
            quality = ?data.data_quality,
            "quantitative analysis complete"
        );

        QuantAnalysis {
            chart_type,
            chart,
            insights,
            data_quality: data.data_quality,
            data,
        }
    }

    async fn extract(&self, question: &str, context: &[ContextChunk]) -> Result<QuantData, LlmError> {
        let block = context_block(context, self.context_max_chars);
        let request = CompletionRequest::new(
            EXTRACTION_SYSTEM,
            format!("QUESTION: {question}\n\nCONTEXT:\n{block}"),
        )
        .json();
        let reply = complete_within(self.model.as_ref(), &request, self.timeout).await?;
        let value = parse_json_block(&reply)
            .ok_or_else(|| LlmError::malformed(format!("extraction is not JSON: {}", truncate(&reply, 200))))?;
        Ok(QuantData::from_json(&value))
    }

    async fn insight(&self, question: &str, data: &QuantData) -> Result<String, LlmError> {
        let rows = data
            .categories
            .iter()
            .zip(&data.values)
            .map(|(c, v)| format!("- {c}: {v} {}", data.unit))
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::new(
            INSIGHT_SYSTEM,
            format!("QUESTION: {question}\n\nDATA ({}):\n{rows}", data.data_type),
        )
        .with_temperature(0.3);
        let reply = complete_within(self.model.as_ref(), &request, self.timeout).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(LlmError::malformed("empty insight"));
        }
        Ok(reply.to_string())
    }
}

fn fallback_insight(data: &QuantData) -> String {
    let max = data
        .categories
        .iter()
        .zip(&data.values)
        .max_by(|a, b| a.1.total_cmp(b.1));
    match max {
        Some((label, value)) => format!(
            "{} values were extracted from the documents. The largest is {label} with {value} {}.",
            data.values.len(),
            data.unit
        )
        .replace(" .", "."),
        None => "No numeric data could be interpreted.".to_string(),
    }
}
