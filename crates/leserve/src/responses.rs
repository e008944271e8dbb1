//! Request and response bodies of the document and risk endpoints
//!
//! `/api/query` uses [`lephase::QueryRequest`] and [`lephase::QueryResponse`]
//! directly.

use lerecherche::IndexStats;
use lerisque::{RiskAssessment, RiskFactor};
use serde::{Deserialize, Serialize};

/// Pre-extracted document text, one string per page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUploadRequest {
    /// Document name reported in answer sources
    pub source: String,

    /// Page texts, page 1 first
    pub pages: Vec<String>,
}

/// Result of one upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentUploadResponse {
    /// Uploaded document name
    pub source: String,

    /// Pages received
    pub pages: usize,

    /// New chunks; chunks already indexed are not counted
    pub chunks_added: usize,

    /// Index after the upload
    pub index: IndexStats,
}

/// Index contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentListResponse {
    /// Indexed documents, sorted
    pub sources: Vec<String>,

    /// Document count
    pub total_documents: usize,

    /// Chunk count
    pub total_chunks: usize,
}

impl From<IndexStats> for DocumentListResponse {
    fn from(stats: IndexStats) -> Self {
        Self {
            total_documents: stats.documents,
            total_chunks: stats.chunks,
            sources: stats.sources,
        }
    }
}

/// Result of clearing the index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClearResponse {
    /// Documents dropped
    pub documents_removed: usize,

    /// Chunks dropped
    pub chunks_removed: usize,
}

/// Direct risk calculation input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScoreRequest {
    /// Findings to score
    pub risk_factors: Vec<RiskFactor>,
}

/// Direct risk calculation output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskScoreResponse {
    /// Score rounded to an integer
    pub score_int: u8,

    /// Recommendation is not NO_GO
    pub gate_passed: bool,

    /// One-line summary
    pub summary: String,

    /// Full assessment
    pub assessment: RiskAssessment,
}

impl From<RiskAssessment> for RiskScoreResponse {
    fn from(assessment: RiskAssessment) -> Self {
        Self {
            score_int: assessment.score_int(),
            gate_passed: assessment.gate_passed(),
            summary: assessment.summary(),
            assessment,
        }
    }
}

/// Health payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Always "ok" when the server answers
    pub status: String,

    /// Service name
    pub service: String,

    /// Crate version
    pub version: String,

    /// Model used by the pipeline
    pub model: String,

    /// Indexed chunks
    pub indexed_chunks: usize,
}
