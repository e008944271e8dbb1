//! HTTP handlers for REST API endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use lephase::{PipelineEngine, QueryRequest, QueryResponse};
use lerecherche::InMemoryIndex;
use lerisque::RiskScorer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::responses::{
    ClearResponse, DocumentListResponse, DocumentUploadRequest, DocumentUploadResponse,
    HealthResponse, RiskScoreRequest, RiskScoreResponse,
};

/// State shared across all handlers
///
/// The engine retrieves from the same `index` the document endpoints write
/// to; each request clones the state, never the index.
#[derive(Clone)]
pub struct AppState {
    /// Question pipeline
    pub engine: PipelineEngine,

    /// Shared document index
    pub index: Arc<InMemoryIndex>,

    /// Scorer for `/api/risk/score`, with the pipeline thresholds
    pub scorer: RiskScorer,

    /// Model identifier reported by the health check
    pub model: Arc<str>,

    /// Immutable server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state around an engine that retrieves from `index`
    pub fn new(
        engine: PipelineEngine,
        index: Arc<InMemoryIndex>,
        model: impl Into<Arc<str>>,
        config: ServerConfig,
    ) -> Self {
        let audit = &engine.config().audit;
        let scorer = RiskScorer::with_thresholds(audit.go_threshold, audit.review_threshold);
        Self {
            engine,
            index,
            scorer,
            model: model.into(),
            config: Arc::new(config),
        }
    }
}

/// POST /api/query - Answer one question
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let report = state.engine.run(&request).await?;
    Ok(Json(report.to_response()))
}

/// POST /api/query/stream - Answer one question as server-sent events
///
/// Sends a `status` event at once, then a single `result` event carrying the
/// query response or an `error` event carrying the API error body. A dropped
/// connection drops the pipeline run with it.
pub async fn query_stream(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let status = Event::default().event("status").json_data(serde_json::json!({
        "step": "retrieve",
        "message": "Retrieving documents",
    }));

    let outcome = stream::once(async move {
        match state.engine.run(&request).await {
            Ok(report) => Event::default()
                .event("result")
                .json_data(report.to_response()),
            Err(err) => {
                let error = ApiError::from(err);
                warn!(code = error.code, status = %error.status, "streamed query failed");
                Event::default().event("error").json_data(error.body())
            }
        }
    });

    Sse::new(stream::iter([status]).chain(outcome)).keep_alive(KeepAlive::default())
}

/// POST /api/documents - Chunk and index pre-extracted pages
pub async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentUploadRequest>,
) -> ApiResult<(StatusCode, Json<DocumentUploadResponse>)> {
    let source = request.source.trim();
    if source.is_empty() {
        return Err(ApiError::validation("source must not be empty"));
    }
    if request.pages.iter().all(|page| page.trim().is_empty()) {
        return Err(ApiError::validation("document has no text"));
    }
    if request.pages.len() > state.config.max_pages_per_upload {
        return Err(ApiError::validation(format!(
            "document has {} pages, the limit is {}",
            request.pages.len(),
            state.config.max_pages_per_upload
        )));
    }

    let chunks = state.config.chunker().split_pages(source, &request.pages);
    let chunks_added = state.index.ingest(chunks);
    info!(source, pages = request.pages.len(), chunks_added, "document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(DocumentUploadResponse {
            source: source.to_string(),
            pages: request.pages.len(),
            chunks_added,
            index: state.index.stats(),
        }),
    ))
}

/// GET /api/documents - Describe the index
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    Json(state.index.stats().into())
}

/// DELETE /api/documents - Drop every indexed document
pub async fn clear_documents(State(state): State<AppState>) -> Json<ClearResponse> {
    let before = state.index.stats();
    state.index.clear();
    warn!(documents = before.documents, chunks = before.chunks, "index cleared over HTTP");
    Json(ClearResponse {
        documents_removed: before.documents,
        chunks_removed: before.chunks,
    })
}

/// POST /api/risk/score - Score risk factors without running the pipeline
///
/// Out-of-range probabilities are clamped by the scorer.
pub async fn score_risks(
    State(state): State<AppState>,
    Json(request): Json<RiskScoreRequest>,
) -> ApiResult<Json<RiskScoreResponse>> {
    let assessment = state.scorer.assess(&request.risk_factors);
    info!(
        score = assessment.score,
        recommendation = %assessment.recommendation,
        factors = request.risk_factors.len(),
        "risk scored"
    );
    Ok(Json(assessment.into()))
}

/// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "leserve".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.model.to_string(),
        indexed_chunks: state.index.stats().chunks,
    })
}

/// Create router with all API endpoints
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/query", post(query))
        .route("/api/query/stream", post(query_stream))
        .route(
            "/api/documents",
            post(upload_document).get(list_documents).delete(clear_documents),
        )
        .route("/api/risk/score", post(score_risks))
}

/// Router with state, CORS and request tracing applied
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let router = create_router().layer(cors);
    let router = if state.config.enable_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
