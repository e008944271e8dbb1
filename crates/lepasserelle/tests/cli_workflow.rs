// Integration Tests for LePasserelle
//
// End-to-end workflows: project config on disk, extracted text loaded into
// the index, one question through the pipeline, rendered for the terminal.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use lemodele::{CompletionRequest, LanguageModel};
use lephase::{PipelineEngine, QueryRequest};
use lepasserelle::cli::{parse_risk_factors, render_response};
use lepasserelle::{load_documents, ProjectConfig};
use lerecherche::InMemoryIndex;
use tempfile::TempDir;

struct ScriptedModel;

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: &CompletionRequest) -> lemodele::Result<String> {
        Ok("El plazo de entrega es de 90 días corridos (pliego.txt p.1).".to_string())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pliego.txt"),
        "El plazo de entrega es de 90 días corridos desde la firma del contrato.\u{c}\
         La garantía de oferta debe presentarse en sobre cerrado.\u{c}",
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn test_config_and_documents_drive_the_pipeline() {
    let dir = project();
    let mut config = ProjectConfig::default();
    config.pipeline.audit.max_revisions = 1;
    config.save(dir.path()).unwrap();

    let config = ProjectConfig::load(dir.path()).unwrap();
    let index = Arc::new(InMemoryIndex::new());
    let added = load_documents(&index, &config.server.chunker(), &[dir.path().join("pliego.txt")]).unwrap();
    assert_eq!(added, 2);

    let engine = PipelineEngine::new(config.pipeline.clone(), index, Arc::new(ScriptedModel)).unwrap();
    let report = engine
        .run(&QueryRequest::new("¿Cuál es el plazo de entrega?"))
        .await
        .unwrap();
    assert!(!report.degraded);
    assert_eq!(engine.config().audit.max_revisions, 1);

    let text = render_response(&report.to_response());
    assert!(text.starts_with("El plazo de entrega es de 90 días"));
    assert!(text.contains("Sources: pliego.txt"));
    assert!(text.contains("Domain: timeline (specialist_timeline)"));
    assert!(text.contains("audit pass"));
    assert!(!text.contains("Warning"));
}

#[tokio::test]
async fn test_risk_file_reaches_the_response() {
    let dir = project();
    let index = Arc::new(InMemoryIndex::new());
    let config = ProjectConfig::load(dir.path()).unwrap();
    load_documents(&index, &config.server.chunker(), &[dir.path().join("pliego.txt")]).unwrap();

    let factors = parse_risk_factors(
        r#"{"risk_factors": [
            {"description": "Penalidad del 20% por atraso", "category": "financial", "severity": "critical"}
        ]}"#,
    )
    .unwrap();

    let engine = PipelineEngine::new(config.pipeline, index, Arc::new(ScriptedModel)).unwrap();
    let response = engine
        .run(&QueryRequest::new("¿Cuál es el plazo de entrega?").with_risk_factors(factors))
        .await
        .unwrap()
        .to_response();

    let text = render_response(&response);
    assert!(text.contains("Warning: the answer did not pass the audit"));
    assert!(text.contains("Risk: 0/100 NO_GO"));
    assert!(text.contains("critical: Penalidad del 20% por atraso"));
}
