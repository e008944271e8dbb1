// CLI Interface
//
// This module provides the command-line interface for LeCahier.

use crate::config::ProjectConfig;
use crate::documents::load_documents;
use anyhow::{bail, Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use lemodele::ChatCompletionsClient;
use lephase::{PipelineEngine, QueryRequest, QueryResponse};
use lerecherche::InMemoryIndex;
use lerisque::{RiskAssessment, RiskFactor, RiskScorer};
use leserve::{AppState, LeServeServer};
use serde::Deserialize;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// LeCahier - Tender Question Answering and Bid Risk Scoring
#[derive(Parser, Debug)]
#[command(name = "lecahier")]
#[command(author = "LeCahier Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ask questions about tender documents and score bid risks", long_about = None)]
pub struct Cli {
    /// Directory holding `.lecahier/config.toml` (defaults to the current directory)
    #[arg(global = true, long = "project", short = 'p')]
    pub project_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question from extracted tender text
    Ask {
        /// Question in natural language
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Extracted text files; pages are separated by form feeds
        #[arg(long = "doc", short = 'd', value_name = "FILE", required = true)]
        documents: Vec<PathBuf>,

        /// JSON file of risk factors known before asking
        #[arg(long = "risks", value_name = "FILE")]
        risks: Option<PathBuf>,

        /// Print the full JSON response
        #[arg(long = "json")]
        json: bool,
    },

    /// Score risk factors from a JSON file ("-" reads stdin)
    Risk {
        /// JSON array of factors, or an object with `risk_factors`
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the full JSON assessment
        #[arg(long = "json")]
        json: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Host address to bind to (overrides `[server] host`)
        #[arg(long = "host")]
        host: Option<String>,

        /// Port to listen on (overrides `[server] port`)
        #[arg(long = "port")]
        port: Option<u16>,

        /// Extracted text files to index at startup
        #[arg(long = "doc", short = 'd', value_name = "FILE")]
        documents: Vec<PathBuf>,
    },

    /// Show or create the project configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long = "force")]
        force: bool,
    },
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<()> {
        init_logging(self.verbose);

        let project = match self.project_path {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };

        match self.command {
            Commands::Ask {
                question,
                documents,
                risks,
                json,
            } => cmd_ask(&project, question, &documents, risks.as_deref(), json).await,
            Commands::Risk { input, json } => cmd_risk(&project, &input, json),
            Commands::Serve { host, port, documents } => cmd_serve(&project, host, port, &documents).await,
            Commands::Config { action } => cmd_config(&project, action),
        }
    }
}

/// Initialize logging to stderr; `RUST_LOG` wins over `--verbose`
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(project: &Path) -> AnyhowResult<ProjectConfig> {
    Ok(ProjectConfig::load(project)?.with_env_overrides())
}

fn build_engine(config: &ProjectConfig, index: Arc<InMemoryIndex>) -> AnyhowResult<PipelineEngine> {
    let model = ChatCompletionsClient::from_env(config.model.clone())
        .context("Failed to configure the model client")?;
    PipelineEngine::new(config.pipeline.clone(), index, Arc::new(model)).context("Invalid pipeline configuration")
}

/// Ask command implementation
async fn cmd_ask(
    project: &Path,
    question: String,
    documents: &[PathBuf],
    risks: Option<&Path>,
    json: bool,
) -> AnyhowResult<()> {
    let config = load_config(project)?;

    let index = Arc::new(InMemoryIndex::new());
    let added = load_documents(&index, &config.server.chunker(), documents)?;
    info!(chunks = added, "documents indexed");

    let mut request = QueryRequest::new(question);
    if let Some(path) = risks {
        request = request.with_risk_factors(parse_risk_factors(&read_input(path)?)?);
    }

    let engine = build_engine(&config, index)?;
    let report = engine.run_until(&request, interrupted()).await?;
    let response = report.to_response();

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render_response(&response));
    }
    Ok(())
}

/// Risk command implementation
fn cmd_risk(project: &Path, input: &Path, json: bool) -> AnyhowResult<()> {
    let config = load_config(project)?;
    let factors = parse_risk_factors(&read_input(input)?)?;

    let audit = &config.pipeline.audit;
    let assessment = RiskScorer::with_thresholds(audit.go_threshold, audit.review_threshold).assess(&factors);

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print!("{}", render_assessment(&assessment));
    }
    Ok(())
}

/// Serve command implementation
async fn cmd_serve(
    project: &Path,
    host: Option<String>,
    port: Option<u16>,
    documents: &[PathBuf],
) -> AnyhowResult<()> {
    let mut config = load_config(project)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let index = Arc::new(InMemoryIndex::new());
    if !documents.is_empty() {
        let added = load_documents(&index, &config.server.chunker(), documents)?;
        info!(chunks = added, "documents indexed");
    }

    let engine = build_engine(&config, index.clone())?;
    let state = AppState::new(engine, index, config.model.model.clone(), config.server.clone());
    let server = LeServeServer::new(state)?;

    println!("LeCahier API listening on {}", server.server_url());
    println!("Press Ctrl+C to stop");
    server.start().await?;
    Ok(())
}

/// Config command implementation
fn cmd_config(project: &Path, action: ConfigAction) -> AnyhowResult<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", load_config(project)?.to_toml()?);
        }
        ConfigAction::Init { force } => {
            let path = ProjectConfig::path(project);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = ProjectConfig::default().save(project)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn read_input(path: &Path) -> AnyhowResult<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RiskInput {
    List(Vec<RiskFactor>),
    Request { risk_factors: Vec<RiskFactor> },
}

/// Parse a JSON array of risk factors or an object with `risk_factors`
pub fn parse_risk_factors(text: &str) -> AnyhowResult<Vec<RiskFactor>> {
    let input: RiskInput = serde_json::from_str(text).context("Invalid risk factor JSON")?;
    Ok(match input {
        RiskInput::List(factors) | RiskInput::Request { risk_factors: factors } => factors,
    })
}

/// Human-readable answer
pub fn render_response(response: &QueryResponse) -> String {
    let meta = &response.agent_metadata;
    let mut out = String::new();

    let _ = writeln!(out, "{}\n", response.answer);
    if !response.sources.is_empty() {
        let _ = writeln!(out, "Sources: {}", response.sources.join(", "));
    }
    let _ = writeln!(
        out,
        "Domain: {} ({}), documents {}/{}, revisions {}, audit {}",
        meta.domain,
        meta.specialist_used,
        meta.documents_filtered,
        meta.documents_retrieved,
        meta.revision_count,
        meta.audit_result
    );
    if meta.degraded {
        let _ = writeln!(out, "Warning: the answer did not pass the audit");
    }
    if let Some(risk) = &meta.risk_assessment {
        let _ = writeln!(out, "Risk: {}/100 {}", risk.score, risk.recommendation);
        for flag in &risk.critical_flags {
            let _ = writeln!(out, "  critical: {flag}");
        }
    }
    out
}

/// Human-readable assessment
pub fn render_assessment(assessment: &RiskAssessment) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Score: {:.1}/100  Recommendation: {}",
        assessment.score, assessment.recommendation
    );
    let _ = writeln!(out, "{}", assessment.reason);
    if assessment.kill_switch_activated {
        for flag in &assessment.critical_flags {
            let _ = writeln!(out, "  critical: {flag}");
        }
    }
    for item in assessment.breakdown.iter().filter(|b| b.risk_count > 0) {
        let _ = writeln!(
            out,
            "  {:<13} {:>5.1}  ({} risks, penalty {:.1})",
            item.category.as_str(), item.score, item.risk_count, item.total_penalty
        );
    }
    out
}

/// Main entry point for the CLI
pub async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();
    cli.run().await
}
