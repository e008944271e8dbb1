// Project Configuration
//
// *La Configuration* (The Configuration) - Pipeline, model and server settings for LeCahier

use anyhow::{bail, Context, Result};
use lemodele::ModelConfig;
use lephase::PipelineConfig;
use leserve::ServerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the project configuration
pub const CONFIG_DIR: &str = ".lecahier";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".lecahier/config.toml";

/// Project configuration
///
/// ```toml
/// [pipeline.audit]
/// max_revisions = 1
///
/// [model]
/// model = "llama-3.1-8b-instant"
///
/// [server]
/// port = 8080
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Question pipeline settings
    pub pipeline: PipelineConfig,

    /// Model backend settings
    pub model: ModelConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

impl ProjectConfig {
    /// Path of the config file inside `project_path`
    pub fn path<P: AsRef<Path>>(project_path: P) -> PathBuf {
        project_path.as_ref().join(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.lecahier/config.toml` in the project directory and falls
    /// back to defaults when it does not exist. The pipeline table is
    /// normalized and validated.
    pub fn load<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let config_path = Self::path(project_path);

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        config.pipeline = config.pipeline.normalized();
        config.validate()
            .with_context(|| format!("Invalid config file: {:?}", config_path))?;

        Ok(config)
    }

    /// Apply environment overrides for the model and server tables
    pub fn with_env_overrides(mut self) -> Self {
        self.model = self.model.with_env_overrides();
        self.server = self.server.with_env_overrides();
        self
    }

    /// Reject inconsistent tables
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.pipeline.validate() {
            bail!("[pipeline] {e}");
        }
        if let Err(e) = self.server.validate() {
            bail!("[server] {e}");
        }
        if self.model.model.trim().is_empty() {
            bail!("[model] model must not be empty");
        }
        Ok(())
    }

    /// Save configuration to a directory
    ///
    /// Creates `.lecahier` if it doesn't exist.
    pub fn save<P: AsRef<Path>>(&self, project_path: P) -> Result<PathBuf> {
        let config_dir = project_path.as_ref().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;

        let config_path = config_dir.join("config.toml");
        fs::write(&config_path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(config_path)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lephase::AuditMode;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.pipeline.audit.max_revisions, 2);
        assert_eq!(config.server.port, leserve::config::DEFAULT_PORT);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            ProjectConfig::path(dir.path()),
            r#"
            [pipeline.audit]
            max_revisions = 1
            mode = "model"

            [pipeline.retrieval]
            k = 0

            [model]
            model = "llama-3.1-8b-instant"

            [server]
            port = 8080
            "#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.pipeline.audit.max_revisions, 1);
        assert_eq!(config.pipeline.audit.mode, AuditMode::Model);
        // zero k is normalized
        assert_eq!(config.pipeline.retrieval.k, 10);
        assert_eq!(config.model.model, "llama-3.1-8b-instant");
        assert_eq!(config.model.api_key_env, lemodele::chat::DEFAULT_API_KEY_ENV);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, leserve::config::DEFAULT_HOST);
    }

    #[test]
    fn test_invalid_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(ProjectConfig::path(dir.path()), "[pipeline.audit]\nreview_threshold = 90.0\n").unwrap();

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("config.toml"));
        assert!(chain.contains("review_threshold"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.pipeline.grader.fallback_docs = 3;
        config.server.port = 9100;

        let path = config.save(dir.path()).unwrap();
        assert!(path.ends_with(".lecahier/config.toml"));

        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.pipeline, config.pipeline);
        assert_eq!(loaded.server, config.server);
    }
}
