//! Server configuration from TOML or environment

use lerecherche::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default host address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port number
pub const DEFAULT_PORT: u16 = 47280;

/// Default CORS origins (localhost for development)
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Largest accepted upload, in pages
pub const MAX_PAGES_PER_UPLOAD: usize = 2_000;

/// Server configuration, the `[server]` table of the project config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Enable request tracing
    pub enable_logging: bool,

    /// Log level for tracing
    pub log_level: String,

    /// Characters per chunk for uploaded pages
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Largest accepted upload, in pages
    pub max_pages_per_upload: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            enable_logging: true,
            log_level: "info".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_pages_per_upload: MAX_PAGES_PER_UPLOAD,
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables with fallback to defaults
    ///
    /// Environment variables:
    /// - `LESERVE_HOST` - Server host
    /// - `LESERVE_PORT` - Server port
    /// - `LESERVE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `LESERVE_*` variables on top of this config
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("LESERVE_HOST") {
            self.host = host;
        }

        if let Ok(port_str) = std::env::var("LESERVE_PORT") {
            match port_str.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %port_str, "ignoring invalid LESERVE_PORT"),
            }
        }

        if let Ok(log_level) = std::env::var("LESERVE_LOG_LEVEL") {
            self.log_level = log_level;
        }

        self
    }

    /// Chunker for uploaded pages
    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }

    /// Get the socket address for the server
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {}", e))
    }

    /// Get the full server URL (e.g., "http://127.0.0.1:47280")
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be zero".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }

        if self.chunk_size == 0 {
            return Err("Chunk size must be greater than zero".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        if self.max_pages_per_upload == 0 {
            return Err("Max pages per upload must be greater than zero".to_string());
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                ));
            }
        }

        Ok(())
    }
}
