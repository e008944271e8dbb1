//! leserve - HTTP Server
//!
//! *Le Serve* (The Server) - Axum-based HTTP API over the LeCahier question
//! pipeline, document index and risk scorer

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// API error types
pub mod error;

/// HTTP handlers for REST endpoints
pub mod handlers;

/// Server configuration from TOML or environment
pub mod config;

/// Document and risk endpoint bodies
pub mod responses;

/// Server instance management
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use handlers::{app, AppState};
pub use server::LeServeServer;
