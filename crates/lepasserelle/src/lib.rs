// lepasserelle - Command Line Gateway
//
// *La Passerelle* (The Bridge) - The `lecahier` CLI tying pipeline, risk scorer and HTTP API together

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Library half of the `lecahier` binary: argument parsing, project
//! configuration and document loading.

/// Command-line interface
pub mod cli;

/// `.lecahier/config.toml` loading
pub mod config;

/// Extracted text loading
pub mod documents;

pub use cli::{Cli, Commands, ConfigAction};
pub use config::ProjectConfig;
pub use documents::load_documents;
