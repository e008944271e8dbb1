// lemodele - Language Model Contract
//
// *Le Modèle* (The Model) - Completion contract, timeouts, and an OpenAI-compatible client

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Every text-generation call in LeCahier goes through [`LanguageModel`].
//! The pipeline only depends on the trait; [`ChatCompletionsClient`] is the
//! production backend and tests plug in scripted fakes.

/// Completion errors
pub mod error;

/// JSON extraction from model output
pub mod json;

/// The `LanguageModel` contract and request type
pub mod model;

/// OpenAI-compatible chat completions client
pub mod chat;

pub use chat::{ChatCompletionsClient, ModelConfig};
pub use error::{LlmError, Result};
pub use json::parse_json_block;
pub use model::{complete_within, CompletionRequest, LanguageModel};
