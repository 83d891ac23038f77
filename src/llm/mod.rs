//! Language-model access: the completion transport and the note-specific operations on top.
//!
//! [`CompletionClient`] is the only seam that talks to the network. [`Assistant`] turns the
//! pipeline's questions (classify, structure, link, query, place) into prompts and parses
//! the answers, degrading structured answers to empty values when the model misbehaves.

mod assistant;
mod client;
pub mod prompts;
mod types;

pub use assistant::Assistant;
pub use client::{AnthropicClient, CompletionClient, CompletionRequest};
pub use types::{LinkSuggestions, QueryArtifacts};

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced while talking to the language model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key has been configured.
    #[error("No API key configured. Add your Anthropic API key in the settings.")]
    MissingApiKey,
    /// HTTP layer failed before receiving a response.
    #[error("Request to the language model failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Endpoint answered with a non-success status.
    #[error("Language model returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the endpoint.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("Malformed language model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether the user has to fix their settings rather than retry later.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingApiKey)
    }
}
