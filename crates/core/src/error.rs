//! Error types for the control plane.

use thiserror::Error;

/// Errors raised by an [`crate::upstream::UpstreamClient`] when a listing
/// operation fails outright (call failures are instead surfaced as
/// `isError` results).
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream '{upstream_id}' is not connected")]
    NotConnected { upstream_id: String },

    #[error("upstream '{upstream_id}' transport error: {message}")]
    Transport { upstream_id: String, message: String },

    #[error("upstream '{upstream_id}' returned a malformed response: {message}")]
    Protocol { upstream_id: String, message: String },
}

/// Errors raised by a pluggable LLM capability ([`crate::capability::LlmClient`]).
///
/// Both the masker's LLM fallback and the compressor treat every variant as
/// fail-open: the caller falls back to the pre-LLM behavior and logs at warn.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    Transport(String),

    #[error("llm returned a response that could not be parsed: {0}")]
    Parse(String),
}

/// Errors raised while resolving routing for a namespaced identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("resource '{0}' not found")]
    ResourceNotFound(String),

    #[error("prompt '{0}' not found")]
    PromptNotFound(String),
}
