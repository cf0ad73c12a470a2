//! Pluggable capability interfaces.
//!
//! Treated as capability interfaces — `generateText(system, user, maxTokens)
//! -> string` and `count(text) -> int` — so the production wiring can target
//! an OpenAI-compatible endpoint and a cl100k-style tokenizer without this
//! crate hard-coding either. Concrete implementations live in `mcpcp-llm`;
//! `mcpcp-core` only ever sees these traits, as trait objects handed in by
//! the `Generation`.

use crate::error::LlmError;
use async_trait::async_trait;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
    ) -> Result<String, LlmError>;
}

pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Stand-in used when no LLM capability is configured. Compression is
/// fail-open, so a generation built without an LLM endpoint still needs
/// *something* implementing the trait; this one always fails, which the
/// compressor treats exactly like an LLM endpoint being down.
pub struct NoopLlm;

#[async_trait]
impl LlmClient for NoopLlm {
    async fn generate_text(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _max_tokens: usize,
    ) -> Result<String, LlmError> {
        Err(LlmError::Transport("no LLM capability configured".to_string()))
    }
}
