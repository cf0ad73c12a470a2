//! `cl100k_base` token counting via `tiktoken-rs`, matching the encoder an
//! OpenAI-compatible chat-completions endpoint actually tokenizes with.

use mcpcp_core::capability::Tokenizer;
use tiktoken_rs::CoreBPE;

pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// # Panics
    /// Panics if the bundled `cl100k_base` encoder table fails to load —
    /// this indicates a broken `tiktoken-rs` install, not a runtime
    /// condition callers can recover from.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bpe: tiktoken_rs::cl100k_base().expect("cl100k_base encoder table"),
        }
    }
}

impl Default for Cl100kTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_roughly_one_token_per_short_word() {
        let tokenizer = Cl100kTokenizer::new();
        let n = tokenizer.count("hello world");
        assert!(n >= 2 && n <= 4);
    }

    #[test]
    fn empty_string_is_zero_tokens() {
        let tokenizer = Cl100kTokenizer::new();
        assert_eq!(tokenizer.count(""), 0);
    }
}
