//! Tool result content blocks and the result envelope.
//!
//! A result's `content` array mixes text, image, and embedded-resource
//! blocks. We model it
//! as a tagged enum so masking/compression transforms can dispatch on tag and
//! pass non-text blocks through untouched, rather than reaching into a
//! free-form `serde_json::Value` at every call site.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { data: String, mime_type: String },
    Resource { resource: Value },
}

impl ContentBlock {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text_mut(&mut self) -> Option<&mut String> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The result of a tool call, as returned by an upstream and as returned by
/// this proxy to its own downstream client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: format!("Error: {}", message.into()),
            }],
            is_error: true,
        }
    }

    /// Total token-bearing text across all text blocks, measured with `count`.
    pub fn text_token_count(&self, count: impl Fn(&str) -> usize) -> usize {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .map(count)
            .sum()
    }
}
