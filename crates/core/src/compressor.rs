//! Response compression.
//!
//! Given a tool result, decide whether it's worth summarizing through the
//! pluggable LLM, and if so, replace each oversized text block with the
//! LLM's reduced version. Non-text blocks and error results pass through
//! untouched; any LLM failure is fail-open (return the original result,
//! log a warning).

use crate::capability::{LlmClient, Tokenizer};
use crate::content::{ContentBlock, ToolCallResult};
use crate::policy::ResolvedCompressionPolicy;

/// Informational content-type tag. Not
/// used to change the prompt — only for logging, so an operator can see why
/// a given block was or wasn't worth compressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategy {
    Json,
    Code,
    Default,
}

#[must_use]
pub fn detect_strategy(text: &str) -> ContentStrategy {
    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        return ContentStrategy::Json;
    }

    let indicators = [
        text.contains("function "),
        text.contains("def "),
        text.contains("class "),
        text.contains("=>"),
        text.contains("import ") || text.contains("require("),
        text.contains(": string") || text.contains(": number") || text.contains("interface "),
        text.contains("async "),
        text.matches('{').count() >= 2 && text.contains(';'),
    ];
    if indicators.iter().filter(|i| **i).count() >= 2 {
        ContentStrategy::Code
    } else {
        ContentStrategy::Default
    }
}

pub struct Compressor {
    tokenizer: std::sync::Arc<dyn Tokenizer>,
    llm: std::sync::Arc<dyn LlmClient>,
}

impl Compressor {
    #[must_use]
    pub fn new(tokenizer: std::sync::Arc<dyn Tokenizer>, llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { tokenizer, llm }
    }

    /// Decide whether to summarize and return the (possibly) reduced result.
    pub async fn compress_tool_result(
        &self,
        result: ToolCallResult,
        tool_name: &str,
        goal: Option<&str>,
        escalation_multiplier: Option<f64>,
        policy: &ResolvedCompressionPolicy,
    ) -> ToolCallResult {
        if !policy.enabled || result.is_error {
            return result;
        }

        let total_tokens: usize = result.text_token_count(|t| self.tokenizer.count(t));
        if total_tokens < policy.token_threshold {
            return result;
        }

        let budget = budget_for(policy, escalation_multiplier);
        let mut out = result;
        for block in &mut out.content {
            let ContentBlock::Text { text } = block else {
                continue;
            };
            if self.tokenizer.count(text) < policy.token_threshold {
                continue;
            }

            let strategy = detect_strategy(text);
            tracing::debug!(tool = %tool_name, ?strategy, budget, "compressing tool result block");

            let system = build_system_prompt(policy, goal, budget);
            let user = build_user_prompt(text, goal);

            match self.llm.generate_text(&system, &user, budget).await {
                Ok(compressed) => *text = compressed,
                Err(err) => {
                    tracing::warn!(tool = %tool_name, error = %err, "compression failed; returning original result");
                    return out;
                }
            }
        }
        out
    }
}

fn budget_for(policy: &ResolvedCompressionPolicy, escalation_multiplier: Option<f64>) -> usize {
    let multiplier = escalation_multiplier.unwrap_or(1.0);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let budget = (policy.max_output_tokens as f64 * multiplier).round() as usize;
    budget.max(1)
}

fn build_system_prompt(policy: &ResolvedCompressionPolicy, goal: Option<&str>, budget: usize) -> String {
    let mut prompt = format!(
        "You are a compression assistant. Reduce the following document to at most {budget} tokens."
    );
    if let Some(goal) = goal.filter(|_| policy.goal_aware) {
        prompt.push_str(&format!(
            " Extract ONLY information relevant to this goal: \"{goal}\". Completely omit irrelevant sections."
        ));
    }
    prompt.push_str(" Preserve structure and formatting where helpful (JSON keys, code signatures, headings).");
    if let Some(custom) = &policy.custom_instructions {
        prompt.push(' ');
        prompt.push_str(custom);
    }
    prompt
}

fn build_user_prompt(content: &str, goal: Option<&str>) -> String {
    let mut prompt = format!("<document>\n{content}\n</document>");
    if let Some(goal) = goal {
        prompt.push_str(&format!("\n<goal>\n{goal}\n</goal>"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CountingTokenizer;
    impl Tokenizer for CountingTokenizer {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    struct StubLlm {
        response: String,
    }
    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate_text(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: usize,
        ) -> Result<String, crate::error::LlmError> {
            Ok(self.response.clone())
        }
    }

    fn policy(threshold: usize, max_out: usize, goal_aware: bool) -> ResolvedCompressionPolicy {
        ResolvedCompressionPolicy {
            enabled: true,
            token_threshold: threshold,
            max_output_tokens: max_out,
            goal_aware,
            custom_instructions: None,
        }
    }

    #[tokio::test]
    async fn below_threshold_is_unchanged() {
        let compressor = Compressor::new(
            Arc::new(CountingTokenizer),
            Arc::new(StubLlm { response: "short".to_string() }),
        );
        let result = ToolCallResult::text("a b c");
        let out = compressor
            .compress_tool_result(result.clone(), "t", None, None, &policy(10, 5, false))
            .await;
        assert_eq!(out, result);
    }

    #[tokio::test]
    async fn above_threshold_is_compressed() {
        let compressor = Compressor::new(
            Arc::new(CountingTokenizer),
            Arc::new(StubLlm { response: "summary".to_string() }),
        );
        let long_text = "word ".repeat(20);
        let result = ToolCallResult::text(long_text);
        let out = compressor
            .compress_tool_result(result, "t", None, None, &policy(10, 5, false))
            .await;
        assert_eq!(out.content[0].as_text(), Some("summary"));
    }

    #[tokio::test]
    async fn error_results_pass_through() {
        let compressor = Compressor::new(
            Arc::new(CountingTokenizer),
            Arc::new(StubLlm { response: "summary".to_string() }),
        );
        let result = ToolCallResult::error("boom boom boom boom boom boom boom boom boom boom boom");
        let out = compressor
            .compress_tool_result(result.clone(), "t", None, None, &policy(1, 5, false))
            .await;
        assert_eq!(out, result);
    }

    #[test]
    fn escalation_multiplier_scales_budget() {
        let p = policy(10, 100, false);
        assert_eq!(budget_for(&p, None), 100);
        assert_eq!(budget_for(&p, Some(1.5)), 150);
        assert_eq!(budget_for(&p, Some(2.0)), 200);
    }

    #[test]
    fn strategy_detection() {
        assert_eq!(detect_strategy("{\"a\":1}"), ContentStrategy::Json);
        assert_eq!(
            detect_strategy("async function foo() { return 1; }"),
            ContentStrategy::Code
        );
        assert_eq!(detect_strategy("just some prose here"), ContentStrategy::Default);
    }
}
