//! Tool-Config Resolver.
//!
//! Pure, non-blocking: every query is answered straight from the in-memory
//! `PolicyConfig` snapshot for the current generation. Policy resolution
//! never fails — a missing tool record is "no override: inherit defaults
//! silently".

use crate::model::split_tool_or_prompt_namespace;
use crate::policy::{
    PolicyConfig, ResolvedCachePolicy, ResolvedCompressionPolicy, ResolvedMaskingPolicy,
    ResolvedRetryEscalation,
};

pub struct ToolConfigResolver {
    config: PolicyConfig,
}

impl ToolConfigResolver {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    fn split(namespaced: &str) -> (&str, &str) {
        split_tool_or_prompt_namespace(namespaced).unwrap_or(("", namespaced))
    }

    #[must_use]
    pub fn is_tool_hidden(&self, namespaced: &str) -> bool {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.is_tool_hidden(namespaced, upstream_id, original)
    }

    #[must_use]
    pub fn hidden_parameters(&self, namespaced: &str) -> Vec<String> {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.hidden_parameters_for(upstream_id, original)
    }

    #[must_use]
    pub fn description_override(&self, namespaced: &str) -> Option<String> {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.description_override_for(upstream_id, original)
    }

    #[must_use]
    pub fn resolve_compression_policy(&self, namespaced: &str) -> ResolvedCompressionPolicy {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.resolve_compression(upstream_id, original)
    }

    #[must_use]
    pub fn resolve_masking_policy(&self, namespaced: &str) -> ResolvedMaskingPolicy {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.resolve_masking(upstream_id, original)
    }

    #[must_use]
    pub fn resolve_cache_policy(&self, namespaced: &str) -> ResolvedCachePolicy {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.resolve_cache(upstream_id, original)
    }

    #[must_use]
    pub fn is_goal_aware_enabled(&self, namespaced: &str) -> bool {
        let (upstream_id, original) = Self::split(namespaced);
        self.config.is_goal_aware(upstream_id, original)
    }

    #[must_use]
    pub fn is_bypass_enabled(&self) -> bool {
        self.config.is_bypass_enabled()
    }

    #[must_use]
    pub fn retry_escalation(&self) -> Option<ResolvedRetryEscalation> {
        self.config.retry_escalation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{CompressionPolicyConfig, UpstreamToolPolicies};
    use std::collections::HashMap;

    #[test]
    fn unknown_tool_inherits_defaults() {
        let resolver = ToolConfigResolver::new(PolicyConfig::default());
        assert!(!resolver.is_tool_hidden("u__nonexistent"));
        assert!(resolver.resolve_compression_policy("u__nonexistent").enabled);
    }

    #[test]
    fn per_tool_override_wins_over_defaults() {
        let mut cfg = PolicyConfig::default();
        cfg.upstream_tool_policies.insert(
            "u".to_string(),
            UpstreamToolPolicies(HashMap::from([(
                "t".to_string(),
                crate::policy::ToolPolicyConfig {
                    compression: Some(CompressionPolicyConfig {
                        token_threshold: Some(99),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )])),
        );
        let resolver = ToolConfigResolver::new(cfg);
        assert_eq!(resolver.resolve_compression_policy("u__t").token_threshold, 99);
    }
}
