//! Policy configuration and the merged ("resolved") views the rest of the
//! control plane actually queries.
//!
//! Resolved policies are never
//! stored; they are recomputed on demand by [`crate::resolver::ToolConfigResolver`]
//! from three layers, most specific first: per-tool tool-policy, upstream-scope
//! tool block, global defaults. Unset fields inherit the next layer down;
//! an explicit `false` overrides an inherited `true`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A field that may be explicitly set, explicitly unset... no — explicitly
/// absent (inherit) or explicitly present (override, including `false`).
/// `Option<T>` already expresses this; we keep the type alias for readability
/// at call sites that overlay several of these in a row.
pub type Override<T> = Option<T>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionPolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_threshold: Override<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Override<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_aware: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Override<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCompressionPolicy {
    pub enabled: bool,
    pub token_threshold: usize,
    pub max_output_tokens: usize,
    pub goal_aware: bool,
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingPolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_types: Override<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_fallback: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_fallback_threshold: Override<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaskingPolicy {
    pub enabled: bool,
    pub pii_types: Vec<String>,
    pub llm_fallback: bool,
    pub llm_fallback_threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Override<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCachePolicy {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Override<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_description: Override<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionPolicyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking: Option<MaskingPolicyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicyConfig>,
}

/// Per-upstream block of per-tool policies, keyed by original (un-namespaced)
/// tool name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamToolPolicies(pub HashMap<String, ToolPolicyConfig>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEscalationConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub token_multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedRetryEscalation {
    pub window_seconds: u64,
    pub token_multiplier: f64,
}

/// Global defaults plus per-tool and per-upstream overrides, as loaded from
/// configuration. This is the raw input the resolver overlays; see
/// `crates/config` for how it is produced from a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    pub default_compression: CompressionPolicyConfig,
    pub default_masking: MaskingPolicyConfig,
    pub default_cache: CachePolicyConfig,
    pub default_goal_aware: bool,
    pub bypass_enabled: bool,
    pub retry_escalation: Option<RetryEscalationConfig>,

    /// Tool names (namespaced) that are hidden outright, in addition to any
    /// per-tool `hidden` override.
    #[serde(default)]
    pub hidden_tools: Vec<String>,

    /// Per-upstream, per-original-tool-name overrides: most specific layer.
    #[serde(default)]
    pub upstream_tool_policies: HashMap<String, UpstreamToolPolicies>,

    /// Upstream-scope defaults applied to every tool of that upstream before
    /// the per-tool override (the "upstream-scope tool block" layer).
    #[serde(default)]
    pub upstream_defaults: HashMap<String, ToolPolicyConfig>,
}

impl PolicyConfig {
    fn tool_policy_for(&self, upstream_id: &str, original_name: &str) -> Option<&ToolPolicyConfig> {
        self.upstream_tool_policies
            .get(upstream_id)
            .and_then(|p| p.0.get(original_name))
    }

    fn upstream_default_for(&self, upstream_id: &str) -> Option<&ToolPolicyConfig> {
        self.upstream_defaults.get(upstream_id)
    }

    #[must_use]
    pub fn is_tool_hidden(&self, namespaced: &str, upstream_id: &str, original_name: &str) -> bool {
        if self.hidden_tools.iter().any(|h| h == namespaced) {
            return true;
        }
        overlay(
            self.tool_policy_for(upstream_id, original_name)
                .and_then(|p| p.hidden),
            self.upstream_default_for(upstream_id).and_then(|p| p.hidden),
            Some(false),
        )
        .unwrap_or(false)
    }

    #[must_use]
    pub fn hidden_parameters_for(&self, upstream_id: &str, original_name: &str) -> Vec<String> {
        self.tool_policy_for(upstream_id, original_name)
            .map(|p| p.hidden_parameters.clone())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.upstream_default_for(upstream_id)
                    .map(|p| p.hidden_parameters.clone())
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn description_override_for(
        &self,
        upstream_id: &str,
        original_name: &str,
    ) -> Option<String> {
        self.tool_policy_for(upstream_id, original_name)
            .and_then(|p| p.overwrite_description.clone())
            .or_else(|| {
                self.upstream_default_for(upstream_id)
                    .and_then(|p| p.overwrite_description.clone())
            })
    }

    #[must_use]
    pub fn resolve_compression(&self, upstream_id: &str, original_name: &str) -> ResolvedCompressionPolicy {
        let tool = self
            .tool_policy_for(upstream_id, original_name)
            .and_then(|p| p.compression.as_ref());
        let upstream = self
            .upstream_default_for(upstream_id)
            .and_then(|p| p.compression.as_ref());
        let d = &self.default_compression;

        ResolvedCompressionPolicy {
            enabled: overlay(
                tool.and_then(|c| c.enabled),
                upstream.and_then(|c| c.enabled),
                d.enabled,
            )
            .unwrap_or(true),
            token_threshold: overlay(
                tool.and_then(|c| c.token_threshold),
                upstream.and_then(|c| c.token_threshold),
                d.token_threshold,
            )
            .unwrap_or(2000),
            max_output_tokens: overlay(
                tool.and_then(|c| c.max_output_tokens),
                upstream.and_then(|c| c.max_output_tokens),
                d.max_output_tokens,
            )
            .unwrap_or(500),
            goal_aware: overlay(
                tool.and_then(|c| c.goal_aware),
                upstream.and_then(|c| c.goal_aware),
                d.goal_aware.or(Some(self.default_goal_aware)),
            )
            .unwrap_or(self.default_goal_aware),
            custom_instructions: tool
                .and_then(|c| c.custom_instructions.clone())
                .or_else(|| upstream.and_then(|c| c.custom_instructions.clone()))
                .or_else(|| d.custom_instructions.clone()),
        }
    }

    #[must_use]
    pub fn resolve_masking(&self, upstream_id: &str, original_name: &str) -> ResolvedMaskingPolicy {
        let tool = self
            .tool_policy_for(upstream_id, original_name)
            .and_then(|p| p.masking.as_ref());
        let upstream = self
            .upstream_default_for(upstream_id)
            .and_then(|p| p.masking.as_ref());
        let d = &self.default_masking;

        ResolvedMaskingPolicy {
            enabled: overlay(
                tool.and_then(|c| c.enabled),
                upstream.and_then(|c| c.enabled),
                d.enabled,
            )
            .unwrap_or(false),
            pii_types: tool
                .and_then(|c| c.pii_types.clone())
                .or_else(|| upstream.and_then(|c| c.pii_types.clone()))
                .or_else(|| d.pii_types.clone())
                .unwrap_or_default(),
            llm_fallback: overlay(
                tool.and_then(|c| c.llm_fallback),
                upstream.and_then(|c| c.llm_fallback),
                d.llm_fallback,
            )
            .unwrap_or(false),
            llm_fallback_threshold: overlay(
                tool.and_then(|c| c.llm_fallback_threshold),
                upstream.and_then(|c| c.llm_fallback_threshold),
                d.llm_fallback_threshold,
            )
            .unwrap_or(0.5),
        }
    }

    #[must_use]
    pub fn resolve_cache(&self, upstream_id: &str, original_name: &str) -> ResolvedCachePolicy {
        let tool = self
            .tool_policy_for(upstream_id, original_name)
            .and_then(|p| p.cache.as_ref());
        let upstream = self
            .upstream_default_for(upstream_id)
            .and_then(|p| p.cache.as_ref());
        let d = &self.default_cache;

        ResolvedCachePolicy {
            enabled: overlay(
                tool.and_then(|c| c.enabled),
                upstream.and_then(|c| c.enabled),
                d.enabled,
            )
            .unwrap_or(false),
            ttl_seconds: overlay(
                tool.and_then(|c| c.ttl_seconds),
                upstream.and_then(|c| c.ttl_seconds),
                d.ttl_seconds,
            )
            .unwrap_or(300),
        }
    }

    #[must_use]
    pub fn is_goal_aware(&self, upstream_id: &str, original_name: &str) -> bool {
        self.resolve_compression(upstream_id, original_name).goal_aware
    }

    #[must_use]
    pub fn is_bypass_enabled(&self) -> bool {
        self.bypass_enabled
    }

    #[must_use]
    pub fn retry_escalation(&self) -> Option<ResolvedRetryEscalation> {
        let cfg = self.retry_escalation.as_ref()?;
        if !cfg.enabled {
            return None;
        }
        Some(ResolvedRetryEscalation {
            window_seconds: cfg.window_seconds,
            token_multiplier: cfg.token_multiplier,
        })
    }
}

/// Overlay three layers, most specific first; the first `Some` wins.
fn overlay<T>(tool: Option<T>, upstream: Option<T>, global: Option<T>) -> Option<T> {
    tool.or(upstream).or(global)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_false_overrides_inherited_true() {
        let mut cfg = PolicyConfig {
            default_masking: MaskingPolicyConfig {
                enabled: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.upstream_tool_policies.insert(
            "u".to_string(),
            UpstreamToolPolicies(HashMap::from([(
                "t".to_string(),
                ToolPolicyConfig {
                    masking: Some(MaskingPolicyConfig {
                        enabled: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )])),
        );
        assert!(!cfg.resolve_masking("u", "t").enabled);
    }

    #[test]
    fn missing_tool_record_inherits_defaults_silently() {
        let cfg = PolicyConfig {
            default_compression: CompressionPolicyConfig {
                token_threshold: Some(42),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(cfg.resolve_compression("unknown", "unknown").token_threshold, 42);
    }

    #[test]
    fn compression_enabled_defaults_true() {
        let cfg = PolicyConfig::default();
        assert!(cfg.resolve_compression("u", "t").enabled);
    }
}
