//! The as-loaded configuration document shape. Every field here maps to a
//! recognized top-level option, plus the upstream-scope tool-default layer
//! that sits between a per-tool override and the global defaults.

use mcpcp_core::model::UpstreamDescriptor;
use mcpcp_core::pii_patterns::custom_pattern;
use mcpcp_core::policy::{
    CachePolicyConfig, CompressionPolicyConfig, MaskingPolicyConfig, PolicyConfig,
    RetryEscalationConfig, ToolPolicyConfig, UpstreamToolPolicies,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DownstreamTransportKind {
    Stdio,
    Sse,
    StreamableHttp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamConfig {
    pub transport: DownstreamTransportKind,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub default_policy: CompressionPolicyConfig,
    #[serde(default)]
    pub tool_policies: HashMap<String, CompressionPolicyConfig>,
    #[serde(default)]
    pub goal_aware: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub cache_errors: bool,
}

fn default_ttl() -> u64 {
    300
}
fn default_max_entries() -> usize {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPatternSpec {
    pub regex: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingLlmConfigSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingSection {
    #[serde(default)]
    pub default_policy: MaskingPolicyConfig,
    #[serde(default)]
    pub tool_policies: HashMap<String, MaskingPolicyConfig>,
    #[serde(default)]
    pub llm_config: Option<MaskingLlmConfigSection>,
    #[serde(default)]
    pub custom_patterns: HashMap<String, CustomPatternSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsSection {
    #[serde(default)]
    pub hidden: Vec<String>,
    /// Per-upstream, per-original-tool-name overrides (`upstreamId -> toolName -> policy`).
    #[serde(default)]
    pub upstream_tool_policies: HashMap<String, HashMap<String, ToolPolicyConfig>>,
    /// Upstream-scope defaults applied before the per-tool override.
    #[serde(default)]
    pub upstream_defaults: HashMap<String, ToolPolicyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub downstream: DownstreamConfig,
    #[serde(default)]
    pub upstreams: Vec<UpstreamDescriptor>,
    #[serde(default)]
    pub compression: CompressionSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub masking: MaskingSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub retry_escalation: Option<RetryEscalationConfig>,
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Everything a `Generation` needs, already converted out of the raw
/// serde shape: a [`PolicyConfig`] plus the ambient settings that aren't
/// policy (downstream transport, cache sizing, LLM endpoint, log level).
pub struct ResolvedConfig {
    pub downstream: DownstreamConfig,
    pub upstreams: Vec<UpstreamDescriptor>,
    pub policy: PolicyConfig,
    pub custom_pii_patterns: Vec<mcpcp_core::pii_patterns::PiiPattern>,
    pub compression_llm: Option<CompressionSection>,
    pub masking_llm: Option<MaskingLlmConfigSection>,
    pub cache: CacheSection,
    pub log_level: LogLevel,
}

impl RawConfig {
    pub fn into_resolved(self) -> Result<ResolvedConfig, ConfigError> {
        let custom_pii_patterns = self
            .masking
            .custom_patterns
            .iter()
            .map(|(name, spec)| {
                let regex = regex::Regex::new(&spec.regex).map_err(|e| ConfigError::InvalidCustomPattern {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
                Ok(custom_pattern(name.clone(), regex, spec.replacement.clone()))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut upstream_tool_policies: HashMap<String, HashMap<String, ToolPolicyConfig>> = HashMap::new();

        // `compression.toolPolicies[namespacedName]` and
        // `masking.toolPolicies[namespacedName]` are flat shorthands for
        // "override just this one policy dimension of this one tool";
        // fold them into the same per-upstream/per-tool map the nested
        // `tools.upstreamToolPolicies` section populates, so the resolver
        // only ever has one merged structure to query. See DESIGN.md, "flat
        // toolPolicies shorthands merge into the nested per-tool map."
        for (namespaced, compression) in &self.compression.tool_policies {
            let Some((upstream_id, original_name)) =
                mcpcp_core::model::split_tool_or_prompt_namespace(namespaced)
            else {
                continue;
            };
            upstream_tool_policies
                .entry(upstream_id.to_string())
                .or_default()
                .entry(original_name.to_string())
                .or_default()
                .compression = Some(compression.clone());
        }
        for (namespaced, masking) in &self.masking.tool_policies {
            let Some((upstream_id, original_name)) =
                mcpcp_core::model::split_tool_or_prompt_namespace(namespaced)
            else {
                continue;
            };
            upstream_tool_policies
                .entry(upstream_id.to_string())
                .or_default()
                .entry(original_name.to_string())
                .or_default()
                .masking = Some(masking.clone());
        }

        // The nested `tools.upstreamToolPolicies` section is the more
        // specific, fully-structured form; an entry there replaces whatever
        // the flat shorthands merged above for that same tool.
        for (upstream_id, tools) in &self.tools.upstream_tool_policies {
            let entry = upstream_tool_policies.entry(upstream_id.clone()).or_default();
            for (tool_name, policy) in tools {
                entry.insert(tool_name.clone(), policy.clone());
            }
        }

        let upstream_tool_policies = upstream_tool_policies
            .into_iter()
            .map(|(upstream_id, tools)| (upstream_id, UpstreamToolPolicies(tools)))
            .collect();

        let policy = PolicyConfig {
            default_compression: self.compression.default_policy.clone(),
            default_masking: self.masking.default_policy.clone(),
            default_cache: CachePolicyConfig {
                enabled: Some(self.cache.enabled),
                ttl_seconds: Some(self.cache.ttl_seconds),
            },
            default_goal_aware: self.compression.goal_aware,
            bypass_enabled: true,
            retry_escalation: self.retry_escalation.clone(),
            hidden_tools: self.tools.hidden.clone(),
            upstream_tool_policies,
            upstream_defaults: self.tools.upstream_defaults.clone(),
        };

        let compression_llm = self.compression.base_url.as_ref().map(|_| self.compression.clone());
        let masking_llm = self.masking.llm_config.clone();

        Ok(ResolvedConfig {
            downstream: self.downstream,
            upstreams: self.upstreams,
            policy,
            custom_pii_patterns,
            compression_llm,
            masking_llm,
            cache: self.cache,
            log_level: self.log_level,
        })
    }
}
