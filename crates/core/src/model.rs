//! Upstream descriptors and aggregated tool/resource/prompt records.
//!
//! Namespacing is bit-exact:
//! - tools and prompts: `{upstreamId}__{originalName}`
//! - resources: `{upstreamId}://{originalUri}`
//!
//! The original name/uri and the owning upstream id are always carried
//! alongside the namespaced identifier on the aggregated record itself —
//! never re-derived by parsing the namespaced string back apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UpstreamTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    StreamableHttp {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamDescriptor {
    pub id: String,
    pub display_name: String,
    pub transport: UpstreamTransport,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Namespace a tool or prompt name: `{upstreamId}__{originalName}`.
#[must_use]
pub fn namespace_tool_or_prompt(upstream_id: &str, original_name: &str) -> String {
    format!("{upstream_id}__{original_name}")
}

/// Namespace a resource URI: `{upstreamId}://{originalUri}`.
#[must_use]
pub fn namespace_resource(upstream_id: &str, original_uri: &str) -> String {
    format!("{upstream_id}://{original_uri}")
}

/// Split a namespaced tool/prompt identifier back into `(upstream_id,
/// original_name)`, for situations where the owning record can't be looked
/// up directly (it generally can — see the invariant above — but the split
/// is also used to validate that a freshly built namespaced id round-trips).
#[must_use]
pub fn split_tool_or_prompt_namespace(namespaced: &str) -> Option<(&str, &str)> {
    namespaced.split_once("__")
}

#[must_use]
pub fn split_resource_namespace(namespaced: &str) -> Option<(&str, &str)> {
    namespaced.split_once("://")
}

#[derive(Debug, Clone)]
pub struct AggregatedTool {
    pub upstream_id: String,
    pub original_name: String,
    pub namespaced_name: String,
    /// The tool's MCP descriptor (`{name, description, inputSchema, ...}`)
    /// kept as a free-form JSON object — see DESIGN NOTES, "dynamic schema
    /// shape". `name` inside this value is always the namespaced name; it is
    /// kept in sync by the aggregator whenever this record is constructed.
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct AggregatedResource {
    pub upstream_id: String,
    pub original_uri: String,
    pub namespaced_uri: String,
    pub descriptor: Value,
}

#[derive(Debug, Clone)]
pub struct AggregatedPrompt {
    pub upstream_id: String,
    pub original_name: String,
    pub namespaced_name: String,
    pub descriptor: Value,
}
