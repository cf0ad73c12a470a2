pub mod error;
pub mod raw;
pub mod schema;

pub use error::ConfigError;
pub use raw::{CacheSection, DownstreamConfig, DownstreamTransportKind, LogLevel, RawConfig, ResolvedConfig};

use std::path::Path;

/// Load, parse, and validate a config document from disk.
/// A missing file, malformed JSON, or a schema violation all return
/// `Err` — the caller decides whether that's fatal (startup) or merely
/// logged (hot reload); this function has no opinion on that.
pub fn load(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let bytes = std::fs::read(path).map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
    let document: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| ConfigError::MalformedJson(e.to_string()))?;

    schema::validate(&document).map_err(ConfigError::SchemaViolation)?;

    let raw: RawConfig =
        serde_json::from_value(document).map_err(|e| ConfigError::MalformedJson(e.to_string()))?;
    raw.into_resolved()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_loads_with_defaults() {
        let document = serde_json::json!({"downstream": {"transport": "stdio"}});
        schema::validate(&document).expect("valid");
        let raw: RawConfig = serde_json::from_value(document).expect("deserializes");
        let resolved = raw.into_resolved().expect("resolves");
        assert!(resolved.upstreams.is_empty());
        assert_eq!(resolved.log_level, LogLevel::Info);
    }

    #[test]
    fn missing_downstream_fails_schema_validation() {
        let document = serde_json::json!({});
        assert!(schema::validate(&document).is_err());
    }

    #[test]
    fn invalid_transport_fails_schema_validation() {
        let document = serde_json::json!({"downstream": {"transport": "carrier-pigeon"}});
        assert!(schema::validate(&document).is_err());
    }

    #[test]
    fn flat_compression_tool_policy_merges_into_per_upstream_map() {
        let document = serde_json::json!({
            "downstream": {"transport": "stdio"},
            "compression": {
                "toolPolicies": {
                    "search_upstream__lookup": {"tokenThreshold": 42}
                }
            }
        });
        let raw: RawConfig = serde_json::from_value(document).unwrap();
        let resolved = raw.into_resolved().unwrap();
        assert_eq!(
            resolved.policy.resolve_compression("search_upstream", "lookup").token_threshold,
            42
        );
    }
}
