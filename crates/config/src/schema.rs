//! JSON Schema for the top-level config document.
//!
//! Deliberately loose beyond the required shape — `additionalProperties`
//! defaults to allowed so forward-compatible fields don't hard-fail an
//! older schema version. Compiled once; `jsonschema` is the same crate used
//! for tool-argument validation, reused here one layer up the stack.

use jsonschema::Validator;
use std::sync::LazyLock;

static SCHEMA: LazyLock<serde_json::Value> = LazyLock::new(|| {
    serde_json::json!({
        "type": "object",
        "required": ["downstream"],
        "properties": {
            "downstream": {
                "type": "object",
                "required": ["transport"],
                "properties": {
                    "transport": {"enum": ["stdio", "sse", "streamable-http"]},
                    "port": {"type": "integer", "minimum": 1, "maximum": 65535},
                    "host": {"type": "string"}
                }
            },
            "upstreams": {"type": "array"},
            "compression": {"type": "object"},
            "cache": {"type": "object"},
            "masking": {
                "type": "object",
                "properties": {
                    "defaultPolicy": {
                        "type": "object",
                        "properties": {
                            "llmFallbackThreshold": {"type": "number", "minimum": 0, "maximum": 1}
                        }
                    }
                }
            },
            "tools": {"type": "object"},
            "retryEscalation": {"type": "object"},
            "logLevel": {"enum": ["error", "warn", "info", "debug"]}
        }
    })
});

static VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| jsonschema::validator_for(&SCHEMA).expect("config schema compiles"));

/// Validate a parsed config document; returns the first violation as a
/// human-readable message, joined with "; " if there's more than one.
pub fn validate(document: &serde_json::Value) -> Result<(), String> {
    let errors: Vec<String> = VALIDATOR.iter_errors(document).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
