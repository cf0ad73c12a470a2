//! PII masking.
//!
//! `maskToolArgs` walks the argument tree, replaces every PII match with a
//! unique placeholder, and records the placeholder → original mapping so the
//! router can restore it once the upstream has echoed (or otherwise
//! incorporated) the masked value back into its result.
//!
//! Restoration is intentionally simple literal substitution
//! (`restoreOriginals`); the masking side is what has to be careful, because
//! every leaf it touches must be perfectly reversible — see
//! `restoration_round_trip` in the test module and the crate-level
//! invariant tests in `tests/`.

use crate::capability::LlmClient;
use crate::pii_patterns::{PiiKind, PiiPattern, BUILTIN_PATTERNS};
use crate::policy::ResolvedMaskingPolicy;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, Default)]
pub struct MaskResult {
    pub masked: Value,
    pub restoration_map: HashMap<String, String>,
    pub was_masked: bool,
    pub masked_fields: Vec<String>,
}

pub struct PiiMasker {
    custom_patterns: Vec<PiiPattern>,
}

impl PiiMasker {
    #[must_use]
    pub fn new(custom_patterns: Vec<PiiPattern>) -> Self {
        Self { custom_patterns }
    }

    fn active_patterns(&self, policy: &ResolvedMaskingPolicy) -> Vec<&PiiPattern> {
        BUILTIN_PATTERNS
            .iter()
            .chain(self.custom_patterns.iter())
            .filter(|p| {
                policy.pii_types.iter().any(|t| t == p.kind.as_str())
                    || (p.kind == PiiKind::Custom && policy.pii_types.iter().any(|t| t == &p.name))
            })
            .collect()
    }

    /// Mask every string leaf of `args` per `policy`. If masking is
    /// disabled, returns the input unchanged with an empty restoration map.
    pub async fn mask_tool_args(
        &self,
        args: Value,
        policy: &ResolvedMaskingPolicy,
        llm: Option<&dyn LlmClient>,
    ) -> MaskResult {
        if !policy.enabled {
            return MaskResult {
                masked: args,
                ..Default::default()
            };
        }

        let patterns = self.active_patterns(policy);
        let mut counter = 0usize;
        let mut restoration = HashMap::new();
        let mut masked_kinds: Vec<String> = Vec::new();

        let masked = walk(
            args,
            &patterns,
            policy,
            llm,
            &mut counter,
            &mut restoration,
            &mut masked_kinds,
        )
        .await;

        masked_kinds.sort();
        masked_kinds.dedup();

        MaskResult {
            was_masked: !restoration.is_empty(),
            masked,
            restoration_map: restoration,
            masked_fields: masked_kinds,
        }
    }
}

/// Recursive shape-preserving walk. Boxed because async fns can't recurse
/// directly.
fn walk<'a>(
    value: Value,
    patterns: &'a [&'a PiiPattern],
    policy: &'a ResolvedMaskingPolicy,
    llm: Option<&'a dyn LlmClient>,
    counter: &'a mut usize,
    restoration: &'a mut HashMap<String, String>,
    masked_kinds: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = Value> + 'a>> {
    Box::pin(async move {
        match value {
            Value::String(s) => {
                let masked = mask_leaf(&s, patterns, policy, llm, counter, restoration, masked_kinds).await;
                Value::String(masked)
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(walk(item, patterns, policy, llm, counter, restoration, masked_kinds).await);
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    let masked = walk(v, patterns, policy, llm, counter, restoration, masked_kinds).await;
                    out.insert(k, masked);
                }
                Value::Object(out)
            }
            other => other,
        }
    })
}

struct Match<'a> {
    start: usize,
    end: usize,
    pattern: &'a PiiPattern,
}

/// Non-overlapping leftmost scan: at each cursor position, the earliest
/// match wins; ties broken by pattern declaration order (more specific
/// patterns are declared first — see `pii_patterns`).
fn find_matches<'a>(s: &str, patterns: &'a [&'a PiiPattern]) -> Vec<Match<'a>> {
    let mut matches = Vec::new();
    let mut cursor = 0usize;

    while cursor <= s.len() {
        let mut best: Option<Match<'a>> = None;
        for pattern in patterns {
            if let Some(m) = pattern.regex.find_at(s, cursor) {
                let better = match &best {
                    None => true,
                    Some(b) => m.start() < b.start,
                };
                if better {
                    best = Some(Match {
                        start: m.start(),
                        end: m.end(),
                        pattern,
                    });
                }
            }
        }
        match best {
            Some(m) if m.end > m.start => {
                cursor = m.end;
                matches.push(m);
            }
            _ => break,
        }
    }

    matches
}

async fn mask_leaf(
    s: &str,
    patterns: &[&PiiPattern],
    policy: &ResolvedMaskingPolicy,
    llm: Option<&dyn LlmClient>,
    counter: &mut usize,
    restoration: &mut HashMap<String, String>,
    masked_kinds: &mut Vec<String>,
) -> String {
    if patterns.is_empty() {
        return maybe_llm_only(s, policy, llm, counter, restoration, masked_kinds).await;
    }

    let matches = find_matches(s, patterns);
    if matches.is_empty() {
        return maybe_llm_only(s, policy, llm, counter, restoration, masked_kinds).await;
    }

    let low_confidence = matches
        .iter()
        .any(|m| m.pattern.confidence < policy.llm_fallback_threshold);

    if policy.llm_fallback && low_confidence && llm.is_some() {
        if let Some(replacement) =
            try_llm_fallback(s, llm.expect("checked above"), counter, restoration).await
        {
            masked_kinds.push("llm".to_string());
            return replacement;
        }
        // Fall through to regex-only on transport/parse failure (fail-safe).
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for m in &matches {
        out.push_str(&s[last..m.start]);
        let placeholder = format!("[{}_REDACTED_{}]", m.pattern.replacement_tag, counter);
        *counter += 1;
        restoration.insert(placeholder.clone(), s[m.start..m.end].to_string());
        masked_kinds.push(m.pattern.kind.as_str().to_string());
        out.push_str(&placeholder);
        last = m.end;
    }
    out.push_str(&s[last..]);
    out
}

/// When no regex pattern matched at all, the spec's LLM-fallback condition
/// never triggers — it's gated on an existing
/// low-confidence regex match. Nothing further to do.
async fn maybe_llm_only(
    s: &str,
    _policy: &ResolvedMaskingPolicy,
    _llm: Option<&dyn LlmClient>,
    _counter: &mut usize,
    _restoration: &mut HashMap<String, String>,
    _masked_kinds: &mut [String],
) -> String {
    s.to_string()
}

#[derive(Debug, serde::Deserialize)]
struct LlmDetection {
    #[serde(default)]
    has_pii: bool,
    #[serde(default)]
    #[allow(dead_code)]
    detected_types: Vec<String>,
    #[serde(default)]
    masked_text: Option<String>,
}

/// Calls the LLM detector and, on a positive detection, supersedes any
/// regex-based masking for this leaf with a single whole-leaf placeholder
/// mapping back to the pre-masking original. Superseding (rather than
/// trying to splice LLM and regex spans together) is what keeps the
/// restoration round-trip exact: one placeholder, one original string.
async fn try_llm_fallback(
    original: &str,
    llm: &dyn LlmClient,
    counter: &mut usize,
    restoration: &mut HashMap<String, String>,
) -> Option<String> {
    let system = "You detect personally identifiable information in text. \
        Respond with strict JSON: {\"hasPII\": bool, \"detectedTypes\": [string], \"maskedText\": string}.";
    let raw = llm.generate_text(system, original, 512).await.ok()?;
    let detection: LlmDetection = serde_json::from_str(&raw).ok()?;
    if !detection.has_pii {
        return Some(original.to_string());
    }
    let placeholder = format!("[LLM_REDACTED_{counter}]");
    *counter += 1;
    restoration.insert(placeholder.clone(), original.to_string());
    let _ = detection.masked_text; // informational only; see DESIGN.md.
    Some(placeholder)
}

/// Literal string replacement of every
/// key in the map. Idempotent over text containing no placeholders.
#[must_use]
pub fn restore_originals(text: &str, restoration_map: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for (placeholder, original) in restoration_map {
        out = out.replace(placeholder.as_str(), original.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ResolvedMaskingPolicy;

    fn policy(types: &[&str]) -> ResolvedMaskingPolicy {
        ResolvedMaskingPolicy {
            enabled: true,
            pii_types: types.iter().map(|s| (*s).to_string()).collect(),
            llm_fallback: false,
            llm_fallback_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn masks_email_and_restores() {
        let masker = PiiMasker::new(vec![]);
        let args = serde_json::json!({"note": "ping a@b.co now"});
        let result = masker.mask_tool_args(args.clone(), &policy(&["email"]), None).await;
        assert!(result.was_masked);
        let masked_note = result.masked["note"].as_str().unwrap();
        assert!(masked_note.contains("EMAIL_REDACTED_0"));
        assert!(!masked_note.contains("a@b.co"));

        let restored = restore_originals(masked_note, &result.restoration_map);
        assert_eq!(restored, "ping a@b.co now");
    }

    #[tokio::test]
    async fn restoration_round_trip_on_nested_structure() {
        let masker = PiiMasker::new(vec![]);
        let args = serde_json::json!({
            "a": "contact a@b.co",
            "nested": {"list": ["b@c.co", "no pii here", 42, null]},
        });
        let result = masker.mask_tool_args(args.clone(), &policy(&["email"]), None).await;

        // Restore every string leaf and confirm it reproduces the original tree.
        let restored = restore_value(&result.masked, &result.restoration_map);
        assert_eq!(restored, args);
    }

    #[tokio::test]
    async fn disabled_policy_is_a_no_op() {
        let masker = PiiMasker::new(vec![]);
        let args = serde_json::json!({"note": "a@b.co"});
        let disabled = ResolvedMaskingPolicy {
            enabled: false,
            ..policy(&["email"])
        };
        let result = masker.mask_tool_args(args.clone(), &disabled, None).await;
        assert!(!result.was_masked);
        assert_eq!(result.masked, args);
    }

    #[tokio::test]
    async fn credit_card_bin_pattern_wins_over_generic_grouping() {
        let masker = PiiMasker::new(vec![]);
        let args = serde_json::json!({"note": "4111 1111 1111 1111"});
        let result = masker
            .mask_tool_args(args, &policy(&["credit_card"]), None)
            .await;
        assert!(result.was_masked);
        // Exactly one match spanning the whole number, not two overlapping ones.
        assert_eq!(result.restoration_map.len(), 1);
    }

    fn restore_value(v: &Value, map: &HashMap<String, String>) -> Value {
        match v {
            Value::String(s) => Value::String(restore_originals(s, map)),
            Value::Array(items) => Value::Array(items.iter().map(|i| restore_value(i, map)).collect()),
            Value::Object(obj) => {
                let mut out = serde_json::Map::new();
                for (k, v) in obj {
                    out.insert(k.clone(), restore_value(v, map));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}
