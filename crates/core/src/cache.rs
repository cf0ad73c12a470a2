//! In-memory TTL cache.
//!
//! Keyed map with insertion-order iteration so oldest-first eviction is a
//! simple scan over a `Vec` of keys rather than needing an ordered-map
//! crate — a plain `HashMap` plus a manual oldest-eviction scan.

use crate::content::ToolCallResult;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: ToolCallResult,
    timestamp_ms: u64,
    ttl_ms: u64,
}

impl Entry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > self.ttl_ms
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Insertion order, oldest first. A key may appear once; re-`set`ting an
    /// existing key moves it to the back.
    order: Vec<String>,
}

pub struct ResultCache {
    max_entries: usize,
    start: Instant,
    inner: Mutex<Inner>,
}

impl ResultCache {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            start: Instant::now(),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<ToolCallResult> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        let expired = inner.entries.get(key).is_some_and(|e| e.is_expired(now));
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.entries.get(key).map(|e| e.value.clone())
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&self, key: String, value: ToolCallResult, ttl_seconds: u64) {
        let now = self.now_ms();
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.entries.len() >= self.max_entries {
            evict_oldest(&mut inner);
        }

        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                timestamp_ms: now,
                ttl_ms: ttl_seconds.saturating_mul(1000),
            },
        );
        inner.order.push(key);
    }

    /// Sweep all expired entries; returns the count removed.
    pub fn cleanup(&self) -> usize {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired_keys {
            inner.entries.remove(k);
        }
        inner.order.retain(|k| !expired_keys.contains(k));
        expired_keys.len()
    }

    /// Fresh state after a configuration reload.
    pub fn update_config(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evict the single oldest entry by stored timestamp; ties broken by
/// insertion order.
fn evict_oldest(inner: &mut Inner) {
    let Some(oldest_key) = inner.order.first().cloned() else {
        return;
    };
    inner.entries.remove(&oldest_key);
    inner.order.remove(0);
}

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Normalize a goal hint: lowercased, punctuation stripped,
/// trimmed. Idempotent.
#[must_use]
pub fn normalize_goal(goal: &str) -> String {
    let lowered = goal.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Canonical JSON: object keys sorted lexicographically at every level.
#[must_use]
pub fn canonicalize_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize_json(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize_json).collect())
        }
        other => other.clone(),
    }
}

/// Cache key format:
/// `compressed:{toolName}:{canonicalArgsJson}[:normalizedGoal]`.
#[must_use]
pub fn cache_key(tool_name: &str, args: &serde_json::Value, goal: Option<&str>) -> String {
    let canonical = canonicalize_json(args);
    let canonical_json = serde_json::to_string(&canonical).unwrap_or_default();
    match goal.map(normalize_goal).filter(|g| !g.is_empty()) {
        Some(g) => format!("compressed:{tool_name}:{canonical_json}:{g}"),
        None => format!("compressed:{tool_name}:{canonical_json}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_canonicalization_is_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(cache_key("t", &a, None), cache_key("t", &b, None));
    }

    #[test]
    fn goal_normalization_idempotent_and_case_punct_insensitive() {
        let g1 = normalize_goal("Hi, World!");
        let g2 = normalize_goal("HI WORLD");
        assert_eq!(g1, g2);
        assert_eq!(normalize_goal(&g1), g1);
    }

    #[test]
    fn ttl_expires_after_advance() {
        let cache = ResultCache::new(10);
        cache.set("k".to_string(), ToolCallResult::text("v"), 0);
        // ttl_seconds = 0 means immediately expired on any elapsed time.
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(!cache.has("k"));
    }

    #[test]
    fn max_entries_bound_holds_after_many_sets() {
        let cache = ResultCache::new(3);
        for i in 0..10 {
            cache.set(format!("k{i}"), ToolCallResult::text("v"), 60);
        }
        assert!(cache.len() <= 3);
    }

    #[test]
    fn oldest_first_eviction() {
        let cache = ResultCache::new(2);
        cache.set("a".to_string(), ToolCallResult::text("1"), 60);
        cache.set("b".to_string(), ToolCallResult::text("2"), 60);
        cache.set("c".to_string(), ToolCallResult::text("3"), 60);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
