//! Retry escalation tracker.
//!
//! When a client repeatedly re-invokes the same tool within a short window,
//! it is signalling that the prior response dropped information it needed;
//! escalation widens the compressor's output budget so the next response is
//! less lossy.

use crate::policy::ResolvedRetryEscalation;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

pub struct RetryTracker {
    start: Instant,
    calls: RwLock<HashMap<String, VecDeque<u64>>>,
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            calls: RwLock::new(HashMap::new()),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Appends `now` to the tool's call history.
    pub fn record_call(&self, tool_name: &str) {
        let now = self.now_ms();
        let mut calls = self.calls.write();
        calls.entry(tool_name.to_string()).or_default().push_back(now);
    }

    /// Prunes timestamps older than `cfg.windowSeconds`, then returns the
    /// escalation multiplier `1 + max(0, n-1) * tokenMultiplier` where `n`
    /// is the remaining count.
    #[must_use]
    pub fn escalation_multiplier(&self, tool_name: &str, cfg: &ResolvedRetryEscalation) -> f64 {
        let now = self.now_ms();
        let window_ms = cfg.window_seconds.saturating_mul(1000);
        let mut calls = self.calls.write();
        let Some(timestamps) = calls.get_mut(tool_name) else {
            return 1.0;
        };
        while let Some(front) = timestamps.front() {
            if now.saturating_sub(*front) > window_ms {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        let n = timestamps.len();
        1.0 + (n.saturating_sub(1) as f64) * cfg.token_multiplier
    }

    /// Removes tools with no calls inside `window_seconds`.
    pub fn cleanup(&self, window_seconds: u64) {
        let now = self.now_ms();
        let window_ms = window_seconds.saturating_mul(1000);
        let mut calls = self.calls.write();
        calls.retain(|_, timestamps| {
            while let Some(front) = timestamps.front() {
                if now.saturating_sub(*front) > window_ms {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
            !timestamps.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(window_seconds: u64, multiplier: f64) -> ResolvedRetryEscalation {
        ResolvedRetryEscalation { window_seconds, token_multiplier: multiplier }
    }

    #[test]
    fn no_calls_means_no_escalation() {
        let tracker = RetryTracker::new();
        assert_eq!(tracker.escalation_multiplier("t", &cfg(10, 0.5)), 1.0);
    }

    #[test]
    fn escalation_grows_monotonically_within_window() {
        let tracker = RetryTracker::new();
        let c = cfg(10, 0.5);

        tracker.record_call("t");
        let m1 = tracker.escalation_multiplier("t", &c);
        tracker.record_call("t");
        let m2 = tracker.escalation_multiplier("t", &c);
        tracker.record_call("t");
        let m3 = tracker.escalation_multiplier("t", &c);

        assert!(m1 <= m2);
        assert!(m2 <= m3);
        assert_eq!(m1, 1.0);
        assert_eq!(m2, 1.5);
        assert_eq!(m3, 2.0);
    }

    #[test]
    fn cleanup_drops_stale_tools() {
        let tracker = RetryTracker::new();
        tracker.record_call("t");
        // window_seconds=0 means anything with elapsed time > 0 is stale.
        std::thread::sleep(std::time::Duration::from_millis(5));
        tracker.cleanup(0);
        assert_eq!(tracker.escalation_multiplier("t", &cfg(10, 0.5)), 1.0);
    }
}
