//! Failure tracking and fallback history
//!
//! The fallback history list and the three failure-tracking maps are shared
//! across every routing call, so they live behind a single lock inside this
//! owning component. Callers go through the method API; nothing reaches
//! into the maps directly. Lost updates here would silently corrupt
//! recovery bookkeeping.

use super::event::{FallbackEvent, FallbackReason};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct TrackerState {
    history: Vec<FallbackEvent>,
    failure_counts: HashMap<String, u32>,
    last_failure: HashMap<String, SystemTime>,
    recovery_attempts: HashMap<String, u32>,
}

/// Owner of fallback history and per-provider failure state
#[derive(Debug, Default)]
pub struct FailureTracker {
    state: Mutex<TrackerState>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fallback event and update failure state
    ///
    /// A failed event marks the original provider as recently failed. A
    /// successful event clears all failure state for the provider that
    /// served it, so a later failure starts its counters fresh.
    pub async fn record_event(&self, event: FallbackEvent) {
        let mut state = self.state.lock().await;

        if event.success {
            let provider = event.fallback_provider.clone();
            state.failure_counts.remove(&provider);
            state.last_failure.remove(&provider);
            state.recovery_attempts.remove(&provider);
        } else {
            let provider = event.original_provider.clone();
            *state.failure_counts.entry(provider.clone()).or_insert(0) += 1;
            state.last_failure.insert(provider, event.timestamp);
        }

        state.history.push(event);
    }

    /// Snapshot of providers with a recorded failure and when it happened
    pub async fn recently_failed(&self) -> Vec<(String, SystemTime)> {
        let state = self.state.lock().await;
        state
            .last_failure
            .iter()
            .map(|(provider, ts)| (provider.clone(), *ts))
            .collect()
    }

    /// Whether a provider currently has any failure state recorded
    pub async fn is_tracked(&self, provider: &str) -> bool {
        let state = self.state.lock().await;
        state.failure_counts.contains_key(provider)
            || state.last_failure.contains_key(provider)
            || state.recovery_attempts.contains_key(provider)
    }

    /// Clear all failure state for a provider (confirmed recovery)
    pub async fn clear_provider(&self, provider: &str) {
        let mut state = self.state.lock().await;
        state.failure_counts.remove(provider);
        state.last_failure.remove(provider);
        state.recovery_attempts.remove(provider);
    }

    /// Bump the recovery-attempt counter for a still-failing provider,
    /// returning the new count
    pub async fn increment_recovery_attempts(&self, provider: &str) -> u32 {
        let mut state = self.state.lock().await;
        let count = state
            .recovery_attempts
            .entry(provider.to_string())
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Remove history entries older than the cutoff, returning how many
    /// were pruned
    pub async fn clear_history_before(&self, cutoff: SystemTime) -> usize {
        let mut state = self.state.lock().await;
        let original = state.history.len();
        state.history.retain(|event| event.timestamp > cutoff);
        original - state.history.len()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Aggregate view used by `get_fallback_statistics`
    pub async fn statistics_snapshot(&self) -> TrackerSnapshot {
        let state = self.state.lock().await;
        let now = SystemTime::now();

        let recent = state
            .history
            .iter()
            .filter(|event| {
                now.duration_since(event.timestamp)
                    .map(|age| age < Duration::from_secs(3600))
                    .unwrap_or(true)
            })
            .count();

        let mut reason_counts: HashMap<FallbackReason, usize> = HashMap::new();
        let mut provider_counts: HashMap<String, usize> = HashMap::new();
        let mut successes = 0usize;

        for event in &state.history {
            if event.success {
                successes += 1;
                *provider_counts
                    .entry(event.fallback_provider.clone())
                    .or_insert(0) += 1;
            } else {
                *reason_counts.entry(event.reason).or_insert(0) += 1;
            }
        }

        let success_rate = if state.history.is_empty() {
            0.0
        } else {
            successes as f64 / state.history.len() as f64
        };

        TrackerSnapshot {
            total_events: state.history.len(),
            recent_events: recent,
            failure_counts: state.failure_counts.clone(),
            recovery_attempts: state.recovery_attempts.clone(),
            top_failure_reasons: top_n(reason_counts, 5),
            top_fallback_providers: top_n(provider_counts, 5),
            success_rate,
        }
    }
}

/// Point-in-time aggregate of tracker state
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub total_events: usize,
    pub recent_events: usize,
    pub failure_counts: HashMap<String, u32>,
    pub recovery_attempts: HashMap<String, u32>,
    pub top_failure_reasons: Vec<(FallbackReason, usize)>,
    pub top_fallback_providers: Vec<(String, usize)>,
    pub success_rate: f64,
}

fn top_n<K: Clone + Ord>(counts: HashMap<K, usize>, n: usize) -> Vec<(K, usize)> {
    let mut entries: Vec<(K, usize)> = counts.into_iter().collect();
    // Descending by count; key order breaks ties deterministically
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::event::FallbackStrategy;

    fn event(original: &str, fallback: &str, success: bool, reason: FallbackReason) -> FallbackEvent {
        FallbackEvent {
            timestamp: SystemTime::now(),
            original_provider: original.to_string(),
            fallback_provider: fallback.to_string(),
            original_model: None,
            fallback_model: None,
            reason,
            strategy: FallbackStrategy::RuntimeSwitch,
            success,
            request_type: "chat".to_string(),
            recovery_time: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_failed_event_marks_provider() {
        let tracker = FailureTracker::new();
        tracker
            .record_event(event(
                "openai",
                "local",
                false,
                FallbackReason::ProviderUnavailable,
            ))
            .await;

        assert!(tracker.is_tracked("openai").await);
        let failed = tracker.recently_failed().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "openai");
    }

    #[tokio::test]
    async fn test_successful_event_clears_serving_provider() {
        let tracker = FailureTracker::new();
        tracker
            .record_event(event(
                "unknown",
                "local",
                false,
                FallbackReason::ProviderUnavailable,
            ))
            .await;
        // "local" was the original of no failure, but suppose it failed earlier
        tracker
            .record_event(event(
                "local",
                "huggingface",
                false,
                FallbackReason::NetworkError,
            ))
            .await;
        assert!(tracker.is_tracked("local").await);

        // A later success served by local wipes its failure state
        tracker
            .record_event(event(
                "openai",
                "local",
                true,
                FallbackReason::ProviderUnavailable,
            ))
            .await;
        assert!(!tracker.is_tracked("local").await);
    }

    #[tokio::test]
    async fn test_recovery_attempts_count_and_clear() {
        let tracker = FailureTracker::new();
        assert_eq!(tracker.increment_recovery_attempts("gemini").await, 1);
        assert_eq!(tracker.increment_recovery_attempts("gemini").await, 2);

        tracker.clear_provider("gemini").await;
        assert!(!tracker.is_tracked("gemini").await);
        // Counter starts fresh after clearing
        assert_eq!(tracker.increment_recovery_attempts("gemini").await, 1);
    }

    #[tokio::test]
    async fn test_history_pruning() {
        let tracker = FailureTracker::new();
        let mut old = event("openai", "local", true, FallbackReason::ProviderUnavailable);
        old.timestamp = SystemTime::now() - Duration::from_secs(48 * 3600);
        tracker.record_event(old).await;
        tracker
            .record_event(event(
                "openai",
                "local",
                true,
                FallbackReason::ProviderUnavailable,
            ))
            .await;

        let cutoff = SystemTime::now() - Duration::from_secs(24 * 3600);
        let cleared = tracker.clear_history_before(cutoff).await;
        assert_eq!(cleared, 1);
        assert_eq!(tracker.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_statistics_top_reasons_sorted_and_truncated() {
        let tracker = FailureTracker::new();
        for _ in 0..4 {
            tracker
                .record_event(event("openai", "x", false, FallbackReason::RateLimited))
                .await;
        }
        for _ in 0..2 {
            tracker
                .record_event(event("openai", "x", false, FallbackReason::Timeout))
                .await;
        }
        tracker
            .record_event(event("openai", "local", true, FallbackReason::RateLimited))
            .await;

        let snapshot = tracker.statistics_snapshot().await;
        assert_eq!(snapshot.total_events, 7);
        assert_eq!(
            snapshot.top_failure_reasons[0],
            (FallbackReason::RateLimited, 4)
        );
        assert_eq!(snapshot.top_failure_reasons[1], (FallbackReason::Timeout, 2));
        assert!((snapshot.success_rate - 1.0 / 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_history_has_zero_success_rate() {
        let tracker = FailureTracker::new();
        let snapshot = tracker.statistics_snapshot().await;
        assert_eq!(snapshot.total_events, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }
}
