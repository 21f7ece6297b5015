//! Fallback data model
//!
//! Records of what happened during fallback execution: per-candidate
//! attempts, the overall result, append-only history events, recovery
//! snapshots, and aggregate statistics.

use serde::Serialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Reasons for fallback activation
///
/// Classification for reporting, not raised as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ProviderUnhealthy,
    ProviderUnavailable,
    AuthenticationFailed,
    RateLimited,
    NetworkError,
    ModelUnavailable,
    CapabilityMissing,
    PrivacyViolation,
    Timeout,
    UnknownError,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderUnhealthy => "provider_unhealthy",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::AuthenticationFailed => "authentication_failed",
            Self::RateLimited => "rate_limited",
            Self::NetworkError => "network_error",
            Self::ModelUnavailable => "model_unavailable",
            Self::CapabilityMissing => "capability_missing",
            Self::PrivacyViolation => "privacy_violation",
            Self::Timeout => "timeout",
            Self::UnknownError => "unknown_error",
        }
    }
}

/// Fallback strategies for different scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    CloudToLocal,
    LocalToDegraded,
    CapabilityDowngrade,
    ModelDowngrade,
    RuntimeSwitch,
    EmergencyDegraded,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudToLocal => "cloud_to_local",
            Self::LocalToDegraded => "local_to_degraded",
            Self::CapabilityDowngrade => "capability_downgrade",
            Self::ModelDowngrade => "model_downgrade",
            Self::RuntimeSwitch => "runtime_switch",
            Self::EmergencyDegraded => "emergency_degraded",
        }
    }
}

/// Why a single fallback candidate was rejected
///
/// Candidate evaluation returns `Result<RouteDecision, AttemptError>`; the
/// walk over the chain short-circuits on the first `Ok` and folds every
/// `Err` into the attempts list. None of these ever escape
/// `execute_fallback`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("Provider unhealthy")]
    Unhealthy,

    #[error("Privacy compliance failed")]
    PrivacyNonCompliant,

    #[error("Could not create viable route decision")]
    NoViableRoute,

    #[error("Candidate evaluation timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

impl AttemptError {
    /// Classify into a reportable fallback reason
    pub fn reason(&self) -> FallbackReason {
        match self {
            Self::Unhealthy => FallbackReason::ProviderUnhealthy,
            Self::PrivacyNonCompliant => FallbackReason::PrivacyViolation,
            Self::NoViableRoute => FallbackReason::ModelUnavailable,
            Self::Timeout(_) => FallbackReason::Timeout,
            Self::Other(_) => FallbackReason::UnknownError,
        }
    }
}

/// Record of a single fallback attempt against one candidate provider
#[derive(Debug, Clone)]
pub struct FallbackAttempt {
    pub provider: String,
    pub runtime: String,
    pub model: String,
    pub timestamp: SystemTime,
    pub success: bool,
    pub error_message: Option<String>,
    pub latency: Option<Duration>,
    pub confidence: Option<f64>,
}

impl FallbackAttempt {
    /// Start a new attempt record for a candidate; filled in as evaluation
    /// progresses, then appended to the result's attempts list
    pub fn started(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            runtime: String::new(),
            model: String::new(),
            timestamp: SystemTime::now(),
            success: false,
            error_message: None,
            latency: None,
            confidence: None,
        }
    }
}

/// Result of one `execute_fallback` call
#[derive(Debug, Clone)]
pub struct FallbackResult {
    pub success: bool,
    pub used_provider: Option<String>,
    pub used_runtime: Option<String>,
    pub used_model: Option<String>,
    pub attempts: Vec<FallbackAttempt>,
    pub final_error: Option<String>,
    pub degraded_mode_activated: bool,
    pub total_time: Duration,
    pub strategy_used: Option<FallbackStrategy>,
    pub recovery_suggestions: Vec<String>,
}

/// Append-only record of a fallback event, kept in the manager's history
#[derive(Debug, Clone)]
pub struct FallbackEvent {
    pub timestamp: SystemTime,
    pub original_provider: String,
    pub fallback_provider: String,
    pub original_model: Option<String>,
    pub fallback_model: Option<String>,
    pub reason: FallbackReason,
    pub strategy: FallbackStrategy,
    pub success: bool,
    pub request_type: String,
    pub recovery_time: Option<Duration>,
    pub error_message: Option<String>,
}

/// Snapshot produced by a recovery-monitoring sweep
///
/// Transient: recomputed on each (throttled) tick, never persisted.
#[derive(Debug, Clone)]
pub struct RecoveryStatus {
    pub recovered_providers: Vec<String>,
    pub still_failing_providers: Vec<String>,
    pub recovery_recommendations: Vec<String>,
    pub next_check_time: SystemTime,
    pub monitoring_active: bool,
}

/// Aggregate fallback statistics
#[derive(Debug, Clone, Serialize)]
pub struct FallbackStatistics {
    pub total_fallback_events: usize,
    /// Events within the last hour
    pub recent_fallback_events: usize,
    pub provider_failure_counts: std::collections::HashMap<String, u32>,
    pub provider_recovery_attempts: std::collections::HashMap<String, u32>,
    /// Top 5, sorted descending by count
    pub most_common_failure_reasons: Vec<(FallbackReason, usize)>,
    /// Top 5, sorted descending by count
    pub most_used_fallback_providers: Vec<(String, usize)>,
    /// Successful events / total events, 0.0 with no history
    pub average_fallback_success_rate: f64,
    pub recovery_monitoring_active: bool,
}
