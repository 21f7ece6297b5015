//! Degraded mode management
//!
//! When every provider is unreachable the system drops to a zero-cost,
//! low-capability mode backed by always-available local heuristics (the
//! "core helpers" bundle). This manager owns that process-wide flag; the
//! fallback manager decides *when* to flip it.

use serde::Serialize;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Why degraded mode was activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedModeReason {
    AllProvidersFailed,
    NetworkUnavailable,
    ApiKeysInvalid,
    Manual,
}

impl DegradedModeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllProvidersFailed => "all_providers_failed",
            Self::NetworkUnavailable => "network_unavailable",
            Self::ApiKeysInvalid => "api_keys_invalid",
            Self::Manual => "manual",
        }
    }
}

/// Snapshot of the degraded-mode state
#[derive(Debug, Clone)]
pub struct DegradedStatus {
    pub is_active: bool,
    pub reason: Option<DegradedModeReason>,
    pub activated_at: Option<SystemTime>,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct DegradedState {
    active: bool,
    reason: Option<DegradedModeReason>,
    activated_at: Option<SystemTime>,
    context: Option<serde_json::Value>,
    activation_count: u64,
}

/// Process-wide degraded mode switch
///
/// Shared via `Arc` across the routing stack. Activation is idempotent:
/// re-activating while already active updates the reason/context and bumps
/// the activation count.
#[derive(Debug, Default)]
pub struct DegradedModeManager {
    state: RwLock<DegradedState>,
}

impl DegradedModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the process into degraded mode
    pub async fn activate_degraded_mode(
        &self,
        reason: DegradedModeReason,
        context: serde_json::Value,
    ) -> DegradedStatus {
        let mut state = self.state.write().await;

        if !state.active {
            tracing::warn!(
                reason = reason.as_str(),
                "Degraded mode activated - serving with core helpers only"
            );
        }

        state.active = true;
        state.reason = Some(reason);
        state.activated_at = Some(SystemTime::now());
        state.context = Some(context);
        state.activation_count += 1;

        DegradedStatus {
            is_active: true,
            reason: state.reason,
            activated_at: state.activated_at,
            context: state.context.clone(),
        }
    }

    /// Leave degraded mode (typically after recovery monitoring reports
    /// providers are back)
    pub async fn deactivate_degraded_mode(&self) {
        let mut state = self.state.write().await;
        if state.active {
            tracing::info!("Degraded mode deactivated - normal routing restored");
        }
        state.active = false;
        state.reason = None;
        state.activated_at = None;
        state.context = None;
    }

    pub async fn is_active(&self) -> bool {
        self.state.read().await.active
    }

    pub async fn status(&self) -> DegradedStatus {
        let state = self.state.read().await;
        DegradedStatus {
            is_active: state.active,
            reason: state.reason,
            activated_at: state.activated_at,
            context: state.context.clone(),
        }
    }

    /// How many times degraded mode has been activated over the process life
    pub async fn activation_count(&self) -> u64 {
        self.state.read().await.activation_count
    }
}
