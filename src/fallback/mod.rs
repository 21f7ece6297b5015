//! Fallback orchestration
//!
//! When direct routing fails, the `FallbackManager` builds an ordered chain
//! of alternative providers, walks it under a per-candidate timeout, records
//! every attempt, and drops the process into degraded mode as a last resort.
//! It also runs the pull-based recovery loop that decides when a failed
//! provider may carry traffic again.

pub mod event;
pub mod provider_kind;
mod tracking;

pub use event::{
    AttemptError, FallbackAttempt, FallbackEvent, FallbackReason, FallbackResult,
    FallbackStatistics, FallbackStrategy, RecoveryStatus,
};
pub use provider_kind::{CORE_HELPERS_MODEL, CORE_HELPERS_PROVIDER, ProviderKind};

use crate::config::FallbackSettings;
use crate::degraded::{DegradedModeManager, DegradedModeReason};
use crate::registry::{ModelMetadata, ProviderRegistry};
use crate::request::{PrivacyLevel, RouteDecision, RoutingRequest};
use crate::router::Router;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::Mutex;
use tracking::FailureTracker;

/// Maximum recovery probes before recommending manual intervention
const MAX_RECOVERY_ATTEMPTS: u32 = 5;

/// Orchestrates provider fallback and recovery
///
/// Shared via `Arc` alongside the registry and router. All internal state is
/// behind async locks; methods take `&self`.
pub struct FallbackManager {
    registry: Arc<ProviderRegistry>,
    router: Arc<Router>,
    degraded: Option<Arc<DegradedModeManager>>,
    settings: FallbackSettings,
    tracker: FailureTracker,
    monitoring_active: AtomicBool,
    last_recovery_check: Mutex<SystemTime>,
}

impl FallbackManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        router: Arc<Router>,
        degraded: Option<Arc<DegradedModeManager>>,
        settings: FallbackSettings,
    ) -> Self {
        // Backdate the throttle marker so the first monitor_recovery call
        // after startup performs a real sweep.
        let last_check = SystemTime::now() - settings.recovery_check_interval();
        Self {
            registry,
            router,
            degraded,
            settings,
            tracker: FailureTracker::new(),
            monitoring_active: AtomicBool::new(false),
            last_recovery_check: Mutex::new(last_check),
        }
    }

    /// Build an ordered, deduplicated chain of fallback candidates
    ///
    /// Four layers, in priority order: local providers when a cloud provider
    /// failed, capability-compatible providers, privacy-compliant providers,
    /// and (only if the chain would otherwise be empty) any healthy provider
    /// as an emergency layer. The first three layers skip already-failed
    /// providers and anything the request's privacy level disallows; the
    /// emergency layer skips only failed providers, because degraded-mode
    /// activation remains the true last resort behind it.
    pub async fn construct_fallback_chain(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
    ) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();

        if self.should_try_cloud_to_local(request, failed_providers) {
            for provider in self.local_candidates(request, failed_providers).await {
                push_unique(&mut chain, provider);
            }
        }

        for provider in self
            .capability_candidates(request, failed_providers, &chain)
            .await
        {
            push_unique(&mut chain, provider);
        }

        for provider in self
            .privacy_candidates(request, failed_providers, &chain)
            .await
        {
            push_unique(&mut chain, provider);
        }

        if chain.is_empty() {
            for provider in self.emergency_candidates(request, failed_providers).await {
                push_unique(&mut chain, provider);
            }
        }

        tracing::debug!(
            request_id = %request.id(),
            chain = ?chain,
            failed = ?failed_providers,
            "Constructed fallback chain"
        );
        chain
    }

    /// Cloud-to-local applies when a cloud provider failed and the request
    /// is not confidential or above (those are local-only anyway, so the
    /// dedicated layer adds nothing)
    fn should_try_cloud_to_local(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
    ) -> bool {
        if request.privacy_level() >= PrivacyLevel::Confidential {
            return false;
        }
        failed_providers
            .iter()
            .any(|p| ProviderKind::classify(p) == ProviderKind::Cloud)
    }

    async fn local_candidates(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
    ) -> Vec<String> {
        let mut candidates = Vec::new();
        for provider in ["local", "huggingface"] {
            if failed_providers.iter().any(|f| f == provider) {
                continue;
            }
            if !self.registry.is_provider_routable(provider).await {
                continue;
            }
            if !self.router.is_privacy_compliant(request, provider, None) {
                continue;
            }
            candidates.push(provider.to_string());
        }
        candidates
    }

    async fn capability_candidates(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
        already_chained: &[String],
    ) -> Vec<String> {
        let requirements = Router::requirements_for(request);
        let mut candidates = Vec::new();

        for provider in self.registry.list_providers(true).await {
            if failed_providers.iter().any(|f| f == &provider)
                || already_chained.iter().any(|c| c == &provider)
            {
                continue;
            }
            let Some(spec) = self.registry.get_provider_spec(&provider).await else {
                continue;
            };
            if !requirements.capabilities.is_subset(spec.capabilities()) {
                continue;
            }
            if !self.router.is_privacy_compliant(request, &provider, None) {
                continue;
            }
            candidates.push(provider);
        }
        candidates
    }

    async fn privacy_candidates(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
        already_chained: &[String],
    ) -> Vec<String> {
        let mut candidates = Vec::new();
        for provider in self.registry.list_providers(true).await {
            if failed_providers.iter().any(|f| f == &provider)
                || already_chained.iter().any(|c| c == &provider)
            {
                continue;
            }
            if !self.router.is_privacy_compliant(request, &provider, None) {
                continue;
            }
            candidates.push(provider);
        }
        candidates
    }

    /// Last-resort layer: any healthy provider that has not already failed,
    /// ignoring capability and privacy checks
    async fn emergency_candidates(
        &self,
        request: &RoutingRequest,
        failed_providers: &[String],
    ) -> Vec<String> {
        let mut candidates = Vec::new();
        for provider in self.registry.list_providers(true).await {
            if failed_providers.iter().any(|f| f == &provider) {
                continue;
            }
            candidates.push(provider);
        }
        if !candidates.is_empty() {
            tracing::warn!(
                request_id = %request.id(),
                "Using emergency fallback layer - capability and privacy filters relaxed"
            );
        }
        candidates
    }

    /// Walk a fallback chain until a candidate yields a viable decision
    ///
    /// Evaluates at most `max_attempts` candidates, each under the
    /// configured probe timeout. Failed candidates are folded into the
    /// attempts list and never abort the walk. If the whole chain fails and
    /// a degraded-mode manager is attached, degraded mode is the final
    /// answer; otherwise the result carries the failure.
    pub async fn execute_fallback(
        &self,
        request: &RoutingRequest,
        chain: &[String],
    ) -> FallbackResult {
        let start = Instant::now();
        let mut attempts: Vec<FallbackAttempt> = Vec::new();
        let max_attempts = self.settings.max_attempts();
        let probe_timeout = self.settings.probe_timeout();

        for (index, provider) in chain.iter().enumerate() {
            if index >= max_attempts {
                tracing::warn!(
                    request_id = %request.id(),
                    max_attempts,
                    chain_len = chain.len(),
                    "Fallback attempt budget exhausted before end of chain"
                );
                break;
            }

            let attempt_start = Instant::now();
            let mut attempt = FallbackAttempt::started(provider.clone());

            let outcome =
                tokio::time::timeout(probe_timeout, self.evaluate_candidate(request, provider))
                    .await;

            match outcome {
                Err(_elapsed) => {
                    let err = AttemptError::Timeout(probe_timeout.as_secs());
                    tracing::warn!(
                        request_id = %request.id(),
                        provider = %provider,
                        timeout_secs = probe_timeout.as_secs(),
                        "Fallback candidate evaluation timed out"
                    );
                    attempt.error_message = Some(err.to_string());
                    attempt.latency = Some(attempt_start.elapsed());
                    attempts.push(attempt);
                }
                Ok(Err(err)) => {
                    tracing::debug!(
                        request_id = %request.id(),
                        provider = %provider,
                        reason = err.reason().as_str(),
                        "Fallback candidate rejected: {err}"
                    );
                    attempt.error_message = Some(err.to_string());
                    attempt.latency = Some(attempt_start.elapsed());
                    attempts.push(attempt);
                }
                Ok(Ok(decision)) => {
                    attempt.runtime = decision.runtime.clone();
                    attempt.model = decision.model_id.clone();
                    attempt.success = true;
                    attempt.latency = Some(attempt_start.elapsed());
                    attempt.confidence = Some(decision.confidence);
                    attempts.push(attempt);

                    let strategy = ProviderKind::classify(provider).fallback_strategy();
                    self.record_event(
                        request,
                        original_provider(request),
                        provider,
                        Some(decision.model_id.clone()),
                        FallbackReason::ProviderUnavailable,
                        strategy,
                        true,
                        None,
                    )
                    .await;

                    tracing::info!(
                        request_id = %request.id(),
                        provider = %decision.provider,
                        model = %decision.model_id,
                        attempts = attempts.len(),
                        strategy = strategy.as_str(),
                        "Fallback succeeded"
                    );

                    return FallbackResult {
                        success: true,
                        used_provider: Some(decision.provider),
                        used_runtime: Some(decision.runtime),
                        used_model: Some(decision.model_id),
                        attempts,
                        final_error: None,
                        degraded_mode_activated: false,
                        total_time: start.elapsed(),
                        strategy_used: Some(strategy),
                        recovery_suggestions: Vec::new(),
                    };
                }
            }
        }

        // Every candidate failed; degraded mode is the final safety net.
        if let Some(decision) = self.activate_degraded_mode(request).await {
            let mut attempt = FallbackAttempt::started(decision.provider.clone());
            attempt.runtime = decision.runtime.clone();
            attempt.model = decision.model_id.clone();
            attempt.success = true;
            attempt.confidence = Some(decision.confidence);
            attempts.push(attempt);

            return FallbackResult {
                success: true,
                used_provider: Some(decision.provider),
                used_runtime: Some(decision.runtime),
                used_model: Some(decision.model_id),
                attempts,
                final_error: None,
                degraded_mode_activated: true,
                total_time: start.elapsed(),
                strategy_used: Some(FallbackStrategy::EmergencyDegraded),
                recovery_suggestions: Vec::new(),
            };
        }

        // Only a real provider name may enter the failure-tracking maps;
        // with no preferred provider there is nothing to attribute the
        // failure to, and a placeholder would surface in recovery sweeps.
        if let Some(original) = request.preferred_provider() {
            self.record_event(
                request,
                original,
                "none",
                None,
                FallbackReason::ProviderUnavailable,
                FallbackStrategy::EmergencyDegraded,
                false,
                Some("All fallback providers failed".to_string()),
            )
            .await;
        }

        tracing::error!(
            request_id = %request.id(),
            attempts = attempts.len(),
            "All fallback providers failed and degraded mode is unavailable"
        );

        let recovery_suggestions = suggest_recovery(&attempts);
        FallbackResult {
            success: false,
            used_provider: None,
            used_runtime: None,
            used_model: None,
            attempts,
            final_error: Some("All fallback providers failed".to_string()),
            degraded_mode_activated: false,
            total_time: start.elapsed(),
            strategy_used: None,
            recovery_suggestions,
        }
    }

    /// Evaluate a single chain candidate into a route decision
    async fn evaluate_candidate(
        &self,
        request: &RoutingRequest,
        provider: &str,
    ) -> Result<RouteDecision, AttemptError> {
        if !self.registry.is_provider_routable(provider).await {
            return Err(AttemptError::Unhealthy);
        }

        if !self.router.is_privacy_compliant(request, provider, None) {
            return Err(AttemptError::PrivacyNonCompliant);
        }

        let Some(spec) = self.registry.get_provider_spec(provider).await else {
            return Err(AttemptError::NoViableRoute);
        };

        let model_id = provider_kind::select_model_for_provider(provider, request);
        let model_meta = ModelMetadata::new(model_id.clone(), provider);

        let mut viable_runtime = None;
        for runtime in self.registry.compatible_runtimes(&model_meta).await {
            if self.registry.is_runtime_routable(&runtime).await
                && self
                    .router
                    .is_privacy_compliant(request, provider, Some(&runtime))
            {
                viable_runtime = Some(runtime);
                break;
            }
        }
        let Some(runtime) = viable_runtime else {
            return Err(AttemptError::NoViableRoute);
        };

        Ok(RouteDecision {
            provider: provider.to_string(),
            runtime: runtime.clone(),
            model_id: model_id.clone(),
            reason: format!("Fallback to {provider}"),
            confidence: 0.6,
            fallback_chain: Vec::new(),
            estimated_cost: provider_kind::estimate_cost(provider, &model_id),
            estimated_latency: provider_kind::estimate_latency(provider, &runtime),
            privacy_compliant: true,
            capabilities: spec.capabilities().iter().cloned().collect(),
        })
    }

    /// Produce the degraded-mode decision, flipping the shared flag
    ///
    /// Returns `None` when no degraded-mode manager is attached; the caller
    /// then reports outright failure instead of pretending a core-helpers
    /// route exists.
    pub async fn activate_degraded_mode(&self, request: &RoutingRequest) -> Option<RouteDecision> {
        let Some(manager) = &self.degraded else {
            tracing::warn!(
                request_id = %request.id(),
                "Degraded mode requested but no manager is attached"
            );
            return None;
        };

        let status = manager
            .activate_degraded_mode(
                DegradedModeReason::AllProvidersFailed,
                serde_json::json!({
                    "request_id": request.id().to_string(),
                    "task_type": request.task_type().as_str(),
                    "privacy_level": request.privacy_level().as_str(),
                }),
            )
            .await;
        if !status.is_active {
            return None;
        }

        self.record_event(
            request,
            original_provider(request),
            CORE_HELPERS_PROVIDER,
            Some(CORE_HELPERS_MODEL.to_string()),
            FallbackReason::ProviderUnavailable,
            FallbackStrategy::EmergencyDegraded,
            true,
            None,
        )
        .await;

        Some(RouteDecision {
            provider: CORE_HELPERS_PROVIDER.to_string(),
            runtime: CORE_HELPERS_PROVIDER.to_string(),
            model_id: CORE_HELPERS_MODEL.to_string(),
            reason: "Degraded mode activated - all providers failed".to_string(),
            confidence: 0.3,
            fallback_chain: Vec::new(),
            estimated_cost: Some(0.0),
            estimated_latency: Some(0.5),
            privacy_compliant: true,
            capabilities: vec!["basic_text".to_string(), "simple_analysis".to_string()],
        })
    }

    /// Record an externally observed provider failure
    ///
    /// Callers report the failure that triggered fallback here (for example
    /// an auth error from the preferred provider) so failure counts and
    /// recovery probing see it.
    pub async fn record_provider_failure(
        &self,
        request: &RoutingRequest,
        provider: &str,
        reason: FallbackReason,
        error_message: Option<String>,
    ) {
        self.record_event(
            request,
            provider,
            "none",
            None,
            reason,
            ProviderKind::classify(provider).fallback_strategy(),
            false,
            error_message,
        )
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_event(
        &self,
        request: &RoutingRequest,
        original: &str,
        fallback: &str,
        fallback_model: Option<String>,
        reason: FallbackReason,
        strategy: FallbackStrategy,
        success: bool,
        error_message: Option<String>,
    ) {
        let event = FallbackEvent {
            timestamp: SystemTime::now(),
            original_provider: original.to_string(),
            fallback_provider: fallback.to_string(),
            original_model: request.preferred_model().map(String::from),
            fallback_model,
            reason,
            strategy,
            success,
            request_type: request.task_type().as_str().to_string(),
            recovery_time: None,
            error_message,
        };
        self.tracker.record_event(event).await;
    }

    /// Run one recovery-monitoring sweep, throttled by the configured
    /// interval
    ///
    /// Within the throttle window this returns an empty status without
    /// touching the network. A real sweep re-probes every provider whose
    /// last failure is older than the recovery threshold; a healthy probe
    /// clears all failure state for that provider, an unhealthy one bumps
    /// its recovery-attempt counter.
    pub async fn monitor_recovery(&self) -> RecoveryStatus {
        let now = SystemTime::now();
        let interval = self.settings.recovery_check_interval();
        let monitoring_active = self.monitoring_active.load(Ordering::Relaxed);

        {
            let mut last_check = self.last_recovery_check.lock().await;
            let since_last = now.duration_since(*last_check).unwrap_or(Duration::ZERO);
            if since_last < interval {
                return RecoveryStatus {
                    recovered_providers: Vec::new(),
                    still_failing_providers: Vec::new(),
                    recovery_recommendations: Vec::new(),
                    next_check_time: *last_check + interval,
                    monitoring_active,
                };
            }
            *last_check = now;
        }

        let threshold = self.settings.recovery_threshold();
        let probe_timeout = self.settings.probe_timeout();
        let mut recovered = Vec::new();
        let mut still_failing = Vec::new();
        let mut recommendations = Vec::new();

        for (provider, last_failure) in self.tracker.recently_failed().await {
            let failing_for = now.duration_since(last_failure).unwrap_or(Duration::ZERO);
            if failing_for < threshold {
                // Too soon to re-probe; leave the provider quarantined.
                continue;
            }

            let probe = tokio::time::timeout(
                probe_timeout,
                self.registry.refresh_provider_health(&provider),
            )
            .await;

            match probe {
                Ok(status) if status.is_routable() => {
                    self.tracker.clear_provider(&provider).await;
                    tracing::info!(provider = %provider, "Provider recovered");
                    recommendations
                        .push(format!("Provider {provider} is now healthy and can be used again"));
                    recovered.push(provider);
                }
                Ok(_) => {
                    let attempts = self.tracker.increment_recovery_attempts(&provider).await;
                    if attempts > MAX_RECOVERY_ATTEMPTS {
                        recommendations.push(format!(
                            "Provider {provider} has failed recovery {attempts} times - consider manual intervention"
                        ));
                    }
                    still_failing.push(provider);
                }
                Err(_elapsed) => {
                    tracing::warn!(provider = %provider, "Recovery probe timed out");
                    still_failing.push(provider);
                }
            }
        }

        RecoveryStatus {
            recovered_providers: recovered,
            still_failing_providers: still_failing,
            recovery_recommendations: recommendations,
            next_check_time: now + interval,
            monitoring_active,
        }
    }

    /// Aggregate fallback statistics over the retained history
    pub async fn get_fallback_statistics(&self) -> FallbackStatistics {
        let snapshot = self.tracker.statistics_snapshot().await;
        FallbackStatistics {
            total_fallback_events: snapshot.total_events,
            recent_fallback_events: snapshot.recent_events,
            provider_failure_counts: snapshot.failure_counts,
            provider_recovery_attempts: snapshot.recovery_attempts,
            most_common_failure_reasons: snapshot.top_failure_reasons,
            most_used_fallback_providers: snapshot.top_fallback_providers,
            average_fallback_success_rate: snapshot.success_rate,
            recovery_monitoring_active: self.monitoring_active.load(Ordering::Relaxed),
        }
    }

    /// Drop history entries older than the given age, returning how many
    /// were removed
    pub async fn clear_fallback_history(&self, older_than: Duration) -> usize {
        let cutoff = SystemTime::now() - older_than;
        let cleared = self.tracker.clear_history_before(cutoff).await;
        if cleared > 0 {
            tracing::info!(cleared, "Pruned fallback history");
        }
        cleared
    }

    pub fn start_recovery_monitoring(&self) {
        self.monitoring_active.store(true, Ordering::Relaxed);
        tracing::info!("Recovery monitoring enabled");
    }

    pub fn stop_recovery_monitoring(&self) {
        self.monitoring_active.store(false, Ordering::Relaxed);
        tracing::info!("Recovery monitoring disabled");
    }

    pub fn recovery_monitoring_active(&self) -> bool {
        self.monitoring_active.load(Ordering::Relaxed)
    }
}

fn original_provider(request: &RoutingRequest) -> &str {
    request.preferred_provider().unwrap_or("unknown")
}

fn push_unique(chain: &mut Vec<String>, provider: String) {
    if !chain.contains(&provider) {
        chain.push(provider);
    }
}

/// Derive operator-facing suggestions from the failed attempts, keyed on
/// which providers failed
fn suggest_recovery(attempts: &[FallbackAttempt]) -> Vec<String> {
    let failed: Vec<&str> = attempts
        .iter()
        .filter(|a| !a.success)
        .map(|a| a.provider.as_str())
        .collect();

    let mut suggestions = Vec::new();
    if failed.contains(&"openai") {
        suggestions.push("Check OpenAI API key and account status".to_string());
    }
    if failed.contains(&"gemini") {
        suggestions.push("Verify Google AI API key and quota limits".to_string());
    }
    if failed.contains(&"local") {
        suggestions
            .push("Check local model availability and Ollama service status".to_string());
    }
    if failed.len() > 2 {
        suggestions
            .push("Consider checking network connectivity and firewall settings".to_string());
    }

    suggestions
}
