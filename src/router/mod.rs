//! Direct routing and privacy policy
//!
//! The router makes the first-choice decision for a request. When it cannot
//! (preferred provider down, nothing auto-selectable), callers hand the
//! request to the fallback manager, which owns the recovery control loop.

use crate::error::{RouteError, RouteResult};
use crate::fallback::provider_kind;
use crate::registry::{ModelMetadata, ProviderRegistry, ProviderRequirements};
use crate::request::{PrivacyLevel, RouteDecision, RoutingRequest};
use std::collections::HashMap;
use std::sync::Arc;

/// Policy configuration for routing decisions
///
/// Privacy maps gate which providers and runtimes each privacy level may
/// touch. A provider absent from a level's list is non-compliant at that
/// level - the maps are allowlists, not denylists.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    name: String,
    privacy_provider_map: HashMap<PrivacyLevel, Vec<String>>,
    privacy_runtime_map: HashMap<PrivacyLevel, Vec<String>>,
}

impl Default for RoutingPolicy {
    /// Default policy: public traffic may use any provider, internal stays
    /// on trusted providers, confidential and restricted never leave the box.
    fn default() -> Self {
        let mut privacy_provider_map = HashMap::new();
        privacy_provider_map.insert(
            PrivacyLevel::Public,
            vec!["openai", "gemini", "deepseek", "huggingface", "local"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        privacy_provider_map.insert(
            PrivacyLevel::Internal,
            vec!["huggingface".to_string(), "local".to_string()],
        );
        privacy_provider_map.insert(PrivacyLevel::Confidential, vec!["local".to_string()]);
        privacy_provider_map.insert(PrivacyLevel::Restricted, vec!["local".to_string()]);

        let mut privacy_runtime_map = HashMap::new();
        privacy_runtime_map.insert(
            PrivacyLevel::Public,
            vec!["vllm", "transformers", "llama.cpp", "core_helpers"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        privacy_runtime_map.insert(
            PrivacyLevel::Internal,
            vec!["transformers", "llama.cpp", "core_helpers"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        privacy_runtime_map.insert(
            PrivacyLevel::Confidential,
            vec!["llama.cpp".to_string(), "core_helpers".to_string()],
        );
        privacy_runtime_map.insert(PrivacyLevel::Restricted, vec!["core_helpers".to_string()]);

        Self {
            name: "default".to_string(),
            privacy_provider_map,
            privacy_runtime_map,
        }
    }
}

impl RoutingPolicy {
    /// Create an empty named policy; populate with `allow_provider`/`allow_runtime`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privacy_provider_map: HashMap::new(),
            privacy_runtime_map: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow a provider at the given privacy level
    pub fn allow_provider(mut self, level: PrivacyLevel, provider: impl Into<String>) -> Self {
        self.privacy_provider_map
            .entry(level)
            .or_default()
            .push(provider.into());
        self
    }

    /// Allow a runtime at the given privacy level
    pub fn allow_runtime(mut self, level: PrivacyLevel, runtime: impl Into<String>) -> Self {
        self.privacy_runtime_map
            .entry(level)
            .or_default()
            .push(runtime.into());
        self
    }

    fn provider_allowed(&self, level: PrivacyLevel, provider: &str) -> bool {
        self.privacy_provider_map
            .get(&level)
            .is_some_and(|allowed| allowed.iter().any(|p| p == provider))
    }

    fn runtime_allowed(&self, level: PrivacyLevel, runtime: &str) -> bool {
        self.privacy_runtime_map
            .get(&level)
            .is_some_and(|allowed| allowed.iter().any(|r| r == runtime))
    }
}

/// Direct router over the provider registry
pub struct Router {
    registry: Arc<ProviderRegistry>,
    policy: RoutingPolicy,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>, policy: RoutingPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Check if a provider (and optionally runtime) meets the request's
    /// privacy requirements
    pub fn is_privacy_compliant(
        &self,
        request: &RoutingRequest,
        provider: &str,
        runtime: Option<&str>,
    ) -> bool {
        if !self.policy.provider_allowed(request.privacy_level(), provider) {
            return false;
        }

        if let Some(runtime) = runtime {
            if !self.policy.runtime_allowed(request.privacy_level(), runtime) {
                return false;
            }
        }

        true
    }

    /// Attempt direct provider selection for a request
    ///
    /// Tries the preferred provider first, then registry auto-selection,
    /// then the remaining registered providers in priority order. Every
    /// candidate passes health, privacy, and capability filtering, so a
    /// privacy-disallowed auto pick never blocks a compliant alternative.
    ///
    /// # Errors
    /// Returns `RouteError::RoutingFailed` when no provider passes all
    /// filters - the caller should fall back via the fallback manager.
    pub async fn route(&self, request: &RoutingRequest) -> RouteResult<RouteDecision> {
        let mut candidates = Vec::new();

        if let Some(preferred) = request.preferred_provider() {
            candidates.push((preferred.to_string(), true));
        }

        let requirements = Self::requirements_for(request);
        if let Some(auto) = self.registry.auto_select_provider(&requirements).await {
            if Some(auto.as_str()) != request.preferred_provider() {
                candidates.push((auto, false));
            }
        }

        for provider in self.registry.list_providers(true).await {
            if !candidates.iter().any(|(name, _)| name == &provider) {
                candidates.push((provider, false));
            }
        }

        for (provider, preferred) in candidates {
            if !self.registry.is_provider_routable(&provider).await {
                tracing::debug!(
                    request_id = %request.id(),
                    provider = %provider,
                    "Skipping unroutable provider in direct selection"
                );
                continue;
            }

            if !self.is_privacy_compliant(request, &provider, None) {
                tracing::debug!(
                    request_id = %request.id(),
                    provider = %provider,
                    privacy_level = request.privacy_level().as_str(),
                    "Provider rejected by privacy policy"
                );
                continue;
            }

            let Some(spec) = self.registry.get_provider_spec(&provider).await else {
                continue;
            };

            if !requirements.capabilities.is_subset(spec.capabilities()) {
                tracing::debug!(
                    request_id = %request.id(),
                    provider = %provider,
                    "Provider lacks required capabilities"
                );
                continue;
            }

            if let Some(decision) = self.build_decision(request, &provider, preferred).await {
                tracing::info!(
                    request_id = %request.id(),
                    provider = %decision.provider,
                    model = %decision.model_id,
                    runtime = %decision.runtime,
                    "Direct routing succeeded"
                );
                return Ok(decision);
            }
        }

        Err(RouteError::RoutingFailed(
            "No viable provider for request".to_string(),
        ))
    }

    /// Capability requirements derived from the request's flags
    pub fn requirements_for(request: &RoutingRequest) -> ProviderRequirements {
        let mut requirements = ProviderRequirements::default();
        if request.requires_streaming() {
            requirements.capabilities.insert("streaming".to_string());
        }
        if request.requires_function_calling() {
            requirements
                .capabilities
                .insert("function_calling".to_string());
        }
        if request.requires_vision() {
            requirements.capabilities.insert("vision".to_string());
        }
        requirements
    }

    async fn build_decision(
        &self,
        request: &RoutingRequest,
        provider: &str,
        preferred: bool,
    ) -> Option<RouteDecision> {
        let spec = self.registry.get_provider_spec(provider).await?;

        let model_id = request
            .preferred_model()
            .filter(|_| preferred)
            .map(String::from)
            .unwrap_or_else(|| provider_kind::select_model_for_provider(provider, request));

        let model_meta = ModelMetadata::new(model_id.clone(), provider);
        let mut viable_runtime = None;
        for runtime in self.registry.compatible_runtimes(&model_meta).await {
            if self.registry.is_runtime_routable(&runtime).await
                && self
                    .policy
                    .runtime_allowed(request.privacy_level(), &runtime)
            {
                viable_runtime = Some(runtime);
                break;
            }
        }
        let runtime = viable_runtime?;

        let (confidence, reason) = if preferred {
            (0.9, format!("Preferred provider {provider}"))
        } else {
            (0.8, format!("Auto-selected provider {provider}"))
        };

        Some(RouteDecision {
            provider: provider.to_string(),
            runtime: runtime.clone(),
            model_id: model_id.clone(),
            reason,
            confidence,
            fallback_chain: Vec::new(),
            estimated_cost: provider_kind::estimate_cost(provider, &model_id),
            estimated_latency: provider_kind::estimate_latency(provider, &runtime),
            privacy_compliant: true,
            capabilities: spec.capabilities().iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Component, HealthStatus, ProviderSpec, RuntimeSpec};

    async fn test_registry() -> Arc<ProviderRegistry> {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register_provider(
                ProviderSpec::new("openai")
                    .with_capabilities(["streaming", "function_calling", "vision"])
                    .with_fallback_priority(80),
            )
            .await;
        registry
            .register_provider(
                ProviderSpec::new("local")
                    .with_capabilities(["streaming"])
                    .with_fallback_priority(60),
            )
            .await;
        registry
            .register_runtime(RuntimeSpec::new("vllm").with_priority(80))
            .await;
        registry
            .register_runtime(RuntimeSpec::new("llama.cpp").with_priority(60))
            .await;
        registry
    }

    #[tokio::test]
    async fn test_direct_route_honors_preferred_provider() {
        let registry = test_registry().await;
        let router = Router::new(registry, RoutingPolicy::default());

        let request = RoutingRequest::new("hello").with_preferred_provider("local");
        let decision = router.route(&request).await.unwrap();

        assert_eq!(decision.provider, "local");
        assert_eq!(decision.model_id, "llama3.2:latest");
        assert!(decision.privacy_compliant);
    }

    #[tokio::test]
    async fn test_direct_route_auto_selects_when_no_preference() {
        let registry = test_registry().await;
        let router = Router::new(registry, RoutingPolicy::default());

        let request = RoutingRequest::new("hello");
        let decision = router.route(&request).await.unwrap();

        // openai has higher fallback priority
        assert_eq!(decision.provider, "openai");
        assert!(decision.reason.contains("Auto-selected"));
    }

    #[tokio::test]
    async fn test_direct_route_skips_unhealthy_preferred() {
        let registry = test_registry().await;
        registry
            .set_health_status(Component::provider("openai"), HealthStatus::Unhealthy)
            .await;
        let router = Router::new(registry, RoutingPolicy::default());

        let request = RoutingRequest::new("hello").with_preferred_provider("openai");
        let decision = router.route(&request).await.unwrap();
        assert_eq!(decision.provider, "local");
    }

    #[tokio::test]
    async fn test_confidential_request_never_routes_to_cloud() {
        let registry = test_registry().await;
        let router = Router::new(registry, RoutingPolicy::default());

        let request = RoutingRequest::new("secret")
            .with_privacy_level(PrivacyLevel::Confidential)
            .with_preferred_provider("openai");

        let decision = router.route(&request).await.unwrap();
        assert_eq!(decision.provider, "local");
    }

    #[tokio::test]
    async fn test_privacy_rejected_auto_pick_does_not_block_routing() {
        let registry = test_registry().await;
        let router = Router::new(registry, RoutingPolicy::default());

        // Auto-selection favors openai (highest priority), but Internal
        // traffic may not touch it; routing must continue to a compliant
        // provider instead of failing.
        let request = RoutingRequest::new("hello").with_privacy_level(PrivacyLevel::Internal);
        let decision = router.route(&request).await.unwrap();

        assert_eq!(decision.provider, "local");
        assert!(decision.reason.contains("Auto-selected"));
    }

    #[tokio::test]
    async fn test_route_fails_when_nothing_viable() {
        let registry = Arc::new(ProviderRegistry::new());
        let router = Router::new(registry, RoutingPolicy::default());

        let request = RoutingRequest::new("hello");
        let result = router.route(&request).await;
        assert!(matches!(result, Err(RouteError::RoutingFailed(_))));
    }

    #[tokio::test]
    async fn test_capability_filter_excludes_provider() {
        let registry = test_registry().await;
        let router = Router::new(registry, RoutingPolicy::default());

        // local lacks vision
        let request = RoutingRequest::new("describe this")
            .with_preferred_provider("local")
            .with_vision();

        let decision = router.route(&request).await.unwrap();
        assert_eq!(decision.provider, "openai");
    }

    #[test]
    fn test_privacy_compliance_provider_and_runtime() {
        let registry = Arc::new(ProviderRegistry::new());
        let router = Router::new(registry, RoutingPolicy::default());

        let public = RoutingRequest::new("x");
        let confidential =
            RoutingRequest::new("x").with_privacy_level(PrivacyLevel::Confidential);

        assert!(router.is_privacy_compliant(&public, "openai", None));
        assert!(!router.is_privacy_compliant(&confidential, "openai", None));
        assert!(router.is_privacy_compliant(&confidential, "local", Some("llama.cpp")));
        assert!(!router.is_privacy_compliant(&confidential, "local", Some("vllm")));
    }

    #[test]
    fn test_custom_policy_allowlist() {
        let policy = RoutingPolicy::named("locked-down")
            .allow_provider(PrivacyLevel::Public, "local")
            .allow_runtime(PrivacyLevel::Public, "llama.cpp");
        let registry = Arc::new(ProviderRegistry::new());
        let router = Router::new(registry, policy);

        let request = RoutingRequest::new("x");
        assert!(router.is_privacy_compliant(&request, "local", Some("llama.cpp")));
        assert!(!router.is_privacy_compliant(&request, "openai", None));
        // Levels with no entry allow nothing
        let internal = RoutingRequest::new("x").with_privacy_level(PrivacyLevel::Internal);
        assert!(!router.is_privacy_compliant(&internal, "local", None));
    }
}
