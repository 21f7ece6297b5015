//! Static per-provider-kind policy
//!
//! The registry's provider list is dynamic (providers can be registered at
//! runtime), but the routing heuristics below apply to a small closed set of
//! provider identities. Keeping them in a tagged enum instead of scattered
//! string comparisons means one place to look when a new provider class is
//! added.

use super::event::FallbackStrategy;
use crate::request::RoutingRequest;

/// Synthetic provider name used when degraded mode is active
pub const CORE_HELPERS_PROVIDER: &str = "core_helpers";

/// Model id served by the core helpers bundle
pub const CORE_HELPERS_MODEL: &str = "tinyllama+distilbert+spacy";

/// Classification of a provider identity for policy decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Hosted API providers (openai, gemini, deepseek)
    Cloud,
    /// In-house providers (local, huggingface)
    Local,
    /// The always-available degraded-mode heuristics bundle
    CoreHelpers,
    /// Anything registered at runtime that we have no specific policy for
    Other,
}

impl ProviderKind {
    /// Classify a provider name
    pub fn classify(provider: &str) -> Self {
        match provider {
            "openai" | "gemini" | "deepseek" => Self::Cloud,
            "local" | "huggingface" => Self::Local,
            CORE_HELPERS_PROVIDER => Self::CoreHelpers,
            _ => Self::Other,
        }
    }

    /// Whether this kind runs entirely in-process or on-premises
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local | Self::CoreHelpers)
    }

    /// Fallback strategy recorded when a fallback lands on this kind
    pub fn fallback_strategy(&self) -> FallbackStrategy {
        match self {
            Self::Local => FallbackStrategy::CloudToLocal,
            Self::CoreHelpers => FallbackStrategy::EmergencyDegraded,
            Self::Cloud | Self::Other => FallbackStrategy::RuntimeSwitch,
        }
    }
}

/// Select a default model for a provider based on request requirements
///
/// Static heuristic table; a full implementation would consult live model
/// discovery, but fallback decisions need an answer even when discovery is
/// what just failed.
pub fn select_model_for_provider(provider: &str, request: &RoutingRequest) -> String {
    match provider {
        "openai" => {
            if request.requires_vision() {
                "gpt-4o".to_string()
            } else {
                "gpt-4o-mini".to_string()
            }
        }
        "gemini" => "gemini-1.5-flash".to_string(),
        "deepseek" => "deepseek-chat".to_string(),
        "local" => "llama3.2:latest".to_string(),
        "huggingface" => "microsoft/DialoGPT-medium".to_string(),
        CORE_HELPERS_PROVIDER => CORE_HELPERS_MODEL.to_string(),
        _ => "default-model".to_string(),
    }
}

/// Estimate per-request cost for a provider/model pair (USD, rough)
pub fn estimate_cost(provider: &str, model_id: &str) -> Option<f64> {
    if ProviderKind::classify(provider).is_local() {
        return Some(0.0);
    }

    match provider {
        "openai" => Some(if model_id.contains("mini") { 0.002 } else { 0.03 }),
        "gemini" => Some(0.001),
        "deepseek" => Some(0.0002),
        _ => None,
    }
}

/// Estimate request latency in seconds for a provider/runtime pair
pub fn estimate_latency(provider: &str, runtime: &str) -> Option<f64> {
    if ProviderKind::classify(provider) == ProviderKind::Cloud {
        return Some(1.5);
    }

    match runtime {
        "vllm" => Some(0.5),
        "transformers" => Some(2.0),
        "llama.cpp" => Some(1.0),
        CORE_HELPERS_PROVIDER => Some(0.3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RoutingRequest;

    #[test]
    fn test_classify_known_providers() {
        assert_eq!(ProviderKind::classify("openai"), ProviderKind::Cloud);
        assert_eq!(ProviderKind::classify("gemini"), ProviderKind::Cloud);
        assert_eq!(ProviderKind::classify("deepseek"), ProviderKind::Cloud);
        assert_eq!(ProviderKind::classify("local"), ProviderKind::Local);
        assert_eq!(ProviderKind::classify("huggingface"), ProviderKind::Local);
        assert_eq!(
            ProviderKind::classify("core_helpers"),
            ProviderKind::CoreHelpers
        );
        assert_eq!(ProviderKind::classify("somebody-new"), ProviderKind::Other);
    }

    #[test]
    fn test_strategy_per_kind() {
        assert_eq!(
            ProviderKind::Local.fallback_strategy(),
            FallbackStrategy::CloudToLocal
        );
        assert_eq!(
            ProviderKind::CoreHelpers.fallback_strategy(),
            FallbackStrategy::EmergencyDegraded
        );
        assert_eq!(
            ProviderKind::Cloud.fallback_strategy(),
            FallbackStrategy::RuntimeSwitch
        );
        assert_eq!(
            ProviderKind::Other.fallback_strategy(),
            FallbackStrategy::RuntimeSwitch
        );
    }

    #[test]
    fn test_model_selection_vision_upgrades_openai() {
        let plain = RoutingRequest::new("hi");
        assert_eq!(select_model_for_provider("openai", &plain), "gpt-4o-mini");

        let vision = RoutingRequest::new("what is in this image").with_vision();
        assert_eq!(select_model_for_provider("openai", &vision), "gpt-4o");
    }

    #[test]
    fn test_model_selection_static_table() {
        let request = RoutingRequest::new("hi");
        assert_eq!(
            select_model_for_provider("gemini", &request),
            "gemini-1.5-flash"
        );
        assert_eq!(
            select_model_for_provider("deepseek", &request),
            "deepseek-chat"
        );
        assert_eq!(
            select_model_for_provider("local", &request),
            "llama3.2:latest"
        );
        assert_eq!(
            select_model_for_provider("unregistered", &request),
            "default-model"
        );
    }

    #[test]
    fn test_cost_estimates() {
        assert_eq!(estimate_cost("local", "llama3.2:latest"), Some(0.0));
        assert_eq!(estimate_cost("core_helpers", CORE_HELPERS_MODEL), Some(0.0));
        assert_eq!(estimate_cost("openai", "gpt-4o-mini"), Some(0.002));
        assert_eq!(estimate_cost("openai", "gpt-4o"), Some(0.03));
        assert_eq!(estimate_cost("deepseek", "deepseek-chat"), Some(0.0002));
        assert_eq!(estimate_cost("unregistered", "default-model"), None);
    }

    #[test]
    fn test_latency_estimates() {
        assert_eq!(estimate_latency("openai", "any"), Some(1.5));
        assert_eq!(estimate_latency("local", "vllm"), Some(0.5));
        assert_eq!(estimate_latency("local", "llama.cpp"), Some(1.0));
        assert_eq!(estimate_latency("huggingface", "transformers"), Some(2.0));
        assert_eq!(estimate_latency("local", "something-else"), None);
    }
}
