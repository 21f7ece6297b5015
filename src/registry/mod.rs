//! Provider and runtime registry
//!
//! Tracks provider/runtime specs, capabilities, and health status for every
//! known provider and runtime. The registry is the single source of truth
//! for "what exists" and "what is currently reachable"; routing policy
//! (which provider a request *should* use) lives in the router and
//! fallback manager.
//!
//! Health is modeled as an explicit three-state enum at this boundary.
//! Every probe implementation must resolve to one of the three states so
//! calling code never has to guess at the shape of a health result.

pub mod probe;

pub use probe::{HealthProbe, HttpHealthProbe};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Health state for a provider or runtime
///
/// A component with no recorded health is treated as `Unknown`, which is
/// routable: marking never-probed providers unroutable would make a fresh
/// registry useless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    /// Whether this status permits routing to the component
    pub fn is_routable(&self) -> bool {
        matches!(self, Self::Healthy | Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

/// Health record for a single component
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_check: SystemTime,
    pub error_message: Option<String>,
    pub response_time: Option<Duration>,
}

impl HealthRecord {
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            last_check: SystemTime::now(),
            error_message: None,
            response_time: None,
        }
    }

    pub fn with_error(status: HealthStatus, error_message: impl Into<String>) -> Self {
        Self {
            status,
            last_check: SystemTime::now(),
            error_message: Some(error_message.into()),
            response_time: None,
        }
    }
}

/// Addressable component in the registry's health map
///
/// Renders as `provider:<name>` or `runtime:<name>` in logs and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Provider(String),
    Runtime(String),
}

impl Component {
    pub fn provider(name: impl Into<String>) -> Self {
        Self::Provider(name.into())
    }

    pub fn runtime(name: impl Into<String>) -> Self {
        Self::Runtime(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Provider(name) | Self::Runtime(name) => name,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(name) => write!(f, "provider:{}", name),
            Self::Runtime(name) => write!(f, "runtime:{}", name),
        }
    }
}

/// Specification for a model provider (where models come from)
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    name: String,
    description: String,
    category: String,
    requires_api_key: bool,
    capabilities: HashSet<String>,
    /// URL probed by live health checks; providers without one keep their
    /// cached status on refresh
    health_url: Option<String>,
    /// Higher priority providers win auto-selection
    fallback_priority: u8,
    /// Load balancing weight among equal-priority providers
    weight: f64,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: "LLM".to_string(),
            requires_api_key: false,
            capabilities: HashSet::new(),
            health_url: None,
            fallback_priority: 50,
            weight: 1.0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_api_key_required(mut self) -> Self {
        self.requires_api_key = true;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    pub fn with_fallback_priority(mut self, priority: u8) -> Self {
        self.fallback_priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn requires_api_key(&self) -> bool {
        self.requires_api_key
    }

    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    pub fn health_url(&self) -> Option<&str> {
        self.health_url.as_deref()
    }

    pub fn fallback_priority(&self) -> u8 {
        self.fallback_priority
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Specification for a model runtime (how models execute)
#[derive(Debug, Clone)]
pub struct RuntimeSpec {
    name: String,
    description: String,
    /// Model families this runtime supports (llama, mistral, qwen, ...)
    family: Vec<String>,
    /// Model formats this runtime supports (gguf, safetensors, ...)
    supports: Vec<String>,
    requires_gpu: bool,
    supports_streaming: bool,
    /// Priority for selection (higher = preferred)
    priority: u8,
}

impl RuntimeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            family: Vec::new(),
            supports: Vec::new(),
            requires_gpu: false,
            supports_streaming: false,
            priority: 50,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_families<I, S>(mut self, family: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.family = family.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_formats<I, S>(mut self, supports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supports = supports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gpu_required(mut self) -> Self {
        self.requires_gpu = true;
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn requires_gpu(&self) -> bool {
        self.requires_gpu
    }

    pub fn supports_streaming(&self) -> bool {
        self.supports_streaming
    }
}

/// Metadata for a specific model, used for runtime compatibility matching
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub id: String,
    pub name: String,
    pub provider: String,
    /// llama, mistral, qwen, ... (empty = any)
    pub family: String,
    /// gguf, safetensors, ... (empty = any)
    pub format: String,
}

impl ModelMetadata {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            family: String::new(),
            format: String::new(),
        }
    }
}

/// Requirements used by [`ProviderRegistry::auto_select_provider`]
#[derive(Debug, Clone, Default)]
pub struct ProviderRequirements {
    pub capabilities: HashSet<String>,
    pub category: Option<String>,
}

/// Registry of providers, runtimes, and their health
///
/// All maps are behind `tokio::sync::RwLock` so a registry can be shared
/// across concurrent routing calls via `Arc`.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, ProviderSpec>>,
    runtimes: RwLock<HashMap<String, RuntimeSpec>>,
    health: RwLock<HashMap<Component, HealthRecord>>,
    probe: Option<Arc<dyn HealthProbe>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create an empty registry with no live probing
    ///
    /// Without a probe, `refresh_provider_health` returns cached status only.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            runtimes: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
            probe: None,
        }
    }

    /// Create a registry that uses the given probe for live health checks
    pub fn with_probe(probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            probe: Some(probe),
            ..Self::new()
        }
    }

    /// Register (or replace) a provider spec
    pub async fn register_provider(&self, spec: ProviderSpec) {
        tracing::debug!(provider = %spec.name(), category = %spec.category(), "Registering provider");
        self.providers
            .write()
            .await
            .insert(spec.name().to_string(), spec);
    }

    /// Register (or replace) a runtime spec
    pub async fn register_runtime(&self, spec: RuntimeSpec) {
        tracing::debug!(runtime = %spec.name(), "Registering runtime");
        self.runtimes
            .write()
            .await
            .insert(spec.name().to_string(), spec);
    }

    /// Get a provider specification by name
    pub async fn get_provider_spec(&self, name: &str) -> Option<ProviderSpec> {
        self.providers.read().await.get(name).cloned()
    }

    /// Get a runtime specification by name
    pub async fn get_runtime_spec(&self, name: &str) -> Option<RuntimeSpec> {
        self.runtimes.read().await.get(name).cloned()
    }

    /// List registered providers, optionally restricted to routable ones
    ///
    /// Output is sorted by fallback priority (descending) then name, so
    /// callers iterating the list try preferred providers first and chain
    /// construction is deterministic.
    pub async fn list_providers(&self, healthy_only: bool) -> Vec<String> {
        let providers = self.providers.read().await;
        let health = self.health.read().await;

        let mut names: Vec<&ProviderSpec> = providers
            .values()
            .filter(|spec| {
                if !healthy_only {
                    return true;
                }
                match health.get(&Component::provider(spec.name())) {
                    Some(record) => record.status.is_routable(),
                    None => true,
                }
            })
            .collect();

        names.sort_by(|a, b| {
            b.fallback_priority()
                .cmp(&a.fallback_priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        names.into_iter().map(|s| s.name().to_string()).collect()
    }

    /// List registered runtimes, optionally restricted to routable ones
    pub async fn list_runtimes(&self, healthy_only: bool) -> Vec<String> {
        let runtimes = self.runtimes.read().await;
        let health = self.health.read().await;

        let mut names: Vec<String> = runtimes
            .values()
            .filter(|spec| {
                if !healthy_only {
                    return true;
                }
                match health.get(&Component::runtime(spec.name())) {
                    Some(record) => record.status.is_routable(),
                    None => true,
                }
            })
            .map(|s| s.name().to_string())
            .collect();

        names.sort();
        names
    }

    /// Get the cached health record for a component
    pub async fn get_health_status(&self, component: &Component) -> Option<HealthRecord> {
        self.health.read().await.get(component).cloned()
    }

    /// Set the health status for a component
    pub async fn set_health_status(&self, component: Component, status: HealthStatus) {
        self.set_health_record(component, HealthRecord::new(status))
            .await;
    }

    /// Set a full health record for a component
    pub async fn set_health_record(&self, component: Component, record: HealthRecord) {
        tracing::debug!(
            component = %component,
            status = record.status.as_str(),
            "Health status updated"
        );
        self.health.write().await.insert(component, record);
    }

    /// Whether a provider is currently routable (healthy or unknown)
    ///
    /// Providers with no health record are routable: absence of evidence is
    /// not treated as failure.
    pub async fn is_provider_routable(&self, name: &str) -> bool {
        match self.get_health_status(&Component::provider(name)).await {
            Some(record) => record.status.is_routable(),
            None => true,
        }
    }

    /// Whether a runtime is currently routable (healthy or unknown)
    pub async fn is_runtime_routable(&self, name: &str) -> bool {
        match self.get_health_status(&Component::runtime(name)).await {
            Some(record) => record.status.is_routable(),
            None => true,
        }
    }

    /// Find compatible runtimes for a given model, sorted by priority (descending)
    pub async fn compatible_runtimes(&self, model: &ModelMetadata) -> Vec<String> {
        let runtimes = self.runtimes.read().await;

        let mut compatible: Vec<&RuntimeSpec> = runtimes
            .values()
            .filter(|runtime| Self::is_compatible(model, runtime))
            .collect();

        compatible.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        compatible
            .into_iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    fn is_compatible(model: &ModelMetadata, runtime: &RuntimeSpec) -> bool {
        if !model.format.is_empty()
            && !runtime.supports.is_empty()
            && !runtime.supports.contains(&model.format)
        {
            return false;
        }

        if !model.family.is_empty()
            && !runtime.family.is_empty()
            && !runtime.family.contains(&model.family)
        {
            return false;
        }

        true
    }

    /// Auto-select a provider meeting the given requirements
    ///
    /// Filters to routable providers whose capability set is a superset of
    /// the requirements, keeps the highest fallback-priority group, and
    /// breaks ties with weighted random selection so traffic spreads across
    /// equally-preferred providers.
    pub async fn auto_select_provider(
        &self,
        requirements: &ProviderRequirements,
    ) -> Option<String> {
        let providers = self.providers.read().await;
        let health = self.health.read().await;

        let candidates: Vec<&ProviderSpec> = providers
            .values()
            .filter(|spec| {
                if let Some(category) = &requirements.category {
                    if spec.category() != category {
                        return false;
                    }
                }
                if !requirements.capabilities.is_subset(spec.capabilities()) {
                    return false;
                }
                match health.get(&Component::provider(spec.name())) {
                    Some(record) => record.status.is_routable(),
                    None => true,
                }
            })
            .collect();

        let max_priority = candidates.iter().map(|s| s.fallback_priority()).max()?;
        let top: Vec<&&ProviderSpec> = candidates
            .iter()
            .filter(|s| s.fallback_priority() == max_priority)
            .collect();

        let total_weight: f64 = top.iter().map(|s| s.weight()).sum();
        if total_weight <= 0.0 {
            // Weights are caller-supplied; fall back to first candidate
            // rather than divide by zero.
            return top.first().map(|s| s.name().to_string());
        }

        let mut rng = rand::rng();
        let mut remaining = rng.random_range(0.0..total_weight);
        for spec in &top {
            remaining -= spec.weight();
            if remaining < 0.0 {
                return Some(spec.name().to_string());
            }
        }

        // Floating-point rounding can leave a sliver; last candidate wins.
        top.last().map(|s| s.name().to_string())
    }

    /// Run a live health probe against a provider and update the cache
    ///
    /// Providers without a configured probe (no registry probe, or no
    /// `health_url` on the spec) keep their cached status; a provider that
    /// has never been checked resolves to `Unknown`. Probe failures are
    /// recorded as `Unhealthy`, never propagated.
    pub async fn refresh_provider_health(&self, name: &str) -> HealthStatus {
        let health_url = {
            let providers = self.providers.read().await;
            providers
                .get(name)
                .and_then(|spec| spec.health_url().map(str::to_string))
        };

        let (Some(probe), Some(url)) = (self.probe.as_ref(), health_url) else {
            return self
                .get_health_status(&Component::provider(name))
                .await
                .map(|r| r.status)
                .unwrap_or(HealthStatus::Unknown);
        };

        let start = std::time::Instant::now();
        let status = if probe.check(&url).await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        let mut record = HealthRecord::new(status);
        record.response_time = Some(start.elapsed());
        self.set_health_record(Component::provider(name), record)
            .await;

        tracing::debug!(
            provider = %name,
            status = status.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Live health probe completed"
        );

        status
    }
}
