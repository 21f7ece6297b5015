//! Routing request and decision types
//!
//! `RoutingRequest` is the immutable description of a single generation
//! request. Fields are private and set through the builder so a request
//! cannot be mutated mid-routing - fallback chain construction reads the
//! same request repeatedly and relies on it not changing underneath it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of tasks that influence routing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Chat,
    Code,
    Reasoning,
    Embedding,
    Summarization,
    Translation,
    Creative,
    Analysis,
}

impl TaskType {
    /// Convert to string representation for logging and event records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Code => "code",
            Self::Reasoning => "reasoning",
            Self::Embedding => "embedding",
            Self::Summarization => "summarization",
            Self::Translation => "translation",
            Self::Creative => "creative",
            Self::Analysis => "analysis",
        }
    }
}

/// Privacy levels that influence routing decisions
///
/// Levels are ordered: `Public < Internal < Confidential < Restricted`.
/// Comparisons like `privacy_level >= PrivacyLevel::Confidential` gate the
/// cloud-to-local fallback strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    /// Can use any provider
    #[default]
    Public,
    /// Prefer local or trusted providers
    Internal,
    /// Local only
    Confidential,
    /// Core helpers only
    Restricted,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        }
    }
}

/// Performance requirements that influence routing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceRequirement {
    /// Low latency, real-time
    #[default]
    Interactive,
    /// High throughput, can wait
    Batch,
    /// Lowest priority, resource efficient
    Background,
}

/// Request for LLM routing with context and requirements
///
/// Immutable once built. Construct with [`RoutingRequest::new`] and the
/// `with_*` builder methods.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    id: Uuid,
    prompt: String,
    task_type: TaskType,
    privacy_level: PrivacyLevel,
    performance_req: PerformanceRequirement,
    preferred_provider: Option<String>,
    preferred_model: Option<String>,
    requires_streaming: bool,
    requires_function_calling: bool,
    requires_vision: bool,
    user_id: Option<String>,
    session_id: Option<String>,
}

impl RoutingRequest {
    /// Create a new RoutingRequest with defaults (chat task, public privacy)
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            task_type: TaskType::default(),
            privacy_level: PrivacyLevel::default(),
            performance_req: PerformanceRequirement::default(),
            preferred_provider: None,
            preferred_model: None,
            requires_streaming: false,
            requires_function_calling: false,
            requires_vision: false,
            user_id: None,
            session_id: None,
        }
    }

    /// Set the task type
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Set the privacy level
    pub fn with_privacy_level(mut self, privacy_level: PrivacyLevel) -> Self {
        self.privacy_level = privacy_level;
        self
    }

    /// Set the performance requirement
    pub fn with_performance_req(mut self, performance_req: PerformanceRequirement) -> Self {
        self.performance_req = performance_req;
        self
    }

    /// Set the preferred provider
    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    /// Set the preferred model
    pub fn with_preferred_model(mut self, model: impl Into<String>) -> Self {
        self.preferred_model = Some(model.into());
        self
    }

    /// Require streaming support from the selected provider
    pub fn with_streaming(mut self) -> Self {
        self.requires_streaming = true;
        self
    }

    /// Require function-calling support from the selected provider
    pub fn with_function_calling(mut self) -> Self {
        self.requires_function_calling = true;
        self
    }

    /// Require vision support from the selected provider
    pub fn with_vision(mut self) -> Self {
        self.requires_vision = true;
        self
    }

    /// Attach caller context for log correlation
    pub fn with_context(
        mut self,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id.into());
        self.session_id = Some(session_id.into());
        self
    }

    /// Unique id for this request, used in log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn privacy_level(&self) -> PrivacyLevel {
        self.privacy_level
    }

    pub fn performance_req(&self) -> PerformanceRequirement {
        self.performance_req
    }

    pub fn preferred_provider(&self) -> Option<&str> {
        self.preferred_provider.as_deref()
    }

    pub fn preferred_model(&self) -> Option<&str> {
        self.preferred_model.as_deref()
    }

    pub fn requires_streaming(&self) -> bool {
        self.requires_streaming
    }

    pub fn requires_function_calling(&self) -> bool {
        self.requires_function_calling
    }

    pub fn requires_vision(&self) -> bool {
        self.requires_vision
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Result of a routing decision with explanation
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub provider: String,
    pub runtime: String,
    pub model_id: String,
    pub reason: String,
    pub confidence: f64,
    pub fallback_chain: Vec<String>,
    pub estimated_cost: Option<f64>,
    pub estimated_latency: Option<f64>,
    pub privacy_compliant: bool,
    pub capabilities: Vec<String>,
}
