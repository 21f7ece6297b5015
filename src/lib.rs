//! routeguard - provider routing with layered fallback for LLM workloads
//!
//! The crate wires four cooperating components:
//!
//! - [`registry::ProviderRegistry`]: what providers and runtimes exist, what
//!   they can do, and whether they are currently healthy
//! - [`router::Router`]: the first-choice routing decision, gated by a
//!   privacy allowlist policy
//! - [`fallback::FallbackManager`]: the recovery control loop - ordered
//!   fallback chains, per-candidate timeouts, failure tracking, and
//!   recovery monitoring
//! - [`degraded::DegradedModeManager`]: the process-wide switch into the
//!   zero-cost core-helpers mode when nothing else is reachable
//!
//! A typical setup:
//!
//! ```no_run
//! use routeguard::config::FallbackSettings;
//! use routeguard::degraded::DegradedModeManager;
//! use routeguard::fallback::FallbackManager;
//! use routeguard::registry::{ProviderRegistry, ProviderSpec, RuntimeSpec};
//! use routeguard::request::RoutingRequest;
//! use routeguard::router::{Router, RoutingPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> routeguard::error::RouteResult<()> {
//! let registry = Arc::new(ProviderRegistry::new());
//! registry
//!     .register_provider(ProviderSpec::new("local").with_capabilities(["streaming"]))
//!     .await;
//! registry.register_runtime(RuntimeSpec::new("llama.cpp")).await;
//!
//! let router = Arc::new(Router::new(registry.clone(), RoutingPolicy::default()));
//! let degraded = Arc::new(DegradedModeManager::new());
//! let fallback = FallbackManager::new(
//!     registry,
//!     router.clone(),
//!     Some(degraded),
//!     FallbackSettings::new(Duration::from_secs(5))?,
//! );
//!
//! let request = RoutingRequest::new("hello");
//! let decision = match router.route(&request).await {
//!     Ok(decision) => decision,
//!     Err(_) => {
//!         let chain = fallback.construct_fallback_chain(&request, &[]).await;
//!         let result = fallback.execute_fallback(&request, &chain).await;
//!         // result carries the decision fields or the final error
//!         # let _ = result;
//!         return Ok(());
//!     }
//! };
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod degraded;
pub mod error;
pub mod fallback;
pub mod registry;
pub mod request;
pub mod router;
pub mod telemetry;

pub use config::{Config, FallbackSettings};
pub use degraded::{DegradedModeManager, DegradedModeReason, DegradedStatus};
pub use error::{RouteError, RouteResult};
pub use fallback::{FallbackManager, FallbackReason, FallbackResult, FallbackStrategy};
pub use registry::{HealthStatus, ProviderRegistry, ProviderSpec, RuntimeSpec};
pub use request::{PrivacyLevel, RouteDecision, RoutingRequest, TaskType};
pub use router::{Router, RoutingPolicy};
