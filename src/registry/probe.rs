//! Live health probes for providers
//!
//! A probe answers one question: is this endpoint reachable right now?
//! Classification into routing decisions happens in the registry and the
//! fallback manager, not here.

use crate::error::{RouteError, RouteResult};
use async_trait::async_trait;
use std::time::Duration;

/// Health probe abstraction
///
/// Implementations must be cheap to call repeatedly and must never panic;
/// any transport failure is simply `false`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe the given URL, returning whether the endpoint looks healthy
    async fn check(&self, url: &str) -> bool;
}

/// HTTP HEAD health probe
///
/// Sends a HEAD request and treats any 2xx response as healthy. The client
/// carries its own timeout so one unresponsive endpoint cannot stall a
/// recovery sweep, independent of the per-candidate timeout the fallback
/// manager enforces.
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Create a probe with the given per-request timeout
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> RouteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                RouteError::Internal(format!("Failed to create HTTP client for health probe: {e}"))
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => {
                let is_success = response.status().is_success();
                tracing::debug!(
                    url = %url,
                    status = %response.status(),
                    healthy = is_success,
                    "Health probe completed"
                );
                is_success
            }
            Err(e) => {
                tracing::debug!(
                    url = %url,
                    error = %e,
                    "Health probe failed"
                );
                false
            }
        }
    }
}
