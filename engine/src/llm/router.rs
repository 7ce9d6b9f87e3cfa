//! LLM Router
//!
//! Orders the configured providers and fails over between them. The user's
//! default provider is always tried first, then local providers ahead of
//! cloud ones. Each attempt runs under its own timeout.

use super::{LLMError, LLMProvider, Message};
use std::time::Duration;

/// Default per-attempt timeout for local providers (model loading + generation)
const LOCAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Default per-attempt timeout for cloud providers
const CLOUD_TIMEOUT: Duration = Duration::from_secs(30);

/// LLM Router with ordered failover
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// Name of the provider to try first
    default_provider: String,

    local_timeout: Duration,
    cloud_timeout: Duration,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - List of available LLM providers
    /// * `default_provider` - Name of the provider to prefer
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, default_provider: impl Into<String>) -> Self {
        Self {
            providers,
            default_provider: default_provider.into(),
            local_timeout: LOCAL_TIMEOUT,
            cloud_timeout: CLOUD_TIMEOUT,
        }
    }

    /// Override the per-attempt timeouts
    pub fn with_timeouts(mut self, local: Duration, cloud: Duration) -> Self {
        self.local_timeout = local;
        self.cloud_timeout = cloud;
        self
    }

    /// Providers in the order they will be attempted
    pub fn rank_providers(&self) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        // Stable sort keeps registration order among equals
        providers.sort_by_key(|p| (p.name() != self.default_provider, !p.is_local()));
        providers
    }

    /// Call LLM providers with automatic failover
    ///
    /// Returns the reply text together with the name of the provider that
    /// produced it.
    pub async fn call(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let mut last_error = None;

        for provider in self.rank_providers() {
            let timeout = if provider.is_local() {
                self.local_timeout
            } else {
                self.cloud_timeout
            };
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.generate(messages)).await {
                Ok(Ok(response)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok((response, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                    last_error = Some(LLMError::Timeout);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(match last_error {
            Some(LLMError::Timeout) => LLMError::Timeout,
            Some(e) => LLMError::ProviderUnavailable(format!("All LLM providers failed: {}", e)),
            None => LLMError::ProviderUnavailable("All LLM providers failed".to_string()),
        })
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}
