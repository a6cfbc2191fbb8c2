//! Enrichment providers: optional HTML widgets placed above the headlines.

mod hadith;
mod markets;

pub use hadith::HadithProvider;
pub use markets::MarketsProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::Result;

/// A source of one HTML snippet per cycle
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the snippet. `Ok(None)` means nothing to show this cycle.
    async fn produce(&self) -> Result<Option<String>>;
}

/// Run every provider in order, each bounded by `timeout`.
///
/// Failures, timeouts and empty output are logged and left out; the result
/// keeps provider order.
pub async fn collect(providers: &[Arc<dyn EnrichmentProvider>], timeout: Duration) -> Vec<String> {
    let mut snippets = Vec::with_capacity(providers.len());

    for provider in providers {
        match tokio::time::timeout(timeout, provider.produce()).await {
            Ok(Ok(Some(snippet))) if !snippet.trim().is_empty() => snippets.push(snippet),
            Ok(Ok(_)) => {
                tracing::debug!(provider = provider.name(), "Enrichment produced nothing");
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = provider.name(), error = %e, "Enrichment failed");
            }
            Err(_) => {
                tracing::warn!(
                    provider = provider.name(),
                    timeout_secs = timeout.as_secs(),
                    "Enrichment timed out"
                );
            }
        }
    }

    snippets
}

/// Build the providers whose credentials are present in the environment
pub fn providers_from_env(config: &AppConfig) -> Vec<Arc<dyn EnrichmentProvider>> {
    let mut providers: Vec<Arc<dyn EnrichmentProvider>> = Vec::new();
    if !config.enrich.enabled {
        tracing::debug!("Enrichment disabled by config");
        return providers;
    }

    match env_key(hadith::API_KEY_ENV) {
        Some(key) => providers.push(Arc::new(HadithProvider::new(key))),
        None => tracing::debug!(var = hadith::API_KEY_ENV, "Hadith provider disabled"),
    }

    match env_key(markets::API_KEY_ENV) {
        Some(key) => providers.push(Arc::new(MarketsProvider::new(
            key,
            config.enrich.tickers.clone(),
        ))),
        None => tracing::debug!(var = markets::API_KEY_ENV, "Markets provider disabled"),
    }

    providers
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
