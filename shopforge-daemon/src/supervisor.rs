//! Lifecycle and health supervision.
//!
//! The [`Supervisor`] owns the registry for the lifetime of the process:
//! providers enter through [`Supervisor::register`], are swept for health
//! with [`Supervisor::health_check_all`], and leave through
//! [`Supervisor::shutdown`], which cleans every provider up exactly once.

use futures::future::join_all;
use serde::Serialize;
use shopforge_provider_core::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::events::{EventBus, PLUGIN_UNREGISTERED};
use crate::fanout::settle;
use crate::registry::{self, ProviderRegistry};

/// Aggregate result of a health sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub providers: HashMap<String, bool>,
}

impl HealthReport {
    /// Names of healthy providers, sorted.
    pub fn healthy(&self) -> Vec<&str> {
        self.filter(true)
    }

    /// Names of unhealthy providers, sorted.
    pub fn unhealthy(&self) -> Vec<&str> {
        self.filter(false)
    }

    pub fn all_healthy(&self) -> bool {
        self.providers.values().all(|healthy| *healthy)
    }

    fn filter(&self, wanted: bool) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .providers
            .iter()
            .filter(|(_, healthy)| **healthy == wanted)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// A provider whose `cleanup()` failed during teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub provider: String,
    pub error: String,
}

/// Summary of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Providers that cleaned up successfully, in registration order
    pub cleaned: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives provider registration, health sweeps and teardown.
pub struct Supervisor {
    registry: Arc<ProviderRegistry>,
    cleanup_timeout: Option<Duration>,
}

impl Supervisor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            cleanup_timeout: None,
        }
    }

    /// Bound each provider's `cleanup()` during shutdown.
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.registry.events()
    }

    /// Initialize and register a provider.
    pub async fn register<P>(&self, provider: P) -> registry::Result<()>
    where
        P: Provider + 'static,
    {
        self.registry.register(provider).await
    }

    /// Health of every registered provider, enabled or not.
    pub async fn health_check_all(&self) -> HealthReport {
        let report = HealthReport {
            providers: self.registry.health_check_all().await,
        };

        if !report.all_healthy() {
            warn!(unhealthy = ?report.unhealthy(), "Unhealthy providers detected");
        }
        report
    }

    /// Remove every provider and run its `cleanup()`.
    ///
    /// Providers are removed from the registry before cleanup starts, so a
    /// concurrent or repeated shutdown never cleans a provider twice. All
    /// cleanups run concurrently; a failure is recorded and does not stop the
    /// others.
    pub async fn shutdown(&self) -> TeardownReport {
        let providers = self.registry.drain().await;
        info!(providers = providers.len(), "Tearing down providers");

        let cleanups = providers.iter().map(|provider| async move {
            let result = settle(provider.cleanup(), self.cleanup_timeout).await;
            (provider.metadata(), result)
        });

        let mut report = TeardownReport::default();
        for (metadata, result) in join_all(cleanups).await {
            let name = metadata.name.clone();
            let error = match result {
                Ok(()) => {
                    info!(provider = %name, "Provider cleaned up");
                    report.cleaned.push(name);
                    None
                }
                Err(error) => {
                    warn!(provider = %name, error = %error, "Provider cleanup failed");
                    report.failures.push(CleanupFailure {
                        provider: name,
                        error: error.clone(),
                    });
                    Some(error)
                }
            };

            self.events().emit(
                PLUGIN_UNREGISTERED,
                serde_json::json!({
                    "plugin": metadata,
                    "cleaned": error.is_none(),
                    "error": error,
                }),
            );
        }

        report
    }
}
