//! Fan-out execution across providers.
//!
//! The [`FanoutEngine`] runs one [`Operation`] concurrently on every enabled
//! provider of a capability type and collects one [`Outcome`] per provider.
//! A failing, panicking or timed-out provider only affects its own outcome;
//! the call as a whole always resolves once every invocation has settled.
//!
//! Each invocation runs as its own tokio task, so on a multi-threaded runtime
//! a provider that blocks its thread (CPU-bound scoring, synchronous I/O)
//! neither delays the others nor escapes its deadline. On a current-thread
//! runtime such work must go through `tokio::task::spawn_blocking`.
//!
//! # Example
//!
//! ```no_run
//! use shopforge_daemon::events::EventBus;
//! use shopforge_daemon::fanout::FanoutEngine;
//! use shopforge_daemon::operations::SearchProducts;
//! use shopforge_daemon::registry::ProviderRegistry;
//! use shopforge_provider_core::CapabilityType;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = Arc::new(ProviderRegistry::new(Arc::new(EventBus::new())));
//! let engine = FanoutEngine::new(Arc::clone(&registry));
//!
//! let outcomes = engine
//!     .execute_across_type(&CapabilityType::WebsiteSearch, &SearchProducts::new("headphones"))
//!     .await;
//! for outcome in outcomes {
//!     println!("{}: success={}", outcome.provider, outcome.is_success());
//! }
//! # }
//! ```

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use shopforge_provider_core::prelude::*;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::events::panic_message;
use crate::registry::ProviderRegistry;

/// Error message recorded for a provider that exceeded its deadline.
pub const TIMEOUT_MESSAGE: &str = "timeout";

// ============================================================================
// Operations and Outcomes
// ============================================================================

/// An operation that can be fanned out across providers.
///
/// The operation value carries its own arguments. `supported_by` is checked
/// before invocation; providers that don't support the operation are skipped
/// and contribute no outcome.
///
/// The engine hands each provider its own clone of the operation, so the
/// value must be `Clone` and own its arguments.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Operation name used in logs, e.g. "search_products"
    fn name(&self) -> &str;

    /// Whether `provider` exposes this operation
    fn supported_by(&self, provider: &dyn Provider) -> bool;

    /// Run the operation on a single provider
    async fn invoke(&self, provider: &dyn Provider) -> Result<Self::Output>;
}

/// Either the value a provider returned or the message of its failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus<T> {
    Result(T),
    Error(String),
}

/// The result of one provider's execution of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub provider: String,
    #[serde(flatten)]
    pub status: OutcomeStatus<T>,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Result(_))
    }

    pub fn result(&self) -> Option<&T> {
        match &self.status {
            OutcomeStatus::Result(value) => Some(value),
            OutcomeStatus::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Result(_) => None,
            OutcomeStatus::Error(message) => Some(message),
        }
    }

}

/// Await a provider call, turning errors, panics and an elapsed deadline into
/// an error message.
pub(crate) async fn settle<F, T>(call: F, timeout: Option<Duration>) -> std::result::Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    let guarded = AssertUnwindSafe(call).catch_unwind();
    let settled = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => return Err(TIMEOUT_MESSAGE.to_string()),
        },
        None => guarded.await,
    };

    match settled {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(&*panic)),
    }
}

/// Run `operation` on `provider` in a task of its own and wait for it,
/// bounded by `timeout`. A missed deadline aborts the task.
async fn invoke_detached<O>(
    operation: Arc<O>,
    provider: Arc<dyn Provider>,
    timeout: Option<Duration>,
) -> std::result::Result<O::Output, String>
where
    O: Operation,
{
    let handle = tokio::spawn(async move { operation.invoke(&*provider).await });
    let abort = handle.abort_handle();

    let joined = async move {
        match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err(panic_message(&*e.into_panic())),
            Err(e) => Err(e.to_string()),
        }
    };

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, joined).await {
            Ok(settled) => settled,
            Err(_) => {
                abort.abort();
                Err(TIMEOUT_MESSAGE.to_string())
            }
        },
        None => joined.await,
    }
}

// ============================================================================
// FanoutEngine
// ============================================================================

/// Runs operations concurrently across the providers of a registry.
pub struct FanoutEngine {
    registry: Arc<ProviderRegistry>,
    timeout: Option<Duration>,
}

impl FanoutEngine {
    /// Create an engine without a per-provider deadline.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound each provider's invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run `operation` on every enabled provider of `capability_type`.
    ///
    /// Returns one outcome per provider that supports the operation, in
    /// registration order.
    pub async fn execute_across_type<O>(
        &self,
        capability_type: &CapabilityType,
        operation: &O,
    ) -> Vec<Outcome<O::Output>>
    where
        O: Operation + Clone,
    {
        let providers = self.registry.get_by_type(capability_type).await;
        debug!(
            capability_type = %capability_type,
            operation = operation.name(),
            providers = providers.len(),
            "Fanning out operation"
        );
        self.execute_on(&providers, operation).await
    }

    /// Run `operation` on an explicit subset of providers.
    ///
    /// Every invocation is spawned before any is awaited, so the total
    /// latency is that of the slowest provider. Outcomes keep the order of
    /// `providers`.
    pub async fn execute_on<O>(
        &self,
        providers: &[Arc<dyn Provider>],
        operation: &O,
    ) -> Vec<Outcome<O::Output>>
    where
        O: Operation + Clone,
    {
        let started = Instant::now();
        let shared = Arc::new(operation.clone());

        let invocations = providers
            .iter()
            .filter(|&provider| {
                let supported = operation.supported_by(&**provider);
                if !supported {
                    debug!(
                        provider = %provider.name(),
                        operation = operation.name(),
                        "Provider does not support operation, skipping"
                    );
                }
                supported
            })
            .map(|provider| {
                let name = provider.name().to_string();
                let call = invoke_detached(Arc::clone(&shared), Arc::clone(provider), self.timeout);
                async move {
                    let status = match call.await {
                        Ok(value) => OutcomeStatus::Result(value),
                        Err(error) => {
                            warn!(
                                provider = %name,
                                operation = operation.name(),
                                error = %error,
                                "Provider operation failed"
                            );
                            OutcomeStatus::Error(error)
                        }
                    };
                    Outcome {
                        provider: name,
                        status,
                    }
                }
            });

        let outcomes = join_all(invocations).await;

        debug!(
            operation = operation.name(),
            outcomes = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fan-out settled"
        );
        outcomes
    }
}
