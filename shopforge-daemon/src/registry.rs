//! # Provider Registry
//!
//! Manages the collection of initialized providers and provides lookup
//! functionality.
//!
//! Providers are indexed twice: by their unique name, and by the
//! [`CapabilityType`] they declared at registration. Both indices sit behind a
//! single lock, so a provider is either present in both or in neither.
//! Providers are stored as trait objects to enable runtime polymorphism and
//! are shared through `Arc` with any in-flight operation.

use futures::future::join_all;
use shopforge_provider_core::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::events::{EventBus, PLUGIN_ENABLED_CHANGED, PLUGIN_REGISTERED};
use crate::fanout::settle;

/// Errors raised by registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The provider is missing required identity.
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// A provider with the same name is already registered.
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// The provider's `initialize()` failed; nothing was registered.
    #[error("Provider '{name}' failed to initialize: {source}")]
    Initialization {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("Provider not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// A registered provider together with the state the registry keeps for it.
struct Entry {
    provider: Arc<dyn Provider>,
    /// Derived once at registration and never re-evaluated
    capability_type: Option<CapabilityType>,
    enabled: AtomicBool,
}

impl Entry {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut metadata = self.provider.metadata();
        metadata.capability_type = self
            .capability_type
            .as_ref()
            .map(|t| t.as_str().to_string());
        metadata.enabled = self.is_enabled();
        metadata
    }
}

#[derive(Default)]
struct Indices {
    by_name: HashMap<String, Arc<Entry>>,
    by_type: HashMap<CapabilityType, Vec<String>>,
    /// Names in registration order
    order: Vec<String>,
}

impl Indices {
    fn entries(&self) -> impl Iterator<Item = &Arc<Entry>> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }
}

/// Registry for managing initialized providers.
///
/// # Example
///
/// ```no_run
/// use shopforge_daemon::events::EventBus;
/// use shopforge_daemon::registry::ProviderRegistry;
/// use shopforge_provider_core::CapabilityType;
/// use provider_amazon::AmazonSearchProvider;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let registry = ProviderRegistry::new(Arc::new(EventBus::new()));
/// registry.register(AmazonSearchProvider::new()).await?;
///
/// let sources = registry.get_by_type(&CapabilityType::WebsiteSearch).await;
/// println!("{} search source(s)", sources.len());
/// # Ok(())
/// # }
/// ```
pub struct ProviderRegistry {
    indices: RwLock<Indices>,
    events: Arc<EventBus>,
    health_timeout: Option<Duration>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry that reports to `events`.
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
            events,
            health_timeout: None,
        }
    }

    /// Bound every individual health check by `timeout`; a provider that
    /// doesn't answer in time counts as unhealthy.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = Some(timeout);
        self
    }

    /// The bus lifecycle events are emitted on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Initialize a provider and add it to the registry.
    ///
    /// Registration is atomic: the provider is either initialized and
    /// present in every index, or absent from all of them.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidProvider`] if the provider has no name
    /// - [`RegistryError::DuplicateProvider`] if the name is taken
    /// - [`RegistryError::Initialization`] if `initialize()` fails
    pub async fn register<P>(&self, provider: P) -> Result<()>
    where
        P: Provider + 'static,
    {
        self.register_arc(Arc::new(provider)).await
    }

    /// Same as [`register`](Self::register) for an already shared provider.
    pub async fn register_arc(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let name = provider.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidProvider(
                "provider must have a name".to_string(),
            ));
        }

        if self.contains(&name).await {
            return Err(RegistryError::DuplicateProvider(name));
        }

        if let Err(source) = provider.initialize().await {
            warn!(provider = %name, error = %source, "Provider failed to initialize");
            return Err(RegistryError::Initialization { name, source });
        }

        let capability_type = provider.capability_type().map(|t| t.normalized());
        let entry = Arc::new(Entry {
            enabled: AtomicBool::new(provider.is_enabled()),
            provider: Arc::clone(&provider),
            capability_type: capability_type.clone(),
        });

        {
            let mut indices = self.indices.write().await;

            // Lost a race against a concurrent registration of the same name
            // while initialize() was running.
            if indices.by_name.contains_key(&name) {
                drop(indices);
                if let Err(e) = provider.cleanup().await {
                    warn!(provider = %name, error = %e, "Cleanup after rejected registration failed");
                }
                return Err(RegistryError::DuplicateProvider(name));
            }

            indices.by_name.insert(name.clone(), Arc::clone(&entry));
            indices.order.push(name.clone());
            if let Some(capability_type) = &capability_type {
                indices
                    .by_type
                    .entry(capability_type.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        info!(
            provider = %name,
            version = %provider.version(),
            capability_type = capability_type.as_ref().map_or("none", |t| t.as_str()),
            "Registered provider"
        );

        self.events.emit(
            PLUGIN_REGISTERED,
            serde_json::json!({ "plugin": entry.metadata() }),
        );
        Ok(())
    }

    /// Get a provider by its name, regardless of whether it is enabled.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.indices
            .read()
            .await
            .by_name
            .get(name)
            .map(|entry| Arc::clone(&entry.provider))
    }

    /// Enabled providers of the given capability type, in registration order.
    ///
    /// An unknown type yields an empty vector.
    pub async fn get_by_type(&self, capability_type: &CapabilityType) -> Vec<Arc<dyn Provider>> {
        let key = capability_type.normalized();
        let indices = self.indices.read().await;

        indices
            .by_type
            .get(&key)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| indices.by_name.get(name))
                    .filter(|entry| entry.is_enabled())
                    .map(|entry| Arc::clone(&entry.provider))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every registered provider, enabled or not, in registration order.
    pub async fn get_all(&self) -> Vec<Arc<dyn Provider>> {
        self.indices
            .read()
            .await
            .entries()
            .map(|entry| Arc::clone(&entry.provider))
            .collect()
    }

    /// Metadata for every registered provider, reflecting the live enabled flag.
    pub async fn metadata(&self) -> Vec<ProviderMetadata> {
        self.indices
            .read()
            .await
            .entries()
            .map(|entry| entry.metadata())
            .collect()
    }

    /// List all registered provider names in registration order.
    pub async fn list(&self) -> Vec<String> {
        self.indices.read().await.order.clone()
    }

    /// Get the number of registered providers.
    pub async fn count(&self) -> usize {
        self.indices.read().await.by_name.len()
    }

    /// Check if a provider with the given name is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.indices.read().await.by_name.contains_key(name)
    }

    /// Whether the named provider is currently enabled.
    pub async fn is_enabled(&self, name: &str) -> Option<bool> {
        self.indices
            .read()
            .await
            .by_name
            .get(name)
            .map(|entry| entry.is_enabled())
    }

    /// Enable or disable a provider.
    ///
    /// Disabled providers stay registered but are excluded from
    /// [`get_by_type`](Self::get_by_type) and therefore from fan-out.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let changed = {
            let indices = self.indices.read().await;
            let entry = indices
                .by_name
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            (entry.enabled.swap(enabled, Ordering::SeqCst) != enabled).then(|| entry.metadata())
        };

        if let Some(metadata) = changed {
            info!(provider = %name, enabled, "Provider {}", if enabled { "enabled" } else { "disabled" });
            self.events.emit(
                PLUGIN_ENABLED_CHANGED,
                serde_json::json!({ "plugin": metadata, "enabled": enabled }),
            );
        }
        Ok(())
    }

    /// Run `health_check()` on every registered provider concurrently.
    ///
    /// A check that errors, panics or times out maps to `false` for that
    /// provider only.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let providers = self.get_all().await;

        let checks = providers.iter().map(|provider| async move {
            let name = provider.name().to_string();
            let healthy = match settle(provider.health_check(), self.health_timeout).await {
                Ok(healthy) => healthy,
                Err(error) => {
                    warn!(provider = %name, error = %error, "Health check failed");
                    false
                }
            };
            (name, healthy)
        });

        let results: HashMap<String, bool> = join_all(checks).await.into_iter().collect();
        debug!(
            healthy = results.values().filter(|h| **h).count(),
            total = results.len(),
            "Health check sweep complete"
        );
        results
    }

    /// Remove every provider from the registry, returning them in
    /// registration order.
    pub(crate) async fn drain(&self) -> Vec<Arc<dyn Provider>> {
        let mut indices = self.indices.write().await;
        let drained = indices
            .entries()
            .map(|entry| Arc::clone(&entry.provider))
            .collect();
        *indices = Indices::default();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    // Mock provider for testing
    struct MockProvider {
        name: String,
        kind: Option<CapabilityType>,
        enabled: bool,
        fail_init: bool,
        healthy: std::result::Result<bool, ()>,
        init_calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn new(name: &str, kind: CapabilityType) -> Self {
            Self {
                name: name.to_string(),
                kind: Some(kind),
                enabled: true,
                fail_init: false,
                healthy: Ok(true),
                init_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn untyped(name: &str) -> Self {
            Self {
                kind: None,
                ..Self::new(name, CapabilityType::WebsiteSearch)
            }
        }

        fn disabled(mut self) -> Self {
            self.enabled = false;
            self
        }

        fn failing_init(mut self) -> Self {
            self.fail_init = true;
            self
        }

        fn health(mut self, healthy: std::result::Result<bool, ()>) -> Self {
            self.healthy = healthy;
            self
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn capability_type(&self) -> Option<CapabilityType> {
            self.kind.clone()
        }

        async fn initialize(&self) -> shopforge_provider_core::Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                Err(ProviderError::Initialization("no credentials".to_string()))
            } else {
                Ok(())
            }
        }

        async fn health_check(&self) -> shopforge_provider_core::Result<bool> {
            self.healthy
                .map_err(|_| ProviderError::Network("unreachable".to_string()))
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(Arc::new(EventBus::new()))
    }

    fn names(providers: &[Arc<dyn Provider>]) -> Vec<String> {
        providers.iter().map(|p| p.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_new_registry() {
        let registry = registry();
        assert_eq!(registry.count().await, 0);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_initializes_once() {
        let registry = registry();
        let provider = MockProvider::new("shop", CapabilityType::WebsiteSearch);
        let init_calls = Arc::clone(&provider.init_calls);

        registry.register(provider).await.unwrap();

        assert_eq!(init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count().await, 1);
        assert!(registry.contains("shop").await);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_name() {
        let registry = registry();
        let result = registry
            .register(MockProvider::new("  ", CapabilityType::WebsiteSearch))
            .await;

        assert!(matches!(result, Err(RegistryError::InvalidProvider(_))));
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_leaves_indices_unchanged() {
        let registry = registry();
        registry
            .register(MockProvider::new("shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();

        let second = MockProvider::new("shop", CapabilityType::ComparisonEngine);
        let second_init = Arc::clone(&second.init_calls);
        let result = registry.register(second).await;

        assert!(matches!(result, Err(RegistryError::DuplicateProvider(ref n)) if n == "shop"));
        assert_eq!(second_init.load(Ordering::SeqCst), 0);
        assert_eq!(registry.count().await, 1);
        assert_eq!(
            registry.get_by_type(&CapabilityType::WebsiteSearch).await.len(),
            1
        );
        assert!(registry
            .get_by_type(&CapabilityType::ComparisonEngine)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_initialize_registers_nothing() {
        let registry = registry();
        let result = registry
            .register(MockProvider::new("broken", CapabilityType::WebsiteSearch).failing_init())
            .await;

        match result {
            Err(RegistryError::Initialization { name, source }) => {
                assert_eq!(name, "broken");
                assert!(matches!(source, ProviderError::Initialization(_)));
            }
            other => panic!("expected initialization error, got {other:?}"),
        }
        assert!(!registry.contains("broken").await);
        assert!(registry
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_get_by_type_filters_enabled_and_keeps_order() {
        let registry = registry();
        registry
            .register(MockProvider::new("b-shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("compare", CapabilityType::ComparisonEngine))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("off-shop", CapabilityType::WebsiteSearch).disabled())
            .await
            .unwrap();
        registry
            .register(MockProvider::new("a-shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();

        let search = registry.get_by_type(&CapabilityType::WebsiteSearch).await;
        assert_eq!(names(&search), vec!["b-shop", "a-shop"]);

        let compare = registry.get_by_type(&CapabilityType::ComparisonEngine).await;
        assert_eq!(names(&compare), vec!["compare"]);
    }

    #[tokio::test]
    async fn test_get_by_unknown_type_is_empty() {
        let registry = registry();
        let providers = registry
            .get_by_type(&CapabilityType::parse("price_alerts"))
            .await;
        assert!(providers.is_empty());
    }

    #[tokio::test]
    async fn test_custom_tag_matches_known_type() {
        let registry = registry();
        registry
            .register(MockProvider::new(
                "shop",
                CapabilityType::Custom("website_search".to_string()),
            ))
            .await
            .unwrap();

        let providers = registry.get_by_type(&CapabilityType::WebsiteSearch).await;
        assert_eq!(providers.len(), 1);
    }

    #[tokio::test]
    async fn test_untyped_provider_is_name_indexed_only() {
        let registry = registry();
        registry.register(MockProvider::untyped("loose")).await.unwrap();

        assert!(registry.get("loose").await.is_some());
        assert_eq!(registry.get_all().await.len(), 1);
        assert!(registry
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await
            .is_empty());
        assert!(registry.metadata().await[0].capability_type.is_none());
    }

    #[tokio::test]
    async fn test_get_all_includes_disabled() {
        let registry = registry();
        registry
            .register(MockProvider::new("on", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("off", CapabilityType::WebsiteSearch).disabled())
            .await
            .unwrap();

        assert_eq!(names(&registry.get_all().await), vec!["on", "off"]);
    }

    #[tokio::test]
    async fn test_set_enabled_toggles_visibility() {
        let registry = registry();
        registry
            .register(MockProvider::new("shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();

        registry.set_enabled("shop", false).await.unwrap();
        assert_eq!(registry.is_enabled("shop").await, Some(false));
        assert!(registry
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await
            .is_empty());
        assert!(!registry.metadata().await[0].enabled);

        registry.set_enabled("shop", true).await.unwrap();
        assert_eq!(
            registry.get_by_type(&CapabilityType::WebsiteSearch).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_set_enabled_unknown_provider() {
        let registry = registry();
        let result = registry.set_enabled("ghost", true).await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_register_emits_event() {
        let events = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            events.on(PLUGIN_REGISTERED, move |event| {
                seen.lock()
                    .unwrap()
                    .push(event.payload["plugin"]["name"].as_str().unwrap_or_default().to_string());
                Ok(())
            });
        }

        let registry = ProviderRegistry::new(events);
        registry
            .register(MockProvider::new("shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        let _ = registry
            .register(MockProvider::new("broken", CapabilityType::WebsiteSearch).failing_init())
            .await;

        assert_eq!(*seen.lock().unwrap(), vec!["shop"]);
    }

    #[tokio::test]
    async fn test_set_enabled_emits_only_on_change() {
        let events = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            events.on(PLUGIN_ENABLED_CHANGED, move |event| {
                seen.lock().unwrap().push(event.payload.clone());
                Ok(())
            });
        }

        let registry = ProviderRegistry::new(events);
        registry
            .register(MockProvider::new("shop", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        registry.set_enabled("shop", true).await.unwrap();
        registry.set_enabled("shop", false).await.unwrap();
        registry.set_enabled("shop", false).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["plugin"]["name"], "shop");
        assert_eq!(seen[0]["plugin"]["enabled"], false);
        assert_eq!(seen[0]["enabled"], false);
    }

    #[tokio::test]
    async fn test_health_check_all_maps_failures_to_false() {
        let registry = registry();
        registry
            .register(MockProvider::new("up", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("down", CapabilityType::WebsiteSearch).health(Ok(false)))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("erroring", CapabilityType::WebsiteSearch).health(Err(())))
            .await
            .unwrap();
        registry
            .register(
                MockProvider::new("off", CapabilityType::WebsiteSearch)
                    .disabled()
                    .health(Ok(true)),
            )
            .await
            .unwrap();

        let health = registry.health_check_all().await;
        assert_eq!(health.len(), 4);
        assert!(health["up"]);
        assert!(!health["down"]);
        assert!(!health["erroring"]);
        assert!(health["off"]);
    }

    #[tokio::test]
    async fn test_drain_empties_every_index() {
        let registry = registry();
        registry
            .register(MockProvider::new("a", CapabilityType::WebsiteSearch))
            .await
            .unwrap();
        registry
            .register(MockProvider::new("b", CapabilityType::ComparisonEngine))
            .await
            .unwrap();

        let drained = registry.drain().await;
        assert_eq!(names(&drained), vec!["a", "b"]);
        assert_eq!(registry.count().await, 0);
        assert!(registry
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await
            .is_empty());
    }
}
