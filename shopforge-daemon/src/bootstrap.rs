//! Config-driven registration of the bundled providers.
//!
//! Every bundled provider is registered regardless of its `enabled` flag. A
//! provider whose section sets `enabled = false` is disabled right after
//! registration: it still appears in listings, metadata and health sweeps,
//! but fan-out skips it.

use shopforge_provider_core::Provider;
use tracing::{error, info};

use provider_amazon::AmazonSearchProvider;
use provider_similarity::SimilarityComparisonProvider;

use crate::config::Config;
use crate::registry::{self, RegistryError};
use crate::supervisor::Supervisor;

pub const AMAZON_SEARCH: &str = "amazon_search";
pub const SIMILARITY_COMPARISON: &str = "ai_similarity_comparison";

/// Register one provider and apply its configured enabled flag.
pub async fn register_configured<P>(
    supervisor: &Supervisor,
    config: &Config,
    provider: P,
) -> registry::Result<()>
where
    P: Provider + 'static,
{
    let name = provider.name().to_string();
    supervisor.register(provider).await?;

    if !config.provider_enabled(&name) {
        supervisor.registry().set_enabled(&name, false).await?;
        info!(provider = %name, "Provider disabled by configuration");
    }
    Ok(())
}

/// Register the bundled providers described by `config`.
///
/// A provider that fails to register is logged and skipped; the failures
/// are returned in registration order.
pub async fn register_bundled(
    supervisor: &Supervisor,
    config: &Config,
) -> Vec<(String, RegistryError)> {
    let mut failures = Vec::new();

    let amazon = match config
        .provider_settings(AMAZON_SEARCH)
        .and_then(|s| s.get("base_url"))
        .and_then(|v| v.as_str())
    {
        Some(base_url) => AmazonSearchProvider::with_base_url(base_url),
        None => AmazonSearchProvider::new(),
    };
    if let Err(e) = register_configured(supervisor, config, amazon).await {
        error!("Failed to register {}: {}", AMAZON_SEARCH, e);
        failures.push((AMAZON_SEARCH.to_string(), e));
    }

    if let Err(e) =
        register_configured(supervisor, config, SimilarityComparisonProvider::new()).await
    {
        error!("Failed to register {}: {}", SIMILARITY_COMPARISON, e);
        failures.push((SIMILARITY_COMPARISON.to_string(), e));
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::registry::ProviderRegistry;
    use shopforge_provider_core::CapabilityType;
    use std::sync::Arc;

    fn supervisor() -> Supervisor {
        Supervisor::new(Arc::new(ProviderRegistry::new(Arc::new(EventBus::new()))))
    }

    fn config(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_register_everything_enabled() {
        let supervisor = supervisor();
        let failures = register_bundled(&supervisor, &Config::default()).await;

        assert!(failures.is_empty());
        assert_eq!(
            supervisor.registry().list().await,
            vec![AMAZON_SEARCH, SIMILARITY_COMPARISON]
        );
        assert!(supervisor
            .registry()
            .metadata()
            .await
            .iter()
            .all(|m| m.enabled));
    }

    #[tokio::test]
    async fn test_disabled_provider_stays_registered() {
        let supervisor = supervisor();
        let config = config(
            r#"
[providers.ai_similarity_comparison]
enabled = false
"#,
        );

        let failures = register_bundled(&supervisor, &config).await;
        assert!(failures.is_empty());

        let registry = supervisor.registry();
        assert_eq!(registry.count().await, 2);
        assert_eq!(registry.is_enabled(SIMILARITY_COMPARISON).await, Some(false));
        assert_eq!(registry.is_enabled(AMAZON_SEARCH).await, Some(true));
        assert!(registry
            .get_by_type(&CapabilityType::ComparisonEngine)
            .await
            .is_empty());

        let health = supervisor.health_check_all().await;
        assert_eq!(health.providers.get(SIMILARITY_COMPARISON), Some(&true));
    }

    #[tokio::test]
    async fn test_bad_base_url_is_reported() {
        let supervisor = supervisor();
        let config = config(
            r#"
[providers.amazon_search.settings]
base_url = "gopher://shop"
"#,
        );

        let failures = register_bundled(&supervisor, &config).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, AMAZON_SEARCH);
        assert!(matches!(failures[0].1, RegistryError::Initialization { .. }));
        assert_eq!(supervisor.registry().list().await, vec![SIMILARITY_COMPARISON]);
    }
}
