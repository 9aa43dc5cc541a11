//! # shopforge-daemon
//!
//! The Shopforge daemon.
//!
//! This daemon is responsible for:
//! - Registering the bundled provider plugins
//! - Indexing providers by capability type
//! - Fanning operations out across every enabled provider of a type
//! - Health sweeps and orderly teardown of providers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    shopforge-daemon                          │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │   Provider   │  │   Fan-out    │  │  Supervisor  │      │
//! │  │   Registry   │  │   Engine     │  │              │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐    │
//! │  │                   Event Bus                         │    │
//! │  └────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!           ┌──────────────────┼──────────────────┐
//!           ▼                  ▼                  ▼
//!      ┌─────────┐      ┌─────────────┐    ┌────────────────┐
//!      │ Search  │      │ Comparison  │    │ Recommendation │
//!      │ Sources │      │  Engines    │    │    Engines     │
//!      └─────────┘      └─────────────┘    └────────────────┘
//! ```
//!
//! ## Configuration
//!
//! The daemon reads configuration from `$XDG_CONFIG_HOME/shopforge/config.toml`.
//!
//! ## Running
//!
//! ```bash
//! # Start the daemon
//! cargo run --bin shopforge-daemon
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin shopforge-daemon
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use shopforge_daemon::bootstrap;
use shopforge_daemon::config::Config;
use shopforge_daemon::events::{
    EventBus, PLUGIN_ENABLED_CHANGED, PLUGIN_REGISTERED, PLUGIN_UNREGISTERED,
};
use shopforge_daemon::fanout::FanoutEngine;
use shopforge_daemon::registry::ProviderRegistry;
use shopforge_daemon::search::SearchService;
use shopforge_daemon::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, config_error) = match Config::load_default() {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.daemon.log_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting shopforge-daemon v{}", env!("CARGO_PKG_VERSION"));
    match config_error {
        None => info!("Loaded configuration from default path"),
        Some(e) => warn!("Failed to load config, using defaults: {:#}", e),
    }

    // Event bus with a logging subscriber for lifecycle events
    let events = Arc::new(EventBus::new());
    for event in [PLUGIN_REGISTERED, PLUGIN_UNREGISTERED, PLUGIN_ENABLED_CHANGED] {
        events.on(event, |event| {
            info!(event = %event.name, payload = %event.payload, "Lifecycle event");
            Ok(())
        });
    }

    // Initialize provider registry
    let mut registry = ProviderRegistry::new(Arc::clone(&events));
    if let Some(timeout) = config.execution.health_check_timeout() {
        registry = registry.with_health_timeout(timeout);
    }
    let registry = Arc::new(registry);

    let mut supervisor = Supervisor::new(Arc::clone(&registry));
    let mut engine = FanoutEngine::new(Arc::clone(&registry));
    if let Some(timeout) = config.execution.operation_timeout() {
        supervisor = supervisor.with_cleanup_timeout(timeout);
        engine = engine.with_timeout(timeout);
    }
    let search = SearchService::new(Arc::new(engine));

    // Register bundled providers; disabled ones stay registered but idle
    let failures = bootstrap::register_bundled(&supervisor, &config).await;
    if !failures.is_empty() {
        warn!("{} provider(s) failed to register", failures.len());
    }

    // Display registered providers
    for metadata in registry.metadata().await {
        info!(
            provider = %metadata.name,
            version = %metadata.version,
            enabled = metadata.enabled,
            "Registered provider"
        );
    }

    // Perform health check
    let health = supervisor.health_check_all().await;
    info!(
        healthy = ?health.healthy(),
        unhealthy = ?health.unhealthy(),
        "Provider health check"
    );

    for source in search.sources().await {
        let filters: Vec<_> = source.supported_filters.iter().map(|f| f.name.as_str()).collect();
        info!(
            source = %source.name,
            version = %source.metadata.version,
            filters = ?filters,
            "Search source available"
        );
    }

    info!("Daemon startup complete");
    info!("Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down...");

    let report = supervisor.shutdown().await;
    for failure in &report.failures {
        warn!(provider = %failure.provider, error = %failure.error, "Cleanup failed");
    }
    info!(
        cleaned = report.cleaned.len(),
        failed = report.failures.len(),
        "Daemon stopped"
    );
    Ok(())
}
