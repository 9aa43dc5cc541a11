//! Multi-source product search.
//!
//! Fans a query out over every enabled website-search provider (optionally
//! narrowed to named sources) and folds the per-provider outcomes into a
//! single response. A failing source contributes an error entry and zero
//! results; it never fails the search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopforge_provider_core::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::fanout::{FanoutEngine, Outcome, OutcomeStatus};
use crate::operations::SearchProducts;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search query is required")]
    EmptyQuery,
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// A search across one or more sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    /// Restrict the search to these provider names; empty means all
    #[serde(default)]
    pub sources: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Error,
}

/// What one source returned for a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: String,
    pub results: Vec<Product>,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Outcome<Vec<Product>>> for SourceResult {
    fn from(outcome: Outcome<Vec<Product>>) -> Self {
        match outcome.status {
            OutcomeStatus::Result(results) => Self {
                source: outcome.provider,
                results,
                status: SourceStatus::Success,
                error: None,
            },
            OutcomeStatus::Error(error) => Self {
                source: outcome.provider,
                results: Vec::new(),
                status: SourceStatus::Error,
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub filters: SearchFilters,
    pub sources: Vec<SourceResult>,
    pub total_results: usize,
    pub timestamp: DateTime<Utc>,
}

/// A search source as listed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub metadata: ProviderMetadata,
    pub supported_filters: Vec<FilterDefinition>,
}

/// Searches every enabled website-search provider at once.
pub struct SearchService {
    engine: Arc<FanoutEngine>,
}

impl SearchService {
    pub fn new(engine: Arc<FanoutEngine>) -> Self {
        Self { engine }
    }

    /// Run `request` against the selected sources.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyQuery`] if the query is blank.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut providers = self
            .engine
            .registry()
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await;
        if !request.sources.is_empty() {
            providers.retain(|p| request.sources.iter().any(|s| s == p.name()));
        }

        debug!(query = %request.query, sources = providers.len(), "Searching");

        let operation =
            SearchProducts::new(request.query.clone()).with_filters(request.filters.clone());
        let sources: Vec<SourceResult> = self
            .engine
            .execute_on(&providers, &operation)
            .await
            .into_iter()
            .map(SourceResult::from)
            .collect();

        let total_results = sources.iter().map(|s| s.results.len()).sum();
        info!(
            query = %request.query,
            sources = sources.len(),
            total_results,
            "Search complete"
        );

        Ok(SearchResponse {
            query: request.query,
            filters: request.filters,
            sources,
            total_results,
            timestamp: Utc::now(),
        })
    }

    /// Enabled search sources with their metadata and filters.
    pub async fn sources(&self) -> Vec<SourceInfo> {
        let registry = self.engine.registry();
        let metadata = registry.metadata().await;

        registry
            .get_by_type(&CapabilityType::WebsiteSearch)
            .await
            .iter()
            .filter_map(|provider| {
                let search = provider.as_website_search()?;
                let metadata = metadata
                    .iter()
                    .find(|m| m.name == provider.name())
                    .cloned()
                    .unwrap_or_else(|| provider.metadata());
                Some(SourceInfo {
                    name: provider.name().to_string(),
                    metadata,
                    supported_filters: search.supported_filters(),
                })
            })
            .collect()
    }
}
