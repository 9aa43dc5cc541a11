//! # shopforge-provider-core
//!
//! Core traits and types for Shopforge providers.
//!
//! This crate defines the contract every provider plugin must satisfy, and the
//! value types that flow through provider operations:
//!
//! - [`Provider`] - identity, lifecycle hooks, declared capabilities, health check
//! - Capability traits: [`WebsiteSearch`], [`ComparisonEngine`], [`RecommendationEngine`]
//! - [`CapabilityType`] - the category tag a provider is indexed under
//! - [`Product`] and the search/comparison/recommendation payloads

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

// ============================================================================
// Capability Types
// ============================================================================

/// The category a provider is indexed under.
///
/// Unknown tags parse to [`CapabilityType::Custom`], so new categories can be
/// introduced by providers without changes to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    /// Search sources that look products up on a website or API.
    WebsiteSearch,

    /// Engines that compare, score and rank products.
    ComparisonEngine,

    /// Engines that recommend products for a user.
    AiRecommendation,

    /// Custom category for extension.
    Custom(String),
}

impl CapabilityType {
    /// Parse a capability type from its tag.
    pub fn parse(s: &str) -> Self {
        match s {
            "website_search" => CapabilityType::WebsiteSearch,
            "comparison_engine" => CapabilityType::ComparisonEngine,
            "ai_recommendation" => CapabilityType::AiRecommendation,
            other => CapabilityType::Custom(other.to_string()),
        }
    }

    /// Convert the capability type to its tag.
    pub fn as_str(&self) -> &str {
        match self {
            CapabilityType::WebsiteSearch => "website_search",
            CapabilityType::ComparisonEngine => "comparison_engine",
            CapabilityType::AiRecommendation => "ai_recommendation",
            CapabilityType::Custom(s) => s,
        }
    }

    /// Re-parse the tag so `Custom("website_search")` and `WebsiteSearch`
    /// compare equal.
    pub fn normalized(&self) -> Self {
        match self {
            CapabilityType::Custom(s) => Self::parse(s),
            other => other.clone(),
        }
    }

    /// Capability tags declared by default for providers of this type.
    pub fn default_capabilities(&self) -> &'static [&'static str] {
        match self {
            CapabilityType::WebsiteSearch => &["search", "product_details", "filtering"],
            CapabilityType::ComparisonEngine => &["comparison", "similarity", "ranking"],
            CapabilityType::AiRecommendation => {
                &["recommendations", "preference_prediction", "learning"]
            }
            CapabilityType::Custom(_) => &[],
        }
    }
}

impl std::fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Product Types
// ============================================================================

/// A product as returned by a search source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<u32>,
    #[serde(default)]
    pub specifications: HashMap<String, String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub availability: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Product {
    /// Create a product with only a name; every other field takes its default.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            description: None,
            price: None,
            currency: default_currency(),
            images: Vec::new(),
            url: None,
            source: None,
            category: None,
            brand: None,
            rating: None,
            reviews_count: None,
            specifications: HashMap::new(),
            features: Vec::new(),
            availability: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filters passed to a search source.
///
/// The well-known filters are typed; anything else a source supports is kept
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The input kind of a supported search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    Select { options: Vec<String> },
    Number,
    Boolean,
    Text,
}

/// A filter a search source understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: FilterKind,
}

// ============================================================================
// Comparison Types
// ============================================================================

/// Criteria steering comparison and ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCriteria {
    #[serde(default)]
    pub prioritize_price: bool,
    #[serde(default)]
    pub prioritize_rating: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// How much a difference between two products matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Low,
    Medium,
    High,
}

/// A single attribute on which two products differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub attribute: String,
    pub product1_value: serde_json::Value,
    pub product2_value: serde_json::Value,
    pub significance: Significance,
}

/// Comparison of one pair of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub product1: Option<String>,
    pub product2: Option<String>,
    pub similarity_score: f64,
    pub differences: Vec<Difference>,
}

/// Result of comparing a set of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub products: Vec<Product>,
    pub comparisons: Vec<PairwiseComparison>,
    pub criteria_used: ComparisonCriteria,
    pub timestamp: DateTime<Utc>,
}

/// A product together with the score it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub score: f64,
}

// ============================================================================
// Recommendation Types
// ============================================================================

/// What is known about the user a recommendation is for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Option<String>,
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub history: Vec<String>,
}

/// Options for generating recommendations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationOptions {
    /// Recommendation type, e.g. "similar", "complementary", "alternative".
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: Product,
    pub kind: String,
    pub score: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceScore {
    pub product_id: Option<String>,
    pub score: f64,
}

/// The type of a recorded user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Click,
    AddToCart,
    Purchase,
    Dismiss,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub user_id: String,
    pub product_id: String,
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Provider Base Trait
// ============================================================================

/// Metadata describing a provider, as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub capability_type: Option<String>,
    pub enabled: bool,
    pub capabilities: Vec<String>,
}

/// Base trait for all providers.
///
/// Every provider must implement this trait. The category-specific operations
/// live in the capability traits; a provider exposes them through the
/// `as_*` accessors, which is also what the registry derives the provider's
/// [`CapabilityType`] from.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique name of this provider instance (e.g. "amazon_search")
    fn name(&self) -> &str;

    /// Semantic version of this provider
    fn version(&self) -> &str;

    /// Whether the provider starts out enabled
    fn is_enabled(&self) -> bool {
        true
    }

    /// The category this provider is indexed under, if any
    fn capability_type(&self) -> Option<CapabilityType> {
        if self.as_website_search().is_some() {
            Some(CapabilityType::WebsiteSearch)
        } else if self.as_comparison_engine().is_some() {
            Some(CapabilityType::ComparisonEngine)
        } else if self.as_recommendation_engine().is_some() {
            Some(CapabilityType::AiRecommendation)
        } else {
            None
        }
    }

    /// Declared capability tags. Informational only.
    fn capabilities(&self) -> Vec<String> {
        self.capability_type()
            .map(|t| {
                t.default_capabilities()
                    .iter()
                    .map(|c| c.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.name().to_string(),
            version: self.version().to_string(),
            capability_type: self.capability_type().map(|t| t.as_str().to_string()),
            enabled: self.is_enabled(),
            capabilities: self.capabilities(),
        }
    }

    /// Set up connections and credentials. Called once, before the provider
    /// is visible to lookups.
    async fn initialize(&self) -> Result<()>;

    /// Release held resources.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Liveness signal
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn as_website_search(&self) -> Option<&dyn WebsiteSearch> {
        None
    }

    fn as_comparison_engine(&self) -> Option<&dyn ComparisonEngine> {
        None
    }

    fn as_recommendation_engine(&self) -> Option<&dyn RecommendationEngine> {
        None
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Search sources.
///
/// Examples: store websites, marketplace APIs
#[async_trait]
pub trait WebsiteSearch: Provider {
    /// Search for products matching a query
    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Product>>;

    /// Get full details for a product
    async fn get_product_details(&self, product_id: &str) -> Result<Product>;

    /// Turn a raw response from the source into a product
    fn parse_product_data(&self, data: &serde_json::Value) -> Result<Product>;

    /// Filters this source understands
    fn supported_filters(&self) -> Vec<FilterDefinition> {
        Vec::new()
    }
}

/// Comparison engines.
#[async_trait]
pub trait ComparisonEngine: Provider {
    /// Compare every pair in a set of products
    async fn compare_products(
        &self,
        products: &[Product],
        criteria: &ComparisonCriteria,
    ) -> Result<ComparisonResult>;

    /// Similarity between two products, in `0.0..=1.0`
    async fn calculate_similarity(&self, a: &Product, b: &Product) -> Result<f64>;

    /// Order products by score, best first
    async fn rank_products(
        &self,
        products: &[Product],
        criteria: &ComparisonCriteria,
    ) -> Result<Vec<RankedProduct>>;

    /// Criteria this engine can compare on
    fn available_criteria(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Recommendation engines.
#[async_trait]
pub trait RecommendationEngine: Provider {
    /// Recommend products for the given context products
    async fn generate_recommendations(
        &self,
        context: &[Product],
        profile: &UserProfile,
        options: &RecommendationOptions,
    ) -> Result<Vec<Recommendation>>;

    /// Score how much a user is likely to want each product
    async fn predict_preferences(
        &self,
        profile: &UserProfile,
        products: &[Product],
    ) -> Result<Vec<PreferenceScore>>;

    /// Feed recorded interactions back into the engine
    async fn learn_from_interactions(&self, _interactions: &[UserInteraction]) -> Result<()> {
        Ok(())
    }

    fn supported_types(&self) -> Vec<String> {
        vec![
            "similar".to_string(),
            "complementary".to_string(),
            "alternative".to_string(),
        ]
    }
}

// ============================================================================
// Re-exports
// ============================================================================

pub mod prelude {
    pub use crate::{
        CapabilityType, ComparisonCriteria, ComparisonEngine, ComparisonResult, Difference,
        FilterDefinition, FilterKind, InteractionKind, PairwiseComparison, PreferenceScore,
        Product, Provider, ProviderError, ProviderMetadata, RankedProduct, Recommendation,
        RecommendationEngine, RecommendationOptions, Result, SearchFilters, Significance,
        UserInteraction, UserProfile, WebsiteSearch,
    };
}
