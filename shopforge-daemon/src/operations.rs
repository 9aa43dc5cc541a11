//! Typed operations for each capability trait.
//!
//! Each struct carries the arguments of one capability method and implements
//! [`Operation`] so it can be handed to the [`FanoutEngine`](crate::fanout::FanoutEngine).
//! A provider supports an operation when it exposes the matching capability
//! trait through its `as_*` accessor.

use async_trait::async_trait;
use shopforge_provider_core::prelude::*;

use crate::fanout::Operation;

fn unsupported(provider: &dyn Provider, operation: &str) -> ProviderError {
    ProviderError::Unsupported(format!("{} does not implement {operation}", provider.name()))
}

fn search<'a>(provider: &'a dyn Provider, operation: &str) -> Result<&'a dyn WebsiteSearch> {
    provider
        .as_website_search()
        .ok_or_else(|| unsupported(provider, operation))
}

fn comparison<'a>(provider: &'a dyn Provider, operation: &str) -> Result<&'a dyn ComparisonEngine> {
    provider
        .as_comparison_engine()
        .ok_or_else(|| unsupported(provider, operation))
}

fn recommendation<'a>(
    provider: &'a dyn Provider,
    operation: &str,
) -> Result<&'a dyn RecommendationEngine> {
    provider
        .as_recommendation_engine()
        .ok_or_else(|| unsupported(provider, operation))
}

// ============================================================================
// Website Search
// ============================================================================

/// `WebsiteSearch::search_products`
#[derive(Debug, Clone, Default)]
pub struct SearchProducts {
    pub query: String,
    pub filters: SearchFilters,
}

impl SearchProducts {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

#[async_trait]
impl Operation for SearchProducts {
    type Output = Vec<Product>;

    fn name(&self) -> &str {
        "search_products"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_website_search().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<Vec<Product>> {
        search(provider, self.name())?
            .search_products(&self.query, &self.filters)
            .await
    }
}

/// `WebsiteSearch::get_product_details`
#[derive(Debug, Clone)]
pub struct GetProductDetails {
    pub product_id: String,
}

#[async_trait]
impl Operation for GetProductDetails {
    type Output = Product;

    fn name(&self) -> &str {
        "get_product_details"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_website_search().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<Product> {
        search(provider, self.name())?
            .get_product_details(&self.product_id)
            .await
    }
}

// ============================================================================
// Comparison Engine
// ============================================================================

/// `ComparisonEngine::compare_products`
#[derive(Debug, Clone, Default)]
pub struct CompareProducts {
    pub products: Vec<Product>,
    pub criteria: ComparisonCriteria,
}

#[async_trait]
impl Operation for CompareProducts {
    type Output = ComparisonResult;

    fn name(&self) -> &str {
        "compare_products"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_comparison_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<ComparisonResult> {
        comparison(provider, self.name())?
            .compare_products(&self.products, &self.criteria)
            .await
    }
}

/// `ComparisonEngine::calculate_similarity`
#[derive(Debug, Clone)]
pub struct CalculateSimilarity {
    pub first: Product,
    pub second: Product,
}

#[async_trait]
impl Operation for CalculateSimilarity {
    type Output = f64;

    fn name(&self) -> &str {
        "calculate_similarity"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_comparison_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<f64> {
        comparison(provider, self.name())?
            .calculate_similarity(&self.first, &self.second)
            .await
    }
}

/// `ComparisonEngine::rank_products`
#[derive(Debug, Clone, Default)]
pub struct RankProducts {
    pub products: Vec<Product>,
    pub criteria: ComparisonCriteria,
}

#[async_trait]
impl Operation for RankProducts {
    type Output = Vec<RankedProduct>;

    fn name(&self) -> &str {
        "rank_products"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_comparison_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<Vec<RankedProduct>> {
        comparison(provider, self.name())?
            .rank_products(&self.products, &self.criteria)
            .await
    }
}

// ============================================================================
// Recommendation Engine
// ============================================================================

/// `RecommendationEngine::generate_recommendations`
#[derive(Debug, Clone, Default)]
pub struct GenerateRecommendations {
    pub context: Vec<Product>,
    pub profile: UserProfile,
    pub options: RecommendationOptions,
}

#[async_trait]
impl Operation for GenerateRecommendations {
    type Output = Vec<Recommendation>;

    fn name(&self) -> &str {
        "generate_recommendations"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_recommendation_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<Vec<Recommendation>> {
        recommendation(provider, self.name())?
            .generate_recommendations(&self.context, &self.profile, &self.options)
            .await
    }
}

/// `RecommendationEngine::predict_preferences`
#[derive(Debug, Clone, Default)]
pub struct PredictPreferences {
    pub profile: UserProfile,
    pub products: Vec<Product>,
}

#[async_trait]
impl Operation for PredictPreferences {
    type Output = Vec<PreferenceScore>;

    fn name(&self) -> &str {
        "predict_preferences"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_recommendation_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<Vec<PreferenceScore>> {
        recommendation(provider, self.name())?
            .predict_preferences(&self.profile, &self.products)
            .await
    }
}

/// `RecommendationEngine::learn_from_interactions`
#[derive(Debug, Clone, Default)]
pub struct LearnFromInteractions {
    pub interactions: Vec<UserInteraction>,
}

#[async_trait]
impl Operation for LearnFromInteractions {
    type Output = ();

    fn name(&self) -> &str {
        "learn_from_interactions"
    }

    fn supported_by(&self, provider: &dyn Provider) -> bool {
        provider.as_recommendation_engine().is_some()
    }

    async fn invoke(&self, provider: &dyn Provider) -> Result<()> {
        recommendation(provider, self.name())?
            .learn_from_interactions(&self.interactions)
            .await
    }
}
