//! # provider-amazon
//!
//! A mock Amazon search provider for development and testing.
//!
//! This provider returns generated fixture products and does not connect to
//! any real service. It implements `Provider` and `WebsiteSearch` to
//! demonstrate the search-source pattern and to exercise the daemon's
//! multi-source search.

use async_trait::async_trait;
use shopforge_provider_core::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://www.amazon.com";
const MOCK_PRICE: f64 = 29.99;

/// Mock search source named `amazon_search`.
pub struct AmazonSearchProvider {
    base_url: String,
    initialized: AtomicBool,
}

impl AmazonSearchProvider {
    /// Create a new provider pointed at the public site.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a provider that builds product URLs under `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            initialized: AtomicBool::new(false),
        }
    }

    fn mock_product(&self, query: &str, filters: &SearchFilters) -> Product {
        let mut product = Product::new(format!("Amazon Product for \"{query}\""));
        product.id = Some("amazon_001".to_string());
        product.description = Some("Mock product description".to_string());
        product.price = Some(MOCK_PRICE);
        product.url = Some(format!("{}/product/{}", self.base_url, uuid::Uuid::new_v4()));
        product.source = Some("amazon".to_string());
        product.category = Some(
            filters
                .category
                .clone()
                .unwrap_or_else(|| "Electronics".to_string()),
        );
        product.brand = Some("Amazon Basics".to_string());
        product.rating = Some(4.2);
        product.reviews_count = Some(1250);
        product
    }
}

impl Default for AmazonSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for AmazonSearchProvider {
    fn name(&self) -> &str {
        "amazon_search"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn initialize(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ProviderError::Initialization(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(base_url = %self.base_url, "Amazon search provider initialized");
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.initialized.load(Ordering::SeqCst))
    }

    fn as_website_search(&self) -> Option<&dyn WebsiteSearch> {
        Some(self)
    }
}

#[async_trait]
impl WebsiteSearch for AmazonSearchProvider {
    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Product>> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty query".to_string()));
        }

        let mut products = vec![self.mock_product(query, filters)];

        // Apply price bounds
        products.retain(|p| {
            let price = p.price.unwrap_or_default();
            filters.price_min.map_or(true, |min| price >= min)
                && filters.price_max.map_or(true, |max| price <= max)
        });

        Ok(products)
    }

    async fn get_product_details(&self, product_id: &str) -> Result<Product> {
        if product_id.is_empty() {
            return Err(ProviderError::NotFound(product_id.to_string()));
        }

        let mut product = Product::new("Detailed Amazon Product");
        product.id = Some(product_id.to_string());
        product.description = Some("Detailed product information".to_string());
        product.price = Some(MOCK_PRICE);
        product.source = Some("amazon".to_string());
        Ok(product)
    }

    fn parse_product_data(&self, data: &serde_json::Value) -> Result<Product> {
        let mut product: Product = serde_json::from_value(data.clone())
            .map_err(|e| ProviderError::InvalidInput(e.to_string()))?;
        if product.source.is_none() {
            product.source = Some("amazon".to_string());
        }
        Ok(product)
    }

    fn supported_filters(&self) -> Vec<FilterDefinition> {
        vec![
            FilterDefinition {
                name: "category".to_string(),
                kind: FilterKind::Select {
                    options: vec![
                        "Electronics".to_string(),
                        "Books".to_string(),
                        "Clothing".to_string(),
                    ],
                },
            },
            FilterDefinition {
                name: "price_min".to_string(),
                kind: FilterKind::Number,
            },
            FilterDefinition {
                name: "price_max".to_string(),
                kind: FilterKind::Number,
            },
            FilterDefinition {
                name: "prime_eligible".to_string(),
                kind: FilterKind::Boolean,
            },
        ]
    }
}
