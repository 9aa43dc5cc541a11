//! # provider-similarity
//!
//! A comparison engine that scores products on a handful of attributes.
//!
//! Similarity averages three factors: relative price distance, category
//! match and (at half weight) brand match. Ranking scores cheapness and
//! rating according to the criteria's priorities.

use async_trait::async_trait;
use chrono::Utc;
use shopforge_provider_core::prelude::*;

/// Price gap above which a comparison flags the price as a significant difference.
const PRICE_DIFFERENCE_THRESHOLD: f64 = 10.0;

/// Comparison engine named `ai_similarity_comparison`.
#[derive(Debug, Default)]
pub struct SimilarityComparisonProvider;

impl SimilarityComparisonProvider {
    pub fn new() -> Self {
        Self
    }

    fn similarity(a: &Product, b: &Product) -> f64 {
        let mut similarity = 0.0;
        let mut factors = 0.0;

        if let (Some(pa), Some(pb)) = (a.price, b.price) {
            let average = (pa + pb) / 2.0;
            if average > 0.0 {
                similarity += (1.0 - (pa - pb).abs() / average).max(0.0);
            } else {
                similarity += 1.0;
            }
            factors += 1.0;
        }

        if a.category == b.category {
            similarity += 1.0;
        }
        factors += 1.0;

        if a.brand == b.brand {
            similarity += 0.5;
        }
        factors += 1.0;

        similarity / factors
    }

    fn differences(a: &Product, b: &Product) -> Vec<Difference> {
        let mut differences = Vec::new();

        if let (Some(pa), Some(pb)) = (a.price, b.price) {
            if (pa - pb).abs() > PRICE_DIFFERENCE_THRESHOLD {
                differences.push(Difference {
                    attribute: "price".to_string(),
                    product1_value: serde_json::json!(pa),
                    product2_value: serde_json::json!(pb),
                    significance: Significance::High,
                });
            }
        }

        if a.category != b.category {
            differences.push(Difference {
                attribute: "category".to_string(),
                product1_value: serde_json::json!(a.category),
                product2_value: serde_json::json!(b.category),
                significance: Significance::Medium,
            });
        }

        differences
    }

    fn score(product: &Product, criteria: &ComparisonCriteria) -> f64 {
        let mut score = 0.0;

        if criteria.prioritize_price {
            if let Some(price) = product.price {
                score += (100.0 - price).max(0.0) / 100.0;
            }
        }

        if criteria.prioritize_rating {
            if let Some(rating) = product.rating {
                score += rating / 5.0;
            }
        }

        score
    }
}

#[async_trait]
impl Provider for SimilarityComparisonProvider {
    fn name(&self) -> &str {
        "ai_similarity_comparison"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn as_comparison_engine(&self) -> Option<&dyn ComparisonEngine> {
        Some(self)
    }
}

#[async_trait]
impl ComparisonEngine for SimilarityComparisonProvider {
    async fn compare_products(
        &self,
        products: &[Product],
        criteria: &ComparisonCriteria,
    ) -> Result<ComparisonResult> {
        let mut comparisons = Vec::new();
        for (i, a) in products.iter().enumerate() {
            for b in &products[i + 1..] {
                comparisons.push(PairwiseComparison {
                    product1: a.id.clone(),
                    product2: b.id.clone(),
                    similarity_score: Self::similarity(a, b),
                    differences: Self::differences(a, b),
                });
            }
        }

        Ok(ComparisonResult {
            products: products.to_vec(),
            comparisons,
            criteria_used: criteria.clone(),
            timestamp: Utc::now(),
        })
    }

    async fn calculate_similarity(&self, a: &Product, b: &Product) -> Result<f64> {
        Ok(Self::similarity(a, b))
    }

    async fn rank_products(
        &self,
        products: &[Product],
        criteria: &ComparisonCriteria,
    ) -> Result<Vec<RankedProduct>> {
        let mut ranked: Vec<RankedProduct> = products
            .iter()
            .map(|product| RankedProduct {
                score: Self::score(product, criteria),
                product: product.clone(),
            })
            .collect();

        // Stable, so equal scores keep their input order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    fn available_criteria(&self) -> Vec<String> {
        ["price", "features", "rating", "brand_reputation"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}
