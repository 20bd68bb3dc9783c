#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{
    checked_ratio, ensure_finite, Feature, FeatureDescriptor, FnStrategy, MappingParams,
    ProcessingStrategy,
};
use crate::features::{mean, number_list, round2, TABULAR_FILE_TYPES};
use bizflow_types::SummaryLine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPricing {
    pub product: String,
    pub cost: f64,
    pub current_price: f64,
    #[serde(default, deserialize_with = "number_list")]
    pub competitor_prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlan {
    pub products: Vec<ProductPricing>,
    pub target_margin: f64,
    pub min_margin: f64,
    pub competitor_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    pub product: String,
    pub current_price: f64,
    pub margin_price: f64,
    pub market_price: f64,
    pub suggested_price: f64,
    /// Percent change from the current price.
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingReport {
    pub suggestions: Vec<PriceSuggestion>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PricingStrategies;

impl Feature for PricingStrategies {
    type Input = Vec<ProductPricing>;
    type Mapped = PricingPlan;
    type Output = PricingReport;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "pricing-strategies",
            title: "Pricing Strategies",
            description: "Suggest prices from costs, margins and competitor prices",
            table_name: "pricing",
            api_endpoint: "pricing/optimize",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        let target_margin = params.f64_or("target_margin", 0.30)?;
        let min_margin = params.f64_or("min_margin", 0.10)?;
        let competitor_weight = params.f64_or("competitor_weight", 0.5)?;
        if !(0.0..=1.0).contains(&competitor_weight) {
            return Err(AppError::mapping(format!(
                "competitor_weight must be between 0 and 1, got {}",
                competitor_weight
            )));
        }
        if target_margin < 0.0 || min_margin < 0.0 {
            return Err(AppError::mapping("margins must not be negative"));
        }
        Ok(PricingPlan {
            products: input.clone(),
            target_margin,
            min_margin,
            competitor_weight,
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        output
            .suggestions
            .iter()
            .map(|s| {
                SummaryLine::new(
                    s.product.clone(),
                    format!(
                        "{:.2} -> {:.2} ({:+.2}%)",
                        s.current_price, s.suggested_price, s.change_pct
                    ),
                )
            })
            .collect()
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(FnStrategy::new("margin-blend", suggest_prices)))
    }
}

/// Blends a cost-plus price with the competitor mean, never dropping below
/// the minimum margin.
pub fn suggest_prices(plan: &PricingPlan) -> Result<PricingReport, AppError> {
    if plan.products.is_empty() {
        return Err(AppError::processing("no products to price"));
    }

    let mut suggestions = Vec::with_capacity(plan.products.len());
    for product in &plan.products {
        if ensure_finite("cost", product.cost)? <= 0.0 {
            return Err(AppError::processing(format!(
                "cost of '{}' must be positive",
                product.product
            )));
        }
        if ensure_finite("current price", product.current_price)? <= 0.0 {
            return Err(AppError::processing(format!(
                "current price of '{}' must be positive",
                product.product
            )));
        }

        let margin_price = product.cost * (1.0 + plan.target_margin);
        let market_price = if product.competitor_prices.is_empty() {
            margin_price
        } else {
            mean("competitor prices", &product.competitor_prices)?
        };
        let blended = margin_price * (1.0 - plan.competitor_weight) + market_price * plan.competitor_weight;
        let floor = product.cost * (1.0 + plan.min_margin);
        let suggested_price = round2(ensure_finite("suggested price", blended.max(floor))?);
        let change = checked_ratio(
            "price change",
            suggested_price - product.current_price,
            product.current_price,
        )?;

        suggestions.push(PriceSuggestion {
            product: product.product.clone(),
            current_price: product.current_price,
            margin_price: round2(margin_price),
            market_price: round2(market_price),
            suggested_price,
            change_pct: round2(change * 100.0),
        });
    }

    Ok(PricingReport { suggestions })
}
