#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{checked_ratio, Feature, FeatureDescriptor, MappingParams, ProcessingStrategy};
use crate::features::{round2, TABULAR_FILE_TYPES};
use async_trait::async_trait;
use bizflow_types::SummaryLine;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierMetrics {
    pub supplier: String,
    pub on_time_rate: f64,
    pub quality_rate: f64,
    pub cost_score: f64,
    pub responsiveness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    pub on_time: f64,
    pub quality: f64,
    pub cost: f64,
    pub responsiveness: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            on_time: 0.35,
            quality: 0.35,
            cost: 0.2,
            responsiveness: 0.1,
        }
    }
}

impl CriteriaWeights {
    fn as_array(&self) -> [f64; 4] {
        [self.on_time, self.quality, self.cost, self.responsiveness]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPlan {
    pub suppliers: Vec<SupplierMetrics>,
    pub weights: CriteriaWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierScore {
    pub rank: usize,
    pub supplier: String,
    pub score: f64,
    pub grade: char,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRanking {
    pub ranking: Vec<SupplierScore>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SupplierPerformance;

impl Feature for SupplierPerformance {
    type Input = Vec<SupplierMetrics>;
    type Mapped = ScoringPlan;
    type Output = SupplierRanking;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "supplier-performance",
            title: "Supplier Performance",
            description: "Score and rank suppliers on delivery, quality, cost and responsiveness",
            table_name: "suppliers",
            api_endpoint: "suppliers/score",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        let defaults = CriteriaWeights::default();
        Ok(ScoringPlan {
            suppliers: input.clone(),
            weights: CriteriaWeights {
                on_time: params.f64_or("on_time_weight", defaults.on_time)?,
                quality: params.f64_or("quality_weight", defaults.quality)?,
                cost: params.f64_or("cost_weight", defaults.cost)?,
                responsiveness: params.f64_or("responsiveness_weight", defaults.responsiveness)?,
            },
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        output
            .ranking
            .iter()
            .map(|entry| {
                SummaryLine::new(
                    format!("#{} {}", entry.rank, entry.supplier),
                    format!("{:.2} ({})", entry.score, entry.grade),
                )
            })
            .collect()
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(WeightedScoring))
    }
}

/// Weighted scorecard over the four supplier criteria.
pub struct WeightedScoring;

impl WeightedScoring {
    fn grade(score: f64) -> char {
        match score {
            s if s >= 90.0 => 'A',
            s if s >= 75.0 => 'B',
            s if s >= 60.0 => 'C',
            _ => 'D',
        }
    }

    pub fn score(plan: &ScoringPlan) -> Result<SupplierRanking, AppError> {
        if plan.suppliers.is_empty() {
            return Err(AppError::processing("no suppliers to score"));
        }
        let weights = plan.weights.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::processing("criteria weights must not be negative"));
        }
        let weight_total: f64 = weights.iter().sum();

        let mut ranking = Vec::with_capacity(plan.suppliers.len());
        for supplier in &plan.suppliers {
            let metrics = [
                supplier.on_time_rate,
                supplier.quality_rate,
                supplier.cost_score,
                supplier.responsiveness,
            ];
            if metrics.iter().any(|m| !(0.0..=100.0).contains(m)) {
                return Err(AppError::processing(format!(
                    "metrics of '{}' must be between 0 and 100",
                    supplier.supplier
                )));
            }
            let weighted: f64 = metrics.iter().zip(weights).map(|(m, w)| m * w).sum();
            let score = round2(checked_ratio("supplier score", weighted, weight_total)?);
            ranking.push(SupplierScore {
                rank: 0,
                supplier: supplier.supplier.clone(),
                score,
                grade: Self::grade(score),
            });
        }

        ranking.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.supplier.cmp(&b.supplier))
        });
        for (index, entry) in ranking.iter_mut().enumerate() {
            entry.rank = index + 1;
        }
        Ok(SupplierRanking { ranking })
    }
}

#[async_trait]
impl ProcessingStrategy<ScoringPlan, SupplierRanking> for WeightedScoring {
    fn name(&self) -> &str {
        "weighted-scorecard"
    }

    async fn process(&self, mapped: &ScoringPlan) -> Result<SupplierRanking, AppError> {
        Self::score(mapped)
    }
}
