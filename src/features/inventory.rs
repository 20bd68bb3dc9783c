#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{ensure_finite, Feature, FeatureDescriptor, FnStrategy, MappingParams, ProcessingStrategy};
use crate::features::{mean, number_list, round2, TABULAR_FILE_TYPES};
use bizflow_types::SummaryLine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub sku: String,
    #[serde(default)]
    pub name: String,
    pub current_stock: f64,
    #[serde(deserialize_with = "number_list")]
    pub daily_demand: Vec<f64>,
    pub lead_time_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryPlan {
    pub items: Vec<InventoryItem>,
    pub safety_days: f64,
    pub review_period_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    Critical,
    Low,
    Optimal,
    Overstocked,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StockStatus::Critical => "Critical",
            StockStatus::Low => "Low",
            StockStatus::Optimal => "Optimal",
            StockStatus::Overstocked => "Overstocked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevels {
    pub sku: String,
    pub name: String,
    pub current_stock: f64,
    pub average_daily_demand: f64,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub optimal_stock: f64,
    pub status: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub items: Vec<StockLevels>,
    pub critical_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryManagement;

impl Feature for InventoryManagement {
    type Input = Vec<InventoryItem>;
    type Mapped = InventoryPlan;
    type Output = InventoryReport;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "inventory-management",
            title: "Inventory Management",
            description: "Optimize stock levels and reorder points",
            table_name: "inventory",
            api_endpoint: "inventory/optimize",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        let safety_days = params.f64_or("safety_days", 3.0)?;
        let review_period_days = params.f64_or("review_period_days", 10.0)?;
        if safety_days < 0.0 || review_period_days < 0.0 {
            return Err(AppError::mapping(
                "safety_days and review_period_days must not be negative",
            ));
        }
        Ok(InventoryPlan {
            items: input.clone(),
            safety_days,
            review_period_days,
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        let mut lines = vec![SummaryLine::new(
            "Items Needing Reorder",
            output.critical_count.to_string(),
        )];
        for item in &output.items {
            lines.push(SummaryLine::new(
                item.sku.clone(),
                format!(
                    "{} (stock {}, reorder at {}, optimal {})",
                    item.status, item.current_stock, item.reorder_point, item.optimal_stock
                ),
            ));
        }
        lines
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(FnStrategy::new("reorder-point", optimize)))
    }
}

fn classify(current: f64, reorder_point: f64, optimal_stock: f64) -> StockStatus {
    if current < reorder_point {
        StockStatus::Critical
    } else if current < (reorder_point + optimal_stock) / 2.0 {
        StockStatus::Low
    } else if current <= optimal_stock * 1.2 {
        StockStatus::Optimal
    } else {
        StockStatus::Overstocked
    }
}

/// Safety stock, reorder point and target level for each item.
pub fn optimize(plan: &InventoryPlan) -> Result<InventoryReport, AppError> {
    if plan.items.is_empty() {
        return Err(AppError::processing("no inventory items to optimize"));
    }

    let mut items = Vec::with_capacity(plan.items.len());
    for item in &plan.items {
        let label = format!("daily demand of {}", item.sku);
        let average = mean(&label, &item.daily_demand)?;
        ensure_finite("current stock", item.current_stock)?;
        ensure_finite("lead time", item.lead_time_days)?;

        let safety_stock = ensure_finite(
            &format!("safety stock of {}", item.sku),
            (average * plan.safety_days).ceil(),
        )?;
        let reorder_point = ensure_finite(
            &format!("reorder point of {}", item.sku),
            safety_stock + (average * item.lead_time_days).ceil(),
        )?;
        let optimal_stock = ensure_finite(
            &format!("optimal stock of {}", item.sku),
            reorder_point + (average * plan.review_period_days).ceil(),
        )?;

        items.push(StockLevels {
            sku: item.sku.clone(),
            name: item.name.clone(),
            current_stock: item.current_stock,
            average_daily_demand: round2(average),
            safety_stock,
            reorder_point,
            optimal_stock,
            status: classify(item.current_stock, reorder_point, optimal_stock),
        });
    }

    let critical_count = items
        .iter()
        .filter(|item| item.status == StockStatus::Critical)
        .count();
    Ok(InventoryReport {
        items,
        critical_count,
    })
}
