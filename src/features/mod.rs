#![allow(clippy::result_large_err)]

//! The six business features and their deterministic strategies.

pub mod forecasting;
pub mod inventory;
pub mod pricing;
pub mod reporting;
pub mod segmentation;
pub mod suppliers;

pub use forecasting::DemandForecasting;
pub use inventory::InventoryManagement;
pub use pricing::PricingStrategies;
pub use reporting::BusinessReporting;
pub use segmentation::CustomerSegmentation;
pub use suppliers::SupplierPerformance;

use crate::core::error::AppError;
use crate::core::pipeline::{ensure_finite, Feature, FeatureDescriptor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Tabular uploads accepted by the data-driven features.
pub(crate) const TABULAR_FILE_TYPES: &[&str] = &[".csv", ".json"];

/// Every built-in feature, addressable by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    BusinessReporting,
    DemandForecasting,
    InventoryManagement,
    PricingStrategies,
    CustomerSegmentation,
    SupplierPerformance,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 6] = [
        FeatureKind::BusinessReporting,
        FeatureKind::DemandForecasting,
        FeatureKind::InventoryManagement,
        FeatureKind::PricingStrategies,
        FeatureKind::CustomerSegmentation,
        FeatureKind::SupplierPerformance,
    ];

    pub fn descriptor(&self) -> FeatureDescriptor {
        match self {
            FeatureKind::BusinessReporting => BusinessReporting.descriptor(),
            FeatureKind::DemandForecasting => DemandForecasting.descriptor(),
            FeatureKind::InventoryManagement => InventoryManagement.descriptor(),
            FeatureKind::PricingStrategies => PricingStrategies.descriptor(),
            FeatureKind::CustomerSegmentation => CustomerSegmentation.descriptor(),
            FeatureKind::SupplierPerformance => SupplierPerformance.descriptor(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.descriptor().key
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_lowercase();
        FeatureKind::ALL
            .into_iter()
            .find(|kind| kind.key() == wanted)
            .ok_or_else(|| {
                let keys: Vec<&str> = FeatureKind::ALL.iter().map(FeatureKind::key).collect();
                format!("unknown feature '{}' (expected one of: {})", value, keys.join(", "))
            })
    }
}

pub fn descriptors() -> Vec<FeatureDescriptor> {
    FeatureKind::ALL.iter().map(FeatureKind::descriptor).collect()
}

/// Mean of `values`; fails on an empty slice or a non-finite result.
pub(crate) fn mean(label: &str, values: &[f64]) -> Result<f64, AppError> {
    if values.is_empty() {
        return Err(AppError::processing(format!("{} has no values", label)));
    }
    ensure_finite(label, values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Accepts a JSON array of numbers or a `;`/space separated string, so list
/// columns survive a CSV upload.
pub(crate) fn number_list<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<f64>),
        Text(String),
        Single(f64),
        Missing(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(values) => Ok(values),
        Raw::Single(value) => Ok(vec![value]),
        Raw::Missing(()) => Ok(Vec::new()),
        Raw::Text(text) => text
            .split(|c: char| c == ';' || c == '|' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<f64>()
                    .map_err(|_| serde::de::Error::custom(format!("'{}' is not a number", part)))
            })
            .collect(),
    }
}
