#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{ensure_finite, Feature, FeatureDescriptor, FnStrategy, MappingParams, ProcessingStrategy};
use crate::features::{round2, TABULAR_FILE_TYPES};
use bizflow_types::SummaryLine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    #[serde(default)]
    pub name: String,
    pub total_spend: f64,
    pub order_count: u64,
    pub days_since_last_order: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRules {
    pub customers: Vec<Customer>,
    pub high_value_spend: f64,
    pub loyal_orders: u64,
    pub churn_days: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    Loyal,
    Regular,
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl Segment {
    /// Reporting order for the segment table.
    pub const ORDER: [Segment; 4] = [
        Segment::Champions,
        Segment::Loyal,
        Segment::Regular,
        Segment::AtRisk,
    ];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::Regular => "Regular",
            Segment::AtRisk => "At Risk",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub customer_id: String,
    pub name: String,
    pub segment: Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment: Segment,
    pub customers: usize,
    pub total_spend: f64,
    pub average_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub assignments: Vec<Assignment>,
    pub segments: Vec<SegmentStats>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerSegmentation;

impl Feature for CustomerSegmentation {
    type Input = Vec<Customer>;
    type Mapped = SegmentationRules;
    type Output = SegmentationReport;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "customer-segmentation",
            title: "Customer Segmentation",
            description: "Group customers by value, loyalty and recency",
            table_name: "customers",
            api_endpoint: "customers/segment",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        Ok(SegmentationRules {
            customers: input.clone(),
            high_value_spend: params.f64_or("high_value_spend", 1000.0)?,
            loyal_orders: params.u64_or("loyal_orders", 10)?,
            churn_days: params.u64_or("churn_days", 90)?,
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        output
            .segments
            .iter()
            .map(|stats| {
                SummaryLine::new(
                    stats.segment.to_string(),
                    format!(
                        "{} customers, total {:.2}, average {:.2}",
                        stats.customers, stats.total_spend, stats.average_spend
                    ),
                )
            })
            .collect()
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(FnStrategy::new("rfm-rules", segment_customers)))
    }
}

fn classify(customer: &Customer, rules: &SegmentationRules) -> Segment {
    if customer.days_since_last_order > rules.churn_days {
        Segment::AtRisk
    } else if customer.total_spend >= rules.high_value_spend && customer.days_since_last_order <= 30 {
        Segment::Champions
    } else if customer.order_count >= rules.loyal_orders {
        Segment::Loyal
    } else {
        Segment::Regular
    }
}

pub fn segment_customers(rules: &SegmentationRules) -> Result<SegmentationReport, AppError> {
    if rules.customers.is_empty() {
        return Err(AppError::processing("no customers to segment"));
    }

    let mut assignments = Vec::with_capacity(rules.customers.len());
    for customer in &rules.customers {
        ensure_finite("total spend", customer.total_spend)?;
        assignments.push(Assignment {
            customer_id: customer.customer_id.clone(),
            name: customer.name.clone(),
            segment: classify(customer, rules),
        });
    }

    let mut segments = Vec::new();
    for segment in Segment::ORDER {
        let spends: Vec<f64> = rules
            .customers
            .iter()
            .zip(&assignments)
            .filter(|(_, assignment)| assignment.segment == segment)
            .map(|(customer, _)| customer.total_spend)
            .collect();
        if spends.is_empty() {
            continue;
        }
        let total = ensure_finite(&format!("total spend of {}", segment), spends.iter().sum())?;
        let average = ensure_finite(
            &format!("average spend of {}", segment),
            total / spends.len() as f64,
        )?;
        segments.push(SegmentStats {
            segment,
            customers: spends.len(),
            total_spend: round2(total),
            average_spend: round2(average),
        });
    }

    Ok(SegmentationReport {
        assignments,
        segments,
    })
}
