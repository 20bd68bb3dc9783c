#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{
    checked_ratio, ensure_finite, Feature, FeatureDescriptor, FnStrategy, MappingParams,
    ProcessingStrategy,
};
use crate::features::{round2, TABULAR_FILE_TYPES};
use bizflow_types::SummaryLine;
use chrono::{DateTime, Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// One dated row of sales and expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: String,
    pub sales: f64,
    pub expenses: f64,
    /// Defaults to `sales - expenses`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
}

impl SalesRecord {
    pub fn profit(&self) -> f64 {
        self.profit.unwrap_or(self.sales - self.expenses)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Summary,
    #[default]
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMapping {
    pub records: Vec<SalesRecord>,
    pub aggregation: Aggregation,
    pub report_type: ReportType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub period: String,
    pub sales: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_sales: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    /// Percent of sales kept as profit.
    pub profit_margin: f64,
    /// Percent change from the first half of the rows to the second.
    pub sales_growth: f64,
    pub expense_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessReport {
    pub summary: ReportSummary,
    pub aggregation: Aggregation,
    pub report_type: ReportType,
    /// Omitted for summary reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods: Option<Vec<PeriodTotals>>,
    pub top_periods: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessReporting;

impl Feature for BusinessReporting {
    type Input = Vec<SalesRecord>;
    type Mapped = ReportMapping;
    type Output = BusinessReport;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "business-reporting",
            title: "Business Reporting",
            description: "Generate comprehensive reports summarizing business performance",
            table_name: "business_reports",
            api_endpoint: "business-analytics",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        let aggregation = match params.str_or("aggregation", "monthly")?.as_str() {
            "daily" => Aggregation::Daily,
            "weekly" => Aggregation::Weekly,
            "monthly" => Aggregation::Monthly,
            other => {
                return Err(AppError::mapping(format!(
                    "aggregation must be daily, weekly or monthly, got '{}'",
                    other
                )))
            }
        };
        let report_type = match params.str_or("report_type", "detailed")?.as_str() {
            "summary" => ReportType::Summary,
            "detailed" => ReportType::Detailed,
            other => {
                return Err(AppError::mapping(format!(
                    "report_type must be summary or detailed, got '{}'",
                    other
                )))
            }
        };
        Ok(ReportMapping {
            records: input.clone(),
            aggregation,
            report_type,
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        let summary = &output.summary;
        let mut lines = vec![
            SummaryLine::new("Total Sales", format!("{:.2}", summary.total_sales)),
            SummaryLine::new("Total Expenses", format!("{:.2}", summary.total_expenses)),
            SummaryLine::new("Total Profit", format!("{:.2}", summary.total_profit)),
            SummaryLine::new("Profit Margin", format!("{:.2}%", summary.profit_margin)),
            SummaryLine::new("Sales Growth", format!("{:+.2}%", summary.sales_growth)),
            SummaryLine::new("Expense Growth", format!("{:+.2}%", summary.expense_growth)),
        ];
        if let Some(periods) = &output.periods {
            for period in periods {
                lines.push(SummaryLine::new(
                    period.period.clone(),
                    format!(
                        "sales {:.2}, expenses {:.2}, profit {:.2}",
                        period.sales, period.expenses, period.profit
                    ),
                ));
            }
        }
        for (rank, period) in output.top_periods.iter().enumerate() {
            lines.push(SummaryLine::new(
                format!("Top #{}", rank + 1),
                format!("{} (profit {:.2})", period.period, period.profit),
            ));
        }
        lines
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(FnStrategy::new("business-reporting", build_report)))
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
}

fn period_key(date: NaiveDate, aggregation: Aggregation) -> String {
    match aggregation {
        Aggregation::Daily => date.format("%Y-%m-%d").to_string(),
        Aggregation::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Aggregation::Monthly => date.format("%b %Y").to_string(),
    }
}

fn growth(first: f64, second: f64) -> f64 {
    if first > 0.0 {
        (second - first) / first * 100.0
    } else {
        0.0
    }
}

fn half_sum(rows: &[(NaiveDate, &SalesRecord)], pick: fn(&SalesRecord) -> f64) -> f64 {
    rows.iter().map(|(_, record)| pick(record)).sum()
}

/// Aggregate the rows into totals, per-period figures and top performers.
pub fn build_report(mapping: &ReportMapping) -> Result<BusinessReport, AppError> {
    if mapping.records.is_empty() {
        return Err(AppError::processing("no business records to report on"));
    }

    let mut dated = Vec::with_capacity(mapping.records.len());
    for record in &mapping.records {
        let date = parse_date(&record.date).ok_or_else(|| {
            AppError::processing(format!("'{}' is not a recognizable date", record.date))
        })?;
        ensure_finite("sales", record.sales)?;
        ensure_finite("expenses", record.expenses)?;
        ensure_finite("profit", record.profit())?;
        dated.push((date, record));
    }
    dated.sort_by_key(|(date, _)| *date);

    let mut periods: IndexMap<String, PeriodTotals> = IndexMap::new();
    for (date, record) in &dated {
        let key = period_key(*date, mapping.aggregation);
        let totals = periods.entry(key.clone()).or_insert_with(|| PeriodTotals {
            period: key,
            sales: 0.0,
            expenses: 0.0,
            profit: 0.0,
        });
        totals.sales += record.sales;
        totals.expenses += record.expenses;
        totals.profit += record.profit();
    }

    let total_sales: f64 = dated.iter().map(|(_, r)| r.sales).sum();
    let total_expenses: f64 = dated.iter().map(|(_, r)| r.expenses).sum();
    let total_profit: f64 = dated.iter().map(|(_, r)| r.profit()).sum();
    let profit_margin = checked_ratio("profit margin", total_profit, total_sales)? * 100.0;

    let midpoint = dated.len() / 2;
    let (first, second) = dated.split_at(midpoint);
    let sales_growth = growth(half_sum(first, |r| r.sales), half_sum(second, |r| r.sales));
    let expense_growth = growth(half_sum(first, |r| r.expenses), half_sum(second, |r| r.expenses));

    let summary = ReportSummary {
        total_sales: ensure_finite("total sales", total_sales)?,
        total_expenses: ensure_finite("total expenses", total_expenses)?,
        total_profit: ensure_finite("total profit", total_profit)?,
        profit_margin: round2(ensure_finite("profit margin", profit_margin)?),
        sales_growth: round2(ensure_finite("sales growth", sales_growth)?),
        expense_growth: round2(ensure_finite("expense growth", expense_growth)?),
    };

    let periods: Vec<PeriodTotals> = periods.into_values().collect();
    let mut top_periods = periods.clone();
    top_periods.sort_by(|a, b| b.profit.partial_cmp(&a.profit).unwrap_or(Ordering::Equal));
    top_periods.truncate(3);

    Ok(BusinessReport {
        summary,
        aggregation: mapping.aggregation,
        report_type: mapping.report_type,
        periods: match mapping.report_type {
            ReportType::Detailed => Some(periods),
            ReportType::Summary => None,
        },
        top_periods,
    })
}
