#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::{
    checked_ratio, ensure_finite, Feature, FeatureDescriptor, FnStrategy, MappingParams,
    ProcessingStrategy,
};
use crate::features::{mean, round2, TABULAR_FILE_TYPES};
use bizflow_types::SummaryLine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_HORIZON: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    /// Free-form label, kept only for display.
    #[serde(default)]
    pub period: String,
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub history: Vec<f64>,
    pub periods: u64,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub frequency: Frequency,
    pub forecast: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub mean_absolute_error: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DemandForecasting;

impl Feature for DemandForecasting {
    type Input = Vec<DemandPoint>;
    type Mapped = ForecastRequest;
    type Output = Forecast;

    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            key: "demand-forecasting",
            title: "Demand Forecasting",
            description: "Predict future demand from historical sales data",
            table_name: "forecasts",
            api_endpoint: "forecasting/timeseries",
            allowed_file_types: TABULAR_FILE_TYPES,
        }
    }

    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError> {
        let periods = params.u64_or("periods", 5)?;
        if !(1..=MAX_HORIZON).contains(&periods) {
            return Err(AppError::mapping(format!(
                "periods must be between 1 and {}, got {}",
                MAX_HORIZON, periods
            )));
        }
        let frequency = match params.str_or("frequency", "daily")?.as_str() {
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            other => {
                return Err(AppError::mapping(format!(
                    "frequency must be daily, weekly or monthly, got '{}'",
                    other
                )))
            }
        };
        Ok(ForecastRequest {
            history: input.iter().map(|point| point.demand).collect(),
            periods,
            frequency,
        })
    }

    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine> {
        let mut lines = vec![
            SummaryLine::new("Trend", format!("{:+.2} per period", output.slope)),
            SummaryLine::new("Intercept", format!("{:.2}", output.intercept)),
            SummaryLine::new("Mean Absolute Error", format!("{:.2}", output.mean_absolute_error)),
        ];
        lines.extend(
            output
                .forecast
                .iter()
                .enumerate()
                .map(|(step, value)| SummaryLine::new(format!("t+{}", step + 1), format!("{:.2}", value))),
        );
        lines
    }

    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        Some(Arc::new(FnStrategy::new("linear-trend", forecast)))
    }
}

/// Least-squares trend over the history, projected `periods` steps ahead.
pub fn forecast(request: &ForecastRequest) -> Result<Forecast, AppError> {
    let history = &request.history;
    if history.len() < 2 {
        return Err(AppError::processing(
            "forecasting needs at least 2 historical points",
        ));
    }
    for value in history {
        ensure_finite("demand", *value)?;
    }

    let xs: Vec<f64> = (0..history.len()).map(|i| i as f64).collect();
    let x_mean = mean("period index", &xs)?;
    let y_mean = mean("demand", history)?;
    let covariance: f64 = xs
        .iter()
        .zip(history)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let variance: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let slope = checked_ratio("slope", covariance, variance)?;
    let intercept = ensure_finite("intercept", y_mean - slope * x_mean)?;

    let errors: Vec<f64> = xs
        .iter()
        .zip(history)
        .map(|(x, y)| (y - (intercept + slope * x)).abs())
        .collect();
    let mean_absolute_error = mean("mean absolute error", &errors)?;

    let start = history.len() as u64;
    let forecast = (start..start + request.periods)
        .map(|step| round2((intercept + slope * step as f64).max(0.0)))
        .collect();

    Ok(Forecast {
        frequency: request.frequency,
        forecast,
        slope: round2(slope),
        intercept: round2(intercept),
        mean_absolute_error: round2(mean_absolute_error),
    })
}
