#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use async_trait::async_trait;

/// Turns mapped data into a result. Implementations must not mutate shared
/// state and must fail with a `ProcessingError` rather than produce
/// non-finite numbers.
#[async_trait]
pub trait ProcessingStrategy<M, R>: Send + Sync {
    fn name(&self) -> &str {
        "custom"
    }

    async fn process(&self, mapped: &M) -> Result<R, AppError>;
}

/// Adapter turning a synchronous pure function into a strategy.
pub struct FnStrategy<F> {
    name: String,
    func: F,
}

impl<F> FnStrategy<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<M, R, F> ProcessingStrategy<M, R> for FnStrategy<F>
where
    M: Sync,
    R: Send,
    F: Fn(&M) -> Result<R, AppError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, mapped: &M) -> Result<R, AppError> {
        (self.func)(mapped)
    }
}

/// Fails with a `ProcessingError` naming `label` when `value` is NaN or infinite.
pub fn ensure_finite(label: &str, value: f64) -> Result<f64, AppError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AppError::processing(format!(
            "{} is not a finite number ({})",
            label, value
        )))
    }
}

/// Divides, failing on a zero or non-finite denominator.
pub fn checked_ratio(label: &str, numerator: f64, denominator: f64) -> Result<f64, AppError> {
    if denominator == 0.0 {
        return Err(AppError::processing(format!(
            "cannot compute {}: denominator is zero",
            label
        )));
    }
    ensure_finite(label, numerator / denominator)
}
