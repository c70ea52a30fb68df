//! Seasonality: a fixed cyclical multiplier per period.

use crate::{
    config::SeasonalityConfig,
    error::{ForecastError, ForecastResult},
    types::Period,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalityProfile {
    indices: Vec<f64>,
}

impl SeasonalityProfile {
    pub fn new(indices: Vec<f64>) -> ForecastResult<Self> {
        if indices.is_empty() {
            return Err(ForecastError::Config("seasonality needs at least one index".into()));
        }
        if let Some(bad) = indices.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(ForecastError::Config(format!(
                "seasonality indices must be positive, got {bad}"
            )));
        }
        Ok(Self { indices })
    }

    pub fn from_config(config: &SeasonalityConfig) -> ForecastResult<Self> {
        Self::new(config.indices.clone())
    }

    /// No seasonal variation.
    pub fn flat() -> Self {
        Self { indices: vec![1.0] }
    }

    pub fn cycle_length(&self) -> usize {
        self.indices.len()
    }

    /// Multiplier for `period`. Total over all periods; repeats every cycle.
    pub fn factor(&self, period: Period) -> f64 {
        self.indices[period as usize % self.indices.len()]
    }
}
