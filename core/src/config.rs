use crate::{
    decision::ScenarioTemplate,
    error::{ForecastError, ForecastResult},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Fewer periods than this is reported as InsufficientHistory. Never below 2.
    pub min_periods: usize,
    /// Joint fits on fewer observations are flagged low-sample.
    pub min_reliable_samples: usize,
    /// Only the most recent N periods are used in a fit.
    pub max_sample_size: usize,
    /// Coefficient substituted when a driver cannot be estimated.
    pub fallback_coefficient: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_periods:          2,
            min_reliable_samples: 4,
            max_sample_size:      64,
            fallback_coefficient: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Upper bound on any single driver's effect multiplier.
    pub max_effect_multiplier: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self { max_effect_multiplier: 10.0 }
    }
}

/// Cyclical demand multipliers.
/// `indices[i]` applies to every period `p` with `p % indices.len() == i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    pub indices: Vec<f64>,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        // Neutral quarterly cycle; real profiles come from forecast_config.json.
        Self { indices: vec![1.0, 1.0, 1.0, 1.0] }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub estimator:   EstimatorConfig,
    pub predictor:   PredictorConfig,
    pub seasonality: SeasonalityConfig,
    pub scenarios:   Vec<ScenarioTemplate>,
}

impl ForecastConfig {
    /// Load from `{data_dir}/forecast_config.json`.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/forecast_config.json");
        if !std::path::Path::new(&path).exists() {
            log::info!("config: {path} not found, using defaults");
            let config = Self::with_standard_scenarios();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ForecastConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus the ±5% price scenarios.
    pub fn with_standard_scenarios() -> Self {
        Self {
            scenarios: vec![
                ScenarioTemplate::price_scale("price_minus_5pct", 0.95),
                ScenarioTemplate::price_scale("price_plus_5pct", 1.05),
            ],
            ..Self::default()
        }
    }

    /// Config with hardcoded values for use in tests.
    /// Uses a non-neutral quarterly profile so seasonality is observable.
    pub fn default_test() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            predictor: PredictorConfig::default(),
            seasonality: SeasonalityConfig {
                indices: vec![1.10, 0.90, 0.95, 1.05],
            },
            scenarios: vec![
                ScenarioTemplate::price_scale("price_minus_5pct", 0.95),
                ScenarioTemplate::price_scale("price_plus_5pct", 1.05),
            ],
        }
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.estimator.min_periods < 2 {
            return Err(ForecastError::Config(format!(
                "estimator.min_periods must be at least 2, got {}",
                self.estimator.min_periods
            )));
        }
        if self.estimator.max_sample_size < self.estimator.min_periods {
            return Err(ForecastError::Config(format!(
                "estimator.max_sample_size ({}) must be >= min_periods ({})",
                self.estimator.max_sample_size, self.estimator.min_periods
            )));
        }
        if !self.estimator.fallback_coefficient.is_finite() {
            return Err(ForecastError::Config(
                "estimator.fallback_coefficient must be finite".into(),
            ));
        }
        if !(self.predictor.max_effect_multiplier.is_finite()
            && self.predictor.max_effect_multiplier > 0.0)
        {
            return Err(ForecastError::Config(format!(
                "predictor.max_effect_multiplier must be positive, got {}",
                self.predictor.max_effect_multiplier
            )));
        }
        if self.seasonality.indices.is_empty() {
            return Err(ForecastError::Config(
                "seasonality.indices must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .seasonality
            .indices
            .iter()
            .find(|v| !(v.is_finite() && **v > 0.0))
        {
            return Err(ForecastError::Config(format!(
                "seasonality indices must be positive, got {bad}"
            )));
        }
        for template in &self.scenarios {
            template.validate()?;
        }
        Ok(())
    }
}
