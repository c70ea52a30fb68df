//! Demand prediction: applies elasticities and seasonality to the
//! most recent known period.
//!
//!   predicted = baseline_demand
//!             × seasonality(target_period)
//!             × (1 + Δprice)^e_price
//!             × (1 + Δadvertising)^e_advertising
//!
//! where Δ = (new − old) / old against the current period's observed value.
//!
//! Local fallbacks never abort the batch; each is recorded as a
//! `PredictionIssue` on the returned table.

use crate::{
    config::PredictorConfig,
    decision::{DecisionVector, ScenarioSet},
    error::{ForecastError, ForecastResult},
    estimator::ElasticityTable,
    history::{MarketObservation, PeriodRecord},
    seasonality::SeasonalityProfile,
    types::{Driver, Period, ProductMarket},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub scenario:           Option<String>,
    pub key:                ProductMarket,
    pub baseline_demand:    f64,
    pub predicted_demand:   f64,
    pub seasonality_factor: f64,
    pub price_effect:       f64,
    pub advertising_effect: f64,
}

/// Where a (product, market) pair was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSource {
    CurrentPeriod,
    Decisions,
    Elasticities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PredictionIssue {
    /// Historical driver value was zero; effect forced to 1.0.
    ZeroBaseline {
        scenario: Option<String>,
        key:      ProductMarket,
        driver:   Driver,
    },
    /// Row omitted.
    MissingKey {
        scenario: Option<String>,
        key:      ProductMarket,
        source:   MissingSource,
    },
    /// Effect exceeded the configured cap. `raw` is `None` when the
    /// unclamped effect was not finite (e.g. a zero price under e < 0).
    EffectClamped {
        scenario: Option<String>,
        key:      ProductMarket,
        driver:   Driver,
        raw:      Option<f64>,
        clamped:  f64,
    },
}

impl PredictionIssue {
    pub fn key(&self) -> &ProductMarket {
        match self {
            Self::ZeroBaseline { key, .. }
            | Self::MissingKey { key, .. }
            | Self::EffectClamped { key, .. } => key,
        }
    }

    pub fn scenario(&self) -> Option<&str> {
        match self {
            Self::ZeroBaseline { scenario, .. }
            | Self::MissingKey { scenario, .. }
            | Self::EffectClamped { scenario, .. } => scenario.as_deref(),
        }
    }

    fn set_scenario(&mut self, name: &str) {
        match self {
            Self::ZeroBaseline { scenario, .. }
            | Self::MissingKey { scenario, .. }
            | Self::EffectClamped { scenario, .. } => *scenario = Some(name.to_string()),
        }
    }
}

/// Flat export row. Column set is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub scenario:           Option<String>,
    pub product:            String,
    pub market:             String,
    pub predicted_demand:   f64,
    pub seasonality_factor: f64,
    pub price_effect:       f64,
    pub advertising_effect: f64,
    pub baseline_demand:    f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTable {
    rows:   Vec<PredictionRecord>,
    issues: Vec<PredictionIssue>,
}

impl PredictionTable {
    /// Rows ordered by scenario, then product, then market.
    pub fn rows(&self) -> &[PredictionRecord] {
        &self.rows
    }

    pub fn issues(&self) -> &[PredictionIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, scenario: Option<&str>, key: &ProductMarket) -> Option<&PredictionRecord> {
        self.rows
            .iter()
            .find(|r| r.scenario.as_deref() == scenario && &r.key == key)
    }

    pub fn scenario_names(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if let Some(name) = &row.scenario {
                if !seen.contains(name) {
                    seen.push(name.clone());
                }
            }
        }
        seen
    }

    pub fn export_rows(&self) -> Vec<PredictionRow> {
        self.rows
            .iter()
            .map(|r| PredictionRow {
                scenario:           r.scenario.clone(),
                product:            r.key.product.clone(),
                market:             r.key.market.clone(),
                predicted_demand:   r.predicted_demand,
                seasonality_factor: r.seasonality_factor,
                price_effect:       r.price_effect,
                advertising_effect: r.advertising_effect,
                baseline_demand:    r.baseline_demand,
            })
            .collect()
    }

    fn tag(&mut self, name: &str) {
        for row in &mut self.rows {
            row.scenario = Some(name.to_string());
        }
        for issue in &mut self.issues {
            issue.set_scenario(name);
        }
    }

    fn append(&mut self, mut other: PredictionTable) {
        self.rows.append(&mut other.rows);
        self.issues.append(&mut other.issues);
    }
}

pub struct DemandPredictor {
    elasticities: ElasticityTable,
    seasonality:  SeasonalityProfile,
    config:       PredictorConfig,
}

impl DemandPredictor {
    pub fn new(
        elasticities: ElasticityTable,
        seasonality: SeasonalityProfile,
        config: PredictorConfig,
    ) -> Self {
        Self {
            elasticities,
            seasonality,
            config,
        }
    }

    pub fn seasonality_factor(&self, period: Period) -> f64 {
        self.seasonality.factor(period)
    }

    /// Predict demand for `target_period` from `current` under `decisions`.
    pub fn predict_demand(
        &self,
        current: &PeriodRecord,
        decisions: &DecisionVector,
        target_period: Period,
    ) -> ForecastResult<PredictionTable> {
        if target_period <= current.period {
            return Err(ForecastError::InvalidTargetPeriod {
                current: current.period,
                target:  target_period,
            });
        }
        decisions.validate()?;

        for key in decisions.prices.keys().chain(decisions.advertising.keys()) {
            if current.observation(key).is_none() && self.elasticities.get(key, Driver::Price).is_none() {
                log::warn!("period={target_period} predictor: decision for unknown pair {key} ignored");
            }
        }

        let seasonality = self.seasonality.factor(target_period);
        let mut keys: BTreeSet<ProductMarket> = current.keys().cloned().collect();
        keys.extend(self.elasticities.keys());

        let mut table = PredictionTable::default();
        for key in keys {
            match self.predict_row(current, decisions, &key, seasonality, &mut table.issues) {
                Ok(row) => table.rows.push(row),
                Err(source) => {
                    log::warn!("period={target_period} predictor: {key} missing from {source:?}, row omitted");
                    table.issues.push(PredictionIssue::MissingKey {
                        scenario: None,
                        key,
                        source,
                    });
                }
            }
        }

        log::debug!(
            "period={target_period} predictor: {} rows, {} issues, seasonality={seasonality:.3}",
            table.rows.len(),
            table.issues.len()
        );
        Ok(table)
    }

    /// Evaluate every scenario independently against the same baseline.
    /// The baseline decisions are only borrowed; each scenario works on
    /// its own merged copy.
    pub fn predict_with_scenarios(
        &self,
        current: &PeriodRecord,
        decisions: &DecisionVector,
        scenarios: &ScenarioSet,
        target_period: Period,
    ) -> ForecastResult<PredictionTable> {
        let mut out = PredictionTable::default();
        for (name, overrides) in scenarios {
            let merged = decisions.merged(overrides);
            let mut table = self.predict_demand(current, &merged, target_period)?;
            table.tag(name);
            out.append(table);
        }
        log::info!(
            "period={target_period} predictor: evaluated {} scenarios ({} rows)",
            scenarios.len(),
            out.rows.len()
        );
        Ok(out)
    }

    fn predict_row(
        &self,
        current: &PeriodRecord,
        decisions: &DecisionVector,
        key: &ProductMarket,
        seasonality: f64,
        issues: &mut Vec<PredictionIssue>,
    ) -> Result<PredictionRecord, MissingSource> {
        let obs = current.observation(key).ok_or(MissingSource::CurrentPeriod)?;

        let mut inputs = Vec::with_capacity(Driver::ALL.len());
        for driver in Driver::ALL {
            let elasticity = self
                .elasticities
                .coefficient(key, driver)
                .ok_or(MissingSource::Elasticities)?;
            let proposed = decisions
                .driver_value(key, driver)
                .ok_or(MissingSource::Decisions)?;
            inputs.push((driver, elasticity, proposed));
        }

        let mut price_effect = 1.0;
        let mut advertising_effect = 1.0;
        for (driver, elasticity, proposed) in inputs {
            let effect = self.driver_effect(obs, key, driver, elasticity, proposed, issues);
            match driver {
                Driver::Price       => price_effect = effect,
                Driver::Advertising => advertising_effect = effect,
            }
        }

        let predicted = (obs.demand * seasonality * price_effect * advertising_effect).max(0.0);

        Ok(PredictionRecord {
            scenario:           None,
            key:                key.clone(),
            baseline_demand:    obs.demand,
            predicted_demand:   predicted,
            seasonality_factor: seasonality,
            price_effect,
            advertising_effect,
        })
    }

    /// (1 + Δ)^e, guarded against a zero historical value and capped.
    fn driver_effect(
        &self,
        obs: &MarketObservation,
        key: &ProductMarket,
        driver: Driver,
        elasticity: f64,
        proposed: f64,
        issues: &mut Vec<PredictionIssue>,
    ) -> f64 {
        let observed = obs.driver_value(driver);
        let delta = (proposed - observed) / observed;
        if observed == 0.0 || !delta.is_finite() {
            log::warn!("pair={key} predictor: historical {driver} is zero, effect set to 1");
            issues.push(PredictionIssue::ZeroBaseline {
                scenario: None,
                key: key.clone(),
                driver,
            });
            return 1.0;
        }

        let raw = (1.0 + delta).powf(elasticity);
        let cap = self.config.max_effect_multiplier;
        if raw.is_finite() && raw <= cap {
            return raw.max(0.0);
        }

        log::warn!("pair={key} predictor: {driver} effect {raw} exceeds cap {cap}, clamped");
        issues.push(PredictionIssue::EffectClamped {
            scenario: None,
            key: key.clone(),
            driver,
            raw: raw.is_finite().then_some(raw),
            clamped: cap,
        });
        cap
    }
}
