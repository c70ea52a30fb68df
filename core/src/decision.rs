//! Decision vectors, scenario overrides, and the caller-supplied plan
//! that builds next-period decisions.
//!
//! Unknown-key policy: entries naming a (product, market) pair that the
//! current period does not carry are ignored and logged at warn level.
//! Company-level fields (management budget, training days) are carried
//! through unchanged; demand prediction does not read them.

use crate::{
    error::{ForecastError, ForecastResult},
    history::PeriodRecord,
    types::{Driver, ProductMarket},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proposed next-period inputs. The engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecisionVector {
    pub prices:            BTreeMap<ProductMarket, f64>,
    pub advertising:       BTreeMap<ProductMarket, f64>,
    pub management_budget: Option<f64>,
    pub training_days:     Option<f64>,
}

impl DecisionVector {
    /// Carry forward every decision observed in `record`.
    pub fn from_period(record: &PeriodRecord) -> Self {
        Self {
            prices: record
                .observations
                .iter()
                .map(|(k, o)| (k.clone(), o.price))
                .collect(),
            advertising: record
                .observations
                .iter()
                .map(|(k, o)| (k.clone(), o.advertising))
                .collect(),
            management_budget: record.management_budget,
            training_days:     record.training_days,
        }
    }

    pub fn driver_value(&self, key: &ProductMarket, driver: Driver) -> Option<f64> {
        match driver {
            Driver::Price       => self.prices.get(key).copied(),
            Driver::Advertising => self.advertising.get(key).copied(),
        }
    }

    pub fn set(&mut self, key: ProductMarket, driver: Driver, value: f64) {
        match driver {
            Driver::Price       => self.prices.insert(key, value),
            Driver::Advertising => self.advertising.insert(key, value),
        };
    }

    /// A copy of `self` with `overrides` merged on top.
    /// Keys not named by the override keep their values.
    pub fn merged(&self, overrides: &ScenarioOverride) -> Self {
        let mut merged = self.clone();
        for (key, value) in &overrides.prices {
            merged.prices.insert(key.clone(), *value);
        }
        for (key, value) in &overrides.advertising {
            merged.advertising.insert(key.clone(), *value);
        }
        if overrides.management_budget.is_some() {
            merged.management_budget = overrides.management_budget;
        }
        if overrides.training_days.is_some() {
            merged.training_days = overrides.training_days;
        }
        merged
    }

    /// Every driver value must be a finite, non-negative number.
    pub fn validate(&self) -> ForecastResult<()> {
        for (driver, values) in [
            (Driver::Price, &self.prices),
            (Driver::Advertising, &self.advertising),
        ] {
            for (key, value) in values {
                if !value.is_finite() || *value < 0.0 {
                    return Err(ForecastError::MalformedInput(format!(
                        "decision {driver} for {key} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Partial decision vector applied on top of the baseline for one scenario.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioOverride {
    pub prices:            BTreeMap<ProductMarket, f64>,
    pub advertising:       BTreeMap<ProductMarket, f64>,
    pub management_budget: Option<f64>,
    pub training_days:     Option<f64>,
}

impl ScenarioOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(mut self, key: ProductMarket, value: f64) -> Self {
        self.prices.insert(key, value);
        self
    }

    pub fn advertising(mut self, key: ProductMarket, value: f64) -> Self {
        self.advertising.insert(key, value);
        self
    }
}

/// Scenario name → override. Iterated in name order.
pub type ScenarioSet = BTreeMap<String, ScenarioOverride>;

// ── Configuration forms ────────────────────────────────────────────

/// One planned value. `product: None` applies to every product in `market`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedValue {
    #[serde(default)]
    pub product: Option<String>,
    pub market:  String,
    pub value:   f64,
}

impl PlannedValue {
    fn matches(&self, key: &ProductMarket) -> bool {
        key.market == self.market
            && self.product.as_deref().map_or(true, |p| p == key.product)
    }
}

/// Next-period strategy supplied by the caller (decisions.json).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionPlan {
    pub prices:            Vec<PlannedValue>,
    pub advertising:       Vec<PlannedValue>,
    pub management_budget: Option<f64>,
    pub training_days:     Option<f64>,
}

impl DecisionPlan {
    /// Load from `{data_dir}/decisions.json`; a missing file means
    /// "carry every decision forward".
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/decisions.json");
        if !std::path::Path::new(&path).exists() {
            log::info!("decisions: {path} not found, carrying current decisions forward");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build the next-period decision vector: the current period's
    /// observed decisions, overridden by every planned value.
    pub fn apply(&self, current: &PeriodRecord) -> DecisionVector {
        let mut decisions = DecisionVector::from_period(current);

        for (driver, planned) in [
            (Driver::Price, &self.prices),
            (Driver::Advertising, &self.advertising),
        ] {
            for pv in planned {
                let targets: Vec<ProductMarket> =
                    current.keys().filter(|k| pv.matches(k)).cloned().collect();
                if targets.is_empty() {
                    log::warn!(
                        "decisions: planned {driver} for {}/{} matches no known pair, ignored",
                        pv.product.as_deref().unwrap_or("*"),
                        pv.market
                    );
                }
                for key in targets {
                    decisions.set(key, driver, pv.value);
                }
            }
        }

        if self.management_budget.is_some() {
            decisions.management_budget = self.management_budget;
        }
        if self.training_days.is_some() {
            decisions.training_days = self.training_days;
        }
        decisions
    }
}

/// Scenario expressed as proportional changes to the baseline decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub name: String,
    #[serde(default)]
    pub price_scale: Option<f64>,
    #[serde(default)]
    pub advertising_scale: Option<f64>,
    /// Restrict to these products; `None` = all products.
    #[serde(default)]
    pub products: Option<Vec<String>>,
}

impl ScenarioTemplate {
    pub fn price_scale(name: impl Into<String>, scale: f64) -> Self {
        Self {
            name:              name.into(),
            price_scale:       Some(scale),
            advertising_scale: None,
            products:          None,
        }
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.name.trim().is_empty() {
            return Err(ForecastError::Config("scenario name must not be empty".into()));
        }
        for scale in [self.price_scale, self.advertising_scale].into_iter().flatten() {
            if !(scale.is_finite() && scale >= 0.0) {
                return Err(ForecastError::Config(format!(
                    "scenario '{}': scale must be a non-negative number, got {scale}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn applies_to(&self, key: &ProductMarket) -> bool {
        self.products
            .as_ref()
            .map_or(true, |ps| ps.iter().any(|p| *p == key.product))
    }

    /// Turn the template into concrete overrides against `baseline`.
    pub fn expand(&self, baseline: &DecisionVector) -> ScenarioOverride {
        let mut out = ScenarioOverride::new();
        if let Some(scale) = self.price_scale {
            for (key, value) in &baseline.prices {
                if self.applies_to(key) {
                    out.prices.insert(key.clone(), value * scale);
                }
            }
        }
        if let Some(scale) = self.advertising_scale {
            for (key, value) in &baseline.advertising {
                if self.applies_to(key) {
                    out.advertising.insert(key.clone(), value * scale);
                }
            }
        }
        out
    }

    /// Expand every template; duplicate names are rejected.
    pub fn expand_all(
        templates: &[ScenarioTemplate],
        baseline: &DecisionVector,
    ) -> ForecastResult<ScenarioSet> {
        let mut set = ScenarioSet::new();
        for template in templates {
            template.validate()?;
            if set.insert(template.name.clone(), template.expand(baseline)).is_some() {
                return Err(ForecastError::Config(format!(
                    "duplicate scenario name '{}'",
                    template.name
                )));
            }
        }
        Ok(set)
    }
}
