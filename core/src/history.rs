//! Historical ledger: one validated record per simulation period.
//!
//! RULE: The estimator and predictor only ever see a `HistoryTable`.
//! Anything that produces periods (report ingestion, JSON ledgers, the
//! synthetic generator) goes through `HistoryTable::new`, which enforces
//! ordering and key consistency once, up front.

use crate::{
    error::{ForecastError, ForecastResult},
    types::{Driver, Period, ProductMarket},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Observed decisions and outcome for one (product, market) pair in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    pub price:       f64,
    pub advertising: f64,
    /// Units sold.
    pub demand:      f64,
    /// Derived features (price_index, ad_share, demand_growth, ...).
    #[serde(default)]
    pub features:    BTreeMap<String, f64>,
}

impl MarketObservation {
    pub fn new(price: f64, advertising: f64, demand: f64) -> Self {
        Self {
            price,
            advertising,
            demand,
            features: BTreeMap::new(),
        }
    }

    pub fn driver_value(&self, driver: Driver) -> f64 {
        match driver {
            Driver::Price       => self.price,
            Driver::Advertising => self.advertising,
        }
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    pub period:            Period,
    pub observations:      BTreeMap<ProductMarket, MarketObservation>,
    pub management_budget: Option<f64>,
    pub training_days:     Option<f64>,
}

impl PeriodRecord {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            observations:      BTreeMap::new(),
            management_budget: None,
            training_days:     None,
        }
    }

    pub fn with_observation(mut self, key: ProductMarket, obs: MarketObservation) -> Self {
        self.observations.insert(key, obs);
        self
    }

    pub fn observation(&self, key: &ProductMarket) -> Option<&MarketObservation> {
        self.observations.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ProductMarket> {
        self.observations.keys()
    }

    fn validate(&self) -> ForecastResult<()> {
        for (key, obs) in &self.observations {
            for (field, value) in [
                ("price", obs.price),
                ("advertising", obs.advertising),
                ("demand", obs.demand),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ForecastError::MalformedInput(format!(
                        "period {} {key}: {field} must be a non-negative number, got {value}",
                        self.period
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Ordered, validated time series of period records.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTable {
    periods: Vec<PeriodRecord>,
}

impl HistoryTable {
    /// Validate and wrap a period sequence.
    ///
    /// Periods must be strictly ascending and every period must carry the
    /// same, non-empty set of (product, market) keys.
    pub fn new(periods: Vec<PeriodRecord>) -> ForecastResult<Self> {
        for pair in periods.windows(2) {
            if pair[1].period <= pair[0].period {
                return Err(ForecastError::MalformedInput(format!(
                    "periods must be strictly ascending: {} followed by {}",
                    pair[0].period, pair[1].period
                )));
            }
        }

        if let Some(first) = periods.first() {
            if first.observations.is_empty() {
                return Err(ForecastError::MalformedInput(format!(
                    "period {} has no product/market observations",
                    first.period
                )));
            }
            let expected: BTreeSet<&ProductMarket> = first.keys().collect();
            for record in &periods {
                let keys: BTreeSet<&ProductMarket> = record.keys().collect();
                if keys != expected {
                    return Err(ForecastError::MalformedInput(format!(
                        "period {} key set differs from period {}",
                        record.period, first.period
                    )));
                }
                record.validate()?;
            }
        }

        Ok(Self { periods })
    }

    pub fn periods(&self) -> &[PeriodRecord] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Most recent known state.
    pub fn latest(&self) -> Option<&PeriodRecord> {
        self.periods.last()
    }

    pub fn keys(&self) -> Vec<ProductMarket> {
        self.periods
            .first()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Observations for one pair, oldest first.
    pub fn series(&self, key: &ProductMarket) -> Vec<(Period, &MarketObservation)> {
        self.periods
            .iter()
            .filter_map(|p| p.observation(key).map(|o| (p.period, o)))
            .collect()
    }

    pub(crate) fn periods_mut(&mut self) -> &mut [PeriodRecord] {
        &mut self.periods
    }
}

/// The trusted tabular source the core depends on.
/// Implementations produce a validated, ascending period sequence.
pub trait HistorySource {
    fn load(&self) -> ForecastResult<HistoryTable>;
}

// ── JSON ledger ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product:     String,
    pub market:      String,
    pub price:       f64,
    pub advertising: f64,
    pub demand:      f64,
    #[serde(default)]
    pub features:    BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPeriod {
    pub period: Period,
    #[serde(default)]
    pub management_budget: Option<f64>,
    #[serde(default)]
    pub training_days: Option<f64>,
    pub observations: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerFile {
    pub periods: Vec<LedgerPeriod>,
}

impl LedgerFile {
    pub fn into_history(self) -> ForecastResult<HistoryTable> {
        let mut periods: Vec<PeriodRecord> = Vec::with_capacity(self.periods.len());
        for lp in self.periods {
            let mut record = PeriodRecord::new(lp.period);
            record.management_budget = lp.management_budget;
            record.training_days = lp.training_days;
            for entry in lp.observations {
                let key = ProductMarket::new(entry.product, entry.market);
                let obs = MarketObservation {
                    price:       entry.price,
                    advertising: entry.advertising,
                    demand:      entry.demand,
                    features:    entry.features,
                };
                if record.observations.insert(key.clone(), obs).is_some() {
                    return Err(ForecastError::MalformedInput(format!(
                        "period {} lists {key} more than once",
                        lp.period
                    )));
                }
            }
            periods.push(record);
        }
        // Upstream contract: ascending by period index.
        periods.sort_by_key(|p| p.period);
        HistoryTable::new(periods)
    }
}

/// Reads a `history.json` ledger produced by report ingestion.
pub struct JsonLedgerSource {
    path: String,
}

impl JsonLedgerSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl HistorySource for JsonLedgerSource {
    fn load(&self) -> ForecastResult<HistoryTable> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", self.path))?;
        let file: LedgerFile = serde_json::from_str(&content)?;
        let table = file.into_history()?;
        log::info!(
            "history: loaded {} periods, {} product/market pairs from {}",
            table.len(),
            table.keys().len(),
            self.path
        );
        Ok(table)
    }
}
