//! Elasticity estimation: log-log OLS per (product, market) pair.
//!
//! Model, fitted per pair:
//!
//!   ln(demand) = a + e_price * ln(price) + e_adv * ln(advertising)
//!
//! so each fitted coefficient reads directly as %Δdemand per %Δdriver.
//!
//! Fallback ladder, per pair:
//!   1. Observations with demand, price or advertising <= 0 are excluded
//!      (log undefined). Fewer than 2 usable rows → every driver gets the
//!      fallback coefficient, quality InsufficientData.
//!   2. A driver whose log has zero variance gets the fallback coefficient,
//!      quality ZeroVariance, and is left out of the design.
//!   3. Remaining drivers are fitted jointly when there is at least one
//!      residual degree of freedom and the system is non-singular;
//!      otherwise each is fitted on its own (quality LowSample).

use crate::{
    config::EstimatorConfig,
    error::{ForecastError, ForecastResult},
    history::HistoryTable,
    regression::{ols, variance},
    store::ForecastStore,
    types::{Driver, ProductMarket, RunId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Log-variance below this counts as "never changed".
const ZERO_VARIANCE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitQuality {
    /// Joint fit with enough observations.
    Fitted,
    /// Fitted, but on too few observations to trust.
    LowSample,
    /// Driver never varied; coefficient is the fallback.
    ZeroVariance,
    /// Fewer than two usable observations; coefficient is the fallback.
    InsufficientData,
}

impl FitQuality {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fitted           => "fitted",
            Self::LowSample        => "low_sample",
            Self::ZeroVariance     => "zero_variance",
            Self::InsufficientData => "insufficient_data",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fitted"            => Some(Self::Fitted),
            "low_sample"        => Some(Self::LowSample),
            "zero_variance"     => Some(Self::ZeroVariance),
            "insufficient_data" => Some(Self::InsufficientData),
            _                   => None,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        !matches!(self, Self::Fitted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticityRecord {
    pub key:         ProductMarket,
    pub driver:      Driver,
    pub coefficient: f64,
    pub r_squared:   Option<f64>,
    pub sample_size: usize,
    pub quality:     FitQuality,
}

impl ElasticityRecord {
    pub fn is_low_confidence(&self) -> bool {
        self.quality.is_low_confidence()
    }
}

/// Flat export row. Column set is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticityRow {
    pub product:        String,
    pub market:         String,
    pub driver:         String,
    pub coefficient:    f64,
    pub r_squared:      Option<f64>,
    pub sample_size:    usize,
    pub quality:        String,
    pub low_confidence: bool,
}

/// Exactly one record per (product, market, driver).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElasticityTable {
    records: BTreeMap<(ProductMarket, Driver), ElasticityRecord>,
}

impl ElasticityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; a later record for the same triple replaces an earlier one.
    pub fn from_records(records: impl IntoIterator<Item = ElasticityRecord>) -> Self {
        let mut table = Self::new();
        for r in records {
            table.insert(r);
        }
        table
    }

    pub fn insert(&mut self, record: ElasticityRecord) {
        self.records
            .insert((record.key.clone(), record.driver), record);
    }

    pub fn get(&self, key: &ProductMarket, driver: Driver) -> Option<&ElasticityRecord> {
        self.records.get(&(key.clone(), driver))
    }

    pub fn coefficient(&self, key: &ProductMarket, driver: Driver) -> Option<f64> {
        self.get(key, driver).map(|r| r.coefficient)
    }

    /// Records in (product, market, driver) order.
    pub fn records(&self) -> impl Iterator<Item = &ElasticityRecord> {
        self.records.values()
    }

    pub fn keys(&self) -> BTreeSet<ProductMarket> {
        self.records.keys().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn low_confidence_count(&self) -> usize {
        self.records().filter(|r| r.is_low_confidence()).count()
    }

    pub fn rows(&self) -> Vec<ElasticityRow> {
        self.records()
            .map(|r| ElasticityRow {
                product:        r.key.product.clone(),
                market:         r.key.market.clone(),
                driver:         r.driver.name().to_string(),
                coefficient:    r.coefficient,
                r_squared:      r.r_squared,
                sample_size:    r.sample_size,
                quality:        r.quality.name().to_string(),
                low_confidence: r.is_low_confidence(),
            })
            .collect()
    }
}

pub struct ElasticityEstimator {
    config: EstimatorConfig,
}

impl Default for ElasticityEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl ElasticityEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Fit every (pair, driver) in the history. Recomputed wholesale.
    pub fn estimate_all(&self, history: &HistoryTable) -> ForecastResult<ElasticityTable> {
        let needed = self.config.min_periods.max(2);
        if history.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                got: history.len(),
            });
        }

        let mut table = ElasticityTable::new();
        for key in history.keys() {
            for record in self.estimate_pair(history, &key) {
                table.insert(record);
            }
        }

        log::info!(
            "estimator: {} elasticities from {} periods ({} low-confidence)",
            table.len(),
            history.len(),
            table.low_confidence_count()
        );
        Ok(table)
    }

    fn estimate_pair(&self, history: &HistoryTable, key: &ProductMarket) -> Vec<ElasticityRecord> {
        let series = history.series(key);
        let skip = series.len().saturating_sub(self.config.max_sample_size);

        let mut ln_demand = Vec::new();
        let mut ln_driver: BTreeMap<Driver, Vec<f64>> = BTreeMap::new();
        let mut excluded = 0usize;
        for (_, obs) in series.iter().skip(skip) {
            if obs.demand <= 0.0 || obs.price <= 0.0 || obs.advertising <= 0.0 {
                excluded += 1;
                continue;
            }
            ln_demand.push(obs.demand.ln());
            for driver in Driver::ALL {
                ln_driver.entry(driver).or_default().push(obs.driver_value(driver).ln());
            }
        }
        if excluded > 0 {
            log::warn!("pair={key} estimator: excluded {excluded} observations with non-positive values");
        }

        let n = ln_demand.len();
        if n < 2 {
            log::warn!("pair={key} estimator: only {n} usable observations, using fallback coefficients");
            return Driver::ALL
                .iter()
                .map(|&driver| self.fallback(key, driver, n, FitQuality::InsufficientData))
                .collect();
        }

        let mut records = Vec::new();
        let mut active: Vec<Driver> = Vec::new();
        for driver in Driver::ALL {
            if variance(&ln_driver[&driver]) < ZERO_VARIANCE_EPS {
                log::warn!("pair={key} estimator: {driver} never changed, elasticity undefined");
                records.push(self.fallback(key, driver, n, FitQuality::ZeroVariance));
            } else {
                active.push(driver);
            }
        }

        if active.is_empty() {
            return records;
        }

        let columns: Vec<&[f64]> = active.iter().map(|d| ln_driver[d].as_slice()).collect();
        let joint = if n >= active.len() + 2 {
            ols(&ln_demand, &columns)
        } else {
            None
        };

        match joint {
            Some(fit) => {
                let quality = if n >= self.config.min_reliable_samples {
                    FitQuality::Fitted
                } else {
                    FitQuality::LowSample
                };
                for (driver, coefficient) in active.iter().zip(&fit.coefficients) {
                    records.push(ElasticityRecord {
                        key:         key.clone(),
                        driver:      *driver,
                        coefficient: *coefficient,
                        r_squared:   fit.r_squared,
                        sample_size: n,
                        quality,
                    });
                }
            }
            None => {
                log::debug!("pair={key} estimator: joint fit unavailable, fitting drivers separately");
                for driver in active {
                    let record = match ols(&ln_demand, &[ln_driver[&driver].as_slice()]) {
                        Some(fit) => ElasticityRecord {
                            key:         key.clone(),
                            driver,
                            coefficient: fit.coefficients[0],
                            r_squared:   fit.r_squared,
                            sample_size: n,
                            quality:     FitQuality::LowSample,
                        },
                        None => self.fallback(key, driver, n, FitQuality::InsufficientData),
                    };
                    records.push(record);
                }
            }
        }

        records.sort_by_key(|r| r.driver);
        records
    }

    fn fallback(
        &self,
        key: &ProductMarket,
        driver: Driver,
        sample_size: usize,
        quality: FitQuality,
    ) -> ElasticityRecord {
        ElasticityRecord {
            key: key.clone(),
            driver,
            coefficient: self.config.fallback_coefficient,
            r_squared: None,
            sample_size,
            quality,
        }
    }

    /// Persist `table` to the SQLite database at `path` under a fresh run id.
    pub fn save_results(&self, table: &ElasticityTable, path: &str) -> ForecastResult<RunId> {
        let store = ForecastStore::open(path)?;
        store.migrate()?;
        let run_id = uuid::Uuid::new_v4().to_string();
        store.insert_run(&run_id, None, env!("CARGO_PKG_VERSION"))?;
        store.insert_elasticities(&run_id, table)?;
        log::info!("estimator: saved {} elasticities to {path} (run {run_id})", table.len());
        Ok(run_id)
    }
}
