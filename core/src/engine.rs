//! The forecast engine: sequences one complete forecast run.
//!
//! EXECUTION ORDER (fixed):
//!   1. Estimate elasticities from the full history
//!   2. Build next-period decisions from the caller's plan
//!   3. Predict the baseline forecast (target = latest period + 1)
//!   4. Evaluate every configured scenario against the same baseline
//!   5. Register the run, then persist elasticities, predictions and
//!      the event log
//!
//! RULES:
//!   - Estimation and prediction never touch the store; the engine
//!     persists their outputs afterwards.
//!   - Every local fallback (low-confidence elasticity, prediction issue)
//!     is written to the event log.

use crate::{
    config::ForecastConfig,
    decision::{DecisionPlan, DecisionVector, ScenarioTemplate},
    error::{ForecastError, ForecastResult},
    estimator::{ElasticityEstimator, ElasticityTable},
    event::{EventLogEntry, ForecastEvent},
    history::HistoryTable,
    predictor::{DemandPredictor, PredictionTable},
    seasonality::SeasonalityProfile,
    store::ForecastStore,
    types::{Period, RunId},
};
use std::collections::BTreeMap;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub run_id:         RunId,
    pub current_period: Period,
    pub target_period:  Period,
    pub elasticities:   ElasticityTable,
    pub decisions:      DecisionVector,
    pub forecast:       PredictionTable,
    pub scenarios:      PredictionTable,
}

/// One market's baseline vs scenario demand, for side-by-side display.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub market:    String,
    pub baseline:  Option<f64>,
    pub scenarios: BTreeMap<String, f64>,
}

impl ForecastReport {
    /// Pivot of predicted demand for `product`: one row per market,
    /// one column per scenario.
    pub fn comparison(&self, product: &str) -> Vec<ComparisonRow> {
        let mut rows: BTreeMap<String, ComparisonRow> = BTreeMap::new();
        for r in self.forecast.rows().iter().filter(|r| r.key.product == product) {
            rows.entry(r.key.market.clone())
                .or_insert_with(|| ComparisonRow {
                    market:    r.key.market.clone(),
                    baseline:  None,
                    scenarios: BTreeMap::new(),
                })
                .baseline = Some(r.predicted_demand);
        }
        for r in self.scenarios.rows().iter().filter(|r| r.key.product == product) {
            let Some(name) = &r.scenario else { continue };
            rows.entry(r.key.market.clone())
                .or_insert_with(|| ComparisonRow {
                    market:    r.key.market.clone(),
                    baseline:  None,
                    scenarios: BTreeMap::new(),
                })
                .scenarios
                .insert(name.clone(), r.predicted_demand);
        }
        rows.into_values().collect()
    }
}

pub struct ForecastEngine {
    pub run_id: RunId,
    config:     ForecastConfig,
    store:      ForecastStore,
}

impl ForecastEngine {
    pub fn new(run_id: RunId, config: ForecastConfig, store: ForecastStore) -> Self {
        Self {
            run_id,
            config,
            store,
        }
    }

    /// Engine over a migrated in-memory store with the test config.
    pub fn build_test(run_id: RunId) -> ForecastResult<Self> {
        let store = ForecastStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(run_id, ForecastConfig::default_test(), store))
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &ForecastStore {
        &self.store
    }

    /// Forecast the period after the latest one in `history`.
    ///
    /// Everything is computed before the first write, so a failing run
    /// leaves no trace in the store.
    pub fn run(&self, history: &HistoryTable, plan: &DecisionPlan) -> ForecastResult<ForecastReport> {
        self.config.validate()?;

        let current = history.latest().ok_or(ForecastError::InsufficientHistory {
            needed: self.config.estimator.min_periods,
            got:    0,
        })?;
        let target = current.period.checked_add(1).ok_or_else(|| {
            ForecastError::MalformedInput(format!("period {} has no successor", current.period))
        })?;

        // ── Estimation ─────────────────────────────────────────
        let estimator = ElasticityEstimator::new(self.config.estimator.clone());
        let elasticities = estimator.estimate_all(history)?;

        // ── Prediction ─────────────────────────────────────────
        let seasonality = SeasonalityProfile::from_config(&self.config.seasonality)?;
        let predictor = DemandPredictor::new(
            elasticities.clone(),
            seasonality,
            self.config.predictor.clone(),
        );

        let decisions = plan.apply(current);
        let forecast = predictor.predict_demand(current, &decisions, target)?;

        let scenario_set = ScenarioTemplate::expand_all(&self.config.scenarios, &decisions)?;
        let scenarios =
            predictor.predict_with_scenarios(current, &decisions, &scenario_set, target)?;

        // ── Persistence ────────────────────────────────────────
        self.store
            .insert_run(&self.run_id, Some(target), env!("CARGO_PKG_VERSION"))?;
        self.log_event(current.period, "engine", &ForecastEvent::RunInitialized {
            run_id:         self.run_id.clone(),
            current_period: current.period,
            target_period:  target,
        })?;

        self.store.insert_elasticities(&self.run_id, &elasticities)?;
        self.log_event(current.period, "estimator", &ForecastEvent::ElasticitiesEstimated {
            periods:        history.len(),
            records:        elasticities.len(),
            low_confidence: elasticities.low_confidence_count(),
        })?;
        for record in elasticities.records().filter(|r| r.is_low_confidence()) {
            self.log_event(current.period, "estimator", &ForecastEvent::LowConfidenceElasticity {
                product:     record.key.product.clone(),
                market:      record.key.market.clone(),
                driver:      record.driver,
                quality:     record.quality,
                coefficient: record.coefficient,
            })?;
        }

        self.store.insert_predictions(&self.run_id, &forecast)?;
        self.log_event(target, "predictor", &ForecastEvent::ForecastCompleted {
            target_period: target,
            rows:          forecast.len(),
        })?;

        self.store.insert_predictions(&self.run_id, &scenarios)?;
        for name in scenario_set.keys() {
            let rows = scenarios
                .rows()
                .iter()
                .filter(|r| r.scenario.as_deref() == Some(name.as_str()))
                .count();
            self.log_event(target, "predictor", &ForecastEvent::ScenarioEvaluated {
                scenario: name.clone(),
                rows,
            })?;
        }

        for issue in forecast.issues().iter().chain(scenarios.issues()) {
            self.log_event(target, "predictor", &ForecastEvent::PredictionIssueRaised {
                issue: issue.clone(),
            })?;
        }

        log::info!(
            "period={target} engine: run {} complete ({} forecast rows, {} scenario rows)",
            self.run_id,
            forecast.len(),
            scenarios.len()
        );

        Ok(ForecastReport {
            run_id: self.run_id.clone(),
            current_period: current.period,
            target_period: target,
            elasticities,
            decisions,
            forecast,
            scenarios,
        })
    }

    fn log_event(&self, period: Period, source: &str, event: &ForecastEvent) -> ForecastResult<()> {
        let entry = EventLogEntry {
            id:         None,
            run_id:     self.run_id.clone(),
            period,
            source:     source.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        };
        self.store.append_event(&entry)
    }
}
