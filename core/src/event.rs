//! The forecast event log: how local fallbacks are reported.
//!
//! RULE: Every flagged elasticity and every prediction issue becomes an
//! event. Callers inspect the returned tables; the event log is the
//! durable record of what the engine had to patch over.

use crate::{
    estimator::FitQuality,
    predictor::PredictionIssue,
    types::{Driver, Period, RunId},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastEvent {
    // ── Run events ─────────────────────────────────
    RunInitialized {
        run_id:         RunId,
        current_period: Period,
        target_period:  Period,
    },

    // ── Estimation events ──────────────────────────
    ElasticitiesEstimated {
        periods:        usize,
        records:        usize,
        low_confidence: usize,
    },
    LowConfidenceElasticity {
        product:     String,
        market:      String,
        driver:      Driver,
        quality:     FitQuality,
        coefficient: f64,
    },

    // ── Prediction events ──────────────────────────
    ForecastCompleted {
        target_period: Period,
        rows:          usize,
    },
    ScenarioEvaluated {
        scenario: String,
        rows:     usize,
    },
    PredictionIssueRaised {
        issue: PredictionIssue,
    },
}

impl ForecastEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }          => "run_initialized",
            Self::ElasticitiesEstimated { .. }   => "elasticities_estimated",
            Self::LowConfidenceElasticity { .. } => "low_confidence_elasticity",
            Self::ForecastCompleted { .. }       => "forecast_completed",
            Self::ScenarioEvaluated { .. }       => "scenario_evaluated",
            Self::PredictionIssueRaised { .. }   => "prediction_issue_raised",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub period:     Period,
    pub source:     String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized ForecastEvent
}
