//! End-to-end forecast run tests.

use gmc_forecast_core::{
    decision::{DecisionPlan, PlannedValue},
    engine::ForecastEngine,
    error::ForecastError,
    event::ForecastEvent,
    predictor::PredictionIssue,
    features::{FeatureEngineer, StandardFeatures},
    history::HistoryTable,
    synthetic::{SyntheticLedger, SyntheticMarket},
    types::{Driver, ProductMarket},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ledger(periods: usize) -> HistoryTable {
    let history = SyntheticLedger::new(0x6D0C, periods)
        .with_noise(0.01)
        .with_market(SyntheticMarket::new(ProductMarket::new("p1", "eaec"), -1.6, 0.25))
        .with_market(SyntheticMarket::new(ProductMarket::new("p1", "eu"), -1.9, 0.20))
        .with_market(SyntheticMarket::new(ProductMarket::new("p2", "eaec"), -1.2, 0.35))
        .with_market(SyntheticMarket::new(ProductMarket::new("p2", "eu"), -2.1, 0.10))
        .generate()
        .unwrap();
    StandardFeatures.engineer(history)
}

fn engine(run_id: &str) -> ForecastEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    ForecastEngine::build_test(run_id.to_string()).unwrap()
}

fn planned(product: Option<&str>, market: &str, value: f64) -> PlannedValue {
    PlannedValue {
        product: product.map(str::to_string),
        market:  market.to_string(),
        value,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn run_forecasts_the_period_after_latest() {
    let history = ledger(8);
    let engine = engine("run-target");

    let report = engine.run(&history, &DecisionPlan::default()).unwrap();

    assert_eq!(report.current_period, 8);
    assert_eq!(report.target_period, 9);
    assert_eq!(report.elasticities.len(), 4 * 2);
    assert_eq!(report.forecast.len(), 4);
    assert_eq!(report.scenarios.len(), 4 * 2, "two configured scenarios");
    assert!(report.forecast.issues().is_empty());
}

/// Carrying every decision forward isolates seasonality.
#[test]
fn carry_forward_plan_predicts_demand_times_seasonality() {
    let history = ledger(6);
    let engine = engine("run-carry");

    let report = engine.run(&history, &DecisionPlan::default()).unwrap();

    let current = history.latest().unwrap();
    let season = engine.config().seasonality.indices[7 % 4];
    for row in report.forecast.rows() {
        let demand = current.observation(&row.key).unwrap().demand;
        assert_eq!(row.seasonality_factor, season);
        assert_eq!(row.predicted_demand, demand * season);
    }
}

#[test]
fn plan_applies_per_market_and_per_product_values() {
    let history = ledger(6);
    let engine = engine("run-plan");
    let plan = DecisionPlan {
        prices:            vec![planned(Some("p1"), "eu", 1234.0)],
        advertising:       vec![planned(None, "eaec", 90.0), planned(None, "mars", 1.0)],
        management_budget: Some(180.0),
        training_days:     None,
    };

    let report = engine.run(&history, &plan).unwrap();

    let d = &report.decisions;
    assert_eq!(d.driver_value(&ProductMarket::new("p1", "eu"), Driver::Price), Some(1234.0));
    let p2_eu_price = history.latest().unwrap().observation(&ProductMarket::new("p2", "eu")).unwrap().price;
    assert_eq!(d.driver_value(&ProductMarket::new("p2", "eu"), Driver::Price), Some(p2_eu_price));
    assert_eq!(d.driver_value(&ProductMarket::new("p1", "eaec"), Driver::Advertising), Some(90.0));
    assert_eq!(d.driver_value(&ProductMarket::new("p2", "eaec"), Driver::Advertising), Some(90.0));
    assert_eq!(d.management_budget, Some(180.0));
    assert_eq!(d.advertising.len(), 4, "unknown market ignored");
}

#[test]
fn run_persists_elasticities_predictions_and_events() {
    let history = ledger(8);
    let engine = engine("run-persist");

    let report = engine.run(&history, &DecisionPlan::default()).unwrap();

    let store = engine.store();
    assert!(store.run_exists("run-persist").unwrap());
    assert_eq!(store.elasticity_count("run-persist").unwrap(), 8);
    assert_eq!(store.load_elasticities("run-persist").unwrap(), report.elasticities);
    assert_eq!(store.prediction_count("run-persist").unwrap(), 4 + 8);

    let baseline = store.prediction_rows("run-persist", None).unwrap();
    assert_eq!(baseline, report.forecast.export_rows());
    let minus = store.prediction_rows("run-persist", Some("price_minus_5pct")).unwrap();
    assert_eq!(minus.len(), 4);

    assert_eq!(store.event_count("run-persist", "run_initialized").unwrap(), 1);
    assert_eq!(store.event_count("run-persist", "elasticities_estimated").unwrap(), 1);
    assert_eq!(store.event_count("run-persist", "forecast_completed").unwrap(), 1);
    assert_eq!(store.event_count("run-persist", "scenario_evaluated").unwrap(), 2);
    assert_eq!(
        store.event_count("run-persist", "low_confidence_elasticity").unwrap(),
        report.elasticities.low_confidence_count() as i64
    );
}

#[test]
fn event_payloads_deserialize() {
    let history = ledger(5);
    let engine = engine("run-events");
    engine.run(&history, &DecisionPlan::default()).unwrap();

    let events = engine.store().events_for_run("run-events").unwrap();

    assert!(!events.is_empty());
    let first: ForecastEvent = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(
        first,
        ForecastEvent::RunInitialized {
            run_id:         "run-events".into(),
            current_period: 5,
            target_period:  6,
        }
    );
    for entry in &events {
        let event: ForecastEvent = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(event.type_name(), entry.event_type);
    }
}

/// Flagged fallbacks reach the event log: a constant price everywhere
/// yields one low-confidence event per pair.
#[test]
fn fallbacks_are_logged_as_events() {
    let mut market = SyntheticMarket::new(ProductMarket::new("p1", "eu"), -1.5, 0.2);
    market.price_jitter = 0.0;
    let history = SyntheticLedger::new(3, 5).with_market(market).generate().unwrap();
    let engine = engine("run-fallback");

    let report = engine.run(&history, &DecisionPlan::default()).unwrap();

    let price = report.elasticities.get(&ProductMarket::new("p1", "eu"), Driver::Price).unwrap();
    assert!(price.is_low_confidence());
    assert!(engine.store().event_count("run-fallback", "low_confidence_elasticity").unwrap() >= 1);
}

#[test]
fn comparison_pivots_baseline_against_scenarios() {
    let history = ledger(8);
    let engine = engine("run-compare");

    let report = engine.run(&history, &DecisionPlan::default()).unwrap();
    let rows = report.comparison("p1");

    let markets: Vec<&str> = rows.iter().map(|r| r.market.as_str()).collect();
    assert_eq!(markets, vec!["eaec", "eu"]);
    for row in &rows {
        let baseline = row.baseline.unwrap();
        assert_eq!(row.scenarios.len(), 2);
        let minus = row.scenarios["price_minus_5pct"];
        let plus = row.scenarios["price_plus_5pct"];
        // Every synthetic market has a negative price elasticity.
        assert!(minus > baseline && baseline > plus, "{}: {minus} {baseline} {plus}", row.market);
    }
    assert!(report.comparison("p9").is_empty());
}

#[test]
fn single_period_history_fails_cleanly() {
    let history = ledger(1);
    let engine = engine("run-short");

    let err = engine.run(&history, &DecisionPlan::default()).unwrap_err();

    assert!(matches!(err, ForecastError::InsufficientHistory { needed: 2, got: 1 }));
    assert!(!engine.store().run_exists("run-short").unwrap());
    assert!(engine.store().events_for_run("run-short").unwrap().is_empty());
}

/// A plan the predictor rejects must not leave a half-written run behind.
#[test]
fn rejected_plan_leaves_store_untouched() {
    let history = ledger(6);
    let engine = engine("run-rejected");
    let plan = DecisionPlan {
        prices: vec![planned(None, "eu", -10.0)],
        ..DecisionPlan::default()
    };

    let err = engine.run(&history, &plan).unwrap_err();

    assert!(matches!(err, ForecastError::MalformedInput(_)), "got {err}");
    assert!(!engine.store().run_exists("run-rejected").unwrap());
    assert_eq!(engine.store().elasticity_count("run-rejected").unwrap(), 0);
}

/// A zero price under negative elasticity has an unbounded effect.
/// The clamp is reported, and every stored payload still reads back.
#[test]
fn zero_price_plan_events_deserialize() {
    let history = ledger(8);
    let engine = engine("run-zero-price");
    let plan = DecisionPlan {
        prices: vec![planned(None, "eu", 0.0)],
        ..DecisionPlan::default()
    };

    let report = engine.run(&history, &plan).unwrap();

    let eu = ProductMarket::new("p1", "eu");
    assert_eq!(report.forecast.get(None, &eu).unwrap().price_effect, 10.0);
    assert!(report.forecast.issues().iter().any(|i| matches!(
        i,
        PredictionIssue::EffectClamped { driver: Driver::Price, raw: None, .. }
    )));

    let events = engine.store().events_for_run("run-zero-price").unwrap();
    let issues: Vec<PredictionIssue> = events
        .iter()
        .map(|e| serde_json::from_str::<ForecastEvent>(&e.payload).unwrap())
        .filter_map(|event| match event {
            ForecastEvent::PredictionIssueRaised { issue } => Some(issue),
            _ => None,
        })
        .collect();
    assert!(!issues.is_empty());
    assert_eq!(
        issues.len(),
        report.forecast.issues().len() + report.scenarios.issues().len()
    );
}

#[test]
fn decision_plan_rejects_misspelled_sections() {
    let dir = std::env::temp_dir().join(format!("plan-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let data_dir = dir.to_string_lossy().into_owned();

    std::fs::write(
        dir.join("decisions.json"),
        r#"{ "advertisment": [ { "market": "eu", "value": 90.0 } ] }"#,
    )
    .unwrap();
    assert!(DecisionPlan::load(&data_dir).is_err());

    std::fs::write(
        dir.join("decisions.json"),
        r#"{ "advertising": [ { "market": "eu", "value": 90.0 } ] }"#,
    )
    .unwrap();
    let plan = DecisionPlan::load(&data_dir).unwrap();
    assert_eq!(plan.advertising.len(), 1);
    assert!(plan.prices.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reusing_a_run_id_is_rejected() {
    let history = ledger(4);
    let engine = engine("run-twice");
    engine.run(&history, &DecisionPlan::default()).unwrap();

    assert!(engine.run(&history, &DecisionPlan::default()).is_err());
}
