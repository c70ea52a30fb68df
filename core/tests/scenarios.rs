//! Scenario analysis tests.

use gmc_forecast_core::{
    config::{ForecastConfig, PredictorConfig},
    decision::{DecisionVector, ScenarioOverride, ScenarioSet, ScenarioTemplate},
    error::ForecastError,
    estimator::{ElasticityRecord, ElasticityTable, FitQuality},
    history::{MarketObservation, PeriodRecord},
    predictor::DemandPredictor,
    seasonality::SeasonalityProfile,
    types::{Driver, ProductMarket},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn key(product: &str, market: &str) -> ProductMarket {
    ProductMarket::new(product, market)
}

fn current_period() -> PeriodRecord {
    PeriodRecord::new(4)
        .with_observation(key("p1", "eaec"), MarketObservation::new(1000.0, 70.0, 500.0))
        .with_observation(key("p1", "eu"), MarketObservation::new(1100.0, 75.0, 420.0))
        .with_observation(key("p2", "eaec"), MarketObservation::new(1500.0, 60.0, 300.0))
        .with_observation(key("p2", "eu"), MarketObservation::new(1600.0, 65.0, 250.0))
}

fn predictor_with(price_e: f64, adv_e: f64) -> DemandPredictor {
    let records = current_period().keys().cloned().collect::<Vec<_>>().into_iter().flat_map(|k| {
        Driver::ALL.map(|driver| ElasticityRecord {
            key: k.clone(),
            driver,
            coefficient: match driver {
                Driver::Price       => price_e,
                Driver::Advertising => adv_e,
            },
            r_squared: Some(0.8),
            sample_size: 8,
            quality: FitQuality::Fitted,
        })
    });
    DemandPredictor::new(
        ElasticityTable::from_records(records),
        SeasonalityProfile::from_config(&ForecastConfig::default_test().seasonality).unwrap(),
        PredictorConfig::default(),
    )
}

fn standard_set(baseline: &DecisionVector) -> ScenarioSet {
    let templates = vec![
        ScenarioTemplate::price_scale("price_minus_5pct", 0.95),
        ScenarioTemplate::price_scale("price_plus_5pct", 1.05),
    ];
    ScenarioTemplate::expand_all(&templates, baseline).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn empty_scenario_set_returns_no_rows() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);

    let table = predictor_with(-1.5, 0.2)
        .predict_with_scenarios(&current, &decisions, &ScenarioSet::new(), 5)
        .unwrap();

    assert!(table.is_empty());
    assert!(table.issues().is_empty());
}

/// Scenarios see the same baseline and never modify the caller's decisions.
#[test]
fn scenarios_do_not_mutate_baseline_decisions() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let snapshot = decisions.clone();
    let predictor = predictor_with(-1.5, 0.2);

    let before = predictor.predict_demand(&current, &decisions, 5).unwrap();
    predictor
        .predict_with_scenarios(&current, &decisions, &standard_set(&decisions), 5)
        .unwrap();
    let after = predictor.predict_demand(&current, &decisions, 5).unwrap();

    assert_eq!(decisions, snapshot);
    assert_eq!(before, after);
}

/// With a negative price elasticity a price cut raises demand and a
/// price rise lowers it, relative to the baseline forecast.
#[test]
fn negative_price_elasticity_moves_demand_against_price() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let predictor = predictor_with(-1.8, 0.2);

    let baseline = predictor.predict_demand(&current, &decisions, 5).unwrap();
    let scenarios = predictor
        .predict_with_scenarios(&current, &decisions, &standard_set(&decisions), 5)
        .unwrap();

    for row in baseline.rows() {
        let minus = scenarios.get(Some("price_minus_5pct"), &row.key).unwrap();
        let plus = scenarios.get(Some("price_plus_5pct"), &row.key).unwrap();
        assert!(minus.predicted_demand > row.predicted_demand, "{}", row.key);
        assert!(plus.predicted_demand < row.predicted_demand, "{}", row.key);
        assert!((minus.price_effect - 0.95f64.powf(-1.8)).abs() < 1e-12);
        assert_eq!(minus.advertising_effect, 1.0);
    }
}

/// A positive price elasticity reverses the direction.
#[test]
fn positive_price_elasticity_moves_demand_with_price() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let predictor = predictor_with(0.6, 0.2);

    let baseline = predictor.predict_demand(&current, &decisions, 5).unwrap();
    let scenarios = predictor
        .predict_with_scenarios(&current, &decisions, &standard_set(&decisions), 5)
        .unwrap();

    for row in baseline.rows() {
        let minus = scenarios.get(Some("price_minus_5pct"), &row.key).unwrap();
        let plus = scenarios.get(Some("price_plus_5pct"), &row.key).unwrap();
        assert!(minus.predicted_demand < row.predicted_demand);
        assert!(plus.predicted_demand > row.predicted_demand);
    }
}

/// A zero elasticity makes the scenario indistinguishable from baseline.
#[test]
fn zero_price_elasticity_leaves_demand_unchanged() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let predictor = predictor_with(0.0, 0.2);

    let baseline = predictor.predict_demand(&current, &decisions, 5).unwrap();
    let scenarios = predictor
        .predict_with_scenarios(&current, &decisions, &standard_set(&decisions), 5)
        .unwrap();

    for row in baseline.rows() {
        let minus = scenarios.get(Some("price_minus_5pct"), &row.key).unwrap();
        assert_eq!(minus.predicted_demand, row.predicted_demand);
    }
}

/// Output grouped by scenario name, then product, then market.
#[test]
fn rows_are_grouped_by_scenario_in_name_order() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let mut set = standard_set(&decisions);
    set.insert(
        "ads_up".into(),
        ScenarioOverride::new().advertising(key("p2", "eu"), 90.0),
    );

    let table = predictor_with(-1.5, 0.2)
        .predict_with_scenarios(&current, &decisions, &set, 5)
        .unwrap();

    assert_eq!(table.len(), 3 * 4);
    assert_eq!(
        table.scenario_names(),
        vec!["ads_up", "price_minus_5pct", "price_plus_5pct"]
    );
    let order: Vec<(String, String, String)> = table
        .rows()
        .iter()
        .take(4)
        .map(|r| {
            (
                r.scenario.clone().unwrap(),
                r.key.product.clone(),
                r.key.market.clone(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("ads_up".into(), "p1".into(), "eaec".into()),
            ("ads_up".into(), "p1".into(), "eu".into()),
            ("ads_up".into(), "p2".into(), "eaec".into()),
            ("ads_up".into(), "p2".into(), "eu".into()),
        ]
    );
}

/// An override naming one pair changes only that pair; the rest match
/// the baseline forecast exactly.
#[test]
fn partial_override_only_moves_named_pair() {
    let current = current_period();
    let decisions = DecisionVector::from_period(&current);
    let predictor = predictor_with(-1.5, 0.3);
    let mut set = ScenarioSet::new();
    set.insert(
        "eu_ads".into(),
        ScenarioOverride::new()
            .price(key("p1", "eu"), 1100.0)
            .advertising(key("p1", "eu"), 150.0),
    );

    let baseline = predictor.predict_demand(&current, &decisions, 5).unwrap();
    let scenarios = predictor
        .predict_with_scenarios(&current, &decisions, &set, 5)
        .unwrap();

    for row in baseline.rows() {
        let s = scenarios.get(Some("eu_ads"), &row.key).unwrap();
        if row.key == key("p1", "eu") {
            assert_eq!(s.price_effect, 1.0, "price override equals the observed price");
            assert!((s.advertising_effect - 2.0f64.powf(0.3)).abs() < 1e-12);
            assert!(s.predicted_demand > row.predicted_demand);
        } else {
            assert_eq!(s.predicted_demand, row.predicted_demand);
        }
    }
}

/// Issues raised inside a scenario carry its name.
#[test]
fn scenario_issues_are_tagged() {
    let current = PeriodRecord::new(4)
        .with_observation(key("p1", "eu"), MarketObservation::new(1000.0, 0.0, 300.0));
    let decisions = DecisionVector::from_period(&current);
    let predictor = DemandPredictor::new(
        ElasticityTable::from_records(Driver::ALL.map(|driver| ElasticityRecord {
            key: key("p1", "eu"),
            driver,
            coefficient: 0.5,
            r_squared: None,
            sample_size: 3,
            quality: FitQuality::LowSample,
        })),
        SeasonalityProfile::flat(),
        PredictorConfig::default(),
    );
    let mut set = ScenarioSet::new();
    set.insert("launch_ads".into(), ScenarioOverride::new().advertising(key("p1", "eu"), 40.0));

    let table = predictor
        .predict_with_scenarios(&current, &decisions, &set, 5)
        .unwrap();

    assert_eq!(table.issues().len(), 1);
    assert_eq!(table.issues()[0].scenario(), Some("launch_ads"));
    assert_eq!(table.issues()[0].key(), &key("p1", "eu"));
}

#[test]
fn template_scales_only_listed_products() {
    let decisions = DecisionVector::from_period(&current_period());
    let template = ScenarioTemplate {
        name:              "p1_cut".into(),
        price_scale:       Some(0.9),
        advertising_scale: Some(1.5),
        products:          Some(vec!["p1".into()]),
    };

    let over = template.expand(&decisions);

    assert_eq!(over.prices.len(), 2);
    assert!((over.prices[&key("p1", "eaec")] - 900.0).abs() < 1e-9);
    assert!((over.prices[&key("p1", "eu")] - 990.0).abs() < 1e-9);
    assert!((over.advertising[&key("p1", "eu")] - 112.5).abs() < 1e-9);
    assert!(!over.prices.contains_key(&key("p2", "eu")));
}

#[test]
fn duplicate_scenario_names_are_rejected() {
    let decisions = DecisionVector::from_period(&current_period());
    let templates = vec![
        ScenarioTemplate::price_scale("cut", 0.95),
        ScenarioTemplate::price_scale("cut", 0.90),
    ];

    let err = ScenarioTemplate::expand_all(&templates, &decisions).unwrap_err();

    assert!(matches!(err, ForecastError::Config(_)), "got {err}");
}

#[test]
fn negative_scale_is_rejected() {
    let err = ScenarioTemplate::price_scale("bad", -0.1).validate().unwrap_err();
    assert!(matches!(err, ForecastError::Config(_)));
}
