//! forecast-runner: headless demand forecast for the next GMC period.
//!
//! Usage:
//!   forecast-runner
//!   forecast-runner --data-dir ./data --out ./output --product p1
//!
//! Reads {data-dir}/history.json (required), forecast_config.json and
//! decisions.json (both optional), writes forecast.db plus JSON exports
//! to {out}.

use anyhow::{bail, Result};
use gmc_forecast_core::{
    config::ForecastConfig,
    decision::DecisionPlan,
    engine::{ForecastEngine, ForecastReport},
    features::{FeatureEngineer, StandardFeatures},
    history::{HistorySource, JsonLedgerSource},
    predictor::PredictionIssue,
    store::ForecastStore,
};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let out_dir = arg_value(&args, "--out").unwrap_or("./output");
    let product = arg_value(&args, "--product").unwrap_or("p1");

    println!("GMC Demand Forecasting: forecast-runner");
    println!("  data_dir:  {data_dir}");
    println!("  out:       {out_dir}");
    println!();

    // ── [1/5] Load ─────────────────────────────────────────────
    println!("[1/5] Loading historical data...");
    let history_path = format!("{data_dir}/history.json");
    if !Path::new(&history_path).exists() {
        bail!("no history ledger found at {history_path}; export your period reports there first");
    }
    let history = JsonLedgerSource::new(history_path).load()?;
    let periods: Vec<String> = history.periods().iter().map(|p| p.period.to_string()).collect();
    println!("  loaded {} periods: [{}]", history.len(), periods.join(", "));

    // ── [2/5] Engineer ─────────────────────────────────────────
    println!("[2/5] Engineering features...");
    let history = StandardFeatures.engineer(history);

    let config = ForecastConfig::load(data_dir)?;
    let plan = DecisionPlan::load(data_dir)?;

    std::fs::create_dir_all(out_dir)?;
    let db_path = format!("{out_dir}/forecast.db");
    let store = ForecastStore::open(&db_path)?;
    store.migrate()?;

    let run_id = format!("forecast-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    let engine = ForecastEngine::new(run_id, config, store);

    // ── [3/5]-[5/5] Estimate, predict, scenarios ───────────────
    let report = engine.run(&history, &plan)?;
    println!(
        "[3/5] Estimated {} elasticities ({} low confidence)",
        report.elasticities.len(),
        report.elasticities.low_confidence_count()
    );
    println!(
        "[4/5] Predicted demand for period {} ({} rows)",
        report.target_period,
        report.forecast.len()
    );
    println!(
        "[5/5] Evaluated {} scenarios ({} rows)",
        report.scenarios.scenario_names().len(),
        report.scenarios.len()
    );

    print_elasticities(&report);
    print_forecast(&report);
    print_comparison(&report, product);
    print_issues(&report);
    export_json(&report, out_dir)?;

    println!();
    println!("=== RUN COMPLETE ===");
    println!("  run_id:  {}", report.run_id);
    println!("  db:      {db_path}");
    Ok(())
}

fn print_elasticities(report: &ForecastReport) {
    println!();
    println!("=== ELASTICITIES (periods up to {}) ===", report.current_period);
    for r in report.elasticities.records() {
        let r2 = r
            .r_squared
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| "-".into());
        let flag = if r.is_low_confidence() { " (low confidence)" } else { "" };
        println!(
            "  {:<6} {:<10} {:<12} {:>8.3}  r2={r2:<6} n={} {}{flag}",
            r.key.product,
            r.key.market,
            r.driver.name(),
            r.coefficient,
            r.sample_size,
            r.quality.name()
        );
    }
}

fn print_forecast(report: &ForecastReport) {
    println!();
    println!(
        "=== DEMAND FORECAST: period {} (based on period {}) ===",
        report.target_period, report.current_period
    );
    println!(
        "  {:<6} {:<10} {:>12} {:>8} {:>8} {:>8}",
        "product", "market", "demand", "season", "price", "adv"
    );
    for r in report.forecast.rows() {
        println!(
            "  {:<6} {:<10} {:>12.1} {:>8.3} {:>8.3} {:>8.3}",
            r.key.product,
            r.key.market,
            r.predicted_demand,
            r.seasonality_factor,
            r.price_effect,
            r.advertising_effect
        );
    }
}

fn print_comparison(report: &ForecastReport, product: &str) {
    println!();
    println!("=== SCENARIO COMPARISON - {product} ===");
    let rows = report.comparison(product);
    if rows.is_empty() {
        println!("  (no predictions for {product})");
        return;
    }
    for row in rows {
        let baseline = row
            .baseline
            .map(|v| format!("{v:.1}"))
            .unwrap_or_else(|| "-".into());
        let scenarios: Vec<String> = row
            .scenarios
            .iter()
            .map(|(name, v)| format!("{name}={v:.1}"))
            .collect();
        println!("  {:<10} baseline={baseline} {}", row.market, scenarios.join(" "));
    }
}

fn print_issues(report: &ForecastReport) {
    let issues: Vec<&PredictionIssue> = report
        .forecast
        .issues()
        .iter()
        .chain(report.scenarios.issues())
        .collect();
    if issues.is_empty() {
        return;
    }
    println!();
    println!("=== ISSUES ({}) ===", issues.len());
    for issue in issues {
        let scenario = issue.scenario().unwrap_or("baseline");
        match issue {
            PredictionIssue::ZeroBaseline { key, driver, .. } => {
                println!("  [{scenario}] {key}: historical {driver} is zero, effect ignored");
            }
            PredictionIssue::MissingKey { key, source, .. } => {
                println!("  [{scenario}] {key}: missing from {source:?}, row omitted");
            }
            PredictionIssue::EffectClamped { key, driver, raw, clamped, .. } => {
                let raw = raw.map(|v| format!("{v:.3}")).unwrap_or_else(|| "unbounded".into());
                println!("  [{scenario}] {key}: {driver} effect {raw} clamped to {clamped:.3}");
            }
        }
    }
}

fn export_json(report: &ForecastReport, out_dir: &str) -> Result<()> {
    let files = [
        ("elasticities.json", serde_json::to_string_pretty(&report.elasticities.rows())?),
        ("demand_forecast.json", serde_json::to_string_pretty(&report.forecast.export_rows())?),
        ("scenario_analysis.json", serde_json::to_string_pretty(&report.scenarios.export_rows())?),
    ];
    for (name, body) in files {
        let path = format!("{out_dir}/{name}");
        std::fs::write(&path, body)?;
        log::info!("exported {path}");
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
