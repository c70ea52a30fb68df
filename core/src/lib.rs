//! gmc-forecast-core: elasticity estimation and next-period demand
//! prediction for Global Management Challenge style business simulations.
//!
//! Data flow:
//!   HistorySource → FeatureEngineer → ElasticityEstimator
//!     → DemandPredictor (baseline + scenarios) → ForecastStore

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod event;
pub mod features;
pub mod history;
pub mod predictor;
pub mod regression;
pub mod rng;
pub mod seasonality;
pub mod store;
pub mod synthetic;
pub mod types;
