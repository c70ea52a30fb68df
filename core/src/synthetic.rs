//! Synthetic ledgers with known elasticities.
//!
//! Used to exercise the estimator end to end: generate a history whose
//! demand follows the log-log model exactly (plus optional noise), then
//! check the fitted coefficients against the ones used here.

use crate::{
    error::ForecastResult,
    history::{HistorySource, HistoryTable, MarketObservation, PeriodRecord},
    rng::LedgerRng,
    types::{Period, ProductMarket},
};

#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    pub key:                    ProductMarket,
    pub base_demand:            f64,
    pub base_price:             f64,
    pub base_advertising:       f64,
    pub price_elasticity:       f64,
    pub advertising_elasticity: f64,
    /// Decisions move uniformly within ±jitter (proportional) each period.
    pub price_jitter:           f64,
    pub advertising_jitter:     f64,
}

impl SyntheticMarket {
    pub fn new(key: ProductMarket, price_elasticity: f64, advertising_elasticity: f64) -> Self {
        Self {
            key,
            base_demand: 1_000.0,
            base_price: 1_000.0,
            base_advertising: 75.0,
            price_elasticity,
            advertising_elasticity,
            price_jitter: 0.10,
            advertising_jitter: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticLedger {
    pub seed:         u64,
    pub first_period: Period,
    pub periods:      usize,
    /// Std-dev of multiplicative log-normal demand noise. 0 = exact.
    pub noise:        f64,
    pub markets:      Vec<SyntheticMarket>,
}

impl SyntheticLedger {
    pub fn new(seed: u64, periods: usize) -> Self {
        Self {
            seed,
            first_period: 1,
            periods,
            noise: 0.0,
            markets: Vec::new(),
        }
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_market(mut self, market: SyntheticMarket) -> Self {
        self.markets.push(market);
        self
    }

    pub fn generate(&self) -> ForecastResult<HistoryTable> {
        let mut records = Vec::with_capacity(self.periods);
        let mut streams: Vec<LedgerRng> = (0..self.markets.len())
            .map(|i| LedgerRng::new(self.seed, i as u64))
            .collect();

        for offset in 0..self.periods {
            let mut record = PeriodRecord::new(self.first_period + offset as Period);
            for (market, rng) in self.markets.iter().zip(streams.iter_mut()) {
                let price = market.base_price
                    * (1.0 + rng.uniform(-market.price_jitter, market.price_jitter));
                let advertising = market.base_advertising
                    * (1.0 + rng.uniform(-market.advertising_jitter, market.advertising_jitter));
                let shock = if self.noise > 0.0 { rng.normal(0.0, self.noise) } else { 0.0 };
                let demand = market.base_demand
                    * (price / market.base_price).powf(market.price_elasticity)
                    * (advertising / market.base_advertising).powf(market.advertising_elasticity)
                    * shock.exp();
                record
                    .observations
                    .insert(market.key.clone(), MarketObservation::new(price, advertising, demand));
            }
            records.push(record);
        }

        HistoryTable::new(records)
    }
}

impl HistorySource for SyntheticLedger {
    fn load(&self) -> ForecastResult<HistoryTable> {
        self.generate()
    }
}
