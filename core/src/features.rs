//! Feature engineering: derives ratios and growth rates from raw columns.
//!
//! Derived features never feed back into price, advertising or demand.
//! They are attached to each observation's `features` map for export and
//! inspection.

use crate::{
    history::HistoryTable,
    types::ProductMarket,
};
use std::collections::{BTreeMap, HashMap};

pub const PRICE_INDEX: &str = "price_index";
pub const AD_SHARE: &str = "ad_share";
pub const DEMAND_GROWTH: &str = "demand_growth";

/// Transform from raw ledger to the estimator's input table.
pub trait FeatureEngineer {
    fn engineer(&self, table: HistoryTable) -> HistoryTable;
}

/// Default feature set:
///   - price_index:   price / mean price of all products in the same market
///   - ad_share:      advertising / total advertising in the same market
///   - demand_growth: (demand - prior demand) / prior demand, 0 for the first period
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFeatures;

impl FeatureEngineer for StandardFeatures {
    fn engineer(&self, mut table: HistoryTable) -> HistoryTable {
        let mut prior_demand: HashMap<ProductMarket, f64> = HashMap::new();

        for record in table.periods_mut() {
            // Market-level aggregates for this period.
            let mut price_sum: BTreeMap<String, (f64, usize)> = BTreeMap::new();
            let mut ad_total:  BTreeMap<String, f64> = BTreeMap::new();
            for (key, obs) in &record.observations {
                let entry = price_sum.entry(key.market.clone()).or_insert((0.0, 0));
                entry.0 += obs.price;
                entry.1 += 1;
                *ad_total.entry(key.market.clone()).or_insert(0.0) += obs.advertising;
            }

            for (key, obs) in record.observations.iter_mut() {
                let (sum, count) = price_sum[&key.market];
                let mean_price = sum / count as f64;
                let price_index = if mean_price > 0.0 { obs.price / mean_price } else { 1.0 };

                let total_ad = ad_total[&key.market];
                let ad_share = if total_ad > 0.0 { obs.advertising / total_ad } else { 0.0 };

                let growth = match prior_demand.get(key) {
                    Some(&prev) if prev > 0.0 => (obs.demand - prev) / prev,
                    _ => 0.0,
                };

                obs.features.insert(PRICE_INDEX.into(), price_index);
                obs.features.insert(AD_SHARE.into(), ad_share);
                obs.features.insert(DEMAND_GROWTH.into(), growth);

                prior_demand.insert(key.clone(), obs.demand);
            }
        }

        log::debug!("features: derived {PRICE_INDEX}, {AD_SHARE}, {DEMAND_GROWTH} for {} periods", table.len());
        table
    }
}
