//! Store methods for elasticity tables.

use crate::{
    error::{ForecastError, ForecastResult},
    estimator::{ElasticityRecord, ElasticityTable, FitQuality},
    types::{Driver, ProductMarket},
};
use rusqlite::params;

use super::ForecastStore;

impl ForecastStore {
    /// Write every record of `table` under `run_id`, atomically.
    pub fn insert_elasticities(&self, run_id: &str, table: &ElasticityTable) -> ForecastResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for row in table.rows() {
            tx.execute(
                "INSERT INTO elasticity
                 (run_id, product, market, driver, coefficient, r_squared,
                  sample_size, quality, low_confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    row.product,
                    row.market,
                    row.driver,
                    row.coefficient,
                    row.r_squared,
                    row.sample_size as i64,
                    row.quality,
                    row.low_confidence,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Rebuild the elasticity table saved under `run_id`.
    pub fn load_elasticities(&self, run_id: &str) -> ForecastResult<ElasticityTable> {
        let mut stmt = self.conn.prepare(
            "SELECT product, market, driver, coefficient, r_squared, sample_size, quality
             FROM elasticity WHERE run_id = ?1
             ORDER BY product, market, driver",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(raw.len());
        for (product, market, driver, coefficient, r_squared, sample_size, quality) in raw {
            let driver = Driver::from_name(&driver).ok_or_else(|| {
                ForecastError::MalformedInput(format!("unknown driver '{driver}' in store"))
            })?;
            let quality = FitQuality::from_name(&quality).ok_or_else(|| {
                ForecastError::MalformedInput(format!("unknown fit quality '{quality}' in store"))
            })?;
            records.push(ElasticityRecord {
                key: ProductMarket::new(product, market),
                driver,
                coefficient,
                r_squared,
                sample_size: sample_size as usize,
                quality,
            });
        }
        Ok(ElasticityTable::from_records(records))
    }

    pub fn elasticity_count(&self, run_id: &str) -> ForecastResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM elasticity WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
