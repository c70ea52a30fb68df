//! Store methods for prediction tables.

use crate::{
    error::ForecastResult,
    predictor::{PredictionRow, PredictionTable},
};
use rusqlite::params;

use super::ForecastStore;

impl ForecastStore {
    /// Write every row of `table` under `run_id`, preserving row order.
    pub fn insert_predictions(&self, run_id: &str, table: &PredictionTable) -> ForecastResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for row in table.export_rows() {
            tx.execute(
                "INSERT INTO prediction
                 (run_id, scenario, product, market, predicted_demand,
                  seasonality_factor, price_effect, advertising_effect, baseline_demand)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    row.scenario,
                    row.product,
                    row.market,
                    row.predicted_demand,
                    row.seasonality_factor,
                    row.price_effect,
                    row.advertising_effect,
                    row.baseline_demand,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Rows for one scenario (`None` = the baseline forecast), in insertion order.
    pub fn prediction_rows(
        &self,
        run_id: &str,
        scenario: Option<&str>,
    ) -> ForecastResult<Vec<PredictionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT scenario, product, market, predicted_demand, seasonality_factor,
                    price_effect, advertising_effect, baseline_demand
             FROM prediction
             WHERE run_id = ?1 AND scenario IS ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, scenario], |row| {
                Ok(PredictionRow {
                    scenario:           row.get(0)?,
                    product:            row.get(1)?,
                    market:             row.get(2)?,
                    predicted_demand:   row.get(3)?,
                    seasonality_factor: row.get(4)?,
                    price_effect:       row.get(5)?,
                    advertising_effect: row.get(6)?,
                    baseline_demand:    row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn prediction_count(&self, run_id: &str) -> ForecastResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM prediction WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
