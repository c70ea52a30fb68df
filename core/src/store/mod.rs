//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The estimator, predictor and engine call store methods; they never
//! execute SQL directly.

use crate::{
    error::ForecastResult,
    event::EventLogEntry,
    types::Period,
};
use rusqlite::{params, Connection, OptionalExtension};

mod elasticity;
mod prediction;

pub struct ForecastStore {
    conn: Connection,
}

impl ForecastStore {
    /// Open (or create) the forecast database at `path`.
    pub fn open(path: &str) -> ForecastResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; in-memory databases ignore it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ForecastResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to re-run.
    pub fn migrate(&self) -> ForecastResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_forecast.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        target_period: Option<Period>,
        version: &str,
    ) -> ForecastResult<()> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO forecast_run (run_id, target_period, version, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, target_period.map(i64::from), version, created_at],
        )?;
        Ok(())
    }

    pub fn run_exists(&self, run_id: &str) -> ForecastResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT run_id FROM forecast_run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> ForecastResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, period, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                i64::from(entry.period),
                entry.source,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> ForecastResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, period, source, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    period:     row.get::<_, i64>(2)? as Period,
                    source:     row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of events of `event_type` logged for this run (for tests).
    pub fn event_count(&self, run_id: &str, event_type: &str) -> ForecastResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
