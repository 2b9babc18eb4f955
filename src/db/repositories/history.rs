use anyhow::{bail, Result};
use async_trait::async_trait;
use rusqlite::{params, Row, Transaction};

use crate::db::{
    helpers::{format_datetime, parse_datetime, parse_mode, to_i64, to_u64},
    Database,
};
use crate::models::EstimateResult;

/// Capped, newest-first log of past estimates.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert `result`, then drop the oldest entries beyond `max_entries`.
    async fn append(&self, result: &EstimateResult, max_entries: u32) -> Result<()>;

    /// Up to `limit` entries, newest first. A non-positive limit yields nothing.
    async fn query(&self, limit: i64) -> Result<Vec<EstimateResult>>;

    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<u64>;

    /// Drop the oldest entries beyond `max_entries`. Returns how many went.
    async fn prune(&self, max_entries: u32) -> Result<u64>;
}

fn row_to_estimate(row: &Row) -> Result<EstimateResult> {
    let created_at: String = row.get("created_at")?;
    let mode: String = row.get("mode")?;
    let duration_ms: i64 = row.get("duration_ms")?;

    Ok(EstimateResult {
        id: row.get("id")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        text: row.get("text")?,
        mode: parse_mode(&mode)?,
        intensity: row.get("intensity")?,
        duration_ms: to_u64(duration_ms, "duration_ms")?,
    })
}

fn prune_in(tx: &Transaction<'_>, max_entries: u32) -> Result<u64> {
    if max_entries == 0 {
        bail!("history cap must be at least 1");
    }

    let removed = tx.execute(
        "DELETE FROM estimates
         WHERE seq NOT IN (
             SELECT seq FROM estimates
             ORDER BY created_at DESC, seq DESC
             LIMIT ?1
         )",
        params![max_entries],
    )?;
    Ok(removed as u64)
}

#[async_trait]
impl HistoryStore for Database {
    async fn append(&self, result: &EstimateResult, max_entries: u32) -> Result<()> {
        if result.text.trim().is_empty() {
            bail!("estimate {} has empty text", result.id);
        }
        let record = result.clone();

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO estimates (id, created_at, text, mode, intensity, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    format_datetime(&record.created_at),
                    record.text,
                    record.mode.as_str(),
                    record.intensity,
                    to_i64(record.duration_ms)?,
                ],
            )?;
            prune_in(&tx, max_entries)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn query(&self, limit: i64) -> Result<Vec<EstimateResult>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, text, mode, intensity, duration_ms
                 FROM estimates
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut estimates = Vec::new();
            while let Some(row) = rows.next()? {
                estimates.push(row_to_estimate(row)?);
            }

            Ok(estimates)
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM estimates", [])?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM estimates", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }

    async fn prune(&self, max_entries: u32) -> Result<u64> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let removed = prune_in(&tx, max_entries)?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }
}
