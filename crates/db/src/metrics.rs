use rusqlite::params;
use usage_core::DailyMetric;

use crate::Db;
use crate::error::Result;
use crate::helpers::{row_to_daily_metric, sql_count};

impl Db {
    /// Writes the batch in one transaction, replacing rows that share a (date, model) key.
    pub fn upsert_daily_metrics(&mut self, metrics: &[DailyMetric]) -> Result<usize> {
        if metrics.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO langfuse_daily_metrics (
                  date, model, input_tokens, output_tokens, total_tokens,
                  request_count, total_cost
                ) VALUES (
                  ?1, ?2, ?3, ?4, ?5, ?6, ?7
                )
                ON CONFLICT(date, model) DO UPDATE SET
                  input_tokens = excluded.input_tokens,
                  output_tokens = excluded.output_tokens,
                  total_tokens = excluded.total_tokens,
                  request_count = excluded.request_count,
                  total_cost = excluded.total_cost
                "#,
            )?;
            for metric in metrics {
                written += stmt.execute(params![
                    metric.date,
                    metric.model,
                    sql_count(metric.input_tokens),
                    sql_count(metric.output_tokens),
                    sql_count(metric.total_tokens),
                    sql_count(metric.request_count),
                    metric.total_cost,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Rollup rows with `from <= date <= to`, ordered by date then model.
    pub fn get_daily_metrics(&self, from: &str, to: &str) -> Result<Vec<DailyMetric>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, model, input_tokens, output_tokens, total_tokens,
                   request_count, total_cost
            FROM langfuse_daily_metrics
            WHERE date >= ?1 AND date <= ?2
            ORDER BY date ASC, model ASC
            "#,
        )?;
        let rows = stmt.query_map(params![from, to], row_to_daily_metric)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Per-day, per-model sums computed from raw requests with `from <= started_at < to`.
    pub fn get_metrics_by_time_range(&self, from: &str, to: &str) -> Result<Vec<DailyMetric>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
              substr(started_at, 1, 10) AS date,
              model,
              SUM(input_tokens) AS input_tokens,
              SUM(output_tokens) AS output_tokens,
              SUM(total_tokens) AS total_tokens,
              COUNT(*) AS request_count,
              COALESCE(SUM(cost), 0) AS total_cost
            FROM langfuse_requests
            WHERE started_at >= ?1 AND started_at < ?2 AND model IS NOT NULL
            GROUP BY date, model
            ORDER BY date ASC, total_cost DESC
            "#,
        )?;
        let rows = stmt.query_map(params![from, to], row_to_daily_metric)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
