use rusqlite::{params, params_from_iter};
use rusqlite::types::Value;
use usage_core::RequestRecord;

use crate::Db;
use crate::error::Result;
use crate::helpers::{REQUEST_COLUMNS, row_to_request_record, sql_count};
use crate::types::{RequestFilter, RequestPage};

impl Db {
    /// Writes the batch in one transaction, replacing rows that share an id.
    pub fn upsert_requests(&mut self, requests: &[RequestRecord]) -> Result<usize> {
        if requests.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO langfuse_requests (
                  id, trace_id, name, model, started_at, finished_at,
                  input_tokens, output_tokens, total_tokens, cost, latency_ms
                ) VALUES (
                  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
                )
                ON CONFLICT(id) DO UPDATE SET
                  trace_id = excluded.trace_id,
                  name = excluded.name,
                  model = excluded.model,
                  started_at = excluded.started_at,
                  finished_at = excluded.finished_at,
                  input_tokens = excluded.input_tokens,
                  output_tokens = excluded.output_tokens,
                  total_tokens = excluded.total_tokens,
                  cost = excluded.cost,
                  latency_ms = excluded.latency_ms
                "#,
            )?;
            for request in requests {
                written += stmt.execute(params![
                    request.id,
                    request.trace_id,
                    request.name,
                    request.model,
                    request.started_at,
                    request.finished_at,
                    sql_count(request.input_tokens),
                    sql_count(request.output_tokens),
                    sql_count(request.total_tokens),
                    request.cost,
                    request.latency_ms,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// One page of requests, most recent first, plus the filtered total.
    pub fn get_requests(
        &self,
        page: u32,
        limit: u32,
        filter: &RequestFilter,
    ) -> Result<RequestPage> {
        let offset = page.saturating_sub(1) as i64 * limit as i64;
        let (where_sql, values) = filter.where_clause();

        let limit_index = values.len() + 1;
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM langfuse_requests {where_sql} \
             ORDER BY started_at DESC, id ASC LIMIT ?{} OFFSET ?{}",
            limit_index,
            limit_index + 1
        );
        let mut page_values = values.clone();
        page_values.push(Value::Integer(limit as i64));
        page_values.push(Value::Integer(offset));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(page_values), row_to_request_record)?;
        let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        let count_sql = format!("SELECT COUNT(*) FROM langfuse_requests {where_sql}");
        let total: i64 =
            self.conn
                .query_row(&count_sql, params_from_iter(values), |row| row.get(0))?;

        Ok(RequestPage {
            rows,
            total: total.max(0) as u64,
        })
    }

    pub fn get_distinct_models(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT model
            FROM langfuse_requests
            WHERE model IS NOT NULL
            ORDER BY model ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
