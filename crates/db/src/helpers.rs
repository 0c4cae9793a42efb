use rusqlite::Row;
use rusqlite::types::Type;
use usage_core::{DailyMetric, ImportMode, ImportRun, ImportStatus, RequestRecord};

pub(crate) const IMPORT_COLUMNS: &str =
    "id, started_at, finished_at, mode, from_timestamp, to_timestamp, status, error_message";

pub(crate) const REQUEST_COLUMNS: &str = "id, trace_id, name, model, started_at, finished_at, \
     input_tokens, output_tokens, total_tokens, cost, latency_ms";

/// Counts are stored as INTEGER; values beyond `i64::MAX` are pinned there.
pub(crate) fn sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Debug, thiserror::Error)]
#[error("unexpected {column} value {value:?}")]
struct UnexpectedValue {
    column: &'static str,
    value: String,
}

fn unexpected(index: usize, column: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(UnexpectedValue { column, value }),
    )
}

pub(crate) fn row_to_import_run(row: &Row<'_>) -> std::result::Result<ImportRun, rusqlite::Error> {
    let mode: String = row.get(3)?;
    let status: String = row.get(6)?;
    Ok(ImportRun {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        mode: ImportMode::parse(&mode).ok_or_else(|| unexpected(3, "mode", mode.clone()))?,
        from_timestamp: row.get(4)?,
        to_timestamp: row.get(5)?,
        status: ImportStatus::parse(&status)
            .ok_or_else(|| unexpected(6, "status", status.clone()))?,
        error_message: row.get(7)?,
    })
}

pub(crate) fn row_to_daily_metric(
    row: &Row<'_>,
) -> std::result::Result<DailyMetric, rusqlite::Error> {
    Ok(DailyMetric {
        date: row.get(0)?,
        model: row.get(1)?,
        input_tokens: row.get::<_, i64>(2)?.max(0) as u64,
        output_tokens: row.get::<_, i64>(3)?.max(0) as u64,
        total_tokens: row.get::<_, i64>(4)?.max(0) as u64,
        request_count: row.get::<_, i64>(5)?.max(0) as u64,
        total_cost: row.get(6)?,
    })
}

pub(crate) fn row_to_request_record(
    row: &Row<'_>,
) -> std::result::Result<RequestRecord, rusqlite::Error> {
    Ok(RequestRecord {
        id: row.get(0)?,
        trace_id: row.get(1)?,
        name: row.get(2)?,
        model: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        input_tokens: row.get::<_, i64>(6)?.max(0) as u64,
        output_tokens: row.get::<_, i64>(7)?.max(0) as u64,
        total_tokens: row.get::<_, i64>(8)?.max(0) as u64,
        cost: row.get(9)?,
        latency_ms: row.get(10)?,
    })
}
