use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use usage_core::{DailyMetric, RequestRecord, UNKNOWN_MODEL};

/// One row of the upstream day/model aggregation. Numeric sums arrive as numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDailyMetric {
    #[serde(rename = "providedModelName")]
    pub provided_model_name: Option<String>,
    pub time_dimension: Option<String>,
    #[serde(rename = "sum_totalCost")]
    pub sum_total_cost: Value,
    #[serde(rename = "sum_inputTokens")]
    pub sum_input_tokens: Value,
    #[serde(rename = "sum_outputTokens")]
    pub sum_output_tokens: Value,
    #[serde(rename = "sum_totalTokens")]
    pub sum_total_tokens: Value,
    pub count_count: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawUsage {
    pub input: Value,
    pub output: Value,
    pub total: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawObservation {
    pub id: Option<String>,
    pub trace_id: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub usage: Option<RawUsage>,
    pub input_usage: Value,
    pub output_usage: Value,
    pub total_usage: Value,
    pub calculated_total_cost: Value,
    pub total_cost: Value,
}

/// Converted rows plus the number of raw rows dropped.
#[derive(Debug, Clone, Default)]
pub struct Transformed<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

pub fn daily_metrics_from_raw(raw: &[RawDailyMetric]) -> Transformed<DailyMetric> {
    let mut out = Transformed {
        rows: Vec::with_capacity(raw.len()),
        skipped: 0,
    };
    for row in raw {
        let Some(date) = row.time_dimension.as_deref().and_then(date_part) else {
            warn!(time_dimension = ?row.time_dimension, "skipping daily metric without a date");
            out.skipped += 1;
            continue;
        };
        let model = row
            .provided_model_name
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(UNKNOWN_MODEL);
        out.rows.push(DailyMetric {
            date,
            model: model.to_string(),
            input_tokens: coerce_u64(&row.sum_input_tokens),
            output_tokens: coerce_u64(&row.sum_output_tokens),
            total_tokens: coerce_u64(&row.sum_total_tokens),
            request_count: coerce_u64(&row.count_count),
            total_cost: coerce_f64(&row.sum_total_cost).unwrap_or(0.0),
        });
    }
    out
}

pub fn requests_from_observations(raw: &[RawObservation]) -> Transformed<RequestRecord> {
    let mut out = Transformed {
        rows: Vec::with_capacity(raw.len()),
        skipped: 0,
    };
    for observation in raw {
        let Some(id) = observation.id.as_deref().filter(|id| !id.is_empty()) else {
            warn!(trace_id = ?observation.trace_id, "skipping observation without an id");
            out.skipped += 1;
            continue;
        };
        let usage = observation.usage.clone().unwrap_or_default();
        let tokens = |flat: &Value, nested: &Value| {
            if flat.is_null() {
                coerce_u64(nested)
            } else {
                coerce_u64(flat)
            }
        };
        let cost = coerce_f64(&observation.calculated_total_cost)
            .or_else(|| coerce_f64(&observation.total_cost));
        out.rows.push(RequestRecord {
            id: id.to_string(),
            trace_id: observation.trace_id.clone(),
            name: observation.name.clone(),
            model: observation.model.clone(),
            started_at: observation.start_time.clone(),
            finished_at: observation.end_time.clone(),
            input_tokens: tokens(&observation.input_usage, &usage.input),
            output_tokens: tokens(&observation.output_usage, &usage.output),
            total_tokens: tokens(&observation.total_usage, &usage.total),
            cost,
            latency_ms: latency_ms(
                observation.start_time.as_deref(),
                observation.end_time.as_deref(),
            ),
        });
    }
    out
}

/// Milliseconds from start to end when both parse as RFC 3339.
pub fn latency_ms(start: Option<&str>, end: Option<&str>) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(start?).ok()?;
    let end = DateTime::parse_from_rfc3339(end?).ok()?;
    Some((end - start).num_milliseconds())
}

fn date_part(value: &str) -> Option<String> {
    let date = value.split('T').next()?.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Non-negative counts, capped at what an SQLite INTEGER column holds.
fn coerce_u64(value: &Value) -> u64 {
    const MAX_COUNT: u64 = i64::MAX as u64;
    coerce_f64(value)
        .filter(|number| *number > 0.0)
        .map(|number| (number as u64).min(MAX_COUNT))
        .unwrap_or(0)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_metric(value: Value) -> RawDailyMetric {
        serde_json::from_value(value).expect("raw metric")
    }

    fn raw_observation(value: Value) -> RawObservation {
        serde_json::from_value(value).expect("raw observation")
    }

    #[test]
    fn oversized_counts_are_capped_instead_of_wrapping() {
        let rows = daily_metrics_from_raw(&[raw_metric(json!({
            "providedModelName": "gpt-4o",
            "time_dimension": "2025-03-01T00:00:00.000Z",
            "sum_totalTokens": "1e19",
            "count_count": 1e300
        }))]);
        let metric = &rows.rows[0];
        assert_eq!(metric.total_tokens, i64::MAX as u64);
        assert_eq!(metric.request_count, i64::MAX as u64);
    }

    #[test]
    fn daily_metric_coerces_string_sums() {
        let rows = daily_metrics_from_raw(&[raw_metric(json!({
            "providedModelName": "gpt-4o",
            "time_dimension": "2025-03-01T00:00:00.000Z",
            "sum_totalCost": 1.25,
            "sum_inputTokens": "1200",
            "sum_outputTokens": "300",
            "sum_totalTokens": "1500",
            "count_count": "4"
        }))]);
        assert_eq!(rows.skipped, 0);
        let metric = &rows.rows[0];
        assert_eq!(metric.date, "2025-03-01");
        assert_eq!(metric.model, "gpt-4o");
        assert_eq!(metric.input_tokens, 1200);
        assert_eq!(metric.total_tokens, 1500);
        assert_eq!(metric.request_count, 4);
        assert!((metric.total_cost - 1.25).abs() < 1e-9);
    }

    #[test]
    fn daily_metric_defaults_bad_numbers_and_missing_model() {
        let rows = daily_metrics_from_raw(&[raw_metric(json!({
            "providedModelName": null,
            "time_dimension": "2025-03-02",
            "sum_totalCost": "n/a",
            "sum_inputTokens": {"nested": true},
            "count_count": -3
        }))]);
        let metric = &rows.rows[0];
        assert_eq!(metric.model, UNKNOWN_MODEL);
        assert_eq!(metric.input_tokens, 0);
        assert_eq!(metric.output_tokens, 0);
        assert_eq!(metric.request_count, 0);
        assert_eq!(metric.total_cost, 0.0);
    }

    #[test]
    fn daily_metric_without_date_is_skipped() {
        let rows = daily_metrics_from_raw(&[
            raw_metric(json!({ "providedModelName": "a" })),
            raw_metric(json!({ "providedModelName": "b", "time_dimension": "yesterday" })),
        ]);
        assert!(rows.rows.is_empty());
        assert_eq!(rows.skipped, 2);
    }

    #[test]
    fn observation_prefers_flat_usage_and_computes_latency() {
        let rows = requests_from_observations(&[raw_observation(json!({
            "id": "obs-1",
            "traceId": "trace-1",
            "name": "chat",
            "model": "gpt-4o",
            "startTime": "2025-03-01T10:00:00.000Z",
            "endTime": "2025-03-01T10:00:01.250Z",
            "inputUsage": 10,
            "outputUsage": 5,
            "totalUsage": 15,
            "usage": { "input": 99, "output": 99, "total": 99 },
            "calculatedTotalCost": 0.002
        }))]);
        let record = &rows.rows[0];
        assert_eq!(record.input_tokens, 10);
        assert_eq!(record.output_tokens, 5);
        assert_eq!(record.total_tokens, 15);
        assert_eq!(record.latency_ms, Some(1250));
        assert_eq!(record.cost, Some(0.002));
        assert_eq!(record.trace_id.as_deref(), Some("trace-1"));
    }

    #[test]
    fn observation_falls_back_to_nested_usage_and_total_cost() {
        let rows = requests_from_observations(&[raw_observation(json!({
            "id": "obs-2",
            "startTime": "2025-03-01T10:00:00Z",
            "usage": { "input": 7, "output": "3", "total": 10 },
            "totalCost": 0.5
        }))]);
        let record = &rows.rows[0];
        assert_eq!(record.input_tokens, 7);
        assert_eq!(record.output_tokens, 3);
        assert_eq!(record.cost, Some(0.5));
        assert_eq!(record.latency_ms, None);
        assert_eq!(record.model, None);
    }

    #[test]
    fn observation_without_cost_keeps_null_cost() {
        let rows = requests_from_observations(&[
            raw_observation(json!({ "id": "obs-3", "calculatedTotalCost": null })),
            raw_observation(json!({ "traceId": "orphan" })),
        ]);
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].cost, None);
        assert_eq!(rows.skipped, 1);
    }
}
