use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use usage_core::CostRange;

use crate::error::{AppError, Result};

/// Parses a bound carrying a time of day. Values without an offset are read as UTC.
fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::InvalidInput(format!("invalid datetime: {value}")))
}

fn format_instant(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A time of day on both sides selects the raw-request path (upper bound exclusive). Anything
/// else is reduced to calendar dates for the daily rollup (both bounds inclusive).
pub fn resolve_cost_range(from: &str, to: &str) -> Result<CostRange> {
    let (from, to) = (from.trim(), to.trim());
    if from.contains('T') && to.contains('T') {
        let from_ts = parse_instant(from)?;
        let to_ts = parse_instant(to)?;
        if from_ts > to_ts {
            return Err(AppError::InvalidInput(
                "from must not be after to".to_string(),
            ));
        }
        return Ok(CostRange::Timestamps {
            from: format_instant(from_ts),
            to: format_instant(to_ts),
        });
    }
    let from_date = parse_date_prefix(from)?;
    let to_date = parse_date_prefix(to)?;
    if from_date > to_date {
        return Err(AppError::InvalidInput(
            "from must not be after to".to_string(),
        ));
    }
    Ok(CostRange::Dates {
        from: from_date.format("%Y-%m-%d").to_string(),
        to: to_date.format("%Y-%m-%d").to_string(),
    })
}

/// A request-listing bound as compared against stored start times. A bare date used as the
/// upper bound covers the whole day.
pub fn resolve_request_bound(value: &str, upper: bool) -> Result<String> {
    let value = value.trim();
    if value.contains('T') {
        return parse_instant(value).map(format_instant);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("invalid date: {value}")))?;
    let date = date.format("%Y-%m-%d");
    Ok(if upper {
        format!("{date}T23:59:59.999Z")
    } else {
        date.to_string()
    })
}

fn parse_date_prefix(value: &str) -> Result<NaiveDate> {
    let date = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("invalid date: {value}")))
}
