mod client;
mod config;
mod pipeline;
mod retry;
mod transform;
mod types;

pub use client::{OBSERVATION_PAGE_SIZE, TelemetryClient};
pub use config::{DEFAULT_TIMEOUT_SECS, TelemetrySettings};
pub use pipeline::{
    Clock, FULL_IMPORT_LOOKBACK_DAYS, ImportOrchestrator, ImportWindow, SystemClock,
    TelemetrySource, format_timestamp,
};
pub use retry::{
    BASE_DELAY, MAX_RETRIES, RateLimited, RetryPolicy, Sleeper, TokioSleeper,
    parse_retry_after, with_rate_limit_retry,
};
pub use transform::{
    RawDailyMetric, RawObservation, RawUsage, Transformed, daily_metrics_from_raw, latency_ms,
    requests_from_observations,
};
pub use types::{ImportStats, IngestError, Result};
