use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{info, warn};
use usage_core::{ImportMode, ImportRun};
use usage_db::{Db, RunCompletion, SharedDb};

use crate::transform::{
    RawDailyMetric, RawObservation, daily_metrics_from_raw, requests_from_observations,
};
use crate::types::{ImportStats, Result};

pub const FULL_IMPORT_LOOKBACK_DAYS: i64 = 90;

/// Where an import reads upstream data from.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_daily_metrics(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<RawDailyMetric>>;

    async fn fetch_all_observations(
        &self,
        from_start_time: Option<&str>,
    ) -> Result<Vec<RawObservation>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bounds of one import. `from_timestamp` is `None` for a full import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWindow {
    pub mode: ImportMode,
    pub from_timestamp: Option<String>,
    pub from_date: String,
    pub to_timestamp: String,
    pub to_date: String,
}

impl ImportWindow {
    pub fn plan(last_success: Option<&ImportRun>, now: DateTime<Utc>) -> Self {
        let to_timestamp = format_timestamp(now);
        let to_date = now.format("%Y-%m-%d").to_string();
        match last_success {
            Some(run) => Self {
                mode: ImportMode::Incremental,
                from_date: date_of(&run.to_timestamp),
                from_timestamp: Some(run.to_timestamp.clone()),
                to_timestamp,
                to_date,
            },
            None => Self {
                mode: ImportMode::Full,
                from_timestamp: None,
                from_date: (now - Duration::days(FULL_IMPORT_LOOKBACK_DAYS))
                    .format("%Y-%m-%d")
                    .to_string(),
                to_timestamp,
                to_date,
            },
        }
    }
}

fn date_of(timestamp: &str) -> String {
    timestamp
        .split('T')
        .next()
        .unwrap_or(timestamp)
        .to_string()
}

/// Runs imports against a telemetry source and records each run in the database.
pub struct ImportOrchestrator<S, C = SystemClock> {
    db: SharedDb,
    source: S,
    clock: C,
}

impl<S: TelemetrySource> ImportOrchestrator<S, SystemClock> {
    pub fn new(db: SharedDb, source: S) -> Self {
        Self::with_clock(db, source, SystemClock)
    }
}

impl<S: TelemetrySource, C: Clock> ImportOrchestrator<S, C> {
    pub fn with_clock(db: SharedDb, source: S, clock: C) -> Self {
        Self { db, source, clock }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs a store call on the blocking pool so SQLite work never parks an async worker.
    async fn with_db<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Db) -> usage_db::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || op(&mut db.lock())).await??;
        Ok(result)
    }

    /// Picks full or incremental mode, fetches and stores the window, and returns the finalized
    /// run. Fetch, transform and upsert failures end up in the run as `failed`; only failures
    /// to read or write the run record itself are returned as errors.
    pub async fn run_import(&self) -> Result<ImportRun> {
        let now = self.clock.now();
        let last_success = self
            .with_db(|db| db.get_last_successful_import())
            .await?;
        let window = ImportWindow::plan(last_success.as_ref(), now);
        let (mode, from_timestamp, to_timestamp) = (
            window.mode,
            window.from_timestamp.clone(),
            window.to_timestamp.clone(),
        );
        let run = self
            .with_db(move |db| {
                db.create_import_run(
                    mode,
                    from_timestamp.as_deref(),
                    &to_timestamp,
                    &to_timestamp,
                )
            })
            .await?;
        info!(
            run_id = run.id,
            mode = window.mode.as_str(),
            from = window.from_timestamp.as_deref().unwrap_or(window.from_date.as_str()),
            to = %window.to_timestamp,
            "starting import"
        );

        let outcome = self.fetch_and_store(&window).await;
        let finished_at = format_timestamp(self.clock.now());
        let completion = match outcome {
            Ok(stats) => {
                info!(
                    run_id = run.id,
                    metrics = stats.metrics_written,
                    requests = stats.requests_written,
                    skipped = stats.skipped_rows,
                    "import finished"
                );
                RunCompletion::success(finished_at)
            }
            Err(err) => {
                warn!(run_id = run.id, error = %err, "import failed");
                RunCompletion::failed(finished_at, err.to_string())
            }
        };
        let run_id = run.id;
        self.with_db(move |db| db.complete_import_run(run_id, &completion))
            .await
    }

    async fn fetch_and_store(&self, window: &ImportWindow) -> Result<ImportStats> {
        let raw_metrics = self
            .source
            .fetch_daily_metrics(&window.from_date, &window.to_date)
            .await?;
        let metrics = daily_metrics_from_raw(&raw_metrics);
        let metric_rows = metrics.rows;
        let metrics_written = self
            .with_db(move |db| db.upsert_daily_metrics(&metric_rows))
            .await?;

        let raw_observations = self
            .source
            .fetch_all_observations(window.from_timestamp.as_deref())
            .await?;
        let requests = requests_from_observations(&raw_observations);
        let request_rows = requests.rows;
        let requests_written = self
            .with_db(move |db| db.upsert_requests(&request_rows))
            .await?;

        Ok(ImportStats {
            metrics_written,
            requests_written,
            skipped_rows: metrics.skipped + requests.skipped,
        })
    }
}
