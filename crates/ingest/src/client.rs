use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::TelemetrySettings;
use crate::pipeline::TelemetrySource;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper, with_rate_limit_retry};
use crate::transform::{RawDailyMetric, RawObservation};
use crate::types::{IngestError, Result};

pub const OBSERVATION_PAGE_SIZE: u32 = 1000;
const OBSERVATION_FIELDS: &str = "core,basic,usage,model";
const METRICS_PATH: &str = "/api/public/metrics";
const OBSERVATIONS_PATH: &str = "/api/public/v2/observations";

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    data: Vec<RawDailyMetric>,
}

#[derive(Debug, Deserialize)]
struct ObservationsPage {
    #[serde(default)]
    data: Vec<RawObservation>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    cursor: Option<String>,
}

/// HTTP client for the upstream telemetry API.
#[derive(Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    host: String,
    public_key: String,
    secret_key: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl TelemetryClient {
    /// Fails with [`IngestError::Config`] when host or either key is missing.
    pub fn new(settings: &TelemetrySettings) -> Result<Self> {
        let credentials = settings.credentials()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            host: credentials.host,
            public_key: credentials.public_key,
            secret_key: credentials.secret_key,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Day-granularity cost and token sums per model for `from_date..=to_date`.
    pub async fn fetch_daily_metrics(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<RawDailyMetric>> {
        let query = json!({
            "view": "observations",
            "metrics": [
                { "measure": "totalCost", "aggregation": "sum" },
                { "measure": "inputTokens", "aggregation": "sum" },
                { "measure": "outputTokens", "aggregation": "sum" },
                { "measure": "totalTokens", "aggregation": "sum" },
                { "measure": "count", "aggregation": "count" }
            ],
            "dimensions": [{ "field": "providedModelName" }],
            "timeDimension": { "granularity": "day" },
            "fromTimestamp": format!("{from_date}T00:00:00Z"),
            "toTimestamp": format!("{to_date}T23:59:59Z"),
            "filters": []
        });
        let response: MetricsResponse = self
            .get_json("metrics", METRICS_PATH, &[("query", query.to_string())])
            .await?;
        debug!(rows = response.data.len(), from_date, to_date, "fetched daily metrics");
        Ok(response.data)
    }

    /// Every generation observation, following cursors until an empty page or no cursor.
    pub async fn fetch_all_observations(
        &self,
        from_start_time: Option<&str>,
    ) -> Result<Vec<RawObservation>> {
        let mut observations = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let mut query = vec![
                ("type", "GENERATION".to_string()),
                ("limit", OBSERVATION_PAGE_SIZE.to_string()),
                ("fields", OBSERVATION_FIELDS.to_string()),
            ];
            if let Some(from) = from_start_time {
                query.push(("fromStartTime", from.to_string()));
            }
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }

            let page: ObservationsPage = self
                .get_json("observations", OBSERVATIONS_PATH, &query)
                .await?;
            pages += 1;
            debug!(page = pages, rows = page.data.len(), "fetched observations page");
            if page.data.is_empty() {
                break;
            }
            observations.extend(page.data);
            match page.meta.and_then(|meta| meta.cursor) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(observations)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        label: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.host, path);
        let response = with_rate_limit_retry(&self.retry, self.sleeper.as_ref(), label, || {
            self.http
                .get(&url)
                .basic_auth(&self.public_key, Some(&self.secret_key))
                .query(query)
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Status {
                label,
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| IngestError::Decode { label, source })
    }
}

#[async_trait]
impl TelemetrySource for TelemetryClient {
    async fn fetch_daily_metrics(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<RawDailyMetric>> {
        TelemetryClient::fetch_daily_metrics(self, from_date, to_date).await
    }

    async fn fetch_all_observations(
        &self,
        from_start_time: Option<&str>,
    ) -> Result<Vec<RawObservation>> {
        TelemetryClient::fetch_all_observations(self, from_start_time).await
    }
}
