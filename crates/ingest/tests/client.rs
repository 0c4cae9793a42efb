use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ingest::{
    IngestError, MAX_RETRIES, RetryPolicy, Sleeper, TelemetryClient, TelemetrySettings,
};
use serde_json::{Value, json};
use wiremock::matchers::{basic_auth, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("delays lock").clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().expect("delays lock").push(duration);
    }
}

fn settings(host: &str) -> TelemetrySettings {
    TelemetrySettings {
        host: Some(host.to_string()),
        public_key: Some("pk-test".to_string()),
        secret_key: Some("sk-test".to_string()),
        timeout_secs: 5,
    }
}

fn client_for(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> TelemetryClient {
    TelemetryClient::new(&settings(&server.uri()))
        .expect("client")
        .with_sleeper(sleeper)
}

fn observations(ids: &[&str]) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({ "id": id, "model": "gpt-4o", "inputUsage": 1 }))
        .collect()
}

#[tokio::test]
async fn fetch_all_observations_follows_cursor_until_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/v2/observations"))
        .and(query_param("type", "GENERATION"))
        .and(query_param("limit", "1000"))
        .and(query_param("fields", "core,basic,usage,model"))
        .and(query_param("fromStartTime", "2025-03-01T00:00:00.000Z"))
        .and(query_param_is_missing("cursor"))
        .and(basic_auth("pk-test", "sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": observations(&["a", "b"]),
            "meta": { "cursor": "c1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/public/v2/observations"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": observations(&["c", "d"]),
            "meta": { "cursor": "c2" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/public/v2/observations"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": observations(&["e"]),
            "meta": { "cursor": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(RecordingSleeper::default()));
    let rows = client
        .fetch_all_observations(Some("2025-03-01T00:00:00.000Z"))
        .await
        .expect("observations");
    let ids: Vec<_> = rows.iter().filter_map(|row| row.id.as_deref()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn fetch_all_observations_stops_on_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/v2/observations"))
        .and(query_param_is_missing("fromStartTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "meta": { "cursor": "never-followed" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(RecordingSleeper::default()));
    let rows = client
        .fetch_all_observations(None)
        .await
        .expect("observations");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn rate_limited_request_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/v2/observations"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(u64::from(MAX_RETRIES) + 1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&server, sleeper.clone());
    let err = client
        .fetch_all_observations(None)
        .await
        .expect_err("429 after retries");
    match err {
        IngestError::Status { status, body, .. } => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test]
async fn retry_after_header_sets_the_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&server, sleeper.clone());
    let rows = client
        .fetch_daily_metrics("2025-03-01", "2025-03-02")
        .await
        .expect("metrics");
    assert!(rows.is_empty());
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn custom_retry_policy_bounds_attempts_and_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&server, sleeper.clone()).with_retry_policy(RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(10),
    });
    let err = client
        .fetch_daily_metrics("2025-03-01", "2025-03-02")
        .await
        .expect_err("429 after one retry");
    assert!(matches!(err, IngestError::Status { status: 429, .. }));
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(10)]);
}

#[tokio::test]
async fn fractional_retry_after_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1.5"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&server, sleeper.clone());
    client
        .fetch_daily_metrics("2025-03-01", "2025-03-02")
        .await
        .expect("metrics");
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(1500)]);
}

#[tokio::test]
async fn fetch_daily_metrics_sends_day_granularity_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .and(basic_auth("pk-test", "sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "providedModelName": "gpt-4o",
                "time_dimension": "2025-03-01T00:00:00.000Z",
                "sum_totalCost": 1.5,
                "sum_inputTokens": "100",
                "sum_outputTokens": "50",
                "sum_totalTokens": "150",
                "count_count": "2"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(RecordingSleeper::default()));
    let rows = client
        .fetch_daily_metrics("2025-03-01", "2025-03-07")
        .await
        .expect("metrics");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].provided_model_name.as_deref(), Some("gpt-4o"));

    let requests = server.received_requests().await.expect("recorded requests");
    let query = requests[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.into_owned())
        .expect("query param");
    let query: Value = serde_json::from_str(&query).expect("query json");
    assert_eq!(query["view"], "observations");
    assert_eq!(query["timeDimension"]["granularity"], "day");
    assert_eq!(query["dimensions"][0]["field"], "providedModelName");
    assert_eq!(query["fromTimestamp"], "2025-03-01T00:00:00Z");
    assert_eq!(query["toTimestamp"], "2025-03-07T23:59:59Z");
    assert_eq!(query["metrics"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = client_for(&server, sleeper.clone());
    let err = client
        .fetch_daily_metrics("2025-03-01", "2025-03-01")
        .await
        .expect_err("500");
    assert!(matches!(err, IngestError::Status { status: 500, label: "metrics", .. }));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(RecordingSleeper::default()));
    let err = client
        .fetch_daily_metrics("2025-03-01", "2025-03-01")
        .await
        .expect_err("decode");
    assert!(matches!(err, IngestError::Decode { label: "metrics", .. }));
}

#[test]
fn missing_secret_key_fails_at_construction() {
    let mut settings = settings("http://127.0.0.1:9");
    settings.secret_key = None;
    let err = TelemetryClient::new(&settings).err().expect("config error");
    assert!(matches!(err, IngestError::Config(ref fields) if fields == "secret_key"));
}
