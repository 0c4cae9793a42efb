#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;
use usage_core::{DailyMetric, RequestRecord};
use usage_db::Db;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn make_metric(date: &str, model: &str, cost: f64, requests: u64) -> DailyMetric {
    DailyMetric {
        date: date.to_string(),
        model: model.to_string(),
        input_tokens: requests * 100,
        output_tokens: requests * 50,
        total_tokens: requests * 150,
        request_count: requests,
        total_cost: cost,
    }
}

pub fn make_request(
    id: &str,
    model: Option<&str>,
    started_at: &str,
    cost: Option<f64>,
) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        trace_id: Some(format!("trace-{id}")),
        name: Some("chat".to_string()),
        model: model.map(str::to_string),
        started_at: Some(started_at.to_string()),
        finished_at: None,
        input_tokens: 10,
        output_tokens: 5,
        total_tokens: 15,
        cost,
        latency_ms: None,
    }
}
