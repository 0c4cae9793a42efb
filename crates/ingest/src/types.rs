use usage_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("telemetry configuration missing: {0}")]
    Config(String),
    #[error("telemetry {label} request failed ({status}): {body}")]
    Status {
        label: &'static str,
        status: u16,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode telemetry {label} response: {source}")]
    Decode {
        label: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Row counts for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub metrics_written: usize,
    pub requests_written: usize,
    pub skipped_rows: usize,
}
