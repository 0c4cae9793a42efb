#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("import run {0} is not running")]
    RunNotRunning(i64),
}

pub type Result<T> = std::result::Result<T, DbError>;
