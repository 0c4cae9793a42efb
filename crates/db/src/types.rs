use rusqlite::types::Value;
use usage_core::{ImportStatus, RequestRecord};

/// Statuses an import run may finish in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Success,
    Failed,
}

impl From<TerminalStatus> for ImportStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Success => ImportStatus::Success,
            TerminalStatus::Failed => ImportStatus::Failed,
        }
    }
}

/// Final state written to an import run. Applied once, to a run still in `running`.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: TerminalStatus,
    pub finished_at: String,
    pub error_message: Option<String>,
}

impl RunCompletion {
    pub fn success(finished_at: impl Into<String>) -> Self {
        Self {
            status: TerminalStatus::Success,
            finished_at: finished_at.into(),
            error_message: None,
        }
    }

    pub fn failed(finished_at: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            status: TerminalStatus::Failed,
            finished_at: finished_at.into(),
            error_message: Some(error_message.into()),
        }
    }
}

/// Optional filters for request listings. Bounds compare against `started_at`, inclusive.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub model: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RequestFilter {
    /// Renders the `WHERE` clause and its positional values.
    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        let filters = [
            ("model = ?", self.model.as_ref()),
            ("started_at >= ?", self.from.as_ref()),
            ("started_at <= ?", self.to.as_ref()),
        ];
        for (clause, value) in filters {
            if let Some(value) = value {
                values.push(Value::Text(value.clone()));
                clauses.push(clause.replace('?', &format!("?{}", values.len())));
            }
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestPage {
    pub rows: Vec<RequestRecord>,
    pub total: u64,
}
