use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 500;
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 200;

fn default_page() -> u32 {
    1
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_history_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

/// Bounds for a cost summary: `YYYY-MM-DD` dates, or timestamps on both sides (UTC when no
/// offset is given).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CostParams {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    pub model: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_page_limit(),
            model: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImportRunParams {
    pub id: i64,
}
