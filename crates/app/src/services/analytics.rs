use std::collections::BTreeMap;

use usage_core::{
    CostRange, CostSummary, DailyCost, DailyMetric, ImportRun, ImportStatusInfo, ModelUsage,
    PageMeta, PaginatedRequests, RequestListing, page_count,
};
use usage_db::{RequestFilter, SharedDb};

use crate::config::{HistoryParams, MAX_HISTORY_LIMIT, MAX_PAGE_LIMIT, RequestParams};
use crate::error::{AppError, Result};
use crate::util::time::{resolve_cost_range, resolve_request_bound};

#[derive(Clone)]
pub struct AnalyticsService {
    db: SharedDb,
}

impl AnalyticsService {
    pub(super) fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Daily cost buckets for the range. Timestamp bounds are answered from raw requests,
    /// date bounds from the daily rollup.
    pub fn get_costs(&self, from: &str, to: &str) -> Result<CostSummary> {
        let rows = match resolve_cost_range(from, to)? {
            CostRange::Dates { from, to } => self.db.lock().get_daily_metrics(&from, &to)?,
            CostRange::Timestamps { from, to } => {
                self.db.lock().get_metrics_by_time_range(&from, &to)?
            }
        };
        Ok(group_by_date(rows))
    }

    pub fn get_requests(&self, params: &RequestParams) -> Result<PaginatedRequests> {
        if params.page < 1 {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }
        if params.limit < 1 || params.limit > MAX_PAGE_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        let filter = RequestFilter {
            model: params
                .model
                .as_deref()
                .map(str::trim)
                .filter(|model| !model.is_empty())
                .map(str::to_string),
            from: params
                .from
                .as_deref()
                .map(|value| resolve_request_bound(value, false))
                .transpose()?,
            to: params
                .to
                .as_deref()
                .map(|value| resolve_request_bound(value, true))
                .transpose()?,
        };
        let page = self
            .db
            .lock()
            .get_requests(params.page, params.limit, &filter)?;
        Ok(PaginatedRequests {
            data: page.rows.into_iter().map(RequestListing::from).collect(),
            meta: PageMeta {
                page: params.page,
                limit: params.limit,
                total_items: page.total,
                total_pages: page_count(page.total, params.limit),
            },
        })
    }

    pub fn get_import_status(&self) -> Result<ImportStatusInfo> {
        let db = self.db.lock();
        let last_run = db.get_latest_import()?;
        let counts = db.get_counts()?;
        Ok(ImportStatusInfo {
            last_status: last_run.as_ref().map(|run| run.status),
            last_run,
            counts,
        })
    }

    pub fn import_history(&self, params: &HistoryParams) -> Result<Vec<ImportRun>> {
        if params.limit < 1 || params.limit > MAX_HISTORY_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }
        Ok(self.db.lock().get_import_history(params.limit)?)
    }

    pub fn import_run(&self, id: i64) -> Result<ImportRun> {
        self.db
            .lock()
            .get_import_run(id)?
            .ok_or_else(|| AppError::NotFound(format!("import run {id} not found")))
    }

    pub fn models(&self) -> Result<Vec<String>> {
        Ok(self.db.lock().get_distinct_models()?)
    }
}

fn group_by_date(rows: Vec<DailyMetric>) -> CostSummary {
    let mut days: BTreeMap<String, DailyCost> = BTreeMap::new();
    for row in rows {
        let day = days.entry(row.date.clone()).or_insert_with(|| DailyCost {
            date: row.date.clone(),
            total_cost: 0.0,
            request_count: 0,
            usage: Vec::new(),
        });
        day.total_cost += row.total_cost;
        day.request_count += row.request_count;
        day.usage.push(ModelUsage {
            model: row.model,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            total_tokens: row.total_tokens,
            total_cost: row.total_cost,
            request_count: row.request_count,
        });
    }
    CostSummary {
        daily: days.into_values().collect(),
    }
}
