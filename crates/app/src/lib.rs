pub mod app;
pub mod config;
pub mod error;
pub mod services;
pub mod util;

pub use app::{AppConfig, AppState, setup_db};
pub use config::{CostParams, HistoryParams, ImportRunParams, RequestParams};
pub use error::{ApiError, AppError, Result};
pub use services::{AnalyticsService, AppServices, ImportService};
pub use util::time::{resolve_cost_range, resolve_request_bound};
