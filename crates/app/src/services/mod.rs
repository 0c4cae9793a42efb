mod analytics;
mod import;

use std::sync::Arc;

use usage_db::SharedDb;

use crate::app::AppConfig;

pub use analytics::AnalyticsService;
pub use import::ImportService;

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub analytics: AnalyticsService,
    pub import: ImportService,
}

impl AppServices {
    pub fn new(config: &AppConfig, db: SharedDb) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            analytics: AnalyticsService::new(db.clone()),
            import: ImportService::new(shared, db),
        }
    }
}
