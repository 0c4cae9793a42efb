use std::sync::Arc;

use ingest::{ImportOrchestrator, TelemetryClient, TelemetrySource};
use tokio::sync::Mutex;
use tracing::info;
use usage_core::ImportRun;
use usage_db::SharedDb;

use crate::error::Result;
use crate::services::SharedConfig;

#[derive(Clone)]
pub struct ImportService {
    config: SharedConfig,
    db: SharedDb,
    in_flight: Arc<Mutex<()>>,
}

impl ImportService {
    pub(super) fn new(config: SharedConfig, db: SharedDb) -> Self {
        Self {
            config,
            db,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.telemetry.is_configured()
    }

    /// Imports from the configured upstream. Fails before creating a run when credentials
    /// are missing.
    pub async fn run(&self) -> Result<ImportRun> {
        let client = TelemetryClient::new(&self.config.telemetry)?;
        self.run_with(client).await
    }

    /// Imports from `source`. Calls are serialized, so each one plans its window from the
    /// checkpoint left by the previous call.
    pub async fn run_with<S: TelemetrySource>(&self, source: S) -> Result<ImportRun> {
        let _guard = self.in_flight.lock().await;
        let run = ImportOrchestrator::new(self.db.clone(), source)
            .run_import()
            .await?;
        info!(run_id = run.id, status = run.status.as_str(), "import run recorded");
        Ok(run)
    }
}
