use std::path::{Path, PathBuf};

use ingest::TelemetrySettings;
use usage_db::{Db, SharedDb};

use crate::error::Result;
use crate::services::AppServices;

/// Everything the process needs, built once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub telemetry: TelemetrySettings,
}

/// Application state shared by the HTTP API and the CLI.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: SharedDb,
    pub services: AppServices,
}

impl AppState {
    /// Opens and migrates the database at `config.db_path`.
    pub fn open(config: AppConfig) -> Result<Self> {
        let db = setup_db(&config.db_path)?.into_shared();
        Ok(Self::with_db(config, db))
    }

    pub fn with_db(config: AppConfig, db: SharedDb) -> Self {
        let services = AppServices::new(&config, db.clone());
        Self {
            config,
            db,
            services,
        }
    }
}

pub fn setup_db(path: &Path) -> Result<Db> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(db)
}
