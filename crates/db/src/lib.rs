mod error;
mod helpers;
mod imports;
mod metrics;
mod migrations;
mod requests;
mod types;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

pub use error::{DbError, Result};
pub use types::{RequestFilter, RequestPage, RunCompletion, TerminalStatus};

/// Process-wide database handle. Each repository call holds the lock for one transaction.
pub type SharedDb = Arc<Mutex<Db>>;

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn into_shared(self) -> SharedDb {
        Arc::new(Mutex::new(self))
    }
}
