//! Application state: the store handle and the logged-in session.
//!
//! Account operations live in [`crate::auth`], conversation and group
//! operations in [`crate::chat`]; both are `impl AppState` blocks.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use peerchat_shared::session::SessionContext;
use peerchat_store::Database;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Store handle shared by the application state and the sync engine.
/// Never locked across an `.await`.
pub type SharedDb = Arc<Mutex<Database>>;

pub struct AppState {
    pub(crate) db: SharedDb,
    /// `None` until login or restore.
    pub(crate) session: Option<SessionContext>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            session: None,
        }
    }

    /// Open the configured database, or the platform default.
    pub fn open(config: &ClientConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::open_default()?,
        };
        info!(path = ?db.path(), "Database opened");
        Ok(Self::new(db))
    }

    pub fn db(&self) -> SharedDb {
        self.db.clone()
    }

    pub fn session(&self) -> Result<&SessionContext> {
        self.session.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }
}

pub(crate) fn lock_db(db: &SharedDb) -> Result<MutexGuard<'_, Database>> {
    db.lock().map_err(|_| ClientError::LockPoisoned)
}
