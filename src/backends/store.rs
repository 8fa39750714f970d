//! moOde configuration database as the authoritative volume store
//!
//! The current level lives in `cfg_system.volknob` and the ceiling in
//! `cfg_system.volume_mpd_max`. The database belongs to moOde, so a
//! connection is opened per call and never held.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

use super::VolumeStore;
use crate::error::BackendError;
use crate::volume::{VolumeSettings, MAX_VOLUME};

const BACKEND: &str = "store";

const CURRENT_PARAM: &str = "volknob";
const MAX_PARAM: &str = "volume_mpd_max";

/// SQLite-backed volume store
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    fn open(path: &PathBuf, busy_timeout: Duration) -> Result<Connection, BackendError> {
        let conn = Connection::open(path).map_err(store_err)?;
        conn.busy_timeout(busy_timeout).map_err(store_err)?;
        Ok(conn)
    }

    fn read_param(conn: &Connection, param: &str) -> Result<Option<i64>, BackendError> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM cfg_system WHERE param = ?1",
                params![param],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        value
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| BackendError::parse(BACKEND, format!("{param} = {v:?}")))
            })
            .transpose()
    }

    fn load_blocking(path: PathBuf, busy_timeout: Duration) -> Result<VolumeSettings, BackendError> {
        let conn = Self::open(&path, busy_timeout)?;

        let current = Self::read_param(&conn, CURRENT_PARAM)?
            .ok_or_else(|| BackendError::parse(BACKEND, format!("{CURRENT_PARAM} is missing")))?;
        let max = Self::read_param(&conn, MAX_PARAM)?.unwrap_or_else(|| {
            debug!("{} not set, assuming {}", MAX_PARAM, MAX_VOLUME);
            i64::from(MAX_VOLUME)
        });

        Ok(VolumeSettings { current, max })
    }

    fn store_blocking(path: PathBuf, busy_timeout: Duration, level: u8) -> Result<(), BackendError> {
        let mut conn = Self::open(&path, busy_timeout)?;

        let tx = conn.transaction().map_err(store_err)?;
        let updated = tx
            .execute(
                "UPDATE cfg_system SET value = ?1 WHERE param = ?2",
                params![level.to_string(), CURRENT_PARAM],
            )
            .map_err(store_err)?;
        if updated == 0 {
            // Dropping the transaction rolls it back
            return Err(BackendError::parse(
                BACKEND,
                format!("{CURRENT_PARAM} row is missing"),
            ));
        }
        tx.commit().map_err(store_err)?;

        trace!("Stored {} = {}", CURRENT_PARAM, level);
        Ok(())
    }
}

#[async_trait]
impl VolumeStore for SqliteStore {
    async fn load(&self) -> Result<VolumeSettings, BackendError> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        tokio::task::spawn_blocking(move || Self::load_blocking(path, busy_timeout))
            .await
            .map_err(join_err)?
    }

    async fn store(&self, level: u8) -> Result<(), BackendError> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        tokio::task::spawn_blocking(move || Self::store_blocking(path, busy_timeout, level))
            .await
            .map_err(join_err)?
    }
}

fn store_err(source: rusqlite::Error) -> BackendError {
    BackendError::Store {
        backend: BACKEND,
        source,
    }
}

fn join_err(e: tokio::task::JoinError) -> BackendError {
    BackendError::io(BACKEND, std::io::Error::new(std::io::ErrorKind::Other, e))
}
