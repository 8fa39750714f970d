//! Pre-mute volume memory
//!
//! Holds the level to restore on unmute. In-memory by default; with
//! `mute.persist` enabled it is mirrored to sled so a restart while muted
//! can still unmute to the right level.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Key of the single mute entry in the sled database
const PREVIOUS_VOLUME_KEY: &str = "mute:previous_volume";

/// Serialized mute entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MuteEntry {
    pub previous_volume: u8,
    pub timestamp: u64,
}

/// Level remembered across a mute/unmute pair
pub struct MuteMemory {
    previous_volume: Option<u8>,
    db: Option<sled::Db>,
}

impl MuteMemory {
    /// Memory that is lost on restart
    pub fn in_memory() -> Self {
        Self {
            previous_volume: None,
            db: None,
        }
    }

    /// Open (or create) the sled database at `path` and restore any entry
    pub fn persistent(path: &Path) -> Result<Self> {
        // Every write is flushed explicitly, no background flusher needed
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(None)
            .open()
            .with_context(|| format!("Failed to open mute database at {}", path.display()))?;
        Ok(Self::with_db(db))
    }

    pub fn with_db(db: sled::Db) -> Self {
        let previous_volume = match db.get(PREVIOUS_VOLUME_KEY) {
            Ok(Some(value)) => match serde_json::from_slice::<MuteEntry>(&value) {
                Ok(entry) => {
                    info!("Restored pre-mute volume {}%", entry.previous_volume);
                    Some(entry.previous_volume)
                }
                Err(e) => {
                    warn!("Ignoring unreadable mute entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read mute entry from sled: {}", e);
                None
            }
        };

        Self {
            previous_volume,
            db: Some(db),
        }
    }

    pub fn previous_volume(&self) -> Option<u8> {
        self.previous_volume
    }

    pub fn is_muted(&self) -> bool {
        self.previous_volume.is_some()
    }

    /// Remember the level to restore
    ///
    /// The in-memory value is always updated; a persistence failure is
    /// returned so the caller can log it.
    pub fn remember(&mut self, level: u8) -> Result<()> {
        self.previous_volume = Some(level);

        if let Some(db) = &self.db {
            let entry = MuteEntry {
                previous_volume: level,
                timestamp: std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0),
            };
            let value = serde_json::to_vec(&entry).context("Failed to serialize mute entry")?;
            db.insert(PREVIOUS_VOLUME_KEY, value)
                .context("Failed to persist mute entry to sled")?;
            db.flush().context("Failed to flush mute database")?;
        }

        debug!("Remembered pre-mute volume {}%", level);
        Ok(())
    }

    /// Forget the remembered level
    pub fn clear(&mut self) -> Result<()> {
        self.previous_volume = None;

        if let Some(db) = &self.db {
            db.remove(PREVIOUS_VOLUME_KEY)
                .context("Failed to remove mute entry from sled")?;
            db.flush().context("Failed to flush mute database")?;
        }

        debug!("Cleared pre-mute volume");
        Ok(())
    }
}
