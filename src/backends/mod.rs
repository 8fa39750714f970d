//! External collaborators the controller drives
//!
//! Every integration is reached through one of the traits below so the
//! synchronizer and the button dispatcher never depend on a concrete
//! transport (subprocess, TCP, HTTP, SQLite).
//!
//! All methods take `&self`; implementations open and close their own
//! connection per call and carry their own timeouts.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::volume::VolumeSettings;

pub mod bluez;
pub mod mixer;
pub mod mpd;
pub mod plexamp;
pub mod power;
pub mod process;
pub mod store;

#[cfg(test)]
pub mod mock;

pub use bluez::BluezMediaControl;
pub use mixer::{MixerDialect, SoftwareMixer};
pub use mpd::MpdClient;
pub use plexamp::PlexampRemote;
pub use power::SystemPower;
pub use store::SqliteStore;

/// Authoritative volume record
///
/// Holds the current level and the configured ceiling. Writes must be
/// atomic: a failed `store` leaves the previous level in place.
#[async_trait]
pub trait VolumeStore: Send + Sync {
    /// Read the current level and the configured maximum in one go
    async fn load(&self) -> Result<VolumeSettings, BackendError>;

    /// Persist a new current level
    async fn store(&self, level: u8) -> Result<(), BackendError>;
}

/// Best-effort volume target (mixer, media client, remote API)
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Short name used in logs and fan-out reports
    fn name(&self) -> &'static str;

    /// Read the level currently applied by this backend
    ///
    /// Default: not supported.
    async fn get_volume(&self) -> Result<u8, BackendError> {
        Err(BackendError::Unsupported {
            backend: self.name(),
        })
    }

    /// Apply a level that has already been clamped by the caller
    async fn set_volume(&self, level: u8) -> Result<(), BackendError>;
}

/// Playback state reported by the connected media source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    Other,
}

impl PlaybackStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            "stopped" => Self::Stopped,
            _ => Self::Other,
        }
    }
}

/// Transport command for the media source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Play,
    Pause,
    Next,
}

impl MediaCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaCommand::Play => "Play",
            MediaCommand::Pause => "Pause",
            MediaCommand::Next => "Next",
        }
    }
}

/// Media transport of whatever device is currently connected
///
/// `connected_device` returning `Ok(None)` is a normal outcome (nothing is
/// paired right now), not an error.
#[async_trait]
pub trait MediaControl: Send + Sync {
    /// Resolve the bus path of the connected device, if any
    async fn connected_device(&self) -> Result<Option<String>, BackendError>;

    async fn playback_status(&self, device: &str) -> Result<PlaybackStatus, BackendError>;

    async fn send(&self, device: &str, command: MediaCommand) -> Result<(), BackendError>;
}

/// Privileged power control
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Issue the power-off command without waiting for it to complete
    async fn power_off(&self) -> Result<(), BackendError>;
}
