//! Config and state path resolution.
//!
//! ## Mode Detection
//!
//! - **Dev mode** (debug builds only): if `config.yaml` exists in the current
//!   working directory, it is used and state goes to `./.state`.
//! - **System mode**: if `/etc/oakhz/rotary.yaml` exists the controller is
//!   running as an installed service; state lives in `/var/lib/oakhz-rotary`.
//! - **User mode** (default): `~/.config/oakhz-rotary/config.yaml` with state
//!   under the user's state (or local data) directory.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the user config/state directories
const APP_NAME: &str = "oakhz-rotary";

const SYSTEM_CONFIG: &str = "/etc/oakhz/rotary.yaml";
const SYSTEM_STATE_DIR: &str = "/var/lib/oakhz-rotary";

/// Resolved locations of the config file and the state directory
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file (may not exist)
    pub config: PathBuf,
    /// Path to the state directory (sled database for mute memory)
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so nothing is logged here.
    pub fn detect() -> Self {
        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let cwd_config = cwd.join("config.yaml");
            if cwd_config.exists() {
                return Self {
                    config: cwd_config,
                    state_dir: cwd.join(".state"),
                };
            }
        }

        Self::detect_in(Path::new(SYSTEM_CONFIG), dirs::config_dir(), user_state_dir())
    }

    /// Detection with the system config location and user directories
    /// supplied by the caller
    fn detect_in(
        system_config: &Path,
        config_dir: Option<PathBuf>,
        state_dir: Option<PathBuf>,
    ) -> Self {
        if system_config.exists() {
            return Self {
                config: system_config.to_path_buf(),
                state_dir: PathBuf::from(SYSTEM_STATE_DIR),
            };
        }

        let config_dir = config_dir.unwrap_or_else(|| PathBuf::from("."));
        let state_dir = state_dir.unwrap_or_else(|| PathBuf::from(".state"));

        Self {
            config: config_dir.join(APP_NAME).join("config.yaml"),
            state_dir: state_dir.join(APP_NAME),
        }
    }

    /// Create the state directory if needed
    pub fn ensure_state_dir(&self) -> anyhow::Result<()> {
        if !self.state_dir.exists() {
            debug!("Creating state directory: {}", self.state_dir.display());
            std::fs::create_dir_all(&self.state_dir).with_context(|| {
                format!(
                    "Failed to create state directory {}",
                    self.state_dir.display()
                )
            })?;
        }
        Ok(())
    }

    /// Get the sled database path (within state_dir)
    pub fn sled_db_path(&self) -> PathBuf {
        self.state_dir.join("sled")
    }
}

/// `$XDG_STATE_HOME` where supported, local data dir elsewhere
fn user_state_dir() -> Option<PathBuf> {
    dirs::state_dir().or_else(dirs::data_local_dir)
}
