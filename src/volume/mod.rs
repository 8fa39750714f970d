//! Volume synchronization across the persisted store and the audio backends
//!
//! The persisted store is authoritative: a volume change only counts as done
//! once it is committed there. The mixer, the media client and the remote
//! API are then updated in order, each on a best-effort basis with its own
//! bounded timeout. Their failures are collected into a [`FanOutReport`]
//! rather than failing the call.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backends::{VolumeBackend, VolumeStore};
use crate::encoder::Direction;
use crate::error::{BackendError, VolumeError};

/// Lowest level ever applied; 0 is reserved as the "uninitialized" sentinel
pub const MIN_VOLUME: u8 = 1;

/// Absolute ceiling regardless of the configured maximum
pub const MAX_VOLUME: u8 = 100;

/// Values read from the persisted store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSettings {
    /// Current authoritative level (may be 0 on a fresh install)
    pub current: i64,
    /// Configured maximum level
    pub max: i64,
}

impl VolumeSettings {
    /// Effective upper bound: `min(100, max)`, never below the floor
    pub fn ceiling(&self) -> u8 {
        self.max.clamp(i64::from(MIN_VOLUME), i64::from(MAX_VOLUME)) as u8
    }
}

/// Clamp a raw level into `[1, ceiling]`
pub fn clamp_level(raw: i64, ceiling: u8) -> u8 {
    let ceiling = ceiling.clamp(MIN_VOLUME, MAX_VOLUME);
    raw.clamp(i64::from(MIN_VOLUME), i64::from(ceiling)) as u8
}

/// Result of one best-effort backend call
#[derive(Debug)]
pub struct BackendOutcome {
    pub backend: &'static str,
    pub result: Result<(), BackendError>,
}

/// Per-backend results of a successful `set_volume`
#[derive(Debug)]
pub struct FanOutReport {
    /// Level committed to the store and pushed to the backends
    pub level: u8,
    pub outcomes: Vec<BackendOutcome>,
}

impl FanOutReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BackendOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Applies volume levels to the store and every configured backend
///
/// Calls are serialized: one `set_volume` (or the read-compute-write of
/// `apply_delta`) completes before the next begins, so two writers can never
/// interleave partial updates of the authoritative record.
pub struct VolumeSynchronizer {
    store: Arc<dyn VolumeStore>,
    backends: Vec<Arc<dyn VolumeBackend>>,
    /// Level used when 0 is requested
    default_volume: u8,
    /// Upper bound for each best-effort backend call
    call_timeout: Duration,
    serial: Mutex<()>,
}

impl VolumeSynchronizer {
    /// Create a synchronizer
    ///
    /// `backends` are applied in the given order after the store write.
    pub fn new(
        store: Arc<dyn VolumeStore>,
        backends: Vec<Arc<dyn VolumeBackend>>,
        default_volume: u8,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            backends,
            default_volume: default_volume.clamp(MIN_VOLUME, MAX_VOLUME),
            call_timeout,
            serial: Mutex::new(()),
        }
    }

    /// Names of the best-effort backends, in fan-out order
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Move the stored volume by `step` in `direction`
    pub async fn apply_delta(
        &self,
        direction: Direction,
        step: u8,
    ) -> Result<FanOutReport, VolumeError> {
        let _serial = self.serial.lock().await;

        let settings = self.load_settings().await?;
        let target = settings.current + direction.signum() * i64::from(step);
        let level = clamp_level(target, settings.ceiling());

        debug!(
            current = settings.current,
            max = settings.max,
            level,
            "Applying volume delta"
        );

        self.apply_locked(level).await
    }

    /// Apply an absolute level
    ///
    /// `0` selects the default volume; anything else is clamped to
    /// `[1, min(100, configured max)]`.
    pub async fn set_volume(&self, level: i64) -> Result<FanOutReport, VolumeError> {
        let _serial = self.serial.lock().await;

        let settings = self.load_settings().await?;
        let level = self.resolve(level, &settings);
        self.apply_locked(level).await
    }

    /// Re-apply the stored level to every backend
    pub async fn resync(&self) -> Result<FanOutReport, VolumeError> {
        let _serial = self.serial.lock().await;

        let settings = self.load_settings().await?;
        let level = self.resolve(settings.current, &settings);
        info!("Synchronizing backends to stored volume {}%", level);
        self.apply_locked(level).await
    }

    fn resolve(&self, requested: i64, settings: &VolumeSettings) -> u8 {
        let requested = if requested == 0 {
            debug!("Volume 0 requested, using default {}", self.default_volume);
            i64::from(self.default_volume)
        } else {
            requested
        };
        clamp_level(requested, settings.ceiling())
    }

    async fn load_settings(&self) -> Result<VolumeSettings, VolumeError> {
        self.store.load().await.map_err(|source| {
            error!("Failed to read volume settings: {}", source);
            VolumeError::SettingsUnavailable { source }
        })
    }

    /// Store write followed by the ordered best-effort fan-out
    ///
    /// Caller must hold `serial`.
    async fn apply_locked(&self, level: u8) -> Result<FanOutReport, VolumeError> {
        if let Err(source) = self.store.store(level).await {
            error!("Failed to persist volume {}: {}", level, source);
            return Err(VolumeError::Persistence { level, source });
        }

        let mut outcomes = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let name = backend.name();
            let result = match tokio::time::timeout(self.call_timeout, backend.set_volume(level))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout {
                    backend: name,
                    after: self.call_timeout,
                }),
            };

            if let Err(e) = &result {
                warn!("Backend '{}' did not take volume {}: {}", name, level, e);
            }
            outcomes.push(BackendOutcome {
                backend: name,
                result,
            });
        }

        let report = FanOutReport { level, outcomes };
        if report.all_succeeded() {
            info!("Volume: {}%", level);
        } else {
            info!(
                "Volume: {}% ({} backend(s) failed)",
                level,
                report.failures().count()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests;
