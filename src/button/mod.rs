//! Push-button press timing and action dispatch
//!
//! The GPIO layer feeds [`ButtonEdge`]s into a bounded channel. The
//! dispatcher pairs each press with the following release (or gives up
//! after a safety timeout), classifies the held duration and performs the
//! matching action.

pub mod mute;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::backends::{MediaCommand, MediaControl, PlaybackStatus, PowerControl, VolumeBackend};
use crate::volume::{VolumeSynchronizer, MIN_VOLUME};

pub use mute::MuteMemory;

/// Capacity of the edge channel between the GPIO callbacks and the dispatcher
pub const EDGE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdgeKind {
    Press,
    Release,
}

/// One debounced button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub kind: ButtonEdgeKind,
    pub at: Instant,
}

impl ButtonEdge {
    pub fn now(kind: ButtonEdgeKind) -> Self {
        Self {
            kind,
            at: Instant::now(),
        }
    }
}

/// What a classified press does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Shutdown,
    SkipTrack,
    TogglePlayPause,
    ToggleMute,
}

/// Action bound to a short press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortPress {
    Mute,
    #[default]
    PlayPause,
}

impl From<ShortPress> for ButtonAction {
    fn from(short: ShortPress) -> Self {
        match short {
            ShortPress::Mute => ButtonAction::ToggleMute,
            ShortPress::PlayPause => ButtonAction::TogglePlayPause,
        }
    }
}

/// Duration thresholds evaluated longest first
#[derive(Debug, Clone)]
pub struct ActionMapping {
    /// `(min_duration, action)`, sorted by descending duration
    thresholds: Vec<(Duration, ButtonAction)>,
    short: ButtonAction,
}

impl ActionMapping {
    pub fn new(medium_press: Duration, long_press: Duration, short_press: ShortPress) -> Self {
        let mut thresholds = vec![
            (long_press, ButtonAction::Shutdown),
            (medium_press, ButtonAction::SkipTrack),
        ];
        thresholds.sort_by(|a, b| b.0.cmp(&a.0));

        Self {
            thresholds,
            short: short_press.into(),
        }
    }

    pub fn classify(&self, held: Duration) -> ButtonAction {
        self.thresholds
            .iter()
            .find(|(min, _)| held >= *min)
            .map(|(_, action)| *action)
            .unwrap_or(self.short)
    }
}

impl Default for ActionMapping {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(3),
            ShortPress::default(),
        )
    }
}

/// Collaborators the dispatcher acts on
pub struct ActionTargets {
    pub volume: Arc<VolumeSynchronizer>,
    /// Read to find the level to restore on unmute
    pub mixer: Arc<dyn VolumeBackend>,
    pub media: Arc<dyn MediaControl>,
    pub power: Arc<dyn PowerControl>,
}

/// Turns button edges into actions
pub struct ButtonDispatcher {
    mapping: ActionMapping,
    safety_timeout: Duration,
    targets: ActionTargets,
    mute: MuteMemory,
}

impl ButtonDispatcher {
    pub fn new(
        mapping: ActionMapping,
        safety_timeout: Duration,
        targets: ActionTargets,
        mute: MuteMemory,
    ) -> Self {
        Self {
            mapping,
            safety_timeout,
            targets,
            mute,
        }
    }

    pub fn mute_memory(&self) -> &MuteMemory {
        &self.mute
    }

    /// Process edges until the channel closes
    pub async fn run(&mut self, mut edges: mpsc::Receiver<ButtonEdge>) {
        info!("Button dispatcher ready");

        while let Some(edge) = edges.recv().await {
            if edge.kind == ButtonEdgeKind::Release {
                trace!("Release without press, ignoring");
                continue;
            }

            let started = edge.at;
            let Some(ended) = self.wait_for_release(started, &mut edges).await else {
                break;
            };

            let held = ended.saturating_duration_since(started);
            let action = self.mapping.classify(held);
            debug!("Button held {:?} -> {:?}", held, action);

            self.perform(action).await;
        }

        info!("Button edge channel closed, dispatcher stopping");
    }

    /// End time of the press started at `started`
    ///
    /// Returns `None` if the channel closed while the button was held.
    async fn wait_for_release(
        &self,
        started: Instant,
        edges: &mut mpsc::Receiver<ButtonEdge>,
    ) -> Option<Instant> {
        let deadline = started + self.safety_timeout;
        loop {
            match tokio::time::timeout_at(deadline, edges.recv()).await {
                Ok(Some(ButtonEdge {
                    kind: ButtonEdgeKind::Release,
                    at,
                })) => return Some(at),
                Ok(Some(_)) => trace!("Repeated press while held, ignoring"),
                Ok(None) => return None,
                Err(_) => {
                    warn!(
                        "No release within {:?}, treating button as released",
                        self.safety_timeout
                    );
                    return Some(Instant::now());
                }
            }
        }
    }

    /// Carry out one action; failures are logged, never propagated
    pub async fn perform(&mut self, action: ButtonAction) {
        match action {
            ButtonAction::Shutdown => self.shutdown().await,
            ButtonAction::SkipTrack => self.skip_track().await,
            ButtonAction::TogglePlayPause => self.toggle_play_pause().await,
            ButtonAction::ToggleMute => self.toggle_mute().await,
        }
    }

    async fn shutdown(&self) {
        info!("Long press: shutting down");
        if let Err(e) = self.targets.power.power_off().await {
            error!("Shutdown failed: {}", e);
        }
    }

    async fn skip_track(&self) {
        let Some(device) = self.connected_device().await else {
            return;
        };
        match self.targets.media.send(&device, MediaCommand::Next).await {
            Ok(()) => info!("Next track"),
            Err(e) => warn!("Skip failed: {}", e),
        }
    }

    async fn toggle_play_pause(&self) {
        let Some(device) = self.connected_device().await else {
            return;
        };

        let status = match self.targets.media.playback_status(&device).await {
            Ok(status) => status,
            Err(e) => {
                debug!("Playback status unavailable ({}), assuming not playing", e);
                PlaybackStatus::Other
            }
        };

        let command = if status == PlaybackStatus::Playing {
            MediaCommand::Pause
        } else {
            MediaCommand::Play
        };

        match self.targets.media.send(&device, command).await {
            Ok(()) => info!("{}", command.as_str()),
            Err(e) => warn!("{} failed: {}", command.as_str(), e),
        }
    }

    async fn toggle_mute(&mut self) {
        match self.mute.previous_volume() {
            None => {
                let current = match self.targets.mixer.get_volume().await {
                    Ok(level) => level,
                    Err(e) => {
                        warn!("Cannot mute, mixer level unreadable: {}", e);
                        return;
                    }
                };

                if let Err(e) = self.targets.volume.set_volume(i64::from(MIN_VOLUME)).await {
                    error!("Mute failed: {}", e);
                    return;
                }
                if let Err(e) = self.mute.remember(current) {
                    warn!("Could not persist pre-mute volume: {:#}", e);
                }
                info!("Muted (was {}%)", current);
            }
            Some(previous) => {
                if let Err(e) = self.targets.volume.set_volume(i64::from(previous)).await {
                    error!("Unmute failed: {}", e);
                    return;
                }
                if let Err(e) = self.mute.clear() {
                    warn!("Could not clear persisted pre-mute volume: {:#}", e);
                }
                info!("Unmuted ({}%)", previous);
            }
        }
    }

    async fn connected_device(&self) -> Option<String> {
        match self.targets.media.connected_device().await {
            Ok(Some(device)) => Some(device),
            Ok(None) => {
                info!("No Bluetooth device connected");
                None
            }
            Err(e) => {
                warn!("Could not resolve connected device: {}", e);
                None
            }
        }
    }
}
