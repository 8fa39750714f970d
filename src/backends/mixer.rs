//! Software mixer control through the command-line mixer tools
//!
//! Two dialects are supported:
//! - `amixer` against an ALSA simple control (moOde's `SoftMaster`)
//! - `pactl` against a PulseAudio / PipeWire sink (`camilladsp_out`)

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{process, VolumeBackend};
use crate::error::BackendError;

const BACKEND: &str = "mixer";

/// Which mixer tool to drive and what to address with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerDialect {
    /// `amixer -D <device> get|set <control>`
    Amixer { device: String, control: String },
    /// `pactl get-sink-volume|set-sink-volume <sink>`
    Pactl { sink: String },
}

/// Mixer backend shelling out to `amixer` or `pactl`
pub struct SoftwareMixer {
    dialect: MixerDialect,
    timeout: Duration,
}

impl SoftwareMixer {
    pub fn new(dialect: MixerDialect, timeout: Duration) -> Self {
        Self { dialect, timeout }
    }
}

#[async_trait]
impl VolumeBackend for SoftwareMixer {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get_volume(&self) -> Result<u8, BackendError> {
        let level = match &self.dialect {
            MixerDialect::Amixer { device, control } => {
                let args = ["-D", device.as_str(), "get", control.as_str()];
                let out = process::run(BACKEND, "amixer", &args, self.timeout).await?;
                parse_amixer_level(&out)?
            }
            MixerDialect::Pactl { sink } => {
                let args = ["get-sink-volume", sink.as_str()];
                let out = process::run(BACKEND, "pactl", &args, self.timeout).await?;
                parse_pactl_level(&out)?
            }
        };

        debug!("Mixer reports {}%", level);
        Ok(level)
    }

    async fn set_volume(&self, level: u8) -> Result<(), BackendError> {
        let percent = format!("{}%", level);
        match &self.dialect {
            MixerDialect::Amixer { device, control } => {
                process::run(
                    BACKEND,
                    "amixer",
                    &["-D", device.as_str(), "set", control.as_str(), percent.as_str()],
                    self.timeout,
                )
                .await?;
            }
            MixerDialect::Pactl { sink } => {
                process::run(
                    BACKEND,
                    "pactl",
                    &["set-sink-volume", sink.as_str(), percent.as_str()],
                    self.timeout,
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// Extract the level from `amixer get` output
///
/// Takes the first channel line carrying a `[NN%]` field, e.g.
/// `  Front Left: 142 [56%]`.
pub fn parse_amixer_level(output: &str) -> Result<u8, BackendError> {
    output
        .lines()
        .filter(|line| line.contains(':') && line.contains('%'))
        .find_map(|line| {
            let start = line.find('[')?;
            let end = line[start..].find("%]")? + start;
            line[start + 1..end].trim().parse::<u8>().ok()
        })
        .filter(|level| *level <= 100)
        .ok_or_else(|| BackendError::parse(BACKEND, "no [NN%] level in amixer output"))
}

/// Extract the level from `pactl get-sink-volume` output
///
/// Format: `Volume: front-left: 52428 /  80% / -5.81 dB, ...`
pub fn parse_pactl_level(output: &str) -> Result<u8, BackendError> {
    let line = output
        .lines()
        .find(|line| line.trim_start().starts_with("Volume:"))
        .ok_or_else(|| BackendError::parse(BACKEND, "no Volume: line in pactl output"))?;

    line.split('/')
        .nth(1)
        .map(|field| field.trim().trim_end_matches('%').trim())
        .and_then(|field| field.parse::<u16>().ok())
        // PulseAudio allows boosting past 100%
        .map(|level| level.min(100) as u8)
        .ok_or_else(|| BackendError::parse(BACKEND, format!("unparsable pactl line: {line}")))
}
