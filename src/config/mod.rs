//! Configuration management for the rotary controller
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup for a stock moOde install.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::backends::MixerDialect;
use crate::button::{ActionMapping, ShortPress};
use crate::encoder::AccelerationPolicy;
use crate::volume::MAX_VOLUME;

/// Upper bound for any single backend call
pub const MAX_BACKEND_TIMEOUT_MS: u64 = 5000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub mute: MuteConfig,
    #[serde(default)]
    pub mixer: MixerConfig,
    #[serde(default)]
    pub mpd: MpdConfig,
    #[serde(default)]
    pub plexamp: PlexampConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub power: PowerConfig,
}

/// Rotary encoder wiring and acceleration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// BCM pin of line A (CLK)
    #[serde(default = "default_pin_a")]
    pub pin_a: u8,
    /// BCM pin of line B (DT)
    #[serde(default = "default_pin_b")]
    pub pin_b: u8,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Detents per poll window at which the coarse step applies
    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: u32,
    /// Coarse volume step
    #[serde(default = "default_step")]
    pub step: u8,
}

/// Push button wiring and press thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonConfig {
    #[serde(default = "default_button_pin")]
    pub pin: u8,
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    /// Presses at least this long skip the track
    #[serde(default = "default_medium_press")]
    pub medium_press_ms: u64,
    /// Presses at least this long power off
    #[serde(default = "default_long_press")]
    pub long_press_ms: u64,
    /// Give up waiting for a release after this long
    #[serde(default = "default_safety_timeout")]
    pub safety_timeout_ms: u64,
    #[serde(default)]
    pub short_press: ShortPress,
}

/// Authoritative store and synchronizer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VolumeConfig {
    /// moOde SQLite database
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Level applied when the store holds 0
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_ms: u64,
    /// Push the stored level to every backend at startup
    #[serde(default = "default_true")]
    pub sync_on_startup: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MuteConfig {
    /// Keep the pre-mute level across restarts
    #[serde(default)]
    pub persist: bool,
    /// Overrides the detected state directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

/// Command-line mixer tool
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MixerTool {
    #[default]
    Amixer,
    Pactl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MixerConfig {
    #[serde(default)]
    pub tool: MixerTool,
    /// ALSA device (amixer)
    #[serde(default = "default_alsa_device")]
    pub device: String,
    /// ALSA simple control (amixer)
    #[serde(default = "default_alsa_control")]
    pub control: String,
    /// PulseAudio / PipeWire sink (pactl)
    #[serde(default = "default_sink")]
    pub sink: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MpdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mpd_host")]
    pub host: String,
    #[serde(default = "default_mpd_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlexampConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_plexamp_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BluetoothConfig {
    #[serde(default = "default_adapter")]
    pub adapter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerConfig {
    /// Program and arguments run on a long press
    #[serde(default = "default_shutdown_command")]
    pub command: Vec<String>,
}

/// Tuning values given on the command line
///
/// `None` keeps whatever the config file (or the built-in default) says.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TuningOverrides {
    pub poll_interval_ms: Option<u64>,
    pub accel_threshold: Option<u32>,
    pub step: Option<u8>,
    pub pin_a: Option<u8>,
    pub pin_b: Option<u8>,
}

impl AppConfig {
    /// Load configuration from file
    ///
    /// Not validated yet: command-line overrides are merged first.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    /// Load the file if it exists, fall back to built-in defaults otherwise
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn apply_overrides(&mut self, overrides: &TuningOverrides) {
        if let Some(v) = overrides.poll_interval_ms {
            self.encoder.poll_interval_ms = v;
        }
        if let Some(v) = overrides.accel_threshold {
            self.encoder.accel_threshold = v;
        }
        if let Some(v) = overrides.step {
            self.encoder.step = v;
        }
        if let Some(v) = overrides.pin_a {
            self.encoder.pin_a = v;
        }
        if let Some(v) = overrides.pin_b {
            self.encoder.pin_b = v;
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let encoder = &self.encoder;
        if encoder.poll_interval_ms == 0 {
            anyhow::bail!("encoder.poll_interval_ms must be greater than 0");
        }
        if encoder.accel_threshold == 0 {
            anyhow::bail!("encoder.accel_threshold must be at least 1");
        }
        if encoder.step == 0 || encoder.step > MAX_VOLUME {
            anyhow::bail!(
                "encoder.step {} is invalid (must be 1-{})",
                encoder.step,
                MAX_VOLUME
            );
        }

        for (name, pin) in [
            ("encoder.pin_a", encoder.pin_a),
            ("encoder.pin_b", encoder.pin_b),
            ("button.pin", self.button.pin),
        ] {
            if pin > 27 {
                anyhow::bail!("{} {} is not a valid BCM GPIO (must be 0-27)", name, pin);
            }
        }
        if encoder.pin_a == encoder.pin_b {
            anyhow::bail!("encoder.pin_a and encoder.pin_b must differ");
        }
        if self.button.pin == encoder.pin_a || self.button.pin == encoder.pin_b {
            anyhow::bail!("button.pin {} is already used by the encoder", self.button.pin);
        }

        let button = &self.button;
        if button.medium_press_ms == 0 || button.medium_press_ms >= button.long_press_ms {
            anyhow::bail!(
                "button.medium_press_ms ({}) must be above 0 and below button.long_press_ms ({})",
                button.medium_press_ms,
                button.long_press_ms
            );
        }
        if button.safety_timeout_ms == 0 {
            anyhow::bail!("button.safety_timeout_ms must be greater than 0");
        }

        let volume = &self.volume;
        if volume.default_volume == 0 || volume.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "volume.default_volume {} is invalid (must be 1-{})",
                volume.default_volume,
                MAX_VOLUME
            );
        }
        if volume.backend_timeout_ms == 0 {
            anyhow::bail!("volume.backend_timeout_ms must be greater than 0");
        }

        match self.mixer.tool {
            MixerTool::Amixer => {
                if self.mixer.device.is_empty() || self.mixer.control.is_empty() {
                    anyhow::bail!("mixer.device and mixer.control cannot be empty for amixer");
                }
            }
            MixerTool::Pactl => {
                if self.mixer.sink.is_empty() {
                    anyhow::bail!("mixer.sink cannot be empty for pactl");
                }
            }
        }

        if self.mpd.enabled && self.mpd.host.is_empty() {
            anyhow::bail!("mpd.host cannot be empty");
        }
        if self.plexamp.enabled
            && !(self.plexamp.url.starts_with("http://") || self.plexamp.url.starts_with("https://"))
        {
            anyhow::bail!("plexamp.url must be an http(s) URL, got '{}'", self.plexamp.url);
        }
        if self.bluetooth.adapter.is_empty() {
            anyhow::bail!("bluetooth.adapter cannot be empty");
        }
        if self.power.command.first().map_or(true, |p| p.is_empty()) {
            anyhow::bail!("power.command cannot be empty");
        }

        Ok(())
    }
}

impl EncoderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn policy(&self) -> AccelerationPolicy {
        AccelerationPolicy {
            threshold: self.accel_threshold,
            coarse_step: self.step,
        }
    }
}

impl ButtonConfig {
    pub fn mapping(&self) -> ActionMapping {
        ActionMapping::new(
            Duration::from_millis(self.medium_press_ms),
            Duration::from_millis(self.long_press_ms),
            self.short_press,
        )
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }
}

impl VolumeConfig {
    /// Per-call timeout, capped at [`MAX_BACKEND_TIMEOUT_MS`]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms.min(MAX_BACKEND_TIMEOUT_MS))
    }
}

impl MixerConfig {
    pub fn dialect(&self) -> MixerDialect {
        match self.tool {
            MixerTool::Amixer => MixerDialect::Amixer {
                device: self.device.clone(),
                control: self.control.clone(),
            },
            MixerTool::Pactl => MixerDialect::Pactl {
                sink: self.sink.clone(),
            },
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            pin_a: default_pin_a(),
            pin_b: default_pin_b(),
            poll_interval_ms: default_poll_interval(),
            accel_threshold: default_accel_threshold(),
            step: default_step(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            pin: default_button_pin(),
            debounce_ms: default_debounce(),
            medium_press_ms: default_medium_press(),
            long_press_ms: default_long_press(),
            safety_timeout_ms: default_safety_timeout(),
            short_press: ShortPress::default(),
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            default_volume: default_volume(),
            backend_timeout_ms: default_backend_timeout(),
            sync_on_startup: true,
        }
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            tool: MixerTool::default(),
            device: default_alsa_device(),
            control: default_alsa_control(),
            sink: default_sink(),
        }
    }
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_mpd_host(),
            port: default_mpd_port(),
            password: None,
        }
    }
}

impl Default for PlexampConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_plexamp_url(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            command: default_shutdown_command(),
        }
    }
}

// Default value functions
fn default_pin_a() -> u8 { 23 }
fn default_pin_b() -> u8 { 24 }
fn default_button_pin() -> u8 { 22 }
fn default_poll_interval() -> u64 { 100 }
fn default_accel_threshold() -> u32 { 2 }
fn default_step() -> u8 { 3 }
fn default_debounce() -> u64 { 20 }
fn default_medium_press() -> u64 { 1000 }
fn default_long_press() -> u64 { 3000 }
fn default_safety_timeout() -> u64 { 5000 }
fn default_database() -> PathBuf { PathBuf::from("/var/local/www/db/moode-sqlite3.db") }
fn default_volume() -> u8 { 80 }
fn default_backend_timeout() -> u64 { 2000 }
fn default_true() -> bool { true }
fn default_alsa_device() -> String { "default".to_string() }
fn default_alsa_control() -> String { "SoftMaster".to_string() }
fn default_sink() -> String { "camilladsp_out".to_string() }
fn default_mpd_host() -> String { "localhost".to_string() }
fn default_mpd_port() -> u16 { 6600 }
fn default_plexamp_url() -> String { "http://localhost:32500".to_string() }
fn default_adapter() -> String { "hci0".to_string() }
fn default_shutdown_command() -> Vec<String> {
    ["sudo", "shutdown", "-h", "now"].iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::ButtonAction;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.encoder.pin_a, 23);
        assert_eq!(config.encoder.pin_b, 24);
        assert_eq!(config.encoder.poll_interval_ms, 100);
        assert_eq!(config.encoder.accel_threshold, 2);
        assert_eq!(config.encoder.step, 3);
        assert_eq!(config.button.pin, 22);
        assert_eq!(config.button.short_press, ShortPress::PlayPause);
        assert_eq!(config.volume.default_volume, 80);
        assert!(config.volume.sync_on_startup);
        assert!(!config.mute.persist);
        assert_eq!(config.mpd.port, 6600);
        assert_eq!(config.power.command, vec!["sudo", "shutdown", "-h", "now"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
encoder:
  step: 5
button:
  short_press: mute
mixer:
  tool: pactl
mpd:
  enabled: false
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.encoder.step, 5);
        assert_eq!(config.encoder.pin_a, 23);
        assert_eq!(config.button.short_press, ShortPress::Mute);
        assert_eq!(
            config.mixer.dialect(),
            MixerDialect::Pactl {
                sink: "camilladsp_out".to_string()
            }
        );
        assert!(!config.mpd.enabled);
        assert!(config.plexamp.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_mixer_tool_is_rejected() {
        assert!(AppConfig::from_yaml("mixer:\n  tool: oss\n").is_err());
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut config = AppConfig::default();
        config.apply_overrides(&TuningOverrides {
            poll_interval_ms: Some(50),
            pin_b: Some(25),
            ..Default::default()
        });

        assert_eq!(config.encoder.poll_interval_ms, 50);
        assert_eq!(config.encoder.pin_b, 25);
        assert_eq!(config.encoder.pin_a, 23);
        assert_eq!(config.encoder.step, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.encoder.pin_b = config.encoder.pin_a;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.button.pin = 24;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.button.medium_press_ms = 3000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.volume.default_volume = 101;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.plexamp.url = "localhost:32500".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.power.command.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.encoder.pin_a = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_timeout_is_capped() {
        let mut config = AppConfig::default();
        config.volume.backend_timeout_ms = 60_000;
        assert_eq!(config.volume.backend_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_button_mapping_uses_thresholds() {
        let mut config = AppConfig::default();
        config.button.medium_press_ms = 500;
        config.button.long_press_ms = 2000;

        let mapping = config.button.mapping();
        assert_eq!(
            mapping.classify(Duration::from_millis(600)),
            ButtonAction::SkipTrack
        );
        assert_eq!(
            mapping.classify(Duration::from_millis(2000)),
            ButtonAction::Shutdown
        );
    }

    #[tokio::test]
    async fn test_load_or_default_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.yaml"))
            .await
            .unwrap();
        assert_eq!(config.encoder.step, 3);

        assert!(AppConfig::load(&dir.path().join("absent.yaml")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "volume:\n  default_volume: 55\n").unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.volume.default_volume, 55);
    }
}
