//! Bluetooth media transport through BlueZ
//!
//! The connected device is found with `bluetoothctl`; its player is queried
//! and driven over the system bus with `dbus-send`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

use super::{process, MediaCommand, MediaControl, PlaybackStatus};
use crate::error::BackendError;

const BACKEND: &str = "bluez";

/// Media control for the first connected Bluetooth source
pub struct BluezMediaControl {
    adapter: String,
    timeout: Duration,
}

impl BluezMediaControl {
    pub fn new(adapter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            adapter: adapter.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaControl for BluezMediaControl {
    async fn connected_device(&self) -> Result<Option<String>, BackendError> {
        let out = process::run(
            BACKEND,
            "bluetoothctl",
            &["devices", "Connected"],
            self.timeout,
        )
        .await?;

        let device = parse_connected_device(&out, &self.adapter);
        trace!("Connected device: {:?}", device);
        Ok(device)
    }

    async fn playback_status(&self, device: &str) -> Result<PlaybackStatus, BackendError> {
        let player = format!("{device}/player0");
        let out = process::run(
            BACKEND,
            "dbus-send",
            &[
                "--system",
                "--print-reply",
                "--dest=org.bluez",
                player.as_str(),
                "org.freedesktop.DBus.Properties.Get",
                "string:org.bluez.MediaPlayer1",
                "string:Status",
            ],
            self.timeout,
        )
        .await?;

        parse_status(&out)
    }

    async fn send(&self, device: &str, command: MediaCommand) -> Result<(), BackendError> {
        let method = format!("org.bluez.MediaControl1.{}", command.as_str());
        process::run(
            BACKEND,
            "dbus-send",
            &[
                "--system",
                "--type=method_call",
                "--dest=org.bluez",
                device,
                method.as_str(),
            ],
            self.timeout,
        )
        .await?;

        debug!("Sent {} to {}", command.as_str(), device);
        Ok(())
    }
}

/// Map the first `Device XX:XX:..` line to its BlueZ object path
pub fn parse_connected_device(output: &str, adapter: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != "Device" {
            return None;
        }
        let address = fields.next()?;
        is_bluetooth_address(address)
            .then(|| format!("/org/bluez/{}/dev_{}", adapter, address.replace(':', "_")))
    })
}

fn is_bluetooth_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Read the `variant string "..."` value from a `Properties.Get` reply
pub fn parse_status(output: &str) -> Result<PlaybackStatus, BackendError> {
    output
        .lines()
        .find_map(|line| {
            let rest = line.trim().strip_prefix("variant")?.trim();
            let quoted = rest.strip_prefix("string")?.trim();
            quoted.strip_prefix('"')?.strip_suffix('"')
        })
        .map(PlaybackStatus::parse)
        .ok_or_else(|| BackendError::parse(BACKEND, "no status string in dbus reply"))
}
