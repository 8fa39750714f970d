//! System power-off

use async_trait::async_trait;
use tracing::warn;

use super::{process, PowerControl};
use crate::error::BackendError;

const BACKEND: &str = "power";

/// Runs the configured shutdown command, e.g. `sudo shutdown -h now`
pub struct SystemPower {
    command: Vec<String>,
}

impl SystemPower {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Default for SystemPower {
    fn default() -> Self {
        Self::new(
            ["sudo", "shutdown", "-h", "now"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

#[async_trait]
impl PowerControl for SystemPower {
    async fn power_off(&self) -> Result<(), BackendError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| BackendError::parse(BACKEND, "empty shutdown command"))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        warn!("Powering off: {}", self.command.join(" "));
        process::spawn_detached(BACKEND, program, &args)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_power_off_spawns_command() {
        let power = SystemPower::new(vec!["true".to_string()]);
        power.power_off().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let power = SystemPower::new(Vec::new());
        assert!(power.power_off().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let power = SystemPower::new(vec!["definitely-not-a-real-binary-oakhz".to_string()]);
        let err = power.power_off().await.unwrap_err();
        assert!(matches!(err, BackendError::Io { backend: "power", .. }));
    }

    #[test]
    fn test_default_command() {
        assert_eq!(
            SystemPower::default().command,
            vec!["sudo", "shutdown", "-h", "now"]
        );
    }
}
