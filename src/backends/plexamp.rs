//! Plexamp headless player remote volume control

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::VolumeBackend;
use crate::error::BackendError;

const BACKEND: &str = "plexamp";

/// Fixed command id; the player only uses it to correlate replies
const COMMAND_ID: &str = "9999";

/// Best-effort Plexamp remote
///
/// Plexamp exposes no volume query, so only `set_volume` is implemented.
pub struct PlexampRemote {
    http: Client,
    base_url: String,
}

impl PlexampRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Http {
                backend: BACKEND,
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VolumeBackend for PlexampRemote {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn set_volume(&self, level: u8) -> Result<(), BackendError> {
        let url = format!("{}/player/playback/setParameters", self.base_url);
        let volume = level.to_string();

        self.http
            .get(&url)
            .query(&[
                ("volume", volume.as_str()),
                ("commandID", COMMAND_ID),
                ("type", "music"),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| BackendError::Http {
                backend: BACKEND,
                source,
            })?;

        debug!("Plexamp volume set to {}", level);
        Ok(())
    }
}
