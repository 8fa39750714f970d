//! MPD volume control over the MPD text protocol
//!
//! Each call opens a fresh TCP session, authenticates if a password is
//! configured, runs one command and closes the connection again.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::VolumeBackend;
use crate::error::BackendError;

const BACKEND: &str = "mpd";

/// Short-lived MPD client
pub struct MpdClient {
    host: String,
    port: u16,
    password: Option<String>,
    timeout: Duration,
}

impl MpdClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        password: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            password,
            timeout,
        }
    }

    /// Open a session, run `command`, close, all within the call timeout
    async fn run_command(&self, command: &str) -> Result<Vec<String>, BackendError> {
        let exchange = async {
            let mut session = Session::open(&self.host, self.port).await?;
            if let Some(password) = &self.password {
                session.command(&format!("password {}", quote(password))).await?;
            }
            let lines = session.command(command).await?;
            session.close().await;
            Ok::<_, BackendError>(lines)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| BackendError::Timeout {
                backend: BACKEND,
                after: self.timeout,
            })?
    }
}

#[async_trait]
impl VolumeBackend for MpdClient {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get_volume(&self) -> Result<u8, BackendError> {
        let lines = self.run_command("status").await?;
        parse_status_volume(&lines)
    }

    async fn set_volume(&self, level: u8) -> Result<(), BackendError> {
        self.run_command(&format!("setvol {}", level)).await?;
        debug!("MPD volume set to {}", level);
        Ok(())
    }
}

/// One open MPD connection
struct Session {
    stream: BufReader<TcpStream>,
}

impl Session {
    async fn open(host: &str, port: u16) -> Result<Self, BackendError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| BackendError::io(BACKEND, e))?;
        let mut session = Self {
            stream: BufReader::new(stream),
        };

        let greeting = session.read_line().await?;
        if !greeting.starts_with("OK MPD ") {
            return Err(BackendError::protocol(
                BACKEND,
                format!("unexpected greeting: {greeting}"),
            ));
        }
        trace!("Connected: {}", greeting);
        Ok(session)
    }

    /// Send one command and collect the response lines preceding `OK`
    async fn command(&mut self, command: &str) -> Result<Vec<String>, BackendError> {
        self.stream
            .get_mut()
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|e| BackendError::io(BACKEND, e))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return Ok(lines);
            }
            if line.starts_with("ACK ") {
                return Err(BackendError::protocol(BACKEND, line));
            }
            lines.push(line);
        }
    }

    async fn read_line(&mut self) -> Result<String, BackendError> {
        let mut line = String::new();
        let read = self
            .stream
            .read_line(&mut line)
            .await
            .map_err(|e| BackendError::io(BACKEND, e))?;
        if read == 0 {
            return Err(BackendError::protocol(BACKEND, "connection closed"));
        }
        Ok(line.trim_end().to_string())
    }

    async fn close(mut self) {
        // Server drops the connection on `close` without replying
        let _ = self.stream.get_mut().write_all(b"close\n").await;
    }
}

/// Quote an argument per the MPD protocol
fn quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Extract `volume: N` from a `status` response
///
/// MPD reports `-1` when no mixer is configured; that is treated as a
/// parse failure because there is no level to report.
pub fn parse_status_volume(lines: &[String]) -> Result<u8, BackendError> {
    let value = lines
        .iter()
        .find_map(|line| line.strip_prefix("volume:"))
        .ok_or_else(|| BackendError::parse(BACKEND, "status has no volume field"))?;

    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|v| (0..=100).contains(v))
        .map(|v| v as u8)
        .ok_or_else(|| BackendError::parse(BACKEND, format!("unusable volume: {}", value.trim())))
}
