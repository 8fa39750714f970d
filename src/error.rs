//! Error types shared by the volume backends and the synchronizer

use std::time::Duration;
use thiserror::Error;

/// Failure of a single external collaborator call
///
/// Every variant names the backend it came from so a log line is enough to
/// tell which of the fan-out targets misbehaved.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend}: timed out after {after:?}")]
    Timeout {
        backend: &'static str,
        after: Duration,
    },

    #[error("{backend}: `{command}` exited with status {status}")]
    CommandFailed {
        backend: &'static str,
        command: String,
        status: i32,
    },

    #[error("{backend}: I/O error: {source}")]
    Io {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend}: unexpected output: {detail}")]
    Parse {
        backend: &'static str,
        detail: String,
    },

    #[error("{backend}: protocol error: {detail}")]
    Protocol {
        backend: &'static str,
        detail: String,
    },

    #[error("{backend}: HTTP error: {source}")]
    Http {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend}: store error: {source}")]
    Store {
        backend: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{backend}: operation not supported")]
    Unsupported { backend: &'static str },
}

impl BackendError {
    pub fn io(backend: &'static str, source: std::io::Error) -> Self {
        Self::Io { backend, source }
    }

    pub fn parse(backend: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            backend,
            detail: detail.into(),
        }
    }

    pub fn protocol(backend: &'static str, detail: impl Into<String>) -> Self {
        Self::Protocol {
            backend,
            detail: detail.into(),
        }
    }

    /// Name of the backend that produced this error
    #[must_use]
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Timeout { backend, .. }
            | Self::CommandFailed { backend, .. }
            | Self::Io { backend, .. }
            | Self::Parse { backend, .. }
            | Self::Protocol { backend, .. }
            | Self::Http { backend, .. }
            | Self::Store { backend, .. }
            | Self::Unsupported { backend } => backend,
        }
    }
}

/// Error escalated to callers of the volume synchronizer
///
/// Only the authoritative store can fail a volume change; the other backends
/// are reported through [`crate::volume::FanOutReport`] instead.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("persisted store rejected volume {level}: {source}")]
    Persistence {
        level: u8,
        #[source]
        source: BackendError,
    },

    #[error("could not read volume settings: {source}")]
    SettingsUnavailable {
        #[source]
        source: BackendError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_is_reported() {
        let err = BackendError::parse("mixer", "no percentage found");
        assert_eq!(err.backend(), "mixer");
        assert_eq!(err.to_string(), "mixer: unexpected output: no percentage found");
    }

    #[test]
    fn test_timeout_message() {
        let err = BackendError::Timeout {
            backend: "mpd",
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "mpd: timed out after 2s");
    }

    #[test]
    fn test_persistence_error_wraps_source() {
        let err = VolumeError::Persistence {
            level: 42,
            source: BackendError::Unsupported { backend: "store" },
        };
        assert!(err.to_string().contains("volume 42"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
