//! In-memory backends for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{
    MediaCommand, MediaControl, PlaybackStatus, PowerControl, VolumeBackend, VolumeStore,
};
use crate::error::BackendError;
use crate::volume::VolumeSettings;

/// Store keeping settings in memory and recording every successful write
pub struct MemoryStore {
    settings: Mutex<VolumeSettings>,
    writes: Mutex<Vec<u8>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(settings: VolumeSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> i64 {
        self.settings.lock().current
    }

    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VolumeStore for MemoryStore {
    async fn load(&self) -> Result<VolumeSettings, BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::parse("store", "simulated read failure"));
        }
        Ok(*self.settings.lock())
    }

    async fn store(&self, level: u8) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::io(
                "store",
                std::io::Error::new(std::io::ErrorKind::Other, "database is locked"),
            ));
        }
        self.settings.lock().current = i64::from(level);
        self.writes.lock().push(level);
        Ok(())
    }
}

/// Volume backend recording every level it is asked to apply
pub struct RecordingBackend {
    name: &'static str,
    level: Mutex<Option<u8>>,
    calls: Mutex<Vec<u8>>,
    fail: AtomicBool,
}

impl RecordingBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_level(name: &'static str, level: u8) -> Self {
        let backend = Self::new(name);
        *backend.level.lock() = Some(level);
        backend
    }

    pub fn calls(&self) -> Vec<u8> {
        self.calls.lock().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VolumeBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_volume(&self) -> Result<u8, BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::parse(self.name, "simulated read failure"));
        }
        self.level
            .lock()
            .ok_or_else(|| BackendError::parse(self.name, "no level applied yet"))
    }

    async fn set_volume(&self, level: u8) -> Result<(), BackendError> {
        self.calls.lock().push(level);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::CommandFailed {
                backend: self.name,
                command: "simulated".to_string(),
                status: 1,
            });
        }
        *self.level.lock() = Some(level);
        Ok(())
    }
}

/// Backend that never answers, for timeout tests
pub struct HangingBackend;

#[async_trait]
impl VolumeBackend for HangingBackend {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn set_volume(&self, _level: u8) -> Result<(), BackendError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Media control with a fixed device and status
pub struct RecordingMedia {
    device: Option<String>,
    status: Mutex<Result<PlaybackStatus, ()>>,
    commands: Mutex<Vec<MediaCommand>>,
}

impl RecordingMedia {
    pub fn connected(status: PlaybackStatus) -> Self {
        Self {
            device: Some("/org/bluez/hci0/dev_00_11_22_33_44_55".to_string()),
            status: Mutex::new(Ok(status)),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            device: None,
            status: Mutex::new(Ok(PlaybackStatus::Stopped)),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status_unavailable(&self) {
        *self.status.lock() = Err(());
    }

    pub fn commands(&self) -> Vec<MediaCommand> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl MediaControl for RecordingMedia {
    async fn connected_device(&self) -> Result<Option<String>, BackendError> {
        Ok(self.device.clone())
    }

    async fn playback_status(&self, _device: &str) -> Result<PlaybackStatus, BackendError> {
        (*self.status.lock()).map_err(|_| BackendError::parse("bluez", "no player"))
    }

    async fn send(&self, _device: &str, command: MediaCommand) -> Result<(), BackendError> {
        self.commands.lock().push(command);
        Ok(())
    }
}

/// Power control counting shutdown requests
#[derive(Default)]
pub struct RecordingPower {
    calls: AtomicUsize,
}

impl RecordingPower {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PowerControl for RecordingPower {
    async fn power_off(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
