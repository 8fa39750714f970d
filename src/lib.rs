//! Rotary encoder volume and media controller for OaKhz / moOde audio players
//!
//! A quadrature encoder drives the volume through an acceleration sampler;
//! a push button toggles playback (or mute), skips tracks and powers off.

pub mod backends;
pub mod button;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
#[cfg(target_os = "linux")]
pub mod gpio;
pub mod paths;
pub mod volume;
