//! Command-line arguments

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::TuningOverrides;

/// Rotary encoder volume and media controller for moOde
///
/// Positional tuning values override the config file when given.
#[derive(Parser, Debug)]
#[command(name = "oakhz-rotary", version, about, disable_version_flag = true)]
pub struct Args {
    /// Encoder poll interval in milliseconds
    #[arg(value_name = "POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Detents per poll at which the coarse step applies
    #[arg(value_name = "ACCEL_THRESHOLD")]
    pub accel_threshold: Option<u32>,

    /// Coarse volume step
    #[arg(value_name = "STEP", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub step: Option<u8>,

    /// BCM pin of encoder line A
    #[arg(value_name = "PIN_A")]
    pub pin_a: Option<u8>,

    /// BCM pin of encoder line B
    #[arg(value_name = "PIN_B")]
    pub pin_b: Option<u8>,

    /// 1 enables debug logging
    #[arg(value_name = "DEBUG", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub debug: Option<u8>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print version
    #[arg(short = 'v', short_alias = 'V', long, action = ArgAction::Version)]
    pub version: Option<bool>,
}

impl Args {
    pub fn overrides(&self) -> TuningOverrides {
        TuningOverrides {
            poll_interval_ms: self.poll_interval,
            accel_threshold: self.accel_threshold,
            step: self.step,
            pin_a: self.pin_a,
            pin_b: self.pin_b,
        }
    }

    /// Effective tracing filter: `DEBUG=1` forces `debug`
    pub fn log_filter(&self) -> &str {
        if self.debug == Some(1) {
            "debug"
        } else {
            &self.log_level
        }
    }
}
