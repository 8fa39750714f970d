//! Encoder acceleration sampling
//!
//! Polls the decoder position on a fixed period and turns the number of
//! detents accumulated since the last poll into a volume step. Several
//! detents in one poll window mean the knob is being spun fast, which
//! switches to the coarse step.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::QuadratureDecoder;
use crate::volume::VolumeSynchronizer;

/// Rotation direction of a volume change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn signum(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// A volume change derived from one poll window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStep {
    pub direction: Direction,
    pub step: u8,
}

/// Fine/coarse step selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationPolicy {
    /// Detents per window at which the coarse step kicks in
    pub threshold: u32,
    /// Step applied once the threshold is reached
    pub coarse_step: u8,
}

impl Default for AccelerationPolicy {
    fn default() -> Self {
        Self {
            threshold: 2,
            coarse_step: 3,
        }
    }
}

impl AccelerationPolicy {
    /// Map a position delta to a volume step
    ///
    /// Any magnitude at or above the threshold yields the coarse step; it is
    /// never scaled by the magnitude itself.
    pub fn step_for(&self, delta: i64) -> Option<VolumeStep> {
        if delta == 0 {
            return None;
        }

        let direction = if delta > 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        let step = if delta.unsigned_abs() < u64::from(self.threshold) {
            1
        } else {
            self.coarse_step
        };

        Some(VolumeStep { direction, step })
    }
}

/// Periodic read-and-diff loop driving the volume synchronizer
pub struct AccelerationSampler {
    decoder: Arc<QuadratureDecoder>,
    volume: Arc<VolumeSynchronizer>,
    policy: AccelerationPolicy,
    poll_interval: Duration,
    /// Position observed at the previous tick
    last_position: i64,
}

impl AccelerationSampler {
    pub fn new(
        decoder: Arc<QuadratureDecoder>,
        volume: Arc<VolumeSynchronizer>,
        policy: AccelerationPolicy,
        poll_interval: Duration,
    ) -> Self {
        let last_position = decoder.position();
        Self {
            decoder,
            volume,
            policy,
            poll_interval,
            last_position,
        }
    }

    /// Run one poll: diff the position and apply the resulting step
    ///
    /// Returns the step that was attempted, whether or not the backends
    /// accepted it.
    pub async fn tick(&mut self) -> Option<VolumeStep> {
        let position = self.decoder.position();
        let delta = position - self.last_position;
        self.last_position = position;

        let step = self.policy.step_for(delta)?;
        debug!(
            delta,
            direction = ?step.direction,
            step = step.step,
            "Encoder moved"
        );

        if let Err(e) = self.volume.apply_delta(step.direction, step.step).await {
            warn!("Volume change failed: {}", e);
        }

        Some(step)
    }

    /// Poll forever
    ///
    /// Missed ticks are delayed rather than bursted, so a slow backend call
    /// does not cause a flurry of catch-up polls afterwards.
    pub async fn run(mut self) {
        info!(
            "Acceleration sampler started (poll: {:?}, threshold: {}, coarse step: {})",
            self.poll_interval, self.policy.threshold, self.policy.coarse_step
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
