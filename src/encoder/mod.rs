//! Quadrature decoding for the volume knob
//!
//! The GPIO layer calls [`QuadratureDecoder::on_edge`] from its interrupt
//! threads; the acceleration sampler reads the accumulated position on its own
//! schedule. Both go through the same lock, which is only ever held for a
//! constant-time state update.

pub mod sampler;

use parking_lot::Mutex;

pub use sampler::{AccelerationPolicy, AccelerationSampler, Direction, VolumeStep};

/// Encoder line that raised an edge interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    A,
    B,
}

/// Decoder state shared between the edge callbacks and the sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderState {
    /// Net detent count (A-initiated detents subtract, B-initiated add)
    pub position: i64,
    pub last_a: bool,
    pub last_b: bool,
}

impl Default for EncoderState {
    fn default() -> Self {
        // Pull-ups keep both lines high at rest
        Self {
            position: 0,
            last_a: true,
            last_b: true,
        }
    }
}

/// Two-line quadrature decoder with debounce-by-state-comparison
///
/// A step is only counted when the lines settle back into the detent state
/// (both high). Direction is attributed to whichever line raised the
/// interrupt, which tolerates noisy intermediate transitions without any
/// timing-based debounce.
#[derive(Debug, Default)]
pub struct QuadratureDecoder {
    state: Mutex<EncoderState>,
}

impl QuadratureDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an edge on `line` with the sampled levels of both lines
    ///
    /// Returns the step applied to the position, if any.
    pub fn on_edge(&self, line: Line, level_a: bool, level_b: bool) -> Option<i8> {
        let mut state = self.state.lock();

        if state.last_a == level_a && state.last_b == level_b {
            return None;
        }

        state.last_a = level_a;
        state.last_b = level_b;

        if !(level_a && level_b) {
            return None;
        }

        let step: i8 = match line {
            Line::A => -1,
            Line::B => 1,
        };
        state.position += i64::from(step);
        Some(step)
    }

    /// Current accumulated position
    pub fn position(&self) -> i64 {
        self.state.lock().position
    }

    /// Copy of the full decoder state
    pub fn snapshot(&self) -> EncoderState {
        *self.state.lock()
    }
}
