//! Raspberry Pi GPIO wiring
//!
//! Encoder lines and the push button are pulled-up inputs with interrupts on
//! both edges. Callbacks run on rppal's interrupt threads and must never
//! block: the encoder callbacks only touch the decoder, the button callback
//! only `try_send`s into the edge channel.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::button::{ButtonEdge, ButtonEdgeKind};
use crate::encoder::{Line, QuadratureDecoder};

/// BCM pin numbers and button debounce
#[derive(Debug, Clone, Copy)]
pub struct GpioPins {
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub button: u8,
    pub button_debounce: Duration,
}

/// Input pins with interrupts attached
///
/// Interrupts stay active for as long as this value lives.
pub struct GpioInputs {
    _encoder_a: Arc<Mutex<InputPin>>,
    _encoder_b: Arc<Mutex<InputPin>>,
    _button: InputPin,
}

/// Configure the pins and register the edge callbacks
pub fn attach(
    pins: GpioPins,
    decoder: Arc<QuadratureDecoder>,
    edges: mpsc::Sender<ButtonEdge>,
) -> Result<GpioInputs> {
    let gpio = Gpio::new().context("Failed to access GPIO")?;

    let input = |pin: u8| -> Result<InputPin> {
        Ok(gpio
            .get(pin)
            .with_context(|| format!("GPIO {} unavailable", pin))?
            .into_input_pullup())
    };

    let encoder_a = Arc::new(Mutex::new(input(pins.encoder_a)?));
    let encoder_b = Arc::new(Mutex::new(input(pins.encoder_b)?));
    let mut button = input(pins.button)?;

    encoder_a
        .lock()
        .set_async_interrupt(
            Trigger::Both,
            None,
            encoder_callback(Line::A, decoder.clone(), Arc::downgrade(&encoder_b)),
        )
        .with_context(|| format!("Failed to watch encoder pin {}", pins.encoder_a))?;

    encoder_b
        .lock()
        .set_async_interrupt(
            Trigger::Both,
            None,
            encoder_callback(Line::B, decoder, Arc::downgrade(&encoder_a)),
        )
        .with_context(|| format!("Failed to watch encoder pin {}", pins.encoder_b))?;

    button
        .set_async_interrupt(
            Trigger::Both,
            Some(pins.button_debounce),
            button_callback(edges),
        )
        .with_context(|| format!("Failed to watch button pin {}", pins.button))?;

    info!(
        "GPIO ready: encoder A={} B={}, button={}",
        pins.encoder_a, pins.encoder_b, pins.button
    );

    Ok(GpioInputs {
        _encoder_a: encoder_a,
        _encoder_b: encoder_b,
        _button: button,
    })
}

/// Callback for one encoder line
///
/// The triggering line's level comes from the edge itself; the other line
/// is sampled. `other` is weak so the two pins do not keep each other alive.
fn encoder_callback(
    line: Line,
    decoder: Arc<QuadratureDecoder>,
    other: Weak<Mutex<InputPin>>,
) -> impl FnMut(Event) + Send + 'static {
    move |event: Event| {
        let own = event.trigger == Trigger::RisingEdge;
        let Some(other) = other.upgrade() else {
            return;
        };
        let other_level = other.lock().is_high();

        let (level_a, level_b) = match line {
            Line::A => (own, other_level),
            Line::B => (other_level, own),
        };

        if let Some(step) = decoder.on_edge(line, level_a, level_b) {
            trace!(?line, step, position = decoder.position(), "Encoder step");
        }
    }
}

/// Active-low button: falling edge is a press, rising edge a release
fn button_callback(edges: mpsc::Sender<ButtonEdge>) -> impl FnMut(Event) + Send + 'static {
    move |event: Event| {
        let kind = match event.trigger {
            Trigger::FallingEdge => ButtonEdgeKind::Press,
            Trigger::RisingEdge => ButtonEdgeKind::Release,
            _ => return,
        };
        debug!("Button {:?}", kind);

        if let Err(e) = edges.try_send(ButtonEdge::now(kind)) {
            warn!("Dropping button edge: {}", e);
        }
    }
}
