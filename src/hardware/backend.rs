use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::{debug, info};

use crate::knob::{InputEdge, KnobId, Line};

use super::{HardwareConfig, KnobInputs, KnobPins};

/// Keeps the watched pins alive and owns the ready indicator.
#[derive(Clone)]
pub struct HardwareHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    // Dropping an input pin removes its interrupt.
    _inputs: Mutex<Vec<InputPin>>,
    indicator: Mutex<Option<OutputPin>>,
}

impl HardwareHandle {
    pub fn set_indicator(&self, on: bool) -> Result<()> {
        let mut indicator = self
            .inner
            .indicator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pin) = indicator.as_mut() {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
            debug!(pin = pin.pin(), on, "indicator updated");
        }
        Ok(())
    }
}

pub fn start(config: HardwareConfig) -> Result<(HardwareHandle, KnobInputs)> {
    let gpio = Gpio::new().context("failed to open GPIO peripheral")?;

    let (song_tx, song_rx) = crossbeam_channel::unbounded();
    let (volume_tx, volume_rx) = crossbeam_channel::unbounded();

    let mut inputs = Vec::with_capacity(6);
    inputs.extend(watch_knob(&gpio, KnobId::Song, config.song, song_tx)?);
    inputs.extend(watch_knob(&gpio, KnobId::Volume, config.volume, volume_tx)?);

    let indicator = match config.indicator_pin {
        Some(pin) => Some(
            gpio.get(pin)
                .with_context(|| format!("failed to claim indicator GPIO {pin}"))?
                .into_output_low(),
        ),
        None => None,
    };

    info!(
        song = ?config.song,
        volume = ?config.volume,
        indicator = ?config.indicator_pin,
        "GPIO knobs configured"
    );

    let handle = HardwareHandle {
        inner: Arc::new(HandleInner {
            _inputs: Mutex::new(inputs),
            indicator: Mutex::new(indicator),
        }),
    };
    Ok((
        handle,
        KnobInputs {
            song: song_rx,
            volume: volume_rx,
        },
    ))
}

fn watch_knob(
    gpio: &Gpio,
    knob: KnobId,
    pins: KnobPins,
    edges: Sender<InputEdge>,
) -> Result<Vec<InputPin>> {
    let mut watched = Vec::with_capacity(3);

    // Every transition on both lines is needed for the gray-code arithmetic.
    for (line, pin) in [(Line::A, pins.pin_a), (Line::B, pins.pin_b)] {
        let mut input = gpio
            .get(pin)
            .with_context(|| format!("failed to claim GPIO {pin} for {knob} knob line {line:?}"))?
            .into_input_pullup();
        let tx = edges.clone();
        input
            .set_async_interrupt(Trigger::Both, move |level: Level| {
                let edge = InputEdge::Line {
                    line,
                    level: level == Level::High,
                    at: Instant::now(),
                };
                tx.send(edge).ok();
            })
            .with_context(|| format!("failed to watch GPIO {pin} for {knob} knob"))?;
        watched.push(input);
    }

    let mut button = gpio
        .get(pins.button)
        .with_context(|| format!("failed to claim GPIO {} for {knob} knob button", pins.button))?
        .into_input_pullup();
    button
        .set_async_interrupt(Trigger::Both, move |level: Level| {
            // Pulled up, so a pressed switch reads low.
            let edge = InputEdge::Button {
                pressed: level == Level::Low,
                at: Instant::now(),
            };
            edges.send(edge).ok();
        })
        .with_context(|| format!("failed to watch button GPIO {} for {knob} knob", pins.button))?;
    watched.push(button);

    Ok(watched)
}

impl std::fmt::Debug for HardwareHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareHandle").finish_non_exhaustive()
    }
}
