#[cfg_attr(not(feature = "hardware"), path = "stub.rs")]
mod backend;

pub use backend::{HardwareHandle, start};

use crossbeam_channel::Receiver;
use serde::Deserialize;

use crate::knob::InputEdge;

/// BCM pin numbers for one rotary encoder with push switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KnobPins {
    #[serde(alias = "a")]
    pub pin_a: u8,
    #[serde(alias = "b")]
    pub pin_b: u8,
    #[serde(alias = "press")]
    pub button: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HardwareConfig {
    pub song: KnobPins,
    pub volume: KnobPins,
    pub indicator_pin: Option<u8>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            song: KnobPins {
                pin_a: 3,
                pin_b: 4,
                button: 2,
            },
            volume: KnobPins {
                pin_a: 9,
                pin_b: 11,
                button: 10,
            },
            indicator_pin: Some(22),
        }
    }
}

/// Edge queues, one per knob, so each knob can be serviced on its own thread.
#[derive(Debug)]
pub struct KnobInputs {
    pub song: Receiver<InputEdge>,
    pub volume: Receiver<InputEdge>,
}
