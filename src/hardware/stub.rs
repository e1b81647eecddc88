#![allow(dead_code)]

use anyhow::{Result, anyhow};

use super::{HardwareConfig, KnobInputs};

#[derive(Clone, Debug, Default)]
pub struct HardwareHandle;

impl HardwareHandle {
    pub fn set_indicator(&self, _on: bool) -> Result<()> {
        Ok(())
    }
}

pub fn start(_: HardwareConfig) -> Result<(HardwareHandle, KnobInputs)> {
    Err(anyhow!(
        "hardware support disabled. Enable the `hardware` feature to read the knobs over GPIO."
    ))
}
