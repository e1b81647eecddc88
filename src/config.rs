use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::controls::{IdleConfig, LongPressWindow, VolumeConfig};
use crate::hardware::{HardwareConfig, KnobPins};
use crate::knob::DEFAULT_DEBOUNCE;

const CONFIG_FILE_NAME: &str = "musicbox.json";
const CONFIG_DIR_NAME: &str = "musicbox_ctrl";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("volume step must be at least 1")]
    ZeroVolumeStep,
    #[error("volume ceiling {max} is below the volume step {step}")]
    CeilingBelowStep { step: u32, max: u32 },
    #[error("long press window [{min_secs}s, {max_secs}s) is empty")]
    EmptyLongPressWindow { min_secs: u64, max_secs: u64 },
    #[error("idle threshold and check period must be non-zero")]
    ZeroIdleTiming,
    #[error("{0} command is empty")]
    EmptyCommand(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub initial: u32,
    pub step: u32,
    pub max: u32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        let defaults = VolumeConfig::default();
        Self {
            initial: defaults.initial,
            step: defaults.step,
            max: defaults.max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LongPressSettings {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for LongPressSettings {
    fn default() -> Self {
        let defaults = LongPressWindow::default();
        Self {
            min_secs: defaults.min.as_secs(),
            max_secs: defaults.max.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdleSettings {
    pub threshold_secs: u64,
    pub check_every_secs: u64,
}

impl Default for IdleSettings {
    fn default() -> Self {
        let defaults = IdleConfig::default();
        Self {
            threshold_secs: defaults.threshold.as_secs(),
            check_every_secs: defaults.period.as_secs(),
        }
    }
}

/// On-disk settings. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub song_knob: KnobPins,
    pub volume_knob: KnobPins,
    pub indicator_pin: Option<u8>,
    pub button_debounce_ms: u64,
    pub volume: VolumeSettings,
    pub long_press: LongPressSettings,
    pub idle: IdleSettings,
    pub player: String,
    pub shutdown_command: Vec<String>,
    pub reboot_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let hardware = HardwareConfig::default();
        Self {
            song_knob: hardware.song,
            volume_knob: hardware.volume,
            indicator_pin: hardware.indicator_pin,
            button_debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            volume: VolumeSettings::default(),
            long_press: LongPressSettings::default(),
            idle: IdleSettings::default(),
            player: "vlc".to_string(),
            shutdown_command: ["sudo", "shutdown", "-h", "now"]
                .map(String::from)
                .to_vec(),
            reboot_command: ["sudo", "shutdown", "-r", "now"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl Settings {
    pub fn hardware(&self) -> HardwareConfig {
        HardwareConfig {
            song: self.song_knob,
            volume: self.volume_knob,
            indicator_pin: self.indicator_pin,
        }
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_millis(self.button_debounce_ms)
    }

    pub fn volume_config(&self) -> Result<VolumeConfig, SettingsError> {
        let VolumeSettings { initial, step, max } = self.volume;
        if step == 0 {
            return Err(SettingsError::ZeroVolumeStep);
        }
        if max < step {
            return Err(SettingsError::CeilingBelowStep { step, max });
        }
        Ok(VolumeConfig {
            initial: initial.min(max),
            step,
            max,
        })
    }

    pub fn long_press_window(&self) -> Result<LongPressWindow, SettingsError> {
        let LongPressSettings { min_secs, max_secs } = self.long_press;
        if min_secs >= max_secs {
            return Err(SettingsError::EmptyLongPressWindow { min_secs, max_secs });
        }
        Ok(LongPressWindow {
            min: Duration::from_secs(min_secs),
            max: Duration::from_secs(max_secs),
        })
    }

    pub fn idle_config(&self) -> Result<IdleConfig, SettingsError> {
        let IdleSettings {
            threshold_secs,
            check_every_secs,
        } = self.idle;
        if threshold_secs == 0 || check_every_secs == 0 {
            return Err(SettingsError::ZeroIdleTiming);
        }
        Ok(IdleConfig {
            threshold: Duration::from_secs(threshold_secs),
            period: Duration::from_secs(check_every_secs),
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.volume_config()?;
        self.long_press_window()?;
        self.idle_config()?;
        if self.shutdown_command.is_empty() {
            return Err(SettingsError::EmptyCommand("shutdown"));
        }
        if self.reboot_command.is_empty() {
            return Err(SettingsError::EmptyCommand("reboot"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub path: PathBuf,
    pub settings: Settings,
}

/// Reads the first settings file found on the search path. `Ok(None)` means
/// no file exists and defaults apply.
pub fn load_settings() -> Result<Option<LoadedSettings>> {
    for candidate in default_config_paths() {
        if !candidate.exists() {
            continue;
        }
        let contents = fs::read_to_string(&candidate).with_context(|| {
            format!(
                "failed to read musicbox_ctrl configuration at {}",
                candidate.display()
            )
        })?;
        let settings = parse_settings(&contents).with_context(|| {
            format!(
                "failed to parse musicbox_ctrl configuration at {}",
                candidate.display()
            )
        })?;
        return Ok(Some(LoadedSettings {
            path: candidate,
            settings,
        }));
    }
    Ok(None)
}

fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings =
        serde_json::from_str(contents).context("configuration file is not valid JSON")?;
    settings.validate()?;
    Ok(settings)
}

pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env::var_os("MUSICBOX_CTRL_CONFIG") {
        paths.push(PathBuf::from(explicit));
    }

    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        paths.push(
            PathBuf::from(xdg)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    if let Some(home) = env::var_os("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    paths.push(
        PathBuf::from("/etc")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    );
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths.push(PathBuf::from("config").join(CONFIG_FILE_NAME));

    paths
}
