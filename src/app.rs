use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use crate::config::{self, Settings, SettingsError};
use crate::controls::{
    IdleConfig, IdleWatchdog, LongPressWindow, PlaybackMediator, Tickable, VolumeConfig,
};
use crate::hardware::{HardwareConfig, HardwareHandle, KnobInputs, start as start_hardware};
use crate::knob::{KnobController, KnobId};
use crate::system::player::PlayerctlPlayer;
use crate::system::power::CommandSystemControl;

type Mediator = PlaybackMediator<PlayerctlPlayer, CommandSystemControl>;

pub struct App {
    mediator: Arc<Mediator>,
    watchdog: IdleWatchdog<PlayerctlPlayer, CommandSystemControl>,
    hardware: HardwareHandle,
    workers: Vec<JoinHandle<()>>,
    shutdown: Option<Receiver<()>>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub hardware: HardwareConfig,
    pub button_debounce: Duration,
    pub volume: VolumeConfig,
    pub long_press: LongPressWindow,
    pub idle: IdleConfig,
    pub player: String,
    pub shutdown_command: Vec<String>,
    pub reboot_command: Vec<String>,
}

impl TryFrom<&Settings> for AppConfig {
    type Error = SettingsError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        settings.validate()?;
        Ok(Self {
            hardware: settings.hardware(),
            button_debounce: settings.button_debounce(),
            volume: settings.volume_config()?,
            long_press: settings.long_press_window()?,
            idle: settings.idle_config()?,
            player: settings.player.clone(),
            shutdown_command: settings.shutdown_command.clone(),
            reboot_command: settings.reboot_command.clone(),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            hardware: settings.hardware(),
            button_debounce: settings.button_debounce(),
            volume: VolumeConfig::default(),
            long_press: LongPressWindow::default(),
            idle: IdleConfig::default(),
            player: settings.player,
            shutdown_command: settings.shutdown_command,
            reboot_command: settings.reboot_command,
        }
    }
}

impl AppConfig {
    /// Loads settings from disk, falling back to defaults on any problem.
    pub fn load() -> Self {
        let loaded = match config::load_settings() {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                info!("no musicbox_ctrl configuration found; using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(error = %err, "failed to load musicbox_ctrl configuration; using defaults");
                return Self::default();
            }
        };

        match Self::try_from(&loaded.settings) {
            Ok(config) => {
                info!(path = %loaded.path.display(), "loaded configuration");
                config
            }
            Err(err) => {
                warn!(
                    error = %err,
                    path = %loaded.path.display(),
                    "invalid musicbox_ctrl configuration; using defaults"
                );
                Self::default()
            }
        }
    }
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("starting GPIO backend");
        let (hardware, inputs) = start_hardware(config.hardware.clone())?;

        let player = PlayerctlPlayer::new(config.player.clone());
        if !player.is_available() {
            warn!(
                player = %config.player,
                "playerctl not found or player not running; playback control disabled until it appears"
            );
        }
        let system = CommandSystemControl::new(
            config.shutdown_command.clone(),
            config.reboot_command.clone(),
        );

        let mediator = Arc::new(PlaybackMediator::new(
            player,
            system,
            config.volume,
            config.long_press,
        ));
        mediator.start();

        let KnobInputs { song, volume } = inputs;
        let workers = vec![
            KnobController::new(KnobId::Song, config.button_debounce, mediator.clone())
                .spawn_worker(song)?,
            KnobController::new(KnobId::Volume, config.button_debounce, mediator.clone())
                .spawn_worker(volume)?,
        ];

        let watchdog = IdleWatchdog::new(mediator.clone(), config.idle);

        if let Err(err) = hardware.set_indicator(true) {
            warn!(error = %err, "failed to switch on ready indicator");
        }
        info!(
            idle_threshold_secs = config.idle.threshold.as_secs(),
            "music box ready"
        );

        Ok(Self {
            mediator,
            watchdog,
            hardware,
            workers,
            shutdown: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let ticker = crossbeam_channel::tick(self.watchdog.period());
        let shutdown = self
            .shutdown
            .clone()
            .unwrap_or_else(crossbeam_channel::never);

        loop {
            crossbeam_channel::select! {
                recv(ticker) -> _ => {
                    if let Err(err) = self.watchdog.on_tick() {
                        warn!(error = %err, "idle check failed");
                    }
                },
                recv(shutdown) -> _ => break,
            }

            if self.workers.iter().all(|worker| worker.is_finished()) {
                warn!("all knob inputs closed");
                break;
            }
        }

        let state = self.mediator.snapshot();
        info!(
            volume = state.volume_percent,
            playing = state.is_playing,
            "stopping music box"
        );
        if let Err(err) = self.hardware.set_indicator(false) {
            warn!(error = %err, "failed to switch off ready indicator");
        }
        Ok(())
    }

    pub fn set_shutdown_channel(&mut self, shutdown: Receiver<()>) {
        self.shutdown = Some(shutdown);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Err(err) = self.hardware.set_indicator(false) {
            warn!(error = %err, "failed to switch off ready indicator on drop");
        }
    }
}

/// Forwards the first SIGINT or SIGTERM into the returned channel.
pub fn install_shutdown_signals() -> Result<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "received termination signal");
                tx.send(()).ok();
            }
        })
        .context("failed to spawn signal listener")?;

    Ok(rx)
}
