use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::system::player::Player;
use crate::system::power::SystemControl;

use super::{PlaybackMediator, Tickable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleConfig {
    pub threshold: Duration,
    pub period: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(60 * 60),
            period: Duration::from_secs(10 * 60),
        }
    }
}

/// Pauses playback after a span without knob activity.
pub struct IdleWatchdog<P, S>
where
    P: Player,
    S: SystemControl,
{
    mediator: Arc<PlaybackMediator<P, S>>,
    config: IdleConfig,
}

impl<P, S> IdleWatchdog<P, S>
where
    P: Player,
    S: SystemControl,
{
    pub fn new(mediator: Arc<PlaybackMediator<P, S>>, config: IdleConfig) -> Self {
        Self { mediator, config }
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn check_at(&self, now: Instant) -> bool {
        self.mediator.pause_if_idle(now, self.config.threshold)
    }
}

impl<P, S> Tickable for IdleWatchdog<P, S>
where
    P: Player,
    S: SystemControl,
{
    fn on_tick(&mut self) -> Result<()> {
        self.check_at(Instant::now());
        Ok(())
    }
}
