mod mediator;
mod watchdog;

pub use mediator::{LongPressWindow, PlaybackMediator, PlaybackState, VolumeConfig};
pub use watchdog::{IdleConfig, IdleWatchdog};

use anyhow::Result;

pub trait Tickable: Send {
    fn on_tick(&mut self) -> Result<()>;
}
