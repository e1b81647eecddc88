use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::knob::{KnobEvent, KnobEventSink, KnobId};
use crate::system::player::Player;
use crate::system::power::{PowerAction, SystemControl};
use crate::util::format_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeConfig {
    pub initial: u32,
    pub step: u32,
    /// May exceed 100 on players that accept amplification.
    pub max: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            initial: 30,
            step: 5,
            max: 100,
        }
    }
}

/// Half-open range of hold durations treated as a deliberate long press.
/// Anything longer is assumed to be a stuck button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPressWindow {
    pub min: Duration,
    pub max: Duration,
}

impl Default for LongPressWindow {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(10),
            max: Duration::from_secs(30),
        }
    }
}

impl LongPressWindow {
    pub fn contains(&self, hold: Duration) -> bool {
        hold >= self.min && hold < self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub volume_percent: u32,
    pub is_playing: bool,
    pub last_activity: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetVolume(u32),
    Power(PowerAction),
}

pub struct PlaybackMediator<P, S>
where
    P: Player,
    S: SystemControl,
{
    player: P,
    system: S,
    volume: VolumeConfig,
    long_press: LongPressWindow,
    state: Mutex<PlaybackState>,
}

impl<P, S> PlaybackMediator<P, S>
where
    P: Player,
    S: SystemControl,
{
    pub fn new(player: P, system: S, volume: VolumeConfig, long_press: LongPressWindow) -> Self {
        let state = PlaybackState {
            volume_percent: volume.initial.min(volume.max),
            is_playing: false,
            last_activity: Instant::now(),
        };
        Self {
            player,
            system,
            volume,
            long_press,
            state: Mutex::new(state),
        }
    }

    /// Pushes the initial volume to the player.
    pub fn start(&self) {
        let volume = self.lock_state().volume_percent;
        match self.player.volume() {
            Ok(previous) => info!(previous, volume, "applying initial volume"),
            Err(err) => {
                debug!(error = %err, "could not read player volume");
                info!(volume, "applying initial volume");
            }
        }
        self.execute(None, &[Action::SetVolume(volume)]);
    }

    pub fn snapshot(&self) -> PlaybackState {
        *self.lock_state()
    }

    pub fn handle(&self, knob: KnobId, event: KnobEvent, now: Instant) {
        info!(knob = %knob, ?event, "knob event");

        let reported = match (knob, event) {
            (KnobId::Volume, KnobEvent::RotateCw) => self.player_reports_playing(),
            _ => None,
        };

        let actions = {
            let mut state = self.lock_state();
            state.last_activity = state.last_activity.max(now);
            if let Some(playing) = reported {
                state.is_playing = playing;
            }
            self.plan(&mut state, knob, event)
        };

        self.execute(Some(knob), &actions);
    }

    /// Pauses playback when no knob has been touched for `threshold`.
    /// Returns true when a pause was issued.
    pub fn pause_if_idle(&self, now: Instant, threshold: Duration) -> bool {
        let reported = self.player_reports_playing();

        let idle_for = {
            let mut state = self.lock_state();
            if let Some(playing) = reported {
                state.is_playing = playing;
            }
            let idle_for = now.saturating_duration_since(state.last_activity);
            if !state.is_playing || idle_for < threshold {
                return false;
            }
            state.is_playing = false;
            idle_for
        };

        info!(idle = %format_duration(idle_for), "no knob activity; pausing playback");
        self.execute(None, &[Action::Pause]);
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn player_reports_playing(&self) -> Option<bool> {
        match self.player.is_playing() {
            Ok(playing) => Some(playing),
            Err(err) => {
                debug!(error = %err, "could not query player state; using last known state");
                None
            }
        }
    }

    fn plan(&self, state: &mut PlaybackState, knob: KnobId, event: KnobEvent) -> Vec<Action> {
        match (knob, event) {
            (KnobId::Song, KnobEvent::RotateCw) => vec![Action::Next],
            (KnobId::Song, KnobEvent::RotateCcw) => vec![Action::Previous],
            (_, KnobEvent::Down) => {
                state.is_playing = false;
                vec![Action::Pause]
            }
            (KnobId::Song, KnobEvent::Up { hold }) => {
                self.long_press(state, knob, hold, PowerAction::Reboot)
            }
            (KnobId::Volume, KnobEvent::Up { hold }) => {
                self.long_press(state, knob, hold, PowerAction::Shutdown)
            }
            (KnobId::Volume, KnobEvent::RotateCw) => self.volume_up(state),
            (KnobId::Volume, KnobEvent::RotateCcw) => self.volume_down(state),
        }
    }

    fn long_press(
        &self,
        state: &mut PlaybackState,
        knob: KnobId,
        hold: Duration,
        action: PowerAction,
    ) -> Vec<Action> {
        if !self.long_press.contains(hold) {
            if hold >= self.long_press.max {
                info!(knob = %knob, hold = %format_duration(hold), "hold too long; ignoring");
            }
            return Vec::new();
        }

        info!(knob = %knob, hold = %format_duration(hold), %action, "long press");
        state.is_playing = false;
        vec![Action::Stop, Action::Power(action)]
    }

    fn volume_up(&self, state: &mut PlaybackState) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        if !state.is_playing {
            state.is_playing = true;
            actions.push(Action::Play);
        }
        if state.volume_percent < self.volume.max {
            state.volume_percent = state
                .volume_percent
                .saturating_add(self.volume.step)
                .min(self.volume.max);
            actions.push(Action::SetVolume(state.volume_percent));
        }
        actions
    }

    fn volume_down(&self, state: &mut PlaybackState) -> Vec<Action> {
        let step = self.volume.step;
        if state.volume_percent > 0 && state.volume_percent <= step {
            state.volume_percent = 0;
            state.is_playing = false;
            vec![Action::SetVolume(0), Action::Pause]
        } else if state.volume_percent >= step {
            state.volume_percent -= step;
            vec![Action::SetVolume(state.volume_percent)]
        } else {
            Vec::new()
        }
    }

    fn execute(&self, knob: Option<KnobId>, actions: &[Action]) {
        let knob = knob.map(KnobId::name).unwrap_or("idle");
        for action in actions {
            let result = match action {
                Action::Play => self.player.play(),
                Action::Pause => self.player.pause(),
                Action::Stop => self.player.stop(),
                Action::Next => self.player.next(),
                Action::Previous => self.player.previous(),
                Action::SetVolume(volume) => {
                    info!(knob, volume, "volume changed");
                    self.player.set_volume(*volume)
                }
                Action::Power(power) => self.system.request(*power),
            };

            if let Err(err) = result {
                warn!(knob, ?action, error = %err, "collaborator call failed");
                continue;
            }

            if matches!(action, Action::Play | Action::Next | Action::Previous) {
                self.log_track(knob);
            }
        }
    }

    fn log_track(&self, knob: &str) {
        match self.player.current_track() {
            Ok(Some(track)) => info!(knob, %track, "now playing"),
            Ok(None) => {}
            Err(err) => debug!(error = %err, "could not read current track"),
        }
    }
}

impl<P, S> KnobEventSink for PlaybackMediator<P, S>
where
    P: Player,
    S: SystemControl,
{
    fn on_knob_event(&self, knob: KnobId, event: KnobEvent, at: Instant) {
        self.handle(knob, event, at);
    }
}
