use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Down,
    Up { hold: Duration },
}

/// Debounces a single push-button line and measures how long it was held.
#[derive(Debug, Clone)]
pub struct ButtonTimer {
    debounce: Duration,
    pressed_at: Option<Instant>,
    last_accepted: Option<Instant>,
}

impl Default for ButtonTimer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ButtonTimer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pressed_at: None,
            last_accepted: None,
        }
    }

    #[cfg(test)]
    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    #[cfg(test)]
    pub fn pressed_at(&self) -> Option<Instant> {
        self.pressed_at
    }

    pub fn on_button_transition(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        if let Some(previous) = self.last_accepted {
            if now.saturating_duration_since(previous) < self.debounce {
                debug!(pressed, "ignoring button edge inside debounce window");
                return None;
            }
        }
        self.last_accepted = Some(now);

        if pressed {
            self.pressed_at = Some(now);
            return Some(ButtonEvent::Down);
        }

        let hold = match self.pressed_at.take() {
            Some(pressed_at) => now.saturating_duration_since(pressed_at),
            None => {
                debug!("button released without a recorded press; reporting zero hold");
                Duration::ZERO
            }
        };
        Some(ButtonEvent::Up { hold })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn press_and_release_reports_hold_duration() {
        let t0 = Instant::now();
        let mut timer = ButtonTimer::default();

        assert_eq!(timer.on_button_transition(true, t0), Some(ButtonEvent::Down));
        assert!(timer.is_pressed());

        let released = timer.on_button_transition(false, t0 + ms(1_500));
        assert_eq!(released, Some(ButtonEvent::Up { hold: ms(1_500) }));
        assert!(!timer.is_pressed());
    }

    #[test]
    fn edges_inside_debounce_window_are_dropped() {
        let t0 = Instant::now();
        let mut timer = ButtonTimer::new(ms(200));

        timer.on_button_transition(true, t0);
        assert_eq!(timer.on_button_transition(false, t0 + ms(20)), None);
        assert_eq!(timer.on_button_transition(true, t0 + ms(40)), None);
        assert_eq!(timer.pressed_at(), Some(t0));

        let released = timer.on_button_transition(false, t0 + ms(900));
        assert_eq!(released, Some(ButtonEvent::Up { hold: ms(900) }));
    }

    #[test]
    fn window_is_measured_from_last_accepted_edge() {
        let t0 = Instant::now();
        let mut timer = ButtonTimer::new(ms(200));

        timer.on_button_transition(true, t0);
        // Rejected edges do not push the window forward.
        assert_eq!(timer.on_button_transition(false, t0 + ms(150)), None);
        assert!(timer.on_button_transition(false, t0 + ms(210)).is_some());
    }

    #[test]
    fn release_without_press_reports_zero_hold() {
        let mut timer = ButtonTimer::default();
        let released = timer.on_button_transition(false, Instant::now());
        assert_eq!(released, Some(ButtonEvent::Up { hold: Duration::ZERO }));
    }

    #[test]
    fn repeated_press_restarts_the_hold() {
        let t0 = Instant::now();
        let mut timer = ButtonTimer::new(ms(200));

        timer.on_button_transition(true, t0);
        assert_eq!(
            timer.on_button_transition(true, t0 + ms(5_000)),
            Some(ButtonEvent::Down)
        );
        let released = timer.on_button_transition(false, t0 + ms(6_000));
        assert_eq!(released, Some(ButtonEvent::Up { hold: ms(1_000) }));
    }

    #[test]
    fn each_press_release_pair_reports_once() {
        let t0 = Instant::now();
        let mut timer = ButtonTimer::new(ms(200));

        let mut ups = 0;
        for cycle in 0..5u64 {
            let start = t0 + ms(cycle * 2_000);
            timer.on_button_transition(true, start);
            if let Some(ButtonEvent::Up { hold }) =
                timer.on_button_transition(false, start + ms(700))
            {
                assert_eq!(hold, ms(700));
                ups += 1;
            }
        }
        assert_eq!(ups, 5);
    }
}
