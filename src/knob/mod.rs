mod button;
mod quadrature;

pub use button::{ButtonEvent, ButtonTimer, DEFAULT_DEBOUNCE};
pub use quadrature::{Line, QuadratureDecoder, Rotation};

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnobId {
    Song,
    Volume,
}

impl KnobId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Volume => "volume",
        }
    }
}

impl fmt::Display for KnobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The only thing a knob reports to the rest of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobEvent {
    RotateCw,
    RotateCcw,
    Down,
    Up { hold: Duration },
}

pub trait KnobEventSink: Send + Sync {
    fn on_knob_event(&self, knob: KnobId, event: KnobEvent, at: Instant);
}

/// A raw edge as delivered by the input backend for one knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEdge {
    Line {
        line: Line,
        level: bool,
        at: Instant,
    },
    Button {
        pressed: bool,
        at: Instant,
    },
}

pub struct KnobController<S>
where
    S: KnobEventSink,
{
    id: KnobId,
    decoder: QuadratureDecoder,
    button: ButtonTimer,
    sink: Arc<S>,
}

impl<S> KnobController<S>
where
    S: KnobEventSink,
{
    pub fn new(id: KnobId, debounce: Duration, sink: Arc<S>) -> Self {
        Self {
            id,
            decoder: QuadratureDecoder::new(),
            button: ButtonTimer::new(debounce),
            sink,
        }
    }

    pub fn on_line_transition(&mut self, line: Line, level: bool, now: Instant) {
        let event = match self.decoder.on_line_transition(line, level) {
            Some(Rotation::Clockwise) => KnobEvent::RotateCw,
            Some(Rotation::Anticlockwise) => KnobEvent::RotateCcw,
            Some(Rotation::None) | None => return,
        };
        self.sink.on_knob_event(self.id, event, now);
    }

    pub fn on_button_transition(&mut self, pressed: bool, now: Instant) {
        let event = match self.button.on_button_transition(pressed, now) {
            Some(ButtonEvent::Down) => KnobEvent::Down,
            Some(ButtonEvent::Up { hold }) => KnobEvent::Up { hold },
            None => return,
        };
        self.sink.on_knob_event(self.id, event, now);
    }

    pub fn handle_edge(&mut self, edge: InputEdge) {
        match edge {
            InputEdge::Line { line, level, at } => self.on_line_transition(line, level, at),
            InputEdge::Button { pressed, at } => self.on_button_transition(pressed, at),
        }
    }
}

impl<S> KnobController<S>
where
    S: KnobEventSink + 'static,
{
    /// Moves the controller onto its own thread, where it drains `edges` until
    /// the sending side goes away.
    pub fn spawn_worker(mut self, edges: Receiver<InputEdge>) -> Result<JoinHandle<()>> {
        let id = self.id;
        thread::Builder::new()
            .name(format!("{id}-knob"))
            .spawn(move || {
                debug!(knob = %id, "knob worker started");
                for edge in edges.iter() {
                    self.handle_edge(edge);
                }
                info!(knob = %id, "knob input closed; worker exiting");
            })
            .with_context(|| format!("failed to spawn {id} knob worker"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<(KnobId, KnobEvent)>>,
    }

    impl RecordingSink {
        pub fn take(&self) -> Vec<(KnobId, KnobEvent)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl KnobEventSink for RecordingSink {
        fn on_knob_event(&self, knob: KnobId, event: KnobEvent, _at: Instant) {
            self.events.lock().unwrap().push((knob, event));
        }
    }

    #[test]
    fn rotation_is_forwarded_with_knob_tag() {
        let sink = Arc::new(RecordingSink::default());
        let mut knob = KnobController::new(KnobId::Song, DEFAULT_DEBOUNCE, sink.clone());
        let now = Instant::now();

        knob.on_line_transition(Line::A, false, now);
        knob.on_line_transition(Line::B, false, now);
        knob.on_line_transition(Line::A, true, now);
        assert!(sink.take().is_empty());

        knob.on_line_transition(Line::B, true, now);
        assert_eq!(sink.take(), vec![(KnobId::Song, KnobEvent::RotateCw)]);
    }

    #[test]
    fn anticlockwise_rotation_maps_to_rotate_ccw() {
        let sink = Arc::new(RecordingSink::default());
        let mut knob = KnobController::new(KnobId::Volume, DEFAULT_DEBOUNCE, sink.clone());
        let now = Instant::now();

        knob.on_line_transition(Line::B, false, now);
        knob.on_line_transition(Line::A, false, now);
        knob.on_line_transition(Line::B, true, now);
        knob.on_line_transition(Line::A, true, now);

        assert_eq!(sink.take(), vec![(KnobId::Volume, KnobEvent::RotateCcw)]);
    }

    #[test]
    fn button_edges_become_down_and_up() {
        let sink = Arc::new(RecordingSink::default());
        let mut knob = KnobController::new(KnobId::Volume, DEFAULT_DEBOUNCE, sink.clone());
        let t0 = Instant::now();

        knob.handle_edge(InputEdge::Button { pressed: true, at: t0 });
        knob.handle_edge(InputEdge::Button {
            pressed: false,
            at: t0 + Duration::from_millis(50),
        });
        knob.handle_edge(InputEdge::Button {
            pressed: false,
            at: t0 + Duration::from_secs(3),
        });

        assert_eq!(
            sink.take(),
            vec![
                (KnobId::Volume, KnobEvent::Down),
                (
                    KnobId::Volume,
                    KnobEvent::Up {
                        hold: Duration::from_secs(3)
                    }
                ),
            ]
        );
    }

    #[test]
    fn worker_drains_its_queue_and_exits_when_closed() {
        let sink = Arc::new(RecordingSink::default());
        let knob = KnobController::new(KnobId::Song, DEFAULT_DEBOUNCE, sink.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = knob.spawn_worker(rx).expect("spawn");

        let now = Instant::now();
        let detent = [
            (Line::B, false),
            (Line::A, false),
            (Line::B, true),
            (Line::A, true),
        ];
        for (line, level) in detent.into_iter().chain(detent) {
            tx.send(InputEdge::Line { line, level, at: now }).unwrap();
        }
        drop(tx);
        worker.join().expect("join");

        assert_eq!(
            sink.take(),
            vec![
                (KnobId::Song, KnobEvent::RotateCcw),
                (KnobId::Song, KnobEvent::RotateCcw)
            ]
        );
    }
}
