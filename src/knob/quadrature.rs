//! Gray-code decoding for a two-line rotary encoder.
//!
//! Each evaluation packs the line levels into `4a + 2b + (a ^ b)` and looks at
//! the distance travelled since the previous evaluation, modulo four. A step of
//! one is clockwise, a step of three is anticlockwise, anything else is bounce.
//! A direction is only confirmed once two consecutive steps agree on it, and a
//! confirmed direction is only reported when the step lands back on the rest
//! reading, so one detent of travel yields one rotation.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Clockwise,
    Anticlockwise,
}

/// Levels of both encoder lines read at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSample {
    pub a: bool,
    pub b: bool,
}

impl PinSample {
    /// Both lines high, which is where a pulled-up encoder sits between detents.
    pub const REST: Self = Self { a: true, b: true };

    fn packed(self) -> u8 {
        let a = u8::from(self.a);
        let b = u8::from(self.b);
        a * 4 + b * 2 + (a ^ b)
    }
}

#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    sample: PinSample,
    last_state: u8,
    direction: Rotation,
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadratureDecoder {
    pub fn new() -> Self {
        Self {
            sample: PinSample::REST,
            last_state: PinSample::REST.packed(),
            direction: Rotation::None,
        }
    }

    #[cfg(test)]
    pub fn with_sample(sample: PinSample) -> Self {
        Self {
            sample,
            last_state: sample.packed(),
            direction: Rotation::None,
        }
    }

    #[cfg(test)]
    pub fn direction(&self) -> Rotation {
        self.direction
    }

    /// Records a new level on one line and evaluates the resulting reading.
    pub fn on_line_transition(&mut self, line: Line, level: bool) -> Option<Rotation> {
        let mut sample = self.sample;
        match line {
            Line::A => sample.a = level,
            Line::B => sample.b = level,
        }
        self.on_sample(sample)
    }

    /// Evaluates a full reading of both lines. Returns a direction only for a
    /// confirmed step that completes a detent.
    pub fn on_sample(&mut self, sample: PinSample) -> Option<Rotation> {
        self.sample = sample;
        let state = sample.packed();
        let delta = state.wrapping_sub(self.last_state) & 0b11;
        self.last_state = state;

        let candidate = match delta {
            1 => Rotation::Clockwise,
            3 => Rotation::Anticlockwise,
            _ => return None,
        };

        if self.direction != candidate {
            self.direction = candidate;
            return None;
        }
        (sample == PinSample::REST).then_some(candidate)
    }
}
