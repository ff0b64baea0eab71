//! Analog axis to digital button conversion.
//!
//! An [`AxisDebouncer`] latches two opposing directions on one axis and reports a
//! transition only when a latch flips. The same threshold is used for press and
//! release, so a reading that hovers at the boundary may toggle.

use crate::controller::buttons::{ButtonIdentity, ButtonPressEvent};
use tracing::debug;

/// Default threshold for treating a stick deflection as a press
pub const DEFAULT_ANALOG_THRESHOLD: f32 = 0.5;

// Latched directions for one axis
#[derive(Debug, Clone)]
pub struct AxisDebouncer {
    negative: ButtonIdentity,
    positive: ButtonIdentity,
    threshold: f32,
    negative_latched: bool,
    positive_latched: bool,
}

impl AxisDebouncer {
    /// Both latches start released so the first crossing always produces a press.
    pub fn new(negative: ButtonIdentity, positive: ButtonIdentity, threshold: f32) -> Self {
        Self {
            negative,
            positive,
            threshold,
            negative_latched: false,
            positive_latched: false,
        }
    }

    /// Feeds one raw reading in `[-1.0, 1.0]` and returns the resulting transitions.
    ///
    /// At most one transition per direction; the negative direction is reported first.
    pub fn update(&mut self, value: f32) -> Vec<ButtonPressEvent> {
        let mut events = Vec::with_capacity(2);

        let negative_pressed = value < -self.threshold;
        if negative_pressed != self.negative_latched {
            self.negative_latched = negative_pressed;
            events.push(ButtonPressEvent::new(self.negative, negative_pressed));
        }

        let positive_pressed = value > self.threshold;
        if positive_pressed != self.positive_latched {
            self.positive_latched = positive_pressed;
            events.push(ButtonPressEvent::new(self.positive, positive_pressed));
        }

        if !events.is_empty() {
            debug!("Axis value {:.4} produced {:?}", value, events);
        }
        events
    }

    /// Current latch for one of the two directions this axis drives
    pub fn is_pressed(&self, identity: ButtonIdentity) -> Option<bool> {
        if identity == self.negative {
            Some(self.negative_latched)
        } else if identity == self.positive {
            Some(self.positive_latched)
        } else {
            None
        }
    }
}

/// Debouncer pair for a two-axis stick.
///
/// X drives Left/Right and Y drives Down/Up, with positive Y pointing up.
#[derive(Debug, Clone)]
pub struct StickDebouncer {
    x: AxisDebouncer,
    y: AxisDebouncer,
}

impl StickDebouncer {
    pub fn new(threshold: f32) -> Self {
        Self {
            x: AxisDebouncer::new(ButtonIdentity::Left, ButtonIdentity::Right, threshold),
            y: AxisDebouncer::new(ButtonIdentity::Down, ButtonIdentity::Up, threshold),
        }
    }

    pub fn update(&mut self, x: f32, y: f32) -> Vec<ButtonPressEvent> {
        let mut events = self.x.update(x);
        events.extend(self.y.update(y));
        events
    }

    pub fn is_pressed(&self, identity: ButtonIdentity) -> bool {
        self.x
            .is_pressed(identity)
            .or_else(|| self.y.is_pressed(identity))
            .unwrap_or(false)
    }
}
