//! Event transducer - one controller's inputs as a single button event stream
//!
//! Digital inputs are forwarded as-is. Left stick positions run through a
//! [`StickDebouncer`] and only latch flips are forwarded. Both feed the same sink,
//! in the order the host delivers callbacks.
//!
//! ```text
//! digital handlers ─────────────────────┐
//!                                        ├──► EventSink
//! left stick ──► StickDebouncer ────────┘
//! ```

use crate::controller::axis::{StickDebouncer, DEFAULT_ANALOG_THRESHOLD};
use crate::controller::buttons::{ButtonIdentity, ButtonPressEvent, GamepadElement, BUTTON_BINDINGS};
use crate::controller::host::{ExtendedGamepad, PressedChangedHandler, StickChangedHandler};
use crate::controller::lock_recover;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Receives every normalized event of a subscription
pub type EventSink = Arc<dyn Fn(ButtonPressEvent) + Send + Sync>;

/// Which physical input drives the four directional buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionSource {
    Stick,
    DPad,
    #[default]
    Both,
}

impl DirectionSource {
    pub fn uses_dpad(&self) -> bool {
        matches!(self, DirectionSource::DPad | DirectionSource::Both)
    }

    pub fn uses_stick(&self) -> bool {
        matches!(self, DirectionSource::Stick | DirectionSource::Both)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransducerSettings {
    pub analog_threshold: f32,
    pub direction_source: DirectionSource,
}

impl Default for TransducerSettings {
    fn default() -> Self {
        Self {
            analog_threshold: DEFAULT_ANALOG_THRESHOLD,
            direction_source: DirectionSource::default(),
        }
    }
}

// Per-subscription mutable state, guarded by one lock
struct SessionState {
    stick: StickDebouncer,
    sink: Option<EventSink>,
}

/// Binds one extended gamepad to event sinks
pub struct EventTransducer {
    gamepad: Arc<dyn ExtendedGamepad>,
    settings: TransducerSettings,
}

impl EventTransducer {
    pub fn new(gamepad: Arc<dyn ExtendedGamepad>, settings: TransducerSettings) -> Self {
        Self { gamepad, settings }
    }

    /// Attaches handlers to the gamepad and forwards every resulting event to `sink`.
    ///
    /// Each subscription starts with released latches. The host keeps one handler per
    /// input, so a second live subscription on the same gamepad replaces the first.
    pub fn subscribe(&self, sink: EventSink) -> Subscription {
        let state = Arc::new(Mutex::new(SessionState {
            stick: StickDebouncer::new(self.settings.analog_threshold),
            sink: Some(sink),
        }));

        let mut bound_elements = Vec::with_capacity(BUTTON_BINDINGS.len());
        for (identity, element) in BUTTON_BINDINGS {
            if identity.has_analog_origin() && !self.settings.direction_source.uses_dpad() {
                continue;
            }
            self.gamepad
                .set_pressed_handler(element, Some(pressed_handler(&state, identity)));
            bound_elements.push(element);
        }

        let stick_bound = self.settings.direction_source.uses_stick();
        if stick_bound {
            self.gamepad
                .set_left_stick_handler(Some(stick_handler(&state)));
        }

        info!(
            "Subscribed to {} digital inputs (left stick: {})",
            bound_elements.len(),
            stick_bound
        );

        Subscription {
            gamepad: self.gamepad.clone(),
            state,
            bound_elements,
            stick_bound,
            detached: false,
        }
    }

    /// Same as [`subscribe`](Self::subscribe), exposing the stream as a channel
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<ButtonPressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink: EventSink = Arc::new(move |event: ButtonPressEvent| {
            if sender.send(event).is_err() {
                debug!("Event receiver dropped, discarding {}", event);
            }
        });
        (self.subscribe(sink), receiver)
    }
}

fn pressed_handler(state: &Arc<Mutex<SessionState>>, identity: ButtonIdentity) -> PressedChangedHandler {
    let state: Weak<Mutex<SessionState>> = Arc::downgrade(state);
    Arc::new(move |is_pressed: bool| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let state = lock_recover(&state);
        if let Some(sink) = &state.sink {
            sink(ButtonPressEvent::new(identity, is_pressed));
        }
    })
}

fn stick_handler(state: &Arc<Mutex<SessionState>>) -> StickChangedHandler {
    let state: Weak<Mutex<SessionState>> = Arc::downgrade(state);
    Arc::new(move |x: f32, y: f32| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = lock_recover(&state);
        let Some(sink) = state.sink.clone() else {
            return;
        };
        for event in state.stick.update(x, y) {
            sink(event);
        }
    })
}

/// A live binding between a gamepad and a sink.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    gamepad: Arc<dyn ExtendedGamepad>,
    state: Arc<Mutex<SessionState>>,
    bound_elements: Vec<GamepadElement>,
    stick_bound: bool,
    detached: bool,
}

impl Subscription {
    /// Detaches every handler from the gamepad, then closes the sink.
    ///
    /// Once this returns no further event reaches the sink, even from a callback the
    /// host had already picked up before the handlers were removed.
    pub fn unsubscribe(&mut self) {
        if self.detached {
            return;
        }

        for element in &self.bound_elements {
            self.gamepad.set_pressed_handler(*element, None);
        }
        if self.stick_bound {
            self.gamepad.set_left_stick_handler(None);
        }

        lock_recover(&self.state).sink = None;
        self.detached = true;
        debug!("Subscription detached");
    }

    pub fn is_active(&self) -> bool {
        !self.detached
    }

    /// Current analog latch for a direction
    pub fn is_latched(&self, identity: ButtonIdentity) -> bool {
        lock_recover(&self.state).stick.is_pressed(identity)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::host::fake::FakeGamepad;

    fn drain(receiver: &mut mpsc::UnboundedReceiver<ButtonPressEvent>) -> Vec<ButtonPressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn transducer(gamepad: &Arc<FakeGamepad>, source: DirectionSource) -> EventTransducer {
        EventTransducer::new(
            gamepad.clone(),
            TransducerSettings {
                analog_threshold: 0.5,
                direction_source: source,
            },
        )
    }

    #[test]
    fn digital_buttons_pass_through_unfiltered() {
        let gamepad = FakeGamepad::new();
        let (_subscription, mut events) = transducer(&gamepad, DirectionSource::Both).subscribe_channel();

        // invoked directly, bypassing the host's change filter
        let handler = gamepad
            .take_pressed_handler(GamepadElement::ButtonA)
            .expect("handler installed");
        handler(true);
        handler(true);
        handler(false);
        gamepad.press(GamepadElement::RightShoulder, true);

        assert_eq!(
            drain(&mut events),
            vec![
                ButtonPressEvent::pressed(ButtonIdentity::A),
                ButtonPressEvent::pressed(ButtonIdentity::A),
                ButtonPressEvent::released(ButtonIdentity::A),
                ButtonPressEvent::pressed(ButtonIdentity::RightBumper),
            ]
        );
    }

    #[test]
    fn stick_and_buttons_merge_in_delivery_order() {
        let gamepad = FakeGamepad::new();
        let (_subscription, mut events) = transducer(&gamepad, DirectionSource::Both).subscribe_channel();

        gamepad.move_stick(-0.9, 0.0);
        gamepad.press(GamepadElement::ButtonB, true);
        gamepad.move_stick(0.0, 0.0);
        gamepad.press(GamepadElement::DPadUp, true);

        assert_eq!(
            drain(&mut events),
            vec![
                ButtonPressEvent::pressed(ButtonIdentity::Left),
                ButtonPressEvent::pressed(ButtonIdentity::B),
                ButtonPressEvent::released(ButtonIdentity::Left),
                ButtonPressEvent::pressed(ButtonIdentity::Up),
            ]
        );
    }

    #[test]
    fn stick_only_leaves_dpad_unbound() {
        let gamepad = FakeGamepad::new();
        let (_subscription, mut events) = transducer(&gamepad, DirectionSource::Stick).subscribe_channel();

        assert!(!gamepad.has_pressed_handler(GamepadElement::DPadLeft));
        assert!(gamepad.has_pressed_handler(GamepadElement::ButtonY));
        gamepad.press(GamepadElement::DPadLeft, true);
        gamepad.move_stick(0.0, -0.7);

        assert_eq!(
            drain(&mut events),
            vec![ButtonPressEvent::pressed(ButtonIdentity::Down)]
        );
    }

    #[test]
    fn dpad_only_ignores_stick() {
        let gamepad = FakeGamepad::new();
        let (_subscription, mut events) = transducer(&gamepad, DirectionSource::DPad).subscribe_channel();

        assert_eq!(gamepad.handler_count(), BUTTON_BINDINGS.len());
        gamepad.move_stick(1.0, 1.0);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn unsubscribe_detaches_everything() {
        let gamepad = FakeGamepad::new();
        let (mut subscription, mut events) =
            transducer(&gamepad, DirectionSource::Both).subscribe_channel();
        assert_eq!(gamepad.handler_count(), BUTTON_BINDINGS.len() + 1);

        subscription.unsubscribe();
        assert_eq!(gamepad.handler_count(), 0);
        assert!(!subscription.is_active());

        gamepad.press(GamepadElement::ButtonA, true);
        gamepad.move_stick(-1.0, 0.0);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn in_flight_callback_after_unsubscribe_is_ignored() {
        let gamepad = FakeGamepad::new();
        let (mut subscription, mut events) =
            transducer(&gamepad, DirectionSource::Both).subscribe_channel();

        let stale = gamepad
            .take_pressed_handler(GamepadElement::ButtonA)
            .expect("handler installed");
        subscription.unsubscribe();
        stale(true);

        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn dropping_subscription_detaches() {
        let gamepad = FakeGamepad::new();
        {
            let (_subscription, _events) =
                transducer(&gamepad, DirectionSource::Both).subscribe_channel();
            assert!(gamepad.handler_count() > 0);
        }
        assert_eq!(gamepad.handler_count(), 0);
    }

    #[test]
    fn new_subscription_starts_with_released_latches() {
        let gamepad = FakeGamepad::new();
        let transducer = transducer(&gamepad, DirectionSource::Stick);

        let (first, mut first_events) = transducer.subscribe_channel();
        gamepad.move_stick(0.9, 0.0);
        assert!(first.is_latched(ButtonIdentity::Right));
        drop(first);
        assert_eq!(
            drain(&mut first_events),
            vec![ButtonPressEvent::pressed(ButtonIdentity::Right)]
        );

        let (second, mut second_events) = transducer.subscribe_channel();
        assert!(!second.is_latched(ButtonIdentity::Right));
        gamepad.move_stick(0.9, 0.0);
        assert_eq!(
            drain(&mut second_events),
            vec![ButtonPressEvent::pressed(ButtonIdentity::Right)]
        );
    }
}
