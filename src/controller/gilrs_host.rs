//! gilrs-backed controller host
//!
//! A dedicated polling thread owns the `Gilrs` context and turns its events into
//! host callbacks. The thread is driven by a small statum machine:
//!
//! ```text
//! Initializing ──► Polling ──► (cancelled)
//! ```
//!
//! Handlers live in a shared registry. The polling thread clones a handler out of
//! the registry and releases the lock before calling it, so handlers are free to
//! call back into the host or the supervisor.

use crate::controller::buttons::GamepadElement;
use crate::controller::host::{
    ConnectionChange, ConnectionHandler, Controller, ControllerHost, ControllerInfo,
    ExtendedGamepad, HostError, PressedChangedHandler, StickChangedHandler,
};
use crate::controller::lock_recover;
use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

// Inputs a controller must expose to count as an extended gamepad
const REQUIRED_BUTTONS: [Button; 5] = [
    Button::South,
    Button::East,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
];
const REQUIRED_AXES: [Axis; 2] = [Axis::LeftStickX, Axis::LeftStickY];

#[derive(Default)]
struct HandlerRegistry {
    connection: Option<ConnectionHandler>,
    pressed: HashMap<(usize, GamepadElement), PressedChangedHandler>,
    left_stick: HashMap<usize, StickChangedHandler>,
}

#[derive(Debug, Clone)]
struct CurrentPad {
    info: ControllerInfo,
    extended: bool,
}

// State shared between the polling thread and callers on other threads
#[derive(Default)]
struct HostShared {
    registry: Mutex<HandlerRegistry>,
    current: Mutex<Option<CurrentPad>>,
}

impl HostShared {
    fn notify_connection(&self, change: ConnectionChange) {
        let handler = lock_recover(&self.registry).connection.clone();
        if let Some(handler) = handler {
            handler(change);
        }
    }

    fn pressed_handler(&self, id: usize, element: GamepadElement) -> Option<PressedChangedHandler> {
        lock_recover(&self.registry)
            .pressed
            .get(&(id, element))
            .cloned()
    }

    fn stick_handler(&self, id: usize) -> Option<StickChangedHandler> {
        lock_recover(&self.registry).left_stick.get(&id).cloned()
    }
}

/// Handle to one gilrs gamepad, registering handlers in the shared registry
struct GilrsGamepad {
    id: usize,
    shared: Arc<HostShared>,
}

impl ExtendedGamepad for GilrsGamepad {
    fn set_pressed_handler(&self, element: GamepadElement, handler: Option<PressedChangedHandler>) {
        let mut registry = lock_recover(&self.shared.registry);
        match handler {
            Some(handler) => {
                registry.pressed.insert((self.id, element), handler);
            }
            None => {
                registry.pressed.remove(&(self.id, element));
            }
        }
    }

    fn set_left_stick_handler(&self, handler: Option<StickChangedHandler>) {
        let mut registry = lock_recover(&self.shared.registry);
        match handler {
            Some(handler) => {
                registry.left_stick.insert(self.id, handler);
            }
            None => {
                registry.left_stick.remove(&self.id);
            }
        }
    }
}

// Last reported input state per gamepad, keyed by host id
#[derive(Debug, Default)]
struct InputTracker {
    buttons: HashMap<(usize, GamepadElement), bool>,
    sticks: HashMap<usize, (f32, f32)>,
}

impl InputTracker {
    // Records a button state; false when it repeats the last reported one
    fn button_changed(&mut self, id: usize, element: GamepadElement, pressed: bool) -> bool {
        self.buttons.insert((id, element), pressed) != Some(pressed)
    }

    fn has_stick(&self, id: usize) -> bool {
        self.sticks.contains_key(&id)
    }

    fn seed_stick(&mut self, id: usize, x: f32, y: f32) {
        self.sticks.insert(id, (x, y));
    }

    // Applies one left stick axis reading and returns the full position
    fn stick_moved(&mut self, id: usize, axis: Axis, value: f32) -> Option<(f32, f32)> {
        let position = self.sticks.entry(id).or_insert((0.0, 0.0));
        match axis {
            Axis::LeftStickX => position.0 = value,
            Axis::LeftStickY => position.1 = value,
            _ => return None,
        }
        Some(*position)
    }

    fn forget(&mut self, id: usize) {
        self.sticks.remove(&id);
        self.buttons.retain(|(pad, _), _| *pad != id);
    }
}

// Poller states
#[state]
#[derive(Debug, Clone)]
enum PollerState {
    Initializing,
    Polling,
}

#[machine]
struct GamepadPoller<S: PollerState> {
    // Gilrs context, owned by the polling thread
    gilrs: Gilrs,

    shared: Arc<HostShared>,

    // Connected gamepads, most recently connected last
    connected: Vec<GamepadId>,

    // Last reported buttons and stick positions
    inputs: InputTracker,
}

impl GamepadPoller<Initializing> {
    fn create(shared: Arc<HostShared>) -> Result<Self, HostError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(HostError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, shared, Vec::new(), InputTracker::default()))
    }

    // Adopt already connected gamepads and transition to Polling
    fn initialize(mut self) -> GamepadPoller<Polling> {
        self.connected = self.gilrs.gamepads().map(|(id, _)| id).collect();

        if self.connected.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads:", self.connected.len());
            for (idx, (id, gamepad)) in self.gilrs.gamepads().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }
        }

        for id in self.connected.clone() {
            self.seed_stick(id);
        }

        let current = self.connected.last().and_then(|id| self.describe(*id));
        *lock_recover(&self.shared.current) = current;

        info!("Gamepad poller initialized, transitioning to Polling state");
        self.transition()
    }
}

impl<S: PollerState> GamepadPoller<S> {
    fn describe(&self, id: GamepadId) -> Option<CurrentPad> {
        let gamepad = self.gilrs.connected_gamepad(id)?;
        let extended = REQUIRED_BUTTONS
            .iter()
            .all(|button| gamepad.button_code(*button).is_some())
            && REQUIRED_AXES
                .iter()
                .all(|axis| gamepad.axis_code(*axis).is_some());

        Some(CurrentPad {
            info: ControllerInfo {
                id: usize::from(id),
                name: gamepad.name().to_string(),
            },
            extended,
        })
    }

    // Starts stick tracking from the pad's current position rather than center
    fn seed_stick(&mut self, id: GamepadId) {
        let (x, y) = self
            .gilrs
            .connected_gamepad(id)
            .map(|gamepad| (gamepad.value(Axis::LeftStickX), gamepad.value(Axis::LeftStickY)))
            .unwrap_or((0.0, 0.0));
        debug!("Seeding left stick of {} at ({:.4}, {:.4})", id, x, y);
        self.inputs.seed_stick(usize::from(id), x, y);
    }
}

impl GamepadPoller<Polling> {
    fn run_until_cancelled(mut self, cancel: &CancellationToken) {
        info!("Starting gamepad polling loop");

        while !cancel.is_cancelled() {
            while let Some(Event { id, event, time, .. }) = self.gilrs.next_event() {
                self.handle_event(id, event, time);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        info!("Gamepad polling loop stopped");
    }

    fn handle_event(&mut self, id: GamepadId, event: EventType, time: SystemTime) {
        let timestamp: DateTime<Local> = time.into();

        match event {
            EventType::Connected => {
                info!(
                    "Gamepad {} connected at {}",
                    id,
                    timestamp.format("%H:%M:%S.%3f")
                );
                self.connected.retain(|known| *known != id);
                self.connected.push(id);
                self.inputs.forget(usize::from(id));
                self.seed_stick(id);
                let current = self.describe(id);
                *lock_recover(&self.shared.current) = current;
                self.shared.notify_connection(ConnectionChange::Connected);
            }
            EventType::Disconnected => {
                warn!(
                    "Gamepad {} disconnected at {}",
                    id,
                    timestamp.format("%H:%M:%S.%3f")
                );
                self.connected.retain(|known| *known != id);
                self.inputs.forget(usize::from(id));
                let current = self.connected.last().and_then(|other| self.describe(*other));
                *lock_recover(&self.shared.current) = current;
                self.shared.notify_connection(ConnectionChange::Disconnected);
            }
            EventType::ButtonPressed(button, _) => self.forward_button(id, button, true),
            EventType::ButtonReleased(button, _) => self.forward_button(id, button, false),
            EventType::AxisChanged(axis, value, _) => self.forward_axis(id, axis, value),
            _ => {
                debug!("Unhandled event type: {:?}", event);
            }
        }
    }

    fn forward_button(&mut self, id: GamepadId, button: Button, pressed: bool) {
        let Some(element) = map_button(button) else {
            debug!("Button {:?} is not bound", button);
            return;
        };
        if !self.inputs.button_changed(usize::from(id), element, pressed) {
            debug!("Button {:?} repeated pressed={}, skipping", button, pressed);
            return;
        }
        debug!("Button {:?} -> {:?} pressed={}", button, element, pressed);
        if let Some(handler) = self.shared.pressed_handler(usize::from(id), element) {
            handler(pressed);
        }
    }

    fn forward_axis(&mut self, id: GamepadId, axis: Axis, value: f32) {
        let key = usize::from(id);
        if !self.inputs.has_stick(key) {
            self.seed_stick(id);
        }
        let Some((x, y)) = self.inputs.stick_moved(key, axis, value) else {
            debug!("Ignoring axis: {:?}", axis);
            return;
        };
        debug!("Left stick: ({:.4}, {:.4})", x, y);
        if let Some(handler) = self.shared.stick_handler(key) {
            handler(x, y);
        }
    }
}

/// Controller host backed by gilrs
pub struct GilrsHost {
    shared: Arc<HostShared>,
    cancel: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl GilrsHost {
    /// Starts the polling thread and waits until gilrs is initialized
    pub async fn spawn(cancel: CancellationToken) -> Result<Arc<Self>, HostError> {
        let shared = Arc::new(HostShared::default());
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_shared = shared.clone();
        let thread_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("gilrs-poller".to_string())
            .spawn(move || {
                let poller = match GamepadPoller::create(thread_shared) {
                    Ok(poller) => poller.initialize(),
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                poller.run_until_cancelled(&thread_cancel);
            })
            .map_err(|e| HostError::ThreadError(e.to_string()))?;

        ready_rx
            .await
            .map_err(|_| HostError::ThreadError("poller thread exited during startup".to_string()))??;

        info!("Gilrs host started");
        Ok(Arc::new(Self {
            shared,
            cancel,
            thread: Mutex::new(Some(thread)),
        }))
    }

    /// Cancels the polling thread and waits for it to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let thread = lock_recover(&self.thread).take();
        if let Some(thread) = thread {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => info!("Gilrs host stopped"),
                Ok(Err(_)) => error!("Gamepad polling thread panicked"),
                Err(e) => error!("Failed to join gamepad polling thread: {}", e),
            }
        }
    }
}

impl Drop for GilrsHost {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ControllerHost for GilrsHost {
    fn set_connection_handler(&self, handler: Option<ConnectionHandler>) {
        lock_recover(&self.shared.registry).connection = handler;
    }

    fn current_controller(&self) -> Option<Controller> {
        let current = lock_recover(&self.shared.current).clone()?;
        let extended_gamepad = if current.extended {
            Some(Arc::new(GilrsGamepad {
                id: current.info.id,
                shared: self.shared.clone(),
            }) as Arc<dyn ExtendedGamepad>)
        } else {
            None
        };
        Some(Controller {
            info: current.info,
            extended_gamepad,
        })
    }
}

// Map gilrs buttons onto extended gamepad inputs
fn map_button(button: Button) -> Option<GamepadElement> {
    match button {
        Button::South => Some(GamepadElement::ButtonA),
        Button::East => Some(GamepadElement::ButtonB),
        Button::North => Some(GamepadElement::ButtonY),
        Button::LeftTrigger => Some(GamepadElement::LeftShoulder),
        Button::RightTrigger => Some(GamepadElement::RightShoulder),
        Button::DPadUp => Some(GamepadElement::DPadUp),
        Button::DPadDown => Some(GamepadElement::DPadDown),
        Button::DPadLeft => Some(GamepadElement::DPadLeft),
        Button::DPadRight => Some(GamepadElement::DPadRight),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn gilrs_buttons_cover_every_element() {
        let buttons = [
            Button::South,
            Button::East,
            Button::North,
            Button::West,
            Button::LeftTrigger,
            Button::RightTrigger,
            Button::LeftTrigger2,
            Button::DPadUp,
            Button::DPadDown,
            Button::DPadLeft,
            Button::DPadRight,
            Button::Start,
        ];
        let elements: HashSet<_> = buttons.iter().filter_map(|b| map_button(*b)).collect();
        assert_eq!(elements.len(), 9);
        assert_eq!(map_button(Button::West), None);
        assert_eq!(map_button(Button::LeftTrigger2), None);
    }

    #[test]
    fn repeated_button_states_are_swallowed() {
        let mut inputs = InputTracker::default();
        assert!(inputs.button_changed(0, GamepadElement::ButtonA, true));
        assert!(!inputs.button_changed(0, GamepadElement::ButtonA, true));
        assert!(inputs.button_changed(1, GamepadElement::ButtonA, true));
        assert!(inputs.button_changed(0, GamepadElement::ButtonA, false));
        assert!(!inputs.button_changed(0, GamepadElement::ButtonA, false));

        // a reconnected pad starts from scratch
        inputs.button_changed(0, GamepadElement::ButtonB, true);
        inputs.forget(0);
        assert!(inputs.button_changed(0, GamepadElement::ButtonB, true));
        assert!(!inputs.button_changed(1, GamepadElement::ButtonA, true));
    }

    #[test]
    fn seeded_stick_keeps_the_other_axis() {
        let mut inputs = InputTracker::default();
        inputs.seed_stick(2, -0.9, 0.7);
        assert!(inputs.has_stick(2));

        assert_eq!(inputs.stick_moved(2, Axis::LeftStickY, 0.8), Some((-0.9, 0.8)));
        assert_eq!(inputs.stick_moved(2, Axis::LeftStickX, 0.0), Some((0.0, 0.8)));
        assert_eq!(inputs.stick_moved(2, Axis::RightStickX, 1.0), None);

        inputs.forget(2);
        assert!(!inputs.has_stick(2));
    }

    #[test]
    fn registry_routes_by_gamepad_and_element() {
        let shared = Arc::new(HostShared::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let gamepad = GilrsGamepad {
            id: 4,
            shared: shared.clone(),
        };

        let counter = hits.clone();
        gamepad.set_pressed_handler(
            GamepadElement::ButtonA,
            Some(Arc::new(move |_: bool| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        assert!(shared.pressed_handler(4, GamepadElement::ButtonA).is_some());
        assert!(shared.pressed_handler(5, GamepadElement::ButtonA).is_none());
        assert!(shared.pressed_handler(4, GamepadElement::ButtonB).is_none());
        if let Some(handler) = shared.pressed_handler(4, GamepadElement::ButtonA) {
            handler(true);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        gamepad.set_pressed_handler(GamepadElement::ButtonA, None);
        assert!(shared.pressed_handler(4, GamepadElement::ButtonA).is_none());
    }

    #[test]
    fn current_controller_reflects_capability() {
        let host = GilrsHost {
            shared: Arc::new(HostShared::default()),
            cancel: CancellationToken::new(),
            thread: Mutex::new(None),
        };
        assert!(host.current_controller().is_none());

        *lock_recover(&host.shared.current) = Some(CurrentPad {
            info: ControllerInfo {
                id: 0,
                name: "Generic HID".to_string(),
            },
            extended: false,
        });
        let controller = host.current_controller().expect("controller set");
        assert!(controller.extended_gamepad.is_none());

        lock_recover(&host.shared.current)
            .as_mut()
            .expect("controller set")
            .extended = true;
        let controller = host.current_controller().expect("controller set");
        assert!(controller.extended_gamepad.is_some());
        assert_eq!(controller.info.name, "Generic HID");
    }

    #[test]
    fn connection_handler_is_invoked_without_registry_lock() {
        let shared = Arc::new(HostShared::default());
        let inner = shared.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        lock_recover(&shared.registry).connection = Some(Arc::new(move |_: ConnectionChange| {
            // would deadlock if the registry were still locked
            lock_recover(&inner.registry).connection = None;
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        shared.notify_connection(ConnectionChange::Connected);
        shared.notify_connection(ConnectionChange::Connected);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
