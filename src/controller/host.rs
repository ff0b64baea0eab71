//! Host capabilities consumed by the controller pipeline.
//!
//! The pipeline never talks to an input backend directly. A [`ControllerHost`]
//! reports connection changes and the currently selected controller, and an
//! [`ExtendedGamepad`] accepts per-input change handlers. Handlers may be invoked
//! from any thread, but never with a host-internal lock held.

use crate::controller::buttons::GamepadElement;
use std::sync::Arc;

/// Called with the new pressed state of one digital input.
///
/// Hosts call it only when the state differs from the last one reported for that
/// input; a repeated state is swallowed by the host.
pub type PressedChangedHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Called with the `(x, y)` position of the left thumbstick, each in `[-1.0, 1.0]`
pub type StickChangedHandler = Arc<dyn Fn(f32, f32) + Send + Sync>;

/// Called when a controller attaches or detaches
pub type ConnectionHandler = Arc<dyn Fn(ConnectionChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChange {
    Connected,
    Disconnected,
}

// Identity of a physical controller as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    pub id: usize,
    pub name: String,
}

/// The host's currently selected controller
pub struct Controller {
    pub info: ControllerInfo,
    /// Present only when the controller exposes the full digital button set and a
    /// left analog stick
    pub extended_gamepad: Option<Arc<dyn ExtendedGamepad>>,
}

pub trait ExtendedGamepad: Send + Sync {
    /// Installs or clears (`None`) the handler for one digital input
    fn set_pressed_handler(&self, element: GamepadElement, handler: Option<PressedChangedHandler>);

    /// Installs or clears (`None`) the left thumbstick handler
    fn set_left_stick_handler(&self, handler: Option<StickChangedHandler>);
}

pub trait ControllerHost: Send + Sync {
    /// Installs or clears (`None`) the connect/disconnect handler
    fn set_connection_handler(&self, handler: Option<ConnectionHandler>);

    /// The controller the host currently considers active
    fn current_controller(&self) -> Option<Controller>;
}

// Host errors
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Failed to initialize controller host: {0}")]
    InitializationError(String),

    #[error("Controller host thread error: {0}")]
    ThreadError(String),
}
