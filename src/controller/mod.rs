//! Controller subsystem for gamepad input handling
//!
//! Turns raw gamepad callbacks into a clean stream of button press/release events:
//!
//! 1. [`buttons`] - Button catalog and host input bindings
//! 2. [`axis`] - Analog axis to digital direction debouncing
//! 3. [`transducer`] - Per-controller event stream (digital + debounced stick)
//! 4. [`supervisor`] - Connect/disconnect lifecycle and session management
//! 5. [`host`] / [`gilrs_host`] - Host capability traits and the gilrs backend
//!
//! # Architecture
//!
//! ```text
//! GilrsHost ──► ConnectionSupervisor ──► EventTransducer ──► EventSink
//!  (callbacks)   (selects controller)     (normalizes)       (dispatcher)
//! ```

pub mod axis;
pub mod buttons;
pub mod gilrs_host;
pub mod host;
pub mod supervisor;
pub mod transducer;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use axis::{AxisDebouncer, StickDebouncer, DEFAULT_ANALOG_THRESHOLD};
pub use buttons::{ButtonIdentity, ButtonPressEvent, GamepadElement, BUTTON_BINDINGS};
pub use gilrs_host::GilrsHost;
pub use host::{Controller, ControllerHost, ControllerInfo, ExtendedGamepad, HostError};
pub use supervisor::{ConnectionSupervisor, SupervisorState};
pub use transducer::{DirectionSource, EventSink, EventTransducer, Subscription, TransducerSettings};

// A panicking callback must not wedge teardown, so poisoned locks are taken over
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
