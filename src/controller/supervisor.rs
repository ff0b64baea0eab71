//! Connection supervisor - keeps exactly one session bound to the current controller
//!
//! # State Machine
//!
//! ```text
//!            start()                compatible connect
//! Stopped ───────────► Idle ─────────────────────────► Active ──┐
//!    ▲                  ▲                                │   ▲    │ connect
//!    │                  └──────── disconnect ────────────┘   └────┘ (rebuild)
//!    └──────────────────── stop() from any state
//! ```
//!
//! Every connection notification tears the old session down before looking at the
//! host's current controller, so a session is rebuilt rather than patched.

use crate::controller::host::{ConnectionChange, ConnectionHandler, ControllerHost, ControllerInfo};
use crate::controller::lock_recover;
use crate::controller::transducer::{EventSink, EventTransducer, Subscription, TransducerSettings};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Idle,
    Active,
}

/// The current controller together with its live subscription
pub struct ControllerSession {
    controller: ControllerInfo,
    subscription: Subscription,
}

impl ControllerSession {
    pub fn controller(&self) -> &ControllerInfo {
        &self.controller
    }

    fn teardown(mut self) {
        self.subscription.unsubscribe();
        info!(
            "Session closed for controller {} ({})",
            self.controller.name, self.controller.id
        );
    }
}

struct SupervisorInner {
    state: SupervisorState,
    session: Option<ControllerSession>,
}

struct SupervisorShared {
    host: Arc<dyn ControllerHost>,
    settings: TransducerSettings,
    sink: EventSink,
    inner: Mutex<SupervisorInner>,
}

impl SupervisorShared {
    fn handle_connection_change(&self, change: ConnectionChange) {
        let mut inner = lock_recover(&self.inner);
        if inner.state == SupervisorState::Stopped {
            debug!("Ignoring {:?} notification while stopped", change);
            return;
        }
        debug!("Controller notification: {:?}", change);
        self.rebuild_session(&mut inner);
    }

    // Drops any existing session, then binds the host's current controller if compatible
    fn rebuild_session(&self, inner: &mut SupervisorInner) {
        if let Some(session) = inner.session.take() {
            session.teardown();
        }

        let Some(controller) = self.host.current_controller() else {
            info!("No controller found");
            inner.state = SupervisorState::Idle;
            return;
        };

        info!(
            "Controller connected: {} ({})",
            controller.info.name, controller.info.id
        );

        match controller.extended_gamepad {
            Some(gamepad) => {
                let subscription = EventTransducer::new(gamepad, self.settings.clone())
                    .subscribe(self.sink.clone());
                inner.session = Some(ControllerSession {
                    controller: controller.info,
                    subscription,
                });
                inner.state = SupervisorState::Active;
            }
            None => {
                warn!(
                    "Controller {} does not expose an extended gamepad, ignoring it",
                    controller.info.name
                );
                inner.state = SupervisorState::Idle;
            }
        }
    }
}

/// Owns the lifecycle of the controller session.
///
/// Host callbacks may arrive on any thread; all session state sits behind one lock.
pub struct ConnectionSupervisor {
    shared: Arc<SupervisorShared>,
}

impl ConnectionSupervisor {
    pub fn new(host: Arc<dyn ControllerHost>, settings: TransducerSettings, sink: EventSink) -> Self {
        Self {
            shared: Arc::new(SupervisorShared {
                host,
                settings,
                sink,
                inner: Mutex::new(SupervisorInner {
                    state: SupervisorState::Stopped,
                    session: None,
                }),
            }),
        }
    }

    /// Registers for connection notifications and binds the current controller.
    ///
    /// No-op when already started.
    pub fn start(&self) {
        let mut inner = lock_recover(&self.shared.inner);
        if inner.state != SupervisorState::Stopped {
            debug!("Supervisor already started");
            return;
        }

        info!("Starting connection supervisor");
        let weak = Arc::downgrade(&self.shared);
        let handler: ConnectionHandler = Arc::new(move |change: ConnectionChange| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_connection_change(change);
            }
        });
        self.shared.host.set_connection_handler(Some(handler));

        inner.state = SupervisorState::Idle;
        self.shared.rebuild_session(&mut inner);
    }

    /// Unregisters from notifications and tears the session down.
    ///
    /// After this returns no further event reaches the sink until the next `start()`.
    pub fn stop(&self) {
        let mut inner = lock_recover(&self.shared.inner);
        if inner.state == SupervisorState::Stopped {
            return;
        }

        info!("Stopping connection supervisor");
        self.shared.host.set_connection_handler(None);
        if let Some(session) = inner.session.take() {
            session.teardown();
        }
        inner.state = SupervisorState::Stopped;
    }

    pub fn state(&self) -> SupervisorState {
        lock_recover(&self.shared.inner).state
    }

    pub fn active_controller(&self) -> Option<ControllerInfo> {
        lock_recover(&self.shared.inner)
            .session
            .as_ref()
            .map(|session| session.controller().clone())
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
