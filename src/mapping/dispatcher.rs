//! Action dispatcher - turns button presses into key injections
//!
//! `dispatch` runs on whatever thread delivered the controller callback, so it only
//! filters, maps and enqueues. A single worker task drains the queue and runs the
//! [`KeySender`] one key at a time, in arrival order. Each send gets a deadline;
//! a send that misses it is aborted and the worker moves on to the next key.
//!
//! ```text
//! ButtonPressEvent ──► dispatch() ──[KeyCommand]──► injection worker ──► KeySender
//!                     (press only)    (bounded)       (deadline)
//! ```

use crate::controller::buttons::{ButtonIdentity, ButtonPressEvent};
use crate::controller::transducer::EventSink;
use crate::mapping::error::InjectionError;
use crate::mapping::key_sender::KeySender;
use crate::mapping::keyboard::{mapped_key, KeyIdentity};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Presses waiting for the injection worker; further presses are dropped
pub const QUEUE_CAPACITY: usize = 100;

/// Deadline for a single key send
pub const DEFAULT_INJECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// One queued injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCommand {
    pub button: ButtonIdentity,
    pub key: KeyIdentity,
}

pub struct ActionDispatcher {
    command_sender: mpsc::Sender<KeyCommand>,
}

impl ActionDispatcher {
    /// Creates the dispatcher and spawns its injection worker.
    ///
    /// The worker finishes once every dispatcher handle is dropped.
    pub fn spawn(
        key_sender: Arc<dyn KeySender>,
        target_application: String,
        injection_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        info!(
            "Spawning action dispatcher for '{}' using {} sender (timeout {:?})",
            target_application,
            key_sender.name(),
            injection_timeout
        );
        let (command_sender, command_receiver) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(run_injection_worker(
            command_receiver,
            key_sender,
            target_application,
            injection_timeout,
        ));

        (Self { command_sender }, worker)
    }

    /// Handles one event; returns whether a key was queued.
    ///
    /// Releases are dropped, and so are presses that find the queue full. Never blocks.
    pub fn dispatch(&self, event: ButtonPressEvent) -> bool {
        if !event.is_pressed {
            debug!("Ignoring release: {}", event);
            return false;
        }

        info!("{} at {}", event, Local::now().format("%H:%M:%S.%3f"));
        let command = KeyCommand {
            button: event.identity,
            key: mapped_key(event.identity),
        };

        match self.command_sender.try_send(command) {
            Ok(_) => true,
            Err(TrySendError::Full(command)) => {
                warn!("Injection queue full, dropping {:?}", command);
                false
            }
            Err(TrySendError::Closed(command)) => {
                warn!("Injection worker is gone, dropping {:?}", command);
                false
            }
        }
    }

    /// Wraps the dispatcher as an event sink for the controller pipeline
    pub fn into_sink(self: Arc<Self>) -> EventSink {
        Arc::new(move |event: ButtonPressEvent| {
            self.dispatch(event);
        })
    }
}

// Drain queued commands until every sender is gone
async fn run_injection_worker(
    mut command_receiver: mpsc::Receiver<KeyCommand>,
    key_sender: Arc<dyn KeySender>,
    target_application: String,
    injection_timeout: Duration,
) {
    info!("Injection worker started");

    while let Some(command) = command_receiver.recv().await {
        let sender = key_sender.clone();
        let target = target_application.clone();
        let mut injection =
            tokio::spawn(async move { sender.send_key(command.key, &target).await });

        let result = match tokio::time::timeout(injection_timeout, &mut injection).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Key injection task failed: {}", e);
                continue;
            }
            Err(_) => {
                injection.abort();
                Err(InjectionError::TimedOut(injection_timeout))
            }
        };

        match result {
            Ok(()) => debug!("Sent {} for {:?}", command.key, command.button),
            Err(e) => warn!(
                "Failed to send {} to '{}', dropping it: {}",
                command.key, target_application, e
            ),
        }
    }

    info!("Injection worker finished");
}
