//! Error definitions for the key injection side

use thiserror::Error;

/// Errors raised by a [`KeySender`](super::key_sender::KeySender)
#[derive(Debug, Error)]
pub enum InjectionError {
    /// The target application is not running or cannot take focus
    #[error("Target application unavailable: {0}")]
    TargetUnavailable(String),

    /// The injection command could not be launched
    #[error("Failed to launch key command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The injection command ran but reported failure
    #[error("Key command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// The OS input queue accepted fewer events than were sent
    #[cfg(windows)]
    #[error("Input rejected after {sent} events: {source}")]
    InputRejected {
        sent: u32,
        #[source]
        source: std::io::Error,
    },

    /// The sender did not finish before its deadline
    #[error("Key send timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The sender was configured with unusable settings
    #[error("Invalid key sender configuration: {0}")]
    ConfigError(String),
}
