//! Mapping of controller events onto key presses for the target application.
//!
//! The [`ActionDispatcher`] consumes the controller's event stream, keeps presses
//! only, maps each button through the fixed table in [`keyboard`] and hands the key
//! to a [`KeySender`]. Injection failures are logged and dropped.

pub mod dispatcher;
pub mod error;
pub mod key_sender;
pub mod keyboard;

// Re-exports for easier access
pub use dispatcher::{ActionDispatcher, KeyCommand, DEFAULT_INJECTION_TIMEOUT};
pub use error::InjectionError;
pub use key_sender::{CommandKeySender, KeySender, LogKeySender};
#[cfg(windows)]
pub use key_sender::SendInputKeySender;
pub use keyboard::{mapped_key, KeyIdentity};
