//! Key injection backends.
//!
//! A [`KeySender`] delivers one key press to a named application. Sends may wait
//! on the outside world (focusing a window, spawning a helper). The dispatcher
//! bounds every send with a deadline and drops the send future when it expires,
//! so implementations must release what they hold on drop.

use crate::mapping::error::InjectionError;
use crate::mapping::keyboard::KeyIdentity;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder replaced by the key's keysym name in command templates
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Placeholder replaced by the target application name in command templates
pub const TARGET_PLACEHOLDER: &str = "{target}";

#[async_trait]
pub trait KeySender: Send + Sync + 'static {
    /// Sends one key press to the target application
    async fn send_key(&self, key: KeyIdentity, target_application: &str) -> Result<(), InjectionError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Dry-run sender that only logs what would be sent
#[derive(Debug, Default, Clone)]
pub struct LogKeySender;

#[async_trait]
impl KeySender for LogKeySender {
    async fn send_key(&self, key: KeyIdentity, target_application: &str) -> Result<(), InjectionError> {
        info!("[dry-run] {} -> {}", key, target_application);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Runs an external program per key press.
///
/// The template is an argv list; `{key}` and `{target}` are substituted in every
/// argument. The default targets xdotool. A send that is abandoned kills the
/// child process.
#[derive(Debug, Clone)]
pub struct CommandKeySender {
    program: String,
    args: Vec<String>,
}

impl CommandKeySender {
    pub fn new(template: &[String]) -> Result<Self, InjectionError> {
        let Some((program, args)) = template.split_first() else {
            return Err(InjectionError::ConfigError(
                "command template is empty".to_string(),
            ));
        };
        if program.trim().is_empty() {
            return Err(InjectionError::ConfigError(
                "command program is blank".to_string(),
            ));
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn default_template() -> Vec<String> {
        [
            "xdotool",
            "search",
            "--name",
            TARGET_PLACEHOLDER,
            "windowactivate",
            "--sync",
            "key",
            KEY_PLACEHOLDER,
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }

    fn render_args(&self, key: KeyIdentity, target_application: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(KEY_PLACEHOLDER, key.keysym())
                    .replace(TARGET_PLACEHOLDER, target_application)
            })
            .collect()
    }
}

#[async_trait]
impl KeySender for CommandKeySender {
    async fn send_key(&self, key: KeyIdentity, target_application: &str) -> Result<(), InjectionError> {
        let args = self.render_args(key, target_application);
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(InjectionError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(windows)]
pub use send_input::SendInputKeySender;

#[cfg(windows)]
mod send_input {
    //! Win32 `SendInput` backend. Keys go to the foreground window.

    use super::*;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_DOWN, VK_ESCAPE, VK_LEFT,
        VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT, VK_TAB, VK_UP,
    };

    // Tags injected input so it can be told apart from real keystrokes
    const INJECTED_MARKER: usize = 0x7061_646b;

    #[derive(Debug, Default, Clone)]
    pub struct SendInputKeySender;

    fn virtual_key(key: KeyIdentity) -> (VIRTUAL_KEY, bool) {
        match key {
            KeyIdentity::Return => (VK_RETURN, false),
            KeyIdentity::Escape => (VK_ESCAPE, false),
            KeyIdentity::Tab => (VK_TAB, false),
            KeyIdentity::LeftArrow => (VK_LEFT, true),
            KeyIdentity::UpArrow => (VK_UP, true),
            KeyIdentity::RightArrow => (VK_RIGHT, true),
            KeyIdentity::DownArrow => (VK_DOWN, true),
            KeyIdentity::PageDown => (VK_NEXT, true),
            KeyIdentity::PageUp => (VK_PRIOR, true),
        }
    }

    fn keyboard_input(vk: VIRTUAL_KEY, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: INJECTED_MARKER,
                },
            },
        }
    }

    #[async_trait]
    impl KeySender for SendInputKeySender {
        async fn send_key(&self, key: KeyIdentity, target_application: &str) -> Result<(), InjectionError> {
            let (vk, extended) = virtual_key(key);
            let mut flags = KEYBD_EVENT_FLAGS(0);
            if extended {
                flags |= KEYEVENTF_EXTENDEDKEY;
            }
            let inputs = [
                keyboard_input(vk, flags),
                keyboard_input(vk, flags | KEYEVENTF_KEYUP),
            ];

            debug!("SendInput {} for {}", key, target_application);
            let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
            if sent as usize == inputs.len() {
                Ok(())
            } else {
                Err(InjectionError::InputRejected {
                    sent,
                    source: std::io::Error::last_os_error(),
                })
            }
        }

        fn name(&self) -> &str {
            "sendinput"
        }
    }
}
