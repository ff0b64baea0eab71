//! Fixed button to key table

use crate::controller::buttons::ButtonIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

// Keys the dispatcher can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyIdentity {
    Return,
    Escape,
    Tab,
    LeftArrow,
    UpArrow,
    RightArrow,
    DownArrow,
    PageDown,
    PageUp,
}

impl KeyIdentity {
    /// X11 keysym name, as understood by xdotool and friends
    pub fn keysym(&self) -> &'static str {
        match self {
            KeyIdentity::Return => "Return",
            KeyIdentity::Escape => "Escape",
            KeyIdentity::Tab => "Tab",
            KeyIdentity::LeftArrow => "Left",
            KeyIdentity::UpArrow => "Up",
            KeyIdentity::RightArrow => "Right",
            KeyIdentity::DownArrow => "Down",
            KeyIdentity::PageDown => "Page_Down",
            KeyIdentity::PageUp => "Page_Up",
        }
    }
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keysym())
    }
}

/// Key sent for a button press
pub fn mapped_key(button: ButtonIdentity) -> KeyIdentity {
    match button {
        ButtonIdentity::A => KeyIdentity::Return,
        ButtonIdentity::B => KeyIdentity::Escape,
        ButtonIdentity::Y => KeyIdentity::Tab,
        ButtonIdentity::Left => KeyIdentity::LeftArrow,
        ButtonIdentity::Up => KeyIdentity::UpArrow,
        ButtonIdentity::Right => KeyIdentity::RightArrow,
        ButtonIdentity::Down => KeyIdentity::DownArrow,
        ButtonIdentity::LeftBumper => KeyIdentity::PageDown,
        ButtonIdentity::RightBumper => KeyIdentity::PageUp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_button_gets_a_distinct_key() {
        let keys: HashSet<_> = ButtonIdentity::ALL.iter().map(|b| mapped_key(*b)).collect();
        assert_eq!(keys.len(), ButtonIdentity::ALL.len());
    }

    #[test]
    fn face_buttons_and_bumpers() {
        assert_eq!(mapped_key(ButtonIdentity::A), KeyIdentity::Return);
        assert_eq!(mapped_key(ButtonIdentity::B), KeyIdentity::Escape);
        assert_eq!(mapped_key(ButtonIdentity::Y), KeyIdentity::Tab);
        assert_eq!(mapped_key(ButtonIdentity::LeftBumper), KeyIdentity::PageDown);
        assert_eq!(mapped_key(ButtonIdentity::RightBumper), KeyIdentity::PageUp);
        assert_eq!(KeyIdentity::PageDown.to_string(), "Page_Down");
    }
}
