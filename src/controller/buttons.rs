//! Button catalog shared by every stage of the controller pipeline.
//!
//! Holds the closed set of logical buttons the pipeline can emit, the event value
//! carried between stages, and the static binding table from logical buttons to the
//! digital inputs a host gamepad exposes.

use serde::{Deserialize, Serialize};
use std::fmt;

// Logical button identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonIdentity {
    A,
    B,
    Y,
    Left,
    Up,
    Right,
    Down,
    LeftBumper,
    RightBumper,
}

impl ButtonIdentity {
    /// Every recognized button, in declaration order
    pub const ALL: [ButtonIdentity; 9] = [
        ButtonIdentity::A,
        ButtonIdentity::B,
        ButtonIdentity::Y,
        ButtonIdentity::Left,
        ButtonIdentity::Up,
        ButtonIdentity::Right,
        ButtonIdentity::Down,
        ButtonIdentity::LeftBumper,
        ButtonIdentity::RightBumper,
    ];

    /// Directional buttons can also be synthesized from an analog stick
    pub fn has_analog_origin(&self) -> bool {
        matches!(
            self,
            ButtonIdentity::Left | ButtonIdentity::Up | ButtonIdentity::Right | ButtonIdentity::Down
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ButtonIdentity::A => "A",
            ButtonIdentity::B => "B",
            ButtonIdentity::Y => "Y",
            ButtonIdentity::Left => "Left",
            ButtonIdentity::Up => "Up",
            ButtonIdentity::Right => "Right",
            ButtonIdentity::Down => "Down",
            ButtonIdentity::LeftBumper => "Left Bumper",
            ButtonIdentity::RightBumper => "Right Bumper",
        }
    }
}

/// A single observed press or release transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub identity: ButtonIdentity,
    pub is_pressed: bool,
}

impl ButtonPressEvent {
    pub fn new(identity: ButtonIdentity, is_pressed: bool) -> Self {
        Self {
            identity,
            is_pressed,
        }
    }

    pub fn pressed(identity: ButtonIdentity) -> Self {
        Self::new(identity, true)
    }

    pub fn released(identity: ButtonIdentity) -> Self {
        Self::new(identity, false)
    }
}

impl fmt::Display for ButtonPressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_pressed {
            "Pressed"
        } else {
            "Unpressed"
        };
        write!(f, "{} - {}", self.identity.display_name(), state)
    }
}

// Digital inputs of an extended gamepad as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadElement {
    ButtonA,
    ButtonB,
    ButtonY,
    DPadLeft,
    DPadUp,
    DPadRight,
    DPadDown,
    LeftShoulder,
    RightShoulder,
}

/// Static binding table from logical buttons to host gamepad inputs.
///
/// This is the single source of truth for which digital handlers exist; the
/// transducer walks it once to attach handlers and once more to detach them.
pub const BUTTON_BINDINGS: [(ButtonIdentity, GamepadElement); 9] = [
    (ButtonIdentity::A, GamepadElement::ButtonA),
    (ButtonIdentity::B, GamepadElement::ButtonB),
    (ButtonIdentity::Y, GamepadElement::ButtonY),
    (ButtonIdentity::Left, GamepadElement::DPadLeft),
    (ButtonIdentity::Up, GamepadElement::DPadUp),
    (ButtonIdentity::Right, GamepadElement::DPadRight),
    (ButtonIdentity::Down, GamepadElement::DPadDown),
    (ButtonIdentity::LeftBumper, GamepadElement::LeftShoulder),
    (ButtonIdentity::RightBumper, GamepadElement::RightShoulder),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn only_directions_have_analog_origin() {
        let analog: Vec<_> = ButtonIdentity::ALL
            .iter()
            .filter(|b| b.has_analog_origin())
            .copied()
            .collect();
        assert_eq!(
            analog,
            vec![
                ButtonIdentity::Left,
                ButtonIdentity::Up,
                ButtonIdentity::Right,
                ButtonIdentity::Down
            ]
        );
    }

    #[test]
    fn bindings_cover_every_button_once() {
        let identities: HashSet<_> = BUTTON_BINDINGS.iter().map(|(id, _)| *id).collect();
        let elements: HashSet<_> = BUTTON_BINDINGS.iter().map(|(_, el)| *el).collect();
        assert_eq!(identities.len(), ButtonIdentity::ALL.len());
        assert_eq!(elements.len(), BUTTON_BINDINGS.len());
        for button in ButtonIdentity::ALL {
            assert!(identities.contains(&button));
        }
    }

    #[test]
    fn description_matches_log_format() {
        assert_eq!(ButtonPressEvent::pressed(ButtonIdentity::A).to_string(), "A - Pressed");
        assert_eq!(
            ButtonPressEvent::released(ButtonIdentity::RightBumper).to_string(),
            "Right Bumper - Unpressed"
        );
    }
}
