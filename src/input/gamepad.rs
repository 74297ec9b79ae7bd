//! Canonical gamepad state in the XInput (XUSB) report layout. This is the
//! format every physical report is translated into before it is pushed to
//! the virtual pad bus.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

// Digital button bitmasks
pub const BUTTON_DPAD_UP: u16 = 0x0001;
pub const BUTTON_DPAD_DOWN: u16 = 0x0002;
pub const BUTTON_DPAD_LEFT: u16 = 0x0004;
pub const BUTTON_DPAD_RIGHT: u16 = 0x0008;
pub const BUTTON_START: u16 = 0x0010;
pub const BUTTON_BACK: u16 = 0x0020;
pub const BUTTON_LEFT_THUMB: u16 = 0x0040;
pub const BUTTON_RIGHT_THUMB: u16 = 0x0080;
pub const BUTTON_LEFT_SHOULDER: u16 = 0x0100;
pub const BUTTON_RIGHT_SHOULDER: u16 = 0x0200;
pub const BUTTON_GUIDE: u16 = 0x0400;
pub const BUTTON_A: u16 = 0x1000;
pub const BUTTON_B: u16 = 0x2000;
pub const BUTTON_X: u16 = 0x4000;
pub const BUTTON_Y: u16 = 0x8000;

/// Trigger value at which a trigger counts as "pressed" (~3% of its range)
pub const TRIGGER_THRESHOLD: u8 = 8;

/// Maximum trigger value
pub const TRIGGER_MAX: u8 = u8::MAX;

/// Identifies a single canonical button or trigger. Used as the key and
/// target type of remap tables and button combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    Guide,
    A,
    B,
    X,
    Y,
    LeftTrigger,
    RightTrigger,
}

impl Control {
    /// All digital buttons in bitmask order
    pub const BUTTONS: [Control; 15] = [
        Control::DPadUp,
        Control::DPadDown,
        Control::DPadLeft,
        Control::DPadRight,
        Control::Start,
        Control::Back,
        Control::LeftThumb,
        Control::RightThumb,
        Control::LeftShoulder,
        Control::RightShoulder,
        Control::Guide,
        Control::A,
        Control::B,
        Control::X,
        Control::Y,
    ];

    /// Both analog triggers
    pub const TRIGGERS: [Control; 2] = [Control::LeftTrigger, Control::RightTrigger];

    /// Returns the bitmask for this control if it is a digital button
    pub fn button_flag(&self) -> Option<u16> {
        let flag = match self {
            Control::DPadUp => BUTTON_DPAD_UP,
            Control::DPadDown => BUTTON_DPAD_DOWN,
            Control::DPadLeft => BUTTON_DPAD_LEFT,
            Control::DPadRight => BUTTON_DPAD_RIGHT,
            Control::Start => BUTTON_START,
            Control::Back => BUTTON_BACK,
            Control::LeftThumb => BUTTON_LEFT_THUMB,
            Control::RightThumb => BUTTON_RIGHT_THUMB,
            Control::LeftShoulder => BUTTON_LEFT_SHOULDER,
            Control::RightShoulder => BUTTON_RIGHT_SHOULDER,
            Control::Guide => BUTTON_GUIDE,
            Control::A => BUTTON_A,
            Control::B => BUTTON_B,
            Control::X => BUTTON_X,
            Control::Y => BUTTON_Y,
            Control::LeftTrigger | Control::RightTrigger => return None,
        };
        Some(flag)
    }

    /// Returns true if this control is one of the analog triggers
    pub fn is_trigger(&self) -> bool {
        matches!(self, Control::LeftTrigger | Control::RightTrigger)
    }
}

impl Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Control::DPadUp => "DPadUp",
            Control::DPadDown => "DPadDown",
            Control::DPadLeft => "DPadLeft",
            Control::DPadRight => "DPadRight",
            Control::Start => "Start",
            Control::Back => "Back",
            Control::LeftThumb => "LS",
            Control::RightThumb => "RS",
            Control::LeftShoulder => "LB",
            Control::RightShoulder => "RB",
            Control::Guide => "Guide",
            Control::A => "A",
            Control::B => "B",
            Control::X => "X",
            Control::Y => "Y",
            Control::LeftTrigger => "LT",
            Control::RightTrigger => "RT",
        };
        write!(f, "{name}")
    }
}

/// State pushed to the virtual pad bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl GamepadState {
    /// Returns true if all bits of the given button mask are set
    pub fn is_pressed(&self, flag: u16) -> bool {
        self.buttons & flag == flag
    }

    /// Returns the analog value of the given trigger. Digital buttons report
    /// [TRIGGER_MAX] while pressed.
    pub fn value(&self, control: Control) -> u8 {
        match control {
            Control::LeftTrigger => self.left_trigger,
            Control::RightTrigger => self.right_trigger,
            button => match button.button_flag() {
                Some(flag) if self.is_pressed(flag) => TRIGGER_MAX,
                _ => 0,
            },
        }
    }

    /// Sets the given trigger value. Ignored for digital buttons.
    pub fn set_trigger(&mut self, control: Control, value: u8) {
        match control {
            Control::LeftTrigger => self.left_trigger = value,
            Control::RightTrigger => self.right_trigger = value,
            _ => (),
        }
    }

    /// Returns true if the control is asserted: buttons when their bit is
    /// set, triggers once they reach [TRIGGER_THRESHOLD].
    pub fn is_active(&self, control: Control) -> bool {
        match control.button_flag() {
            Some(flag) => self.is_pressed(flag),
            None => self.value(control) >= TRIGGER_THRESHOLD,
        }
    }

    /// Releases the given control in this state
    pub fn release(&mut self, control: Control) {
        match control.button_flag() {
            Some(flag) => self.buttons &= !flag,
            None => self.set_trigger(control, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_flags_are_unique() {
        let mut seen = 0u16;
        for control in Control::BUTTONS {
            let flag = control.button_flag().unwrap();
            assert_eq!(seen & flag, 0, "{control} overlaps another button");
            seen |= flag;
        }
        assert!(Control::TRIGGERS.iter().all(|c| c.button_flag().is_none()));
    }

    #[test]
    fn test_trigger_activation_threshold() {
        let mut state = GamepadState {
            left_trigger: TRIGGER_THRESHOLD - 1,
            right_trigger: TRIGGER_THRESHOLD,
            ..Default::default()
        };
        assert!(!state.is_active(Control::LeftTrigger));
        assert!(state.is_active(Control::RightTrigger));

        state.release(Control::RightTrigger);
        assert_eq!(state.right_trigger, 0);
    }

    #[test]
    fn test_control_names_round_trip_through_yaml() {
        let controls: Vec<Control> = serde_yaml::from_str("[a, left_trigger, d_pad_up]").unwrap();
        assert_eq!(
            controls,
            vec![Control::A, Control::LeftTrigger, Control::DPadUp]
        );
    }
}
