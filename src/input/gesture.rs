//! Runtime button gestures: guide emulation and live deadzone tuning.
//!
//! Both gestures inspect a snapshot taken before remapping, so remapping a
//! physical control away from its role never disables a gesture.
use super::deadzone::{Deadzone, DeadzoneTarget};
use super::gamepad::{Control, GamepadState, BUTTON_DPAD_DOWN, BUTTON_DPAD_UP, BUTTON_GUIDE};

/// Stick deadzone step per gesture
pub const STICK_TUNING_STEP: i32 = 500;
/// Trigger deadzone step per gesture
pub const TRIGGER_TUNING_STEP: i32 = 15;

/// The combination emulating the guide button when none is configured
pub const DEFAULT_GUIDE_COMBINATION: [Control; 4] = [
    Control::LeftTrigger,
    Control::RightTrigger,
    Control::LeftThumb,
    Control::RightThumb,
];

/// A single deadzone step produced by the tuning gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadzoneChange {
    pub target: DeadzoneTarget,
    pub value: i32,
}

/// Sets the guide button in `out` if every control of the combination is
/// asserted in the snapshot. The combination's controls are released in
/// `out` so they do not also register as their literal buttons. Returns
/// true if the combination matched.
pub fn apply_guide_combination(
    out: &mut GamepadState,
    snapshot: &GamepadState,
    combination: &[Control],
) -> bool {
    if combination.is_empty() {
        return false;
    }
    if !combination.iter().all(|control| snapshot.is_active(*control)) {
        return false;
    }

    for control in combination {
        out.release(*control);
    }
    out.buttons |= BUTTON_GUIDE;
    true
}

/// Evaluates the live tuning gesture against the snapshot and steps the
/// deadzone at most once per press.
///
/// Stick tuning: both triggers with exactly one thumb click, the held thumb
/// selects the stick. Trigger tuning: exactly one trigger with both thumb
/// clicks, the held trigger selects which one changes. D-pad up increases
/// and D-pad down decreases. Returns the new value if it changed.
pub fn tune_deadzone(snapshot: &GamepadState, deadzone: &mut Deadzone) -> Option<DeadzoneChange> {
    let Some((target, delta)) = detect_tuning(snapshot) else {
        deadzone.hold = false;
        return None;
    };

    if deadzone.hold {
        return None;
    }
    deadzone.hold = true;

    let before = deadzone.get(target);
    let value = deadzone.adjust(target, delta);
    if value == before {
        return None;
    }
    Some(DeadzoneChange { target, value })
}

/// Returns the target and step for the tuning gesture currently held, if any
fn detect_tuning(snapshot: &GamepadState) -> Option<(DeadzoneTarget, i32)> {
    let up = snapshot.is_pressed(BUTTON_DPAD_UP);
    let down = snapshot.is_pressed(BUTTON_DPAD_DOWN);
    let direction = match (up, down) {
        (true, false) => 1,
        (false, true) => -1,
        _ => return None,
    };

    let lt = snapshot.is_active(Control::LeftTrigger);
    let rt = snapshot.is_active(Control::RightTrigger);
    let ls = snapshot.is_active(Control::LeftThumb);
    let rs = snapshot.is_active(Control::RightThumb);

    if lt && rt && (ls ^ rs) {
        let target = if ls {
            DeadzoneTarget::LeftStick
        } else {
            DeadzoneTarget::RightStick
        };
        return Some((target, direction * STICK_TUNING_STEP));
    }

    if (lt ^ rt) && ls && rs {
        let target = if lt {
            DeadzoneTarget::LeftTrigger
        } else {
            DeadzoneTarget::RightTrigger
        };
        return Some((target, direction * TRIGGER_TUNING_STEP));
    }

    None
}
