//! Radial deadzone correction for sticks and linear deadzone correction for
//! triggers.
use std::fmt::Display;

use super::gamepad::GamepadState;

/// Upper rescaling bound for stick axes
pub const STICK_SICKZONE: i16 = i16::MAX;
/// Upper rescaling bound for triggers
pub const TRIGGER_SICKZONE: i16 = u8::MAX as i16;

/// Which deadzone value a change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadzoneTarget {
    LeftStick,
    RightStick,
    LeftTrigger,
    RightTrigger,
}

impl Display for DeadzoneTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeadzoneTarget::LeftStick => "LS",
            DeadzoneTarget::RightStick => "RS",
            DeadzoneTarget::LeftTrigger => "LT",
            DeadzoneTarget::RightTrigger => "RT",
        };
        write!(f, "{name}")
    }
}

/// Per-stick radial and per-trigger linear deadzones. Values are clamped on
/// every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadzone {
    left_stick: i16,
    right_stick: i16,
    left_trigger: u8,
    right_trigger: u8,
    /// Set while the live-tuning gesture is held so one press yields one step
    pub hold: bool,
}

impl Deadzone {
    pub fn new(left_stick: i32, right_stick: i32, left_trigger: i32, right_trigger: i32) -> Self {
        let mut deadzone = Self::default();
        deadzone.set(DeadzoneTarget::LeftStick, left_stick);
        deadzone.set(DeadzoneTarget::RightStick, right_stick);
        deadzone.set(DeadzoneTarget::LeftTrigger, left_trigger);
        deadzone.set(DeadzoneTarget::RightTrigger, right_trigger);
        deadzone
    }

    pub fn left_stick(&self) -> i16 {
        self.left_stick
    }

    pub fn right_stick(&self) -> i16 {
        self.right_stick
    }

    pub fn left_trigger(&self) -> u8 {
        self.left_trigger
    }

    pub fn right_trigger(&self) -> u8 {
        self.right_trigger
    }

    /// Returns the current value for the given target
    pub fn get(&self, target: DeadzoneTarget) -> i32 {
        match target {
            DeadzoneTarget::LeftStick => self.left_stick as i32,
            DeadzoneTarget::RightStick => self.right_stick as i32,
            DeadzoneTarget::LeftTrigger => self.left_trigger as i32,
            DeadzoneTarget::RightTrigger => self.right_trigger as i32,
        }
    }

    /// Sets the value for the given target, clamped to [0, 32767] for sticks
    /// and [0, 255] for triggers.
    pub fn set(&mut self, target: DeadzoneTarget, value: i32) {
        match target {
            DeadzoneTarget::LeftStick => self.left_stick = clamp_stick(value),
            DeadzoneTarget::RightStick => self.right_stick = clamp_stick(value),
            DeadzoneTarget::LeftTrigger => self.left_trigger = clamp_trigger(value),
            DeadzoneTarget::RightTrigger => self.right_trigger = clamp_trigger(value),
        }
    }

    /// Adds the given delta to the target and returns the new clamped value
    pub fn adjust(&mut self, target: DeadzoneTarget, delta: i32) -> i32 {
        self.set(target, self.get(target) + delta);
        self.get(target)
    }
}

fn clamp_stick(value: i32) -> i16 {
    value.clamp(0, STICK_SICKZONE as i32) as i16
}

fn clamp_trigger(value: i32) -> u8 {
    value.clamp(0, TRIGGER_SICKZONE as i32) as u8
}

/// Applies a radial deadzone to the (x, y) vector.
///
/// Inside the deadzone the output is (0, 0). Between the deadzone and the
/// sickzone the radius is rescaled linearly so that the deadzone edge maps
/// to 0 and the sickzone maps to itself, keeping the angle. At or beyond the
/// sickzone the input passes through unchanged. A deadzone of 0 disables the
/// correction.
pub fn dead_zone_calc(x: i16, y: i16, deadzone: i16, sickzone: i16) -> (i16, i16) {
    if deadzone <= 0 {
        return (x, y);
    }

    let xf = x as f64;
    let yf = y as f64;
    let radius = (xf * xf + yf * yf).sqrt();
    let deadzone = deadzone as f64;
    let sickzone = sickzone as f64;

    if radius < deadzone {
        return (0, 0);
    }
    if radius >= sickzone {
        return (x, y);
    }

    let scaled = (radius - deadzone) / (sickzone - deadzone) * sickzone;
    let theta = (xf / radius.max(1.0)).acos();
    let out_x = theta.cos() * scaled;
    let mut out_y = theta.sin() * scaled;
    if y < 0 {
        out_y = -out_y;
    }

    (to_axis(out_x), to_axis(out_y))
}

fn to_axis(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Applies the stick and trigger deadzones to the given state in place
pub fn apply(state: &mut GamepadState, deadzone: &Deadzone) {
    (state.thumb_lx, state.thumb_ly) = dead_zone_calc(
        state.thumb_lx,
        state.thumb_ly,
        deadzone.left_stick,
        STICK_SICKZONE,
    );
    (state.thumb_rx, state.thumb_ry) = dead_zone_calc(
        state.thumb_rx,
        state.thumb_ry,
        deadzone.right_stick,
        STICK_SICKZONE,
    );
    state.left_trigger = apply_trigger(state.left_trigger, deadzone.left_trigger);
    state.right_trigger = apply_trigger(state.right_trigger, deadzone.right_trigger);
}

fn apply_trigger(value: u8, deadzone: u8) -> u8 {
    let (out, _) = dead_zone_calc(value as i16, 0, deadzone as i16, TRIGGER_SICKZONE);
    clamp_trigger(out as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitude((x, y): (i16, i16)) -> f64 {
        ((x as f64).powi(2) + (y as f64).powi(2)).sqrt()
    }

    #[test]
    fn test_inside_deadzone_is_suppressed() {
        for deadzone in [1, 500, 8000, 20000] {
            for (x, y) in [(0, 0), (100, 0), (0, -100), (-300, 250)] {
                let r = magnitude((x, y));
                if r < deadzone as f64 {
                    assert_eq!(dead_zone_calc(x, y, deadzone, STICK_SICKZONE), (0, 0));
                }
            }
        }
        assert_eq!(dead_zone_calc(100, 0, 8000, STICK_SICKZONE), (0, 0));
        assert_eq!(dead_zone_calc(-7999, 0, 8000, STICK_SICKZONE), (0, 0));
    }

    #[test]
    fn test_zero_deadzone_passes_through() {
        assert_eq!(dead_zone_calc(123, -456, 0, STICK_SICKZONE), (123, -456));
        assert_eq!(dead_zone_calc(10, 0, 0, TRIGGER_SICKZONE), (10, 0));
        assert_eq!(dead_zone_calc(200, 0, 0, TRIGGER_SICKZONE), (200, 0));
    }

    #[test]
    fn test_sickzone_magnitude_is_preserved() {
        for deadzone in [0, 1, 4000, 16000, 32000] {
            let (x, y) = dead_zone_calc(STICK_SICKZONE, 0, deadzone, STICK_SICKZONE);
            assert_eq!((x, y), (STICK_SICKZONE, 0));
            let (x, y) = dead_zone_calc(0, -STICK_SICKZONE, deadzone, STICK_SICKZONE);
            assert_eq!((x, y), (0, -STICK_SICKZONE));
        }
    }

    #[test]
    fn test_output_is_monotonic_along_each_axis() {
        for deadzone in [0, 1000, 8000, 30000] {
            let mut last = 0.0;
            for x in (0..=i16::MAX).step_by(97) {
                let out = magnitude(dead_zone_calc(x, 0, deadzone, STICK_SICKZONE));
                assert!(out >= last, "x={x} dz={deadzone}: {out} < {last}");
                last = out;
            }
            let mut last = 0.0;
            for y in (0..=i16::MAX).step_by(97) {
                let out = magnitude(dead_zone_calc(0, -y, deadzone, STICK_SICKZONE));
                assert!(out >= last, "y={y} dz={deadzone}: {out} < {last}");
                last = out;
            }
        }
    }

    #[test]
    fn test_rescale_keeps_angle_and_sign() {
        let (x, y) = dead_zone_calc(-10000, -10000, 4000, STICK_SICKZONE);
        assert!(x < 0 && y < 0);
        assert!((x - y).abs() <= 1);
        // Just outside the deadzone the output starts near zero
        let (x, _) = dead_zone_calc(4001, 0, 4000, STICK_SICKZONE);
        assert!(x <= 10);
    }

    #[test]
    fn test_clamped_mutation() {
        let mut deadzone = Deadzone::new(-5, 40000, 300, -1);
        assert_eq!(deadzone.left_stick(), 0);
        assert_eq!(deadzone.right_stick(), 32767);
        assert_eq!(deadzone.left_trigger(), 255);
        assert_eq!(deadzone.right_trigger(), 0);

        assert_eq!(deadzone.adjust(DeadzoneTarget::LeftStick, -500), 0);
        assert_eq!(deadzone.adjust(DeadzoneTarget::RightStick, 500), 32767);
        assert_eq!(deadzone.adjust(DeadzoneTarget::RightTrigger, 15), 15);
    }

    #[test]
    fn test_apply_to_state() {
        let mut state = GamepadState {
            left_trigger: 10,
            right_trigger: 200,
            thumb_lx: 100,
            thumb_rx: 30000,
            ..Default::default()
        };
        let deadzone = Deadzone::new(8000, 0, 0, 0);
        apply(&mut state, &deadzone);
        assert_eq!((state.thumb_lx, state.thumb_ly), (0, 0));
        assert_eq!(state.thumb_rx, 30000);
        assert_eq!((state.left_trigger, state.right_trigger), (10, 200));

        let mut state = GamepadState {
            left_trigger: 20,
            right_trigger: 255,
            ..Default::default()
        };
        apply(&mut state, &Deadzone::new(0, 0, 30, 30));
        assert_eq!(state.left_trigger, 0);
        assert_eq!(state.right_trigger, 255);
    }
}
