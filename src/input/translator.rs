use super::deadzone::{self, Deadzone};
use super::gamepad::{Control, GamepadState};
use super::gesture::{self, DeadzoneChange};
use super::remap::{self, RemapTable};

/// Feature switches read once per translated report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    pub guide_enabled: bool,
    pub remap_enabled: bool,
    pub deadzone_adjust_enabled: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            guide_enabled: true,
            remap_enabled: true,
            deadzone_adjust_enabled: true,
        }
    }
}

/// Result of translating one decoded report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// State to push to the virtual pad
    pub state: GamepadState,
    /// Deadzone step produced by the tuning gesture, to be persisted
    pub deadzone_change: Option<DeadzoneChange>,
}

/// Per-device transformation pipeline from decoded report to emitted state
#[derive(Debug, Clone, Default)]
pub struct Translator {
    pub deadzone: Deadzone,
    pub remap: RemapTable,
    pub guide_combination: Vec<Control>,
}

impl Translator {
    pub fn new(deadzone: Deadzone, remap: RemapTable, guide_combination: Vec<Control>) -> Self {
        Self {
            deadzone,
            remap,
            guide_combination,
        }
    }

    /// Runs deadzone correction, remapping and gesture detection on the
    /// decoded state.
    pub fn translate(&mut self, decoded: GamepadState, toggles: Toggles) -> Translation {
        let mut snapshot = decoded;
        deadzone::apply(&mut snapshot, &self.deadzone);

        let mut state = if toggles.remap_enabled {
            remap::remap(&snapshot, &self.remap)
        } else {
            snapshot
        };

        if toggles.guide_enabled {
            gesture::apply_guide_combination(&mut state, &snapshot, &self.guide_combination);
        }

        let deadzone_change = if toggles.deadzone_adjust_enabled {
            gesture::tune_deadzone(&snapshot, &mut self.deadzone)
        } else {
            self.deadzone.hold = false;
            None
        };

        Translation {
            state,
            deadzone_change,
        }
    }
}
