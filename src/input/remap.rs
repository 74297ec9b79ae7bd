//! Button and trigger remapping.
//!
//! A [RemapTable] maps a source control to a combination of target controls.
//! Controls without an entry keep their own meaning.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::gamepad::{Control, GamepadState, TRIGGER_MAX, TRIGGER_THRESHOLD};

/// Mapping from a source control to the combination it should produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemapTable {
    entries: BTreeMap<Control, Vec<Control>>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the source control to the given target combination
    pub fn insert(&mut self, source: Control, targets: Vec<Control>) {
        self.entries.insert(source, targets);
    }

    /// Returns the target combination for the source control, if mapped
    pub fn get(&self, source: Control) -> Option<&[Control]> {
        self.entries.get(&source).map(|targets| targets.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<(Control, Vec<Control>)> for RemapTable {
    fn from_iter<T: IntoIterator<Item = (Control, Vec<Control>)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Returns the remapped state. Sticks are never remapped.
///
/// Every asserted button produces its target combination; triggers mapped
/// to buttons press them once past [TRIGGER_THRESHOLD]. A trigger mapped to
/// a trigger carries its analog magnitude, while a button mapped to a
/// trigger drives it to [TRIGGER_MAX]. Overlapping trigger outputs keep the
/// largest value.
pub fn remap(state: &GamepadState, table: &RemapTable) -> GamepadState {
    if table.is_empty() {
        return *state;
    }

    let mut out = GamepadState {
        buttons: 0,
        left_trigger: 0,
        right_trigger: 0,
        ..*state
    };

    for source in Control::BUTTONS {
        if !state.is_active(source) {
            continue;
        }
        match table.get(source) {
            Some(targets) => press_targets(&mut out, targets, TRIGGER_MAX, true),
            None => press_targets(&mut out, &[source], TRIGGER_MAX, true),
        }
    }

    for source in Control::TRIGGERS {
        let value = state.value(source);
        let past_threshold = value >= TRIGGER_THRESHOLD;
        match table.get(source) {
            Some(targets) => press_targets(&mut out, targets, value, past_threshold),
            None => press_targets(&mut out, &[source], value, past_threshold),
        }
    }

    out
}

/// Asserts each target in the output state. Trigger targets receive the
/// given analog value; button targets are only pressed when `pressed` is
/// true.
fn press_targets(out: &mut GamepadState, targets: &[Control], value: u8, pressed: bool) {
    for target in targets {
        match target.button_flag() {
            Some(flag) => {
                if pressed {
                    out.buttons |= flag;
                }
            }
            None => {
                let current = out.value(*target);
                out.set_trigger(*target, current.max(value));
            }
        }
    }
}
