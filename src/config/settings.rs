//! Per-device user settings and the store they are loaded from.
//!
//! Settings are stored as sections keyed by device serial number or
//! "VVVV:PPPP". Each section is a flat map of field name to value. A value
//! missing from a device's section is taken from the "Default" section, and
//! then from the compiled-in defaults.
use std::{
    collections::BTreeMap,
    fmt::Display,
    fs, io,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use serde_yaml::Value;
use thiserror::Error;

use crate::{
    constants::DEFAULT_SETTINGS_KEY,
    input::{
        deadzone::{Deadzone, DeadzoneTarget},
        gamepad::Control,
        gesture::DEFAULT_GUIDE_COMBINATION,
        remap::RemapTable,
    },
};

/// Errors raised while reading or writing the settings store
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not access settings: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to (de)serialize settings: {0}")]
    SerializeError(#[from] serde_yaml::Error),
}

/// Settings applied to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub guide_enabled: bool,
    pub vibration_enabled: bool,
    pub deadzone_adjust_enabled: bool,
    pub remap_enabled: bool,
    pub deadzone: Deadzone,
    pub remap: RemapTable,
    pub guide_combination: Vec<Control>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            guide_enabled: true,
            vibration_enabled: true,
            deadzone_adjust_enabled: true,
            remap_enabled: true,
            deadzone: Deadzone::default(),
            remap: RemapTable::default(),
            guide_combination: DEFAULT_GUIDE_COMBINATION.to_vec(),
        }
    }
}

/// Name of a single stored setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    GuideEnabled,
    VibrationEnabled,
    DeadzoneAdjustEnabled,
    RemapEnabled,
    DeadzoneLeftStick,
    DeadzoneRightStick,
    DeadzoneLeftTrigger,
    DeadzoneRightTrigger,
    Remap,
    GuideCombination,
}

impl SettingsField {
    pub const ALL: [SettingsField; 10] = [
        SettingsField::GuideEnabled,
        SettingsField::VibrationEnabled,
        SettingsField::DeadzoneAdjustEnabled,
        SettingsField::RemapEnabled,
        SettingsField::DeadzoneLeftStick,
        SettingsField::DeadzoneRightStick,
        SettingsField::DeadzoneLeftTrigger,
        SettingsField::DeadzoneRightTrigger,
        SettingsField::Remap,
        SettingsField::GuideCombination,
    ];

    /// Key the field is stored under
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsField::GuideEnabled => "guide_enabled",
            SettingsField::VibrationEnabled => "vibration_enabled",
            SettingsField::DeadzoneAdjustEnabled => "deadzone_adjust_enabled",
            SettingsField::RemapEnabled => "remap_enabled",
            SettingsField::DeadzoneLeftStick => "deadzone.left_stick",
            SettingsField::DeadzoneRightStick => "deadzone.right_stick",
            SettingsField::DeadzoneLeftTrigger => "deadzone.left_trigger",
            SettingsField::DeadzoneRightTrigger => "deadzone.right_trigger",
            SettingsField::Remap => "remap",
            SettingsField::GuideCombination => "guide_combination",
        }
    }

    /// Returns the field stored under the given key
    pub fn from_name(name: &str) -> Option<SettingsField> {
        SettingsField::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
    }

    /// Returns the field holding the deadzone of the given target
    pub fn for_deadzone(target: DeadzoneTarget) -> SettingsField {
        match target {
            DeadzoneTarget::LeftStick => SettingsField::DeadzoneLeftStick,
            DeadzoneTarget::RightStick => SettingsField::DeadzoneRightStick,
            DeadzoneTarget::LeftTrigger => SettingsField::DeadzoneLeftTrigger,
            DeadzoneTarget::RightTrigger => SettingsField::DeadzoneRightTrigger,
        }
    }
}

impl Display for SettingsField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl UserSettings {
    /// Overrides a single field from its stored value. On error the field is
    /// left untouched.
    pub fn apply(&mut self, field: SettingsField, value: &Value) -> Result<(), serde_yaml::Error> {
        let value = value.clone();
        match field {
            SettingsField::GuideEnabled => self.guide_enabled = serde_yaml::from_value(value)?,
            SettingsField::VibrationEnabled => {
                self.vibration_enabled = serde_yaml::from_value(value)?
            }
            SettingsField::DeadzoneAdjustEnabled => {
                self.deadzone_adjust_enabled = serde_yaml::from_value(value)?
            }
            SettingsField::RemapEnabled => self.remap_enabled = serde_yaml::from_value(value)?,
            SettingsField::DeadzoneLeftStick => {
                let value: i32 = serde_yaml::from_value(value)?;
                self.deadzone.set(DeadzoneTarget::LeftStick, value);
            }
            SettingsField::DeadzoneRightStick => {
                let value: i32 = serde_yaml::from_value(value)?;
                self.deadzone.set(DeadzoneTarget::RightStick, value);
            }
            SettingsField::DeadzoneLeftTrigger => {
                let value: i32 = serde_yaml::from_value(value)?;
                self.deadzone.set(DeadzoneTarget::LeftTrigger, value);
            }
            SettingsField::DeadzoneRightTrigger => {
                let value: i32 = serde_yaml::from_value(value)?;
                self.deadzone.set(DeadzoneTarget::RightTrigger, value);
            }
            SettingsField::Remap => self.remap = serde_yaml::from_value(value)?,
            SettingsField::GuideCombination => {
                self.guide_combination = serde_yaml::from_value(value)?
            }
        }
        Ok(())
    }

    /// Returns the current value of a single field in its stored form
    pub fn value(&self, field: SettingsField) -> Result<Value, serde_yaml::Error> {
        let value = match field {
            SettingsField::GuideEnabled => serde_yaml::to_value(self.guide_enabled)?,
            SettingsField::VibrationEnabled => serde_yaml::to_value(self.vibration_enabled)?,
            SettingsField::DeadzoneAdjustEnabled => {
                serde_yaml::to_value(self.deadzone_adjust_enabled)?
            }
            SettingsField::RemapEnabled => serde_yaml::to_value(self.remap_enabled)?,
            SettingsField::DeadzoneLeftStick => serde_yaml::to_value(self.deadzone.left_stick())?,
            SettingsField::DeadzoneRightStick => serde_yaml::to_value(self.deadzone.right_stick())?,
            SettingsField::DeadzoneLeftTrigger => {
                serde_yaml::to_value(self.deadzone.left_trigger())?
            }
            SettingsField::DeadzoneRightTrigger => {
                serde_yaml::to_value(self.deadzone.right_trigger())?
            }
            SettingsField::Remap => serde_yaml::to_value(&self.remap)?,
            SettingsField::GuideCombination => serde_yaml::to_value(&self.guide_combination)?,
        };
        Ok(value)
    }

    /// Applies every known field present in the given section
    fn apply_section(&mut self, key: &str, section: &Section) {
        for field in SettingsField::ALL {
            let Some(value) = section.get(field.as_str()) else {
                continue;
            };
            if let Err(e) = self.apply(field, value) {
                log::warn!("Ignoring malformed setting '{field}' in section '{key}': {e}");
            }
        }
    }
}

/// Source of per-device settings. Implementations must be usable from
/// several threads.
pub trait SettingsStore: Send + Sync {
    /// Loads the settings for the given key. Never fails: missing or
    /// malformed values fall back to defaults.
    fn load(&self, key: &str) -> UserSettings;

    /// Stores a single field for the given key
    fn save_field(&self, key: &str, field: SettingsField, value: Value)
        -> Result<(), SettingsError>;
}

type Section = BTreeMap<String, Value>;
type Document = BTreeMap<String, Section>;

/// [SettingsStore] backed by a YAML document. Without a path the document
/// only lives in memory.
#[derive(Debug, Default)]
pub struct YamlSettingsStore {
    path: Option<PathBuf>,
    document: Mutex<Document>,
}

impl YamlSettingsStore {
    /// Opens the settings file at the given path. A missing file is treated
    /// as empty and created on the first save.
    pub fn open(path: PathBuf) -> Result<Self, SettingsError> {
        let document = if path.exists() {
            let content = fs::read_to_string(&path)?;
            parse_document(&content)?
        } else {
            log::debug!("Settings file {path:?} does not exist yet");
            Document::new()
        };
        Ok(Self {
            path: Some(path),
            document: Mutex::new(document),
        })
    }

    /// Creates an empty store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates an in-memory store seeded from the given YAML document
    pub fn from_yaml(content: &str) -> Result<Self, SettingsError> {
        Ok(Self {
            path: None,
            document: Mutex::new(parse_document(content)?),
        })
    }

    /// Serializes the whole document
    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(serde_yaml::to_string(&*document)?)
    }

    fn persist(&self, document: &Document) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(document)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn parse_document(content: &str) -> Result<Document, SettingsError> {
    if content.trim().is_empty() {
        return Ok(Document::new());
    }
    Ok(serde_yaml::from_str(content)?)
}

impl SettingsStore for YamlSettingsStore {
    fn load(&self, key: &str) -> UserSettings {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = UserSettings::default();
        if let Some(section) = document.get(DEFAULT_SETTINGS_KEY) {
            settings.apply_section(DEFAULT_SETTINGS_KEY, section);
        }
        if key != DEFAULT_SETTINGS_KEY {
            if let Some(section) = document.get(key) {
                settings.apply_section(key, section);
            }
        }
        settings
    }

    fn save_field(
        &self,
        key: &str,
        field: SettingsField,
        value: Value,
    ) -> Result<(), SettingsError> {
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        document
            .entry(key.to_string())
            .or_default()
            .insert(field.as_str().to_string(), value);
        log::debug!("Saved setting '{field}' for '{key}'");
        self.persist(&document)
    }
}
