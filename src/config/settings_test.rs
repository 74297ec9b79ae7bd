use std::{
    error::Error,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::config::settings::{
    SettingsField, SettingsStore, UserSettings, YamlSettingsStore,
};
use crate::input::gamepad::Control;

const SETTINGS: &str = r#"
Default:
  vibration_enabled: false
  deadzone.left_stick: 4000
  deadzone.left_trigger: 12
A1B2C3:
  deadzone.left_stick: 9000
  remap:
    a: [b]
    left_trigger: [right_trigger]
'045E:0289':
  guide_enabled: false
  deadzone.right_stick: not-a-number
  guide_combination: [back, start]
  unknown_field: 42
"#;

#[test]
fn test_defaults_without_sections() {
    let store = YamlSettingsStore::in_memory();
    assert_eq!(store.load("A1B2C3"), UserSettings::default());
    assert_eq!(
        UserSettings::default().guide_combination,
        vec![
            Control::LeftTrigger,
            Control::RightTrigger,
            Control::LeftThumb,
            Control::RightThumb
        ]
    );
}

#[test]
fn test_layering() -> Result<(), Box<dyn Error>> {
    let store = YamlSettingsStore::from_yaml(SETTINGS)?;

    let settings = store.load("A1B2C3");
    assert!(!settings.vibration_enabled);
    assert!(settings.guide_enabled);
    assert_eq!(settings.deadzone.left_stick(), 9000);
    assert_eq!(settings.deadzone.left_trigger(), 12);
    assert_eq!(settings.remap.get(Control::A), Some(&[Control::B][..]));

    let defaults = store.load("Default");
    assert_eq!(defaults.deadzone.left_stick(), 4000);
    assert!(defaults.remap.is_empty());

    Ok(())
}

#[test]
fn test_malformed_value_falls_back() -> Result<(), Box<dyn Error>> {
    let store = YamlSettingsStore::from_yaml(SETTINGS)?;
    let settings = store.load("045E:0289");
    assert!(!settings.guide_enabled);
    assert_eq!(settings.deadzone.right_stick(), 0);
    assert_eq!(settings.deadzone.left_stick(), 4000);
    assert_eq!(settings.guide_combination, vec![Control::Back, Control::Start]);
    Ok(())
}

#[test]
fn test_loaded_deadzones_are_clamped() -> Result<(), Box<dyn Error>> {
    let store = YamlSettingsStore::from_yaml(
        "Default:\n  deadzone.left_stick: 99999\n  deadzone.right_trigger: -4\n",
    )?;
    let settings = store.load("Default");
    assert_eq!(settings.deadzone.left_stick(), 32767);
    assert_eq!(settings.deadzone.right_trigger(), 0);
    Ok(())
}

#[test]
fn test_save_field_round_trip() -> Result<(), Box<dyn Error>> {
    let store = YamlSettingsStore::in_memory();
    let mut settings = UserSettings::default();
    settings.deadzone = crate::input::deadzone::Deadzone::new(0, 1500, 0, 0);

    let field = SettingsField::DeadzoneRightStick;
    store.save_field("045E:0289", field, settings.value(field)?)?;
    store.save_field(
        "Default",
        SettingsField::RemapEnabled,
        serde_yaml::Value::Bool(false),
    )?;

    let loaded = store.load("045E:0289");
    assert_eq!(loaded.deadzone.right_stick(), 1500);
    assert!(!loaded.remap_enabled);
    assert!(store.to_yaml()?.contains("deadzone.right_stick: 1500"));
    Ok(())
}

#[test]
fn test_persisted_to_disk() -> Result<(), Box<dyn Error>> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let path = std::env::temp_dir()
        .join(format!("padbridge-test-{nanos}"))
        .join("settings.yaml");

    let store = YamlSettingsStore::open(path.clone())?;
    store.save_field(
        "A1B2C3",
        SettingsField::VibrationEnabled,
        serde_yaml::Value::Bool(false),
    )?;

    let reopened = YamlSettingsStore::open(path.clone())?;
    assert!(!reopened.load("A1B2C3").vibration_enabled);
    assert!(reopened.load("Default").vibration_enabled);

    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[test]
fn test_field_names() {
    for field in SettingsField::ALL {
        assert_eq!(SettingsField::from_name(field.as_str()), Some(field));
    }
    assert_eq!(SettingsField::from_name("deadzone"), None);
}
