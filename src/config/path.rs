//! Module for locating padbridge config files

use std::path::PathBuf;

use crate::constants::APP_NAME;

/// Fallback path to use if one cannot be found with XDG
const FALLBACK_BASE_PATH: &str = "/etc/padbridge";

/// Returns the directory holding padbridge's configuration
/// (e.g. "~/.config/padbridge")
pub fn get_base_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix(APP_NAME) else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };
    base_dirs.get_config_home()
}

/// Returns the path to the daemon config file
pub fn get_config_path() -> PathBuf {
    get_base_path().join("config.yaml")
}

/// Returns the path to the per-device settings file
pub fn get_settings_path() -> PathBuf {
    get_base_path().join("settings.yaml")
}
