/// Name used for config directories and log output
pub const APP_NAME: &str = "padbridge";

/// Settings key holding the process-wide default settings
pub const DEFAULT_SETTINGS_KEY: &str = "Default";
