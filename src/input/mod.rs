pub mod deadzone;
pub mod gamepad;
pub mod gesture;
pub mod manager;
pub mod notifier;
pub mod registry;
pub mod remap;
pub mod session;
pub mod target;
pub mod translator;
