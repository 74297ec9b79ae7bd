//! padbridge translates legacy USB Xbox controllers into virtual Xbox 360
//! gamepads.
//!
//! Physical controllers are discovered over libusb, polled for their HID
//! input reports, run through a deadzone and remapping pipeline, and
//! emitted through a virtual pad bus. Rumble requests from the virtual pad
//! flow back the other way and are written to the physical device.
pub mod config;
pub mod constants;
pub mod drivers;
pub mod input;
pub mod sync;
pub mod usb;
