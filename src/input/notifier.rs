use crate::usb::DeviceIdentity;

/// Receives attach and detach events. Each physical transition is reported
/// exactly once.
pub trait ChangeNotifier: Send + Sync {
    fn device_attached(&self, identity: &DeviceIdentity);
    fn device_detached(&self, identity: &DeviceIdentity);
}

/// [ChangeNotifier] that writes every change to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn device_attached(&self, identity: &DeviceIdentity) {
        log::info!("Controller attached: {identity}");
    }

    fn device_detached(&self, identity: &DeviceIdentity) {
        log::info!("Controller detached: {identity}");
    }
}
