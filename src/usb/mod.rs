//! USB transport used to reach physical controllers.
//!
//! The [UsbBus] and [UsbIo] traits describe the narrow slice of libusb the
//! rest of the crate needs, so sessions can be driven by a mock transport in
//! tests. [libusb::LibUsbBus] is the real implementation.
pub mod endpoint;
pub mod libusb;

use std::{fmt::Display, sync::Arc, time::Duration};

use self::endpoint::TransferMode;

/// Errors raised while enumerating or opening devices
#[derive(Debug, thiserror::Error)]
pub enum UsbError {
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),
    #[error("device not found on bus {bus_number} ports {port_path:?}")]
    NotFound { bus_number: u8, port_path: Vec<u8> },
}

/// Enumeration result for a device currently attached to the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub port_path: Vec<u8>,
}

impl UsbDeviceInfo {
    /// Returns true if both entries describe the same physical attachment point
    pub fn same_topology(&self, bus_number: u8, port_path: &[u8]) -> bool {
        self.bus_number == bus_number && self.port_path == port_path
    }
}

/// Identity of an opened physical controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: String,
    pub vendor_name: String,
    /// May be empty
    pub serial_number: String,
    pub bus_number: u8,
    /// Ordered hub port numbers from the root hub to the device
    pub port_path: Vec<u8>,
}

impl DeviceIdentity {
    /// Key used to load and store this device's settings: the serial number
    /// if present, otherwise "VVVV:PPPP".
    pub fn settings_key(&self) -> String {
        let serial = self.serial_number.trim();
        if !serial.is_empty() {
            return serial.to_string();
        }
        format!("{:04X}:{:04X}", self.vendor_id, self.product_id)
    }

    /// Short "VVVV:PPPP" form of the vendor and product id
    pub fn usb_id(&self) -> String {
        format!("{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

impl Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.product_name.is_empty() {
            return write!(f, "{}", self.usb_id());
        }
        write!(f, "{} ({})", self.usb_id(), self.product_name)
    }
}

/// Raw transfers against an opened device. Signatures follow [rusb]. A
/// result of `Err(rusb::Error::Timeout)` means no data arrived in time.
pub trait UsbIo: Send + Sync {
    fn read_interrupt(&self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> rusb::Result<usize>;

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

/// An opened device ready for polling
pub struct OpenedDevice {
    pub identity: DeviceIdentity,
    pub io: Arc<dyn UsbIo>,
    /// Fixed for the lifetime of the device handle
    pub mode: TransferMode,
}

impl std::fmt::Debug for OpenedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedDevice")
            .field("identity", &self.identity)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Device enumeration and opening
pub trait UsbBus: Send + Sync {
    /// Lists every device currently attached
    fn list_devices(&self) -> Result<Vec<UsbDeviceInfo>, UsbError>;

    /// Opens the given device, claiming the interface it will be polled on
    fn open(&self, info: &UsbDeviceInfo) -> Result<OpenedDevice, UsbError>;
}
