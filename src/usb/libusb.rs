use std::{sync::Arc, time::Duration};

use rusb::{Context, Device, DeviceHandle, UsbContext};

use super::{
    endpoint::{select_transfer_mode, EndpointInfo, TransferMode},
    DeviceIdentity, OpenedDevice, UsbBus, UsbDeviceInfo, UsbError, UsbIo,
};

/// Timeout used when reading string descriptors
const STRING_TIMEOUT: Duration = Duration::from_millis(100);

/// [UsbBus] backed by a libusb context
pub struct LibUsbBus {
    context: Context,
}

impl LibUsbBus {
    /// Initializes libusb. Failing here means no controller can ever be
    /// reached.
    pub fn new() -> Result<Self, UsbError> {
        let context = Context::new()?;
        Ok(Self { context })
    }

    fn find_device(&self, info: &UsbDeviceInfo) -> Result<Device<Context>, UsbError> {
        for device in self.context.devices()?.iter() {
            let Ok(port_path) = device.port_numbers() else {
                continue;
            };
            if info.same_topology(device.bus_number(), &port_path) {
                return Ok(device);
            }
        }
        Err(UsbError::NotFound {
            bus_number: info.bus_number,
            port_path: info.port_path.clone(),
        })
    }
}

impl UsbBus for LibUsbBus {
    fn list_devices(&self) -> Result<Vec<UsbDeviceInfo>, UsbError> {
        let mut found = Vec::new();
        for device in self.context.devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    log::trace!("Skipping device without descriptor: {e}");
                    continue;
                }
            };
            let port_path = device.port_numbers().unwrap_or_default();
            found.push(UsbDeviceInfo {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                bus_number: device.bus_number(),
                port_path,
            });
        }
        Ok(found)
    }

    fn open(&self, info: &UsbDeviceInfo) -> Result<OpenedDevice, UsbError> {
        let device = self.find_device(info)?;
        let descriptor = device.device_descriptor()?;
        let mut handle = LibUsbHandle::new(device.open()?);

        let endpoints = read_endpoints(&device)?;
        let mode = select_transfer_mode(&endpoints);
        log::debug!("Selected transfer mode for {info:?}: {mode:?}");

        match kernel_driver_policy(mode) {
            KernelDriverPolicy::AutoDetach => {
                // libusb detaches on claim and reattaches when the handle
                // releases the interface
                if let Err(e) = handle.handle.set_auto_detach_kernel_driver(true) {
                    log::trace!("Automatic kernel driver detach unavailable: {e}");
                    handle.detach_kernel_driver(mode.interface())?;
                }
            }
            KernelDriverPolicy::DetachAndReattach => {
                handle.detach_kernel_driver(mode.interface())?;
            }
        }
        if let TransferMode::Interrupt {
            interface,
            alt_setting,
            ..
        } = mode
        {
            handle.handle.claim_interface(interface)?;
            if alt_setting != 0 {
                handle.handle.set_alternate_setting(interface, alt_setting)?;
            }
        }

        let read_string = |result: rusb::Result<String>| -> String {
            result.map(|s| s.trim().to_string()).unwrap_or_default()
        };
        let language = handle
            .handle
            .read_languages(STRING_TIMEOUT)
            .ok()
            .and_then(|languages| languages.first().copied());
        let (product_name, vendor_name, serial_number) = match language {
            Some(language) => (
                read_string(handle.handle.read_product_string(
                    language,
                    &descriptor,
                    STRING_TIMEOUT,
                )),
                read_string(handle.handle.read_manufacturer_string(
                    language,
                    &descriptor,
                    STRING_TIMEOUT,
                )),
                read_string(handle.handle.read_serial_number_string(
                    language,
                    &descriptor,
                    STRING_TIMEOUT,
                )),
            ),
            None => Default::default(),
        };

        let identity = DeviceIdentity {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            product_name,
            vendor_name,
            serial_number,
            bus_number: info.bus_number,
            port_path: info.port_path.clone(),
        };

        Ok(OpenedDevice {
            identity,
            io: Arc::new(handle),
            mode,
        })
    }
}

/// Collects every endpoint of the device's first configuration
fn read_endpoints(device: &Device<Context>) -> Result<Vec<EndpointInfo>, UsbError> {
    let config = device.config_descriptor(0)?;
    let mut endpoints = Vec::new();
    for interface in config.interfaces() {
        for setting in interface.descriptors() {
            for endpoint in setting.endpoint_descriptors() {
                endpoints.push(EndpointInfo {
                    interface: setting.interface_number(),
                    alt_setting: setting.setting_number(),
                    address: endpoint.address(),
                    direction: endpoint.direction(),
                    transfer_type: endpoint.transfer_type(),
                });
            }
        }
    }
    Ok(endpoints)
}

/// How the kernel driver bound to the device is moved out of the way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KernelDriverPolicy {
    /// Let libusb detach on claim and reattach on release
    AutoDetach,
    /// Detach by hand and reattach when the handle is dropped
    DetachAndReattach,
}

/// Control mode never claims an interface, so libusb has nothing to
/// release and would never reattach the driver on its own.
fn kernel_driver_policy(mode: TransferMode) -> KernelDriverPolicy {
    match mode {
        TransferMode::Interrupt { .. } => KernelDriverPolicy::AutoDetach,
        TransferMode::Control { .. } => KernelDriverPolicy::DetachAndReattach,
    }
}

/// An open device handle that gives the interface back to the kernel
/// driver it was taken from once dropped
struct LibUsbHandle {
    handle: DeviceHandle<Context>,
    reattach: Option<u8>,
}

impl LibUsbHandle {
    fn new(handle: DeviceHandle<Context>) -> Self {
        Self {
            handle,
            reattach: None,
        }
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        match self.handle.kernel_driver_active(interface) {
            Ok(true) => {
                log::debug!("Detaching kernel driver from interface {interface}");
                self.handle.detach_kernel_driver(interface)?;
                self.reattach = Some(interface);
            }
            Ok(false) => (),
            // Not supported on every platform
            Err(e) => log::trace!("Unable to query kernel driver: {e}"),
        }
        Ok(())
    }
}

impl Drop for LibUsbHandle {
    fn drop(&mut self) {
        let Some(interface) = self.reattach.take() else {
            return;
        };
        // The kernel refuses the driver while the interface is still claimed
        let _ = self.handle.release_interface(interface);
        match self.handle.attach_kernel_driver(interface) {
            Ok(_) => log::debug!("Reattached kernel driver to interface {interface}"),
            Err(e) => {
                log::debug!("Unable to reattach kernel driver to interface {interface}: {e}")
            }
        }
    }
}

impl UsbIo for LibUsbHandle {
    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.read_interrupt(endpoint, buf, timeout)
    }

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.read_control(request_type, request, value, index, buf, timeout)
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.write_control(request_type, request, value, index, buf, timeout)
    }
}
