#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use packed_struct::prelude::*;

use padbridge::config::settings::YamlSettingsStore;
use padbridge::drivers::ogxbox::hid_report::PackedInputDataReport;
use padbridge::input::gamepad::GamepadState;
use padbridge::input::notifier::ChangeNotifier;
use padbridge::input::registry::Registry;
use padbridge::input::target::{
    FeedbackCallback, FeedbackEvent, PadHandle, TargetError, VirtualPadBus,
};
use padbridge::usb::endpoint::TransferMode;
use padbridge::usb::{DeviceIdentity, OpenedDevice, UsbBus, UsbDeviceInfo, UsbError, UsbIo};

/// How long a mock read waits before reporting a timeout
const READ_DELAY: Duration = Duration::from_millis(2);

pub const INTERRUPT_MODE: TransferMode = TransferMode::Interrupt {
    interface: 0,
    alt_setting: 0,
    endpoint_in: 0x81,
    endpoint_out: 0x02,
};
pub const CONTROL_MODE: TransferMode = TransferMode::Control { interface: 0 };

/// Builds a raw input report
pub fn input_report(
    left_trigger: u8,
    right_trigger: u8,
    left_stick: (i16, i16),
) -> Result<Vec<u8>, PackingError> {
    let report = PackedInputDataReport {
        left_trigger,
        right_trigger,
        left_stick_x: Integer::from_primitive(left_stick.0),
        left_stick_y: Integer::from_primitive(left_stick.1),
        ..Default::default()
    };
    Ok(report.pack()?.to_vec())
}

/// A control write recorded by [MockIo]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlWrite {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
}

/// Scripted USB device. Queued reports are returned in order; once the
/// queue is empty interrupt reads time out while control reads repeat the
/// last report.
#[derive(Debug, Default)]
pub struct MockIo {
    reports: Mutex<VecDeque<Vec<u8>>>,
    last_report: Mutex<Option<Vec<u8>>>,
    unplugged: AtomicBool,
    /// Signals when the next report read starts and waits to be released
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    reading: AtomicBool,
    /// Set if a control write started while a report read was in flight
    pub overlapped: AtomicBool,
    pub writes: Mutex<Vec<ControlWrite>>,
    pub status_checks: AtomicUsize,
}

impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_report(&self, report: Vec<u8>) {
        self.reports.lock().unwrap().push_back(report);
    }

    /// Makes every following transfer fail
    pub fn unplug(&self) {
        self.unplugged.store(true, Ordering::SeqCst);
    }

    /// Blocks the next control report read until the returned sender is
    /// used. The returned receiver fires once that read has started.
    pub fn hold_next_read(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    pub fn writes(&self) -> Vec<ControlWrite> {
        self.writes.lock().unwrap().clone()
    }

    fn next_report(&self, buf: &mut [u8], repeat: bool) -> rusb::Result<usize> {
        let report = match self.reports.lock().unwrap().pop_front() {
            Some(report) => {
                *self.last_report.lock().unwrap() = Some(report.clone());
                Some(report)
            }
            None if repeat => self.last_report.lock().unwrap().clone(),
            None => None,
        };
        let Some(report) = report else {
            thread::sleep(READ_DELAY);
            return Err(rusb::Error::Timeout);
        };
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }
}

impl UsbIo for MockIo {
    fn read_interrupt(
        &self,
        _endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        if self.unplugged.load(Ordering::SeqCst) {
            thread::sleep(READ_DELAY);
            return Err(rusb::Error::Io);
        }
        self.next_report(buf, false)
    }

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        _value: u16,
        _index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        // Standard device-to-host GET_STATUS
        if request_type == 0x80 && request == 0x00 {
            self.status_checks.fetch_add(1, Ordering::SeqCst);
            if self.unplugged.load(Ordering::SeqCst) {
                return Err(rusb::Error::NoDevice);
            }
            return Ok(2);
        }
        if self.unplugged.load(Ordering::SeqCst) {
            thread::sleep(READ_DELAY);
            return Err(rusb::Error::Pipe);
        }
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            self.reading.store(true, Ordering::SeqCst);
            let _ = entered.send(());
            let _ = release.recv();
            self.reading.store(false, Ordering::SeqCst);
        }
        self.next_report(buf, true)
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        if self.reading.load(Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if self.unplugged.load(Ordering::SeqCst) {
            return Err(rusb::Error::NoDevice);
        }
        self.writes.lock().unwrap().push(ControlWrite {
            request_type,
            request,
            value,
            index,
            data: buf.to_vec(),
        });
        Ok(buf.len())
    }
}

struct MockDevice {
    info: UsbDeviceInfo,
    identity: DeviceIdentity,
    io: Arc<MockIo>,
    mode: TransferMode,
}

/// USB bus with a fixed set of attached devices
#[derive(Default)]
pub struct MockUsbBus {
    devices: Mutex<Vec<MockDevice>>,
    pub opens: AtomicUsize,
}

impl MockUsbBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a device at the given port and returns its transport
    pub fn attach(
        &self,
        vendor_id: u16,
        product_id: u16,
        port: u8,
        mode: TransferMode,
    ) -> Arc<MockIo> {
        let io = Arc::new(MockIo::new());
        let info = UsbDeviceInfo {
            vendor_id,
            product_id,
            bus_number: 1,
            port_path: vec![port],
        };
        let identity = DeviceIdentity {
            vendor_id,
            product_id,
            product_name: "Mock Controller".to_string(),
            vendor_name: "Mock".to_string(),
            serial_number: String::new(),
            bus_number: info.bus_number,
            port_path: info.port_path.clone(),
        };
        self.devices.lock().unwrap().push(MockDevice {
            info,
            identity,
            io: io.clone(),
            mode,
        });
        io
    }

    /// Removes the device at the given port from enumeration
    pub fn detach(&self, port: u8) {
        self.devices
            .lock()
            .unwrap()
            .retain(|device| device.info.port_path != [port]);
    }
}

impl UsbBus for MockUsbBus {
    fn list_devices(&self) -> Result<Vec<UsbDeviceInfo>, UsbError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .map(|device| device.info.clone())
            .collect())
    }

    fn open(&self, info: &UsbDeviceInfo) -> Result<OpenedDevice, UsbError> {
        let devices = self.devices.lock().unwrap();
        let Some(device) = devices.iter().find(|device| &device.info == info) else {
            return Err(UsbError::NotFound {
                bus_number: info.bus_number,
                port_path: info.port_path.clone(),
            });
        };
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(OpenedDevice {
            identity: device.identity.clone(),
            io: device.io.clone(),
            mode: device.mode,
        })
    }
}

/// Virtual pad bus that records everything sent to it
#[derive(Default)]
pub struct MockPadBus {
    next_handle: AtomicU32,
    /// Number of registrations that will fail before one succeeds
    pub failing_registrations: AtomicUsize,
    pub registered: Mutex<Vec<PadHandle>>,
    pub states: Mutex<Vec<(PadHandle, GamepadState)>>,
    callbacks: Mutex<HashMap<PadHandle, FeedbackCallback>>,
}

impl MockPadBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> Vec<PadHandle> {
        self.registered.lock().unwrap().clone()
    }

    pub fn last_state(&self) -> Option<GamepadState> {
        self.states.lock().unwrap().last().map(|(_, state)| *state)
    }

    /// Delivers a rumble request the way an application would. Returns
    /// false if nothing is subscribed to the pad.
    pub fn fire_feedback(&self, handle: PadHandle, large_motor: u8, small_motor: u8) -> bool {
        let callback = self.callbacks.lock().unwrap().get(&handle).cloned();
        let Some(callback) = callback else {
            return false;
        };
        callback(FeedbackEvent {
            handle,
            large_motor,
            small_motor,
        });
        true
    }
}

impl VirtualPadBus for MockPadBus {
    fn register_target(&self) -> Result<PadHandle, TargetError> {
        let failing = self.failing_registrations.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_registrations
                .store(failing - 1, Ordering::SeqCst);
            return Err(TargetError::OutOfCapacity);
        }
        let handle = PadHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.registered.lock().unwrap().push(handle);
        Ok(handle)
    }

    fn update_state(&self, handle: PadHandle, state: &GamepadState) -> Result<(), TargetError> {
        if !self.registered.lock().unwrap().contains(&handle) {
            return Err(TargetError::NoSuchTarget(handle));
        }
        self.states.lock().unwrap().push((handle, *state));
        Ok(())
    }

    fn unregister_target(&self, handle: PadHandle) -> Result<(), TargetError> {
        let mut registered = self.registered.lock().unwrap();
        let Some(index) = registered.iter().position(|h| *h == handle) else {
            return Err(TargetError::NoSuchTarget(handle));
        };
        registered.remove(index);
        Ok(())
    }

    fn subscribe_feedback(
        &self,
        handle: PadHandle,
        callback: FeedbackCallback,
    ) -> Result<(), TargetError> {
        self.callbacks.lock().unwrap().insert(handle, callback);
        Ok(())
    }

    fn unsubscribe_feedback(&self, handle: PadHandle) -> Result<(), TargetError> {
        self.callbacks.lock().unwrap().remove(&handle);
        Ok(())
    }
}

/// Notifier that records every attach and detach
#[derive(Default)]
pub struct RecordingNotifier {
    pub attached: Mutex<Vec<DeviceIdentity>>,
    pub detached: Mutex<Vec<DeviceIdentity>>,
}

impl RecordingNotifier {
    pub fn attached(&self) -> usize {
        self.attached.lock().unwrap().len()
    }

    pub fn detached(&self) -> usize {
        self.detached.lock().unwrap().len()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn device_attached(&self, identity: &DeviceIdentity) {
        self.attached.lock().unwrap().push(identity.clone());
    }

    fn device_detached(&self, identity: &DeviceIdentity) {
        self.detached.lock().unwrap().push(identity.clone());
    }
}

/// A registry wired to mocks
pub struct Harness {
    pub usb: Arc<MockUsbBus>,
    pub pads: Arc<MockPadBus>,
    pub settings: Arc<YamlSettingsStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Registry,
}

impl Harness {
    pub fn new(settings: YamlSettingsStore) -> Self {
        let usb = Arc::new(MockUsbBus::new());
        let pads = Arc::new(MockPadBus::new());
        let settings = Arc::new(settings);
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = Registry::new(
            usb.clone(),
            pads.clone(),
            settings.clone(),
            notifier.clone(),
        )
        .with_pad_retry_interval(Duration::ZERO);
        Self {
            usb,
            pads,
            settings,
            notifier,
            registry,
        }
    }

    /// Polls every session until the condition holds or a second passes.
    /// Returns the final value of the condition.
    pub fn poll_until(&self, condition: impl Fn(&Harness) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            self.registry.poll_all();
            if condition(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition(self)
    }
}
