use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use packed_struct::PackedStruct;
use rusb::{Direction, Recipient, RequestType};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::usb::{endpoint::TransferMode, UsbIo};

use super::hid_report::{PackedRumbleOutputReport, ReportError, OUTPUT_REPORT_SIZE};

/// HID class request reading a report
pub const HID_GET_REPORT: u8 = 0x01;
/// HID class request writing a report
pub const HID_SET_REPORT: u8 = 0x09;
/// wValue for GET_REPORT of input report 0
pub const HID_INPUT_REPORT: u16 = 0x0100;
/// wValue for SET_REPORT of output report 0
pub const HID_OUTPUT_REPORT: u16 = 0x0200;
/// Standard GET_STATUS request used to check whether a device still answers
const GET_STATUS: u8 = 0x00;

/// Timeout for interrupt reads. Expiring only means nothing changed.
pub const INTERRUPT_TIMEOUT: Duration = Duration::from_millis(100);
/// Timeout for control transfers
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);
const STATUS_TIMEOUT: Duration = Duration::from_millis(100);

/// Size of the buffer reads land in. Larger than a report so oversized
/// reports arrive whole and are rejected by length.
pub const READ_BUFFER_SIZE: usize = 32;

/// Errors produced when writing to the device
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),
    #[error("short write: {written}/{expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// Outcome of one read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Data arrived; only the first `len` bytes are valid
    Report {
        data: [u8; READ_BUFFER_SIZE],
        len: usize,
    },
    /// The read expired without data
    TimedOut,
    /// The read failed. `confirmed` is set when the device is known to be
    /// gone rather than merely failing a single transfer.
    Failed { error: rusb::Error, confirmed: bool },
}

/// Transfer layer for one original Xbox controller
pub struct Driver {
    io: Arc<dyn UsbIo>,
    mode: TransferMode,
    /// Serializes control transfers between the reader and rumble writes
    control: Mutex<()>,
}

impl Driver {
    pub fn new(io: Arc<dyn UsbIo>, mode: TransferMode) -> Self {
        Self {
            io,
            mode,
            control: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Reads one input report, blocking for up to the mode's timeout
    pub fn read_input(&self, buf: &mut [u8]) -> rusb::Result<usize> {
        match self.mode {
            TransferMode::Interrupt { endpoint_in, .. } => {
                self.io.read_interrupt(endpoint_in, buf, INTERRUPT_TIMEOUT)
            }
            TransferMode::Control { interface } => {
                let request_type =
                    rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
                let _guard = self.control.lock().unwrap_or_else(PoisonError::into_inner);
                self.io.read_control(
                    request_type,
                    HID_GET_REPORT,
                    HID_INPUT_REPORT,
                    interface as u16,
                    buf,
                    CONTROL_TIMEOUT,
                )
            }
        }
    }

    /// Performs one read and classifies its result
    pub fn poll_once(&self) -> Completion {
        let mut data = [0; READ_BUFFER_SIZE];
        match self.read_input(&mut data) {
            Ok(len) => Completion::Report { data, len },
            Err(rusb::Error::Timeout) => Completion::TimedOut,
            Err(rusb::Error::NoDevice) => Completion::Failed {
                error: rusb::Error::NoDevice,
                confirmed: true,
            },
            Err(error) => {
                let confirmed = match self.mode {
                    TransferMode::Control { .. } => true,
                    TransferMode::Interrupt { .. } => !self.is_responsive(),
                };
                Completion::Failed { error, confirmed }
            }
        }
    }

    /// Issues a synchronous GET_STATUS and returns true if the device answered
    pub fn is_responsive(&self) -> bool {
        let request_type =
            rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device);
        let mut status = [0; 2];
        let _guard = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        match self
            .io
            .read_control(request_type, GET_STATUS, 0, 0, &mut status, STATUS_TIMEOUT)
        {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Device did not answer status request: {e}");
                false
            }
        }
    }

    /// Writes a rumble report with the given motor speeds
    pub fn write_rumble(&self, large_motor: u8, small_motor: u8) -> Result<(), DriverError> {
        let report = PackedRumbleOutputReport::new(large_motor, small_motor);
        let data = report.pack().map_err(ReportError::from)?;
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);

        let _guard = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        let written = self.io.write_control(
            request_type,
            HID_SET_REPORT,
            HID_OUTPUT_REPORT,
            self.mode.interface() as u16,
            &data,
            CONTROL_TIMEOUT,
        )?;
        if written != OUTPUT_REPORT_SIZE {
            return Err(DriverError::ShortWrite {
                written,
                expected: OUTPUT_REPORT_SIZE,
            });
        }
        Ok(())
    }
}

/// Runs reads for one device on a dedicated thread so blocking transfers
/// never stall the caller. At most one read is in flight and completions
/// are delivered in submission order.
pub struct TransferWorker {
    submit_tx: mpsc::Sender<()>,
    completion_rx: mpsc::Receiver<Completion>,
    pending: bool,
}

impl TransferWorker {
    /// Starts the worker thread. The thread exits once the worker is dropped
    /// and any in-flight read has returned.
    pub fn spawn(driver: Arc<Driver>, name: String) -> std::io::Result<Self> {
        let (submit_tx, mut submit_rx) = mpsc::channel::<()>(1);
        let (completion_tx, completion_rx) = mpsc::channel(1);

        thread::Builder::new().name(name).spawn(move || {
            while submit_rx.blocking_recv().is_some() {
                let completion = driver.poll_once();
                if completion_tx.blocking_send(completion).is_err() {
                    break;
                }
            }
            log::trace!("Transfer worker stopped");
        })?;

        Ok(Self {
            submit_tx,
            completion_rx,
            pending: false,
        })
    }

    /// Submits a read unless one is already in flight
    pub fn submit(&mut self) {
        if self.pending {
            return;
        }
        match self.submit_tx.try_send(()) {
            Ok(_) => self.pending = true,
            Err(e) => log::trace!("Unable to submit read: {e}"),
        }
    }

    /// Returns the completed read, if any, without blocking
    pub fn try_complete(&mut self) -> Option<Completion> {
        match self.completion_rx.try_recv() {
            Ok(completion) => {
                self.pending = false;
                Some(completion)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = false;
                Some(Completion::Failed {
                    error: rusb::Error::NoDevice,
                    confirmed: true,
                })
            }
        }
    }
}
