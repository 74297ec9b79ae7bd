//! Endpoint discovery. A device exposing an interrupt IN/OUT pair is polled
//! with interrupt transfers; anything else falls back to HID class control
//! requests.
use rusb::{Direction, TransferType};

/// Endpoint as found in the device's active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub interface: u8,
    pub alt_setting: u8,
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

/// How a device is polled. Chosen once when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Interrupt {
        interface: u8,
        alt_setting: u8,
        endpoint_in: u8,
        endpoint_out: u8,
    },
    Control {
        interface: u8,
    },
}

impl TransferMode {
    /// Interface number the device is addressed through
    pub fn interface(&self) -> u8 {
        match self {
            TransferMode::Interrupt { interface, .. } => *interface,
            TransferMode::Control { interface } => *interface,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, TransferMode::Interrupt { .. })
    }
}

/// Selects the first interface setting that has both an interrupt IN and an
/// interrupt OUT endpoint, or control transfers on the first interface.
pub fn select_transfer_mode(endpoints: &[EndpointInfo]) -> TransferMode {
    for candidate in endpoints {
        let same_setting = |e: &&EndpointInfo| {
            e.interface == candidate.interface
                && e.alt_setting == candidate.alt_setting
                && e.transfer_type == TransferType::Interrupt
        };
        let endpoint_in = endpoints
            .iter()
            .filter(same_setting)
            .find(|e| e.direction == Direction::In);
        let endpoint_out = endpoints
            .iter()
            .filter(same_setting)
            .find(|e| e.direction == Direction::Out);

        if let (Some(endpoint_in), Some(endpoint_out)) = (endpoint_in, endpoint_out) {
            return TransferMode::Interrupt {
                interface: candidate.interface,
                alt_setting: candidate.alt_setting,
                endpoint_in: endpoint_in.address,
                endpoint_out: endpoint_out.address,
            };
        }
    }

    let interface = endpoints.first().map(|e| e.interface).unwrap_or(0);
    TransferMode::Control { interface }
}
