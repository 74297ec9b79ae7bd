//! Input and output report layouts of original Xbox controllers
use packed_struct::prelude::*;
use packed_struct::PackingError;

use crate::input::gamepad::{
    GamepadState, BUTTON_A, BUTTON_B, BUTTON_LEFT_SHOULDER, BUTTON_RIGHT_SHOULDER, BUTTON_X,
    BUTTON_Y,
};

/// Size of the input report in bytes
pub const INPUT_REPORT_SIZE: usize = 20;
/// Size of the rumble output report in bytes
pub const OUTPUT_REPORT_SIZE: usize = 6;

/// Digital button bits that share their position with the canonical layout:
/// D-pad, Start, Back and both thumb clicks.
const DIGITAL_BUTTON_MASK: u16 = 0x00FF;

/// Errors produced while decoding or encoding a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report length: got {got} bytes, expected {expected}")]
    InvalidLength { got: usize, expected: usize },
    #[error("invalid report size field: {0:#04x}")]
    InvalidSize(u8),
    #[error("failed to pack report: {0}")]
    Packing(#[from] PackingError),
}

// Example report with A fully pressed and the left stick pushed right:
// 00 14 00 00 ff 00 00 00 00 00 00 00 ff 7f 00 00 00 00 00 00
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "20")]
pub struct PackedInputDataReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub size: u8,
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4")]
    pub a: u8,
    #[packed_field(bytes = "5")]
    pub b: u8,
    #[packed_field(bytes = "6")]
    pub x: u8,
    #[packed_field(bytes = "7")]
    pub y: u8,
    #[packed_field(bytes = "8")]
    pub black: u8,
    #[packed_field(bytes = "9")]
    pub white: u8,
    #[packed_field(bytes = "10")]
    pub left_trigger: u8,
    #[packed_field(bytes = "11")]
    pub right_trigger: u8,
    #[packed_field(bytes = "12..=13", endian = "lsb")]
    pub left_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "14..=15", endian = "lsb")]
    pub left_stick_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "16..=17", endian = "lsb")]
    pub right_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "18..=19", endian = "lsb")]
    pub right_stick_y: Integer<i16, packed_bits::Bits<16>>,
}

impl Default for PackedInputDataReport {
    fn default() -> Self {
        Self {
            report_id: 0,
            size: INPUT_REPORT_SIZE as u8,
            buttons: Integer::from_primitive(0),
            a: 0,
            b: 0,
            x: 0,
            y: 0,
            black: 0,
            white: 0,
            left_trigger: 0,
            right_trigger: 0,
            left_stick_x: Integer::from_primitive(0),
            left_stick_y: Integer::from_primitive(0),
            right_stick_x: Integer::from_primitive(0),
            right_stick_y: Integer::from_primitive(0),
        }
    }
}

impl PackedInputDataReport {
    /// Validates and unpacks a raw input report. The buffer must hold
    /// exactly one report and its size field must match the layout.
    pub fn from_buffer(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() != INPUT_REPORT_SIZE {
            return Err(ReportError::InvalidLength {
                got: buf.len(),
                expected: INPUT_REPORT_SIZE,
            });
        }
        if buf[1] as usize != INPUT_REPORT_SIZE {
            return Err(ReportError::InvalidSize(buf[1]));
        }
        let mut data = [0; INPUT_REPORT_SIZE];
        data.copy_from_slice(buf);
        Ok(Self::unpack(&data)?)
    }

    /// Decodes the report into the canonical gamepad state. Analog face and
    /// shoulder buttons count as pressed when nonzero.
    pub fn to_gamepad_state(&self) -> GamepadState {
        let mut buttons = self.buttons.to_primitive() & DIGITAL_BUTTON_MASK;
        let analog = [
            (self.a, BUTTON_A),
            (self.b, BUTTON_B),
            (self.x, BUTTON_X),
            (self.y, BUTTON_Y),
            (self.black, BUTTON_RIGHT_SHOULDER),
            (self.white, BUTTON_LEFT_SHOULDER),
        ];
        for (value, flag) in analog {
            if value != 0 {
                buttons |= flag;
            }
        }

        GamepadState {
            buttons,
            left_trigger: self.left_trigger,
            right_trigger: self.right_trigger,
            thumb_lx: self.left_stick_x.to_primitive(),
            thumb_ly: self.left_stick_y.to_primitive(),
            thumb_rx: self.right_stick_x.to_primitive(),
            thumb_ry: self.right_stick_y.to_primitive(),
        }
    }
}

// The device expects each motor speed as a big-endian word with the
// 8-bit speed in the low byte.
// 00 06 00 ff 00 80
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "6")]
pub struct PackedRumbleOutputReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub size: u8,
    #[packed_field(bytes = "2..=3", endian = "msb")]
    pub left_motor: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4..=5", endian = "msb")]
    pub right_motor: Integer<u16, packed_bits::Bits<16>>,
}

impl Default for PackedRumbleOutputReport {
    fn default() -> Self {
        Self {
            report_id: 0,
            size: OUTPUT_REPORT_SIZE as u8,
            left_motor: Integer::from_primitive(0),
            right_motor: Integer::from_primitive(0),
        }
    }
}

impl PackedRumbleOutputReport {
    /// Rumble report for the given large (left) and small (right) motor speed
    pub fn new(large_motor: u8, small_motor: u8) -> Self {
        Self {
            left_motor: Integer::from_primitive(large_motor as u16),
            right_motor: Integer::from_primitive(small_motor as u16),
            ..Default::default()
        }
    }
}
