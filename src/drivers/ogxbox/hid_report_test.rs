use std::error::Error;

use packed_struct::{types::SizedInteger, PackedStruct};

use crate::drivers::ogxbox::hid_report::{
    PackedInputDataReport, PackedRumbleOutputReport, ReportError,
};
use crate::input::gamepad::{
    BUTTON_A, BUTTON_DPAD_UP, BUTTON_LEFT_SHOULDER, BUTTON_RIGHT_SHOULDER, BUTTON_START,
};

// A pressed, Start + D-pad up held, black half pressed, LT=10 RT=200,
// left stick (32767, -100), right stick (-32768, 1)
const INPUT_REPORT: [u8; 20] = [
    0x00, 0x14, 0x11, 0x00, 0xff, 0x00, 0x00, 0x00, 0x80, 0x00, 0x0a, 0xc8, 0xff, 0x7f, 0x9c,
    0xff, 0x00, 0x80, 0x01, 0x00,
];

#[test]
fn test_decode_input_report() -> Result<(), Box<dyn Error>> {
    let report = PackedInputDataReport::from_buffer(&INPUT_REPORT)?;
    println!("Report: {report}");
    assert_eq!(report.buttons.to_primitive(), 0x0011);

    let state = report.to_gamepad_state();
    assert_eq!(
        state.buttons,
        BUTTON_DPAD_UP | BUTTON_START | BUTTON_A | BUTTON_RIGHT_SHOULDER
    );
    assert_eq!((state.left_trigger, state.right_trigger), (10, 200));
    assert_eq!((state.thumb_lx, state.thumb_ly), (32767, -100));
    assert_eq!((state.thumb_rx, state.thumb_ry), (-32768, 1));

    Ok(())
}

#[test]
fn test_white_maps_to_left_shoulder() -> Result<(), Box<dyn Error>> {
    let report = PackedInputDataReport {
        white: 1,
        ..Default::default()
    };
    let packed = report.pack()?;
    let state = PackedInputDataReport::from_buffer(&packed)?.to_gamepad_state();
    assert_eq!(state.buttons, BUTTON_LEFT_SHOULDER);

    Ok(())
}

#[test]
fn test_reject_invalid_reports() {
    let mut bad_size = INPUT_REPORT;
    bad_size[1] = 0x06;
    assert!(matches!(
        PackedInputDataReport::from_buffer(&bad_size),
        Err(ReportError::InvalidSize(0x06))
    ));
    assert!(matches!(
        PackedInputDataReport::from_buffer(&INPUT_REPORT[..12]),
        Err(ReportError::InvalidLength {
            got: 12,
            expected: 20
        })
    ));

    let mut oversized = INPUT_REPORT.to_vec();
    oversized.extend_from_slice(&[0, 0]);
    assert!(matches!(
        PackedInputDataReport::from_buffer(&oversized),
        Err(ReportError::InvalidLength {
            got: 22,
            expected: 20
        })
    ));
}

#[test]
fn test_rumble_report() -> Result<(), Box<dyn Error>> {
    let packed = PackedRumbleOutputReport::new(255, 0).pack()?;
    assert_eq!(packed, [0x00, 0x06, 0x00, 0xff, 0x00, 0x00]);

    let packed = PackedRumbleOutputReport::new(0x12, 0x80).pack()?;
    assert_eq!(packed, [0x00, 0x06, 0x00, 0x12, 0x00, 0x80]);

    Ok(())
}
