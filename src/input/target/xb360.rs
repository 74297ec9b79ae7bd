//! Virtual pad bus backed by uinput. Every target appears to the system as a
//! wired Xbox 360 controller.
use std::{
    collections::HashMap,
    os::fd::AsRawFd,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::Duration,
};

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventSummary, EventType, FFEffectCode,
    FFEffectData, FFEffectKind, FFStatusCode, InputEvent, InputId, KeyCode, SynchronizationCode,
    SynchronizationEvent, UInputCode, UinputAbsSetup,
};
use nix::fcntl::{FcntlArg, OFlag};

use crate::input::gamepad::{
    GamepadState, BUTTON_A, BUTTON_B, BUTTON_BACK, BUTTON_DPAD_DOWN, BUTTON_DPAD_LEFT,
    BUTTON_DPAD_RIGHT, BUTTON_DPAD_UP, BUTTON_GUIDE, BUTTON_LEFT_SHOULDER, BUTTON_LEFT_THUMB,
    BUTTON_RIGHT_SHOULDER, BUTTON_RIGHT_THUMB, BUTTON_START, BUTTON_X, BUTTON_Y,
};

use super::{FeedbackCallback, FeedbackEvent, PadHandle, TargetError, VirtualPadBus};

const NAME: &str = "Xbox 360 Controller";
const VID: u16 = 0x045E;
const PID: u16 = 0x028E;
const VERSION: u16 = 0x0114;
/// Number of force feedback effects an application may upload at once
const FF_EFFECTS_MAX: u32 = 16;
/// How long the feedback thread sleeps between reads
const FF_POLL_RATE: Duration = Duration::from_millis(4);

/// Canonical button bits and the key each one emits
const BUTTON_KEYS: [(u16, KeyCode); 11] = [
    (BUTTON_A, KeyCode::BTN_SOUTH),
    (BUTTON_B, KeyCode::BTN_EAST),
    (BUTTON_X, KeyCode::BTN_NORTH),
    (BUTTON_Y, KeyCode::BTN_WEST),
    (BUTTON_LEFT_SHOULDER, KeyCode::BTN_TL),
    (BUTTON_RIGHT_SHOULDER, KeyCode::BTN_TR),
    (BUTTON_BACK, KeyCode::BTN_SELECT),
    (BUTTON_START, KeyCode::BTN_START),
    (BUTTON_GUIDE, KeyCode::BTN_MODE),
    (BUTTON_LEFT_THUMB, KeyCode::BTN_THUMBL),
    (BUTTON_RIGHT_THUMB, KeyCode::BTN_THUMBR),
];

type SharedCallback = Arc<Mutex<Option<FeedbackCallback>>>;

/// One registered uinput device
struct UinputTarget {
    device: Arc<Mutex<VirtualDevice>>,
    callback: SharedCallback,
}

/// [VirtualPadBus] creating one uinput device per target
pub struct UinputBus {
    next_handle: AtomicU32,
    targets: Mutex<HashMap<PadHandle, UinputTarget>>,
}

impl Default for UinputBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UinputBus {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU32::new(1),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Creates and immediately removes a device to check that uinput is
    /// usable by this process.
    pub fn check_available(&self) -> Result<(), TargetError> {
        let device = create_virtual_device()?;
        drop(device);
        Ok(())
    }

    fn with_target<T>(
        &self,
        handle: PadHandle,
        f: impl FnOnce(&UinputTarget) -> Result<T, TargetError>,
    ) -> Result<T, TargetError> {
        let targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        let target = targets
            .get(&handle)
            .ok_or(TargetError::NoSuchTarget(handle))?;
        f(target)
    }
}

impl VirtualPadBus for UinputBus {
    fn register_target(&self) -> Result<PadHandle, TargetError> {
        let device = create_virtual_device()?;
        let handle = PadHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let device = Arc::new(Mutex::new(device));
        let callback: SharedCallback = Arc::new(Mutex::new(None));

        spawn_ff_thread(handle, device.clone(), callback.clone())?;

        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets.insert(handle, UinputTarget { device, callback });
        log::debug!("Created virtual pad {handle}");

        Ok(handle)
    }

    fn update_state(&self, handle: PadHandle, state: &GamepadState) -> Result<(), TargetError> {
        let events = translate_state(state);
        self.with_target(handle, |target| {
            let mut device = target
                .device
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            device.emit(events.as_slice())?;
            Ok(())
        })
    }

    fn unregister_target(&self, handle: PadHandle) -> Result<(), TargetError> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        let target = targets
            .remove(&handle)
            .ok_or(TargetError::NoSuchTarget(handle))?;
        *target
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        log::debug!("Removed virtual pad {handle}");

        // Dropping the device reference stops the feedback thread
        Ok(())
    }

    fn subscribe_feedback(
        &self,
        handle: PadHandle,
        callback: FeedbackCallback,
    ) -> Result<(), TargetError> {
        self.with_target(handle, |target| {
            *target
                .callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(callback);
            Ok(())
        })
    }

    fn unsubscribe_feedback(&self, handle: PadHandle) -> Result<(), TargetError> {
        self.with_target(handle, |target| {
            *target
                .callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
            Ok(())
        })
    }
}

/// Builds the uinput device
fn create_virtual_device() -> Result<VirtualDevice, TargetError> {
    let mut keys = AttributeSet::<KeyCode>::new();
    for (_, key) in BUTTON_KEYS {
        keys.insert(key);
    }

    let joystick_setup = AbsInfo::new(0, -32768, 32767, 16, 128, 1);
    let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, joystick_setup);
    let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, joystick_setup);
    let abs_rx = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RX, joystick_setup);
    let abs_ry = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RY, joystick_setup);
    let triggers_setup = AbsInfo::new(0, 0, 255, 0, 0, 1);
    let abs_z = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Z, triggers_setup);
    let abs_rz = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RZ, triggers_setup);
    let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 1);
    let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
    let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);

    let mut ff = AttributeSet::<FFEffectCode>::new();
    ff.insert(FFEffectCode::FF_RUMBLE);

    let id = InputId::new(BusType(3), VID, PID, VERSION);
    let device = VirtualDeviceBuilder::new()?
        .name(NAME)
        .input_id(id)
        .with_keys(&keys)?
        .with_absolute_axis(&abs_x)?
        .with_absolute_axis(&abs_y)?
        .with_absolute_axis(&abs_rx)?
        .with_absolute_axis(&abs_ry)?
        .with_absolute_axis(&abs_z)?
        .with_absolute_axis(&abs_rz)?
        .with_absolute_axis(&abs_hat0x)?
        .with_absolute_axis(&abs_hat0y)?
        .with_ff(&ff)?
        .with_ff_effects_max(FF_EFFECTS_MAX)
        .build()?;

    // Feedback events are read from a polling thread
    let raw_fd = device.as_raw_fd();
    nix::fcntl::fcntl(raw_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;

    Ok(device)
}

/// Translates the canonical state into evdev events followed by a sync
fn translate_state(state: &GamepadState) -> Vec<InputEvent> {
    let mut events = Vec::with_capacity(BUTTON_KEYS.len() + 9);
    for (flag, key) in BUTTON_KEYS {
        let value = state.is_pressed(flag) as i32;
        events.push(InputEvent::new(EventType::KEY.0, key.0, value));
    }

    let hat_x = state.is_pressed(BUTTON_DPAD_RIGHT) as i32 - state.is_pressed(BUTTON_DPAD_LEFT) as i32;
    let hat_y = state.is_pressed(BUTTON_DPAD_DOWN) as i32 - state.is_pressed(BUTTON_DPAD_UP) as i32;

    // evdev Y axes grow downwards
    let axes = [
        (AbsoluteAxisCode::ABS_X, state.thumb_lx as i32),
        (AbsoluteAxisCode::ABS_Y, invert_axis(state.thumb_ly)),
        (AbsoluteAxisCode::ABS_RX, state.thumb_rx as i32),
        (AbsoluteAxisCode::ABS_RY, invert_axis(state.thumb_ry)),
        (AbsoluteAxisCode::ABS_Z, state.left_trigger as i32),
        (AbsoluteAxisCode::ABS_RZ, state.right_trigger as i32),
        (AbsoluteAxisCode::ABS_HAT0X, hat_x),
        (AbsoluteAxisCode::ABS_HAT0Y, hat_y),
    ];
    for (code, value) in axes {
        events.push(InputEvent::new(EventType::ABSOLUTE.0, code.0, value));
    }

    events.push(SynchronizationEvent::new(SynchronizationCode::SYN_REPORT, 0).into());
    events
}

fn invert_axis(value: i16) -> i32 {
    -(value as i32).clamp(-32767, 32767)
}

/// Spawns the force-feedback handler thread. The thread stops once the bus
/// drops its reference to the device.
fn spawn_ff_thread(
    handle: PadHandle,
    device: Arc<Mutex<VirtualDevice>>,
    callback: SharedCallback,
) -> Result<(), TargetError> {
    thread::Builder::new()
        .name(format!("ff-{handle}"))
        .spawn(move || {
            let mut effects = HashMap::new();
            loop {
                if Arc::strong_count(&device) == 1 {
                    log::debug!("Virtual pad {handle} stopped. Stopping FF handler thread.");
                    break;
                }
                if let Err(e) = process_ff(handle, &device, &callback, &mut effects) {
                    log::warn!("Error processing FF events for {handle}: {e}");
                }
                thread::sleep(FF_POLL_RATE);
            }
        })?;
    Ok(())
}

/// Services effect uploads and erases, and turns played effects into
/// feedback notifications.
fn process_ff(
    handle: PadHandle,
    device: &Arc<Mutex<VirtualDevice>>,
    callback: &SharedCallback,
    effects: &mut HashMap<i16, FFEffectData>,
) -> Result<(), TargetError> {
    let mut dev = device.lock().unwrap_or_else(PoisonError::into_inner);
    let events: Vec<InputEvent> = match dev.fetch_events() {
        Ok(events) => events.collect(),
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    const STOPPED: i32 = FFStatusCode::FF_STATUS_STOPPED.0 as i32;
    const PLAYING: i32 = FFStatusCode::FF_STATUS_PLAYING.0 as i32;

    let mut notifications = Vec::new();
    for event in events {
        match event.destructure() {
            EventSummary::UInput(event, UInputCode::UI_FF_UPLOAD, ..) => {
                let mut event = dev.process_ff_upload(event)?;
                log::debug!("Upload effect {}: {:?}", event.effect_id(), event.effect());
                effects.insert(event.effect_id(), event.effect());
                event.set_retval(0);
            }
            EventSummary::UInput(event, UInputCode::UI_FF_ERASE, ..) => {
                let event = dev.process_ff_erase(event)?;
                log::debug!("Erase effect {}", event.effect_id());
                effects.remove(&(event.effect_id() as i16));
            }
            EventSummary::ForceFeedback(.., effect_id, PLAYING) => {
                let (large_motor, small_motor) = effects
                    .get(&(effect_id.0 as i16))
                    .map(rumble_magnitudes)
                    .unwrap_or_default();
                notifications.push((large_motor, small_motor));
            }
            EventSummary::ForceFeedback(.., STOPPED) => {
                notifications.push((0, 0));
            }
            _ => {
                log::trace!("Unhandled event: {:?}", event);
            }
        }
    }
    drop(dev);

    let Some(callback) = callback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    else {
        return Ok(());
    };
    for (large_motor, small_motor) in notifications {
        callback(FeedbackEvent {
            handle,
            large_motor,
            small_motor,
        });
    }

    Ok(())
}

/// Scales the 16-bit rumble magnitudes of an effect to 8-bit motor speeds
fn rumble_magnitudes(effect: &FFEffectData) -> (u8, u8) {
    match effect.kind {
        FFEffectKind::Rumble {
            strong_magnitude,
            weak_magnitude,
        } => ((strong_magnitude >> 8) as u8, (weak_magnitude >> 8) as u8),
        _ => (0, 0),
    }
}
