//! A [DeviceSession] owns one physical controller from the moment it is
//! opened until it is removed: its transfer worker, its virtual pad and its
//! translation state.
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use crate::{
    config::settings::{SettingsError, SettingsField, SettingsStore},
    drivers::ogxbox::{
        driver::{Completion, Driver, TransferWorker, READ_BUFFER_SIZE},
        hid_report::PackedInputDataReport,
    },
    input::{
        deadzone::{Deadzone, DeadzoneTarget},
        gesture::DeadzoneChange,
        target::{FeedbackCallback, PadHandle, VirtualPadBus},
        translator::{Toggles, Translator},
    },
    usb::{endpoint::TransferMode, DeviceIdentity, OpenedDevice, UsbDeviceInfo},
};

/// How long to wait before retrying a failed virtual pad registration
pub const DEFAULT_PAD_RETRY_INTERVAL: Duration = Duration::from_millis(1500);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    AwaitingPadRegistration,
    Active,
    Closing,
    Removed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AwaitingPadRegistration => "awaiting pad registration",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Removed => "removed",
        };
        write!(f, "{name}")
    }
}

/// Result of a single poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    /// The device is gone and the session must be removed
    Disconnected,
}

/// Feature switches that can be flipped while a session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Guide,
    Vibration,
    DeadzoneAdjust,
    Remap,
}

impl Toggle {
    /// Settings field the toggle is persisted as
    pub fn field(&self) -> SettingsField {
        match self {
            Toggle::Guide => SettingsField::GuideEnabled,
            Toggle::Vibration => SettingsField::VibrationEnabled,
            Toggle::DeadzoneAdjust => SettingsField::DeadzoneAdjustEnabled,
            Toggle::Remap => SettingsField::RemapEnabled,
        }
    }
}

/// Snapshot of a session for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub identity: DeviceIdentity,
    pub settings_key: String,
    pub pad: Option<PadHandle>,
    pub state: SessionState,
    pub mode: TransferMode,
    pub deadzone: Deadzone,
}

/// State only touched by the session's poll path
struct Inner {
    state: SessionState,
    worker: Option<TransferWorker>,
    translator: Translator,
    last_report: [u8; READ_BUFFER_SIZE],
    next_registration: Option<Instant>,
}

pub struct DeviceSession {
    identity: DeviceIdentity,
    settings_key: String,
    driver: Arc<Driver>,
    bus: Arc<dyn VirtualPadBus>,
    settings: Arc<dyn SettingsStore>,
    feedback: FeedbackCallback,
    retry_interval: Duration,
    guide_enabled: AtomicBool,
    vibration_enabled: AtomicBool,
    deadzone_adjust_enabled: AtomicBool,
    remap_enabled: AtomicBool,
    pad: Mutex<Option<PadHandle>>,
    inner: Mutex<Inner>,
}

impl DeviceSession {
    /// Creates a session for the opened device and starts its transfer
    /// worker. No virtual pad exists until the first poll.
    pub fn new(
        device: OpenedDevice,
        bus: Arc<dyn VirtualPadBus>,
        settings: Arc<dyn SettingsStore>,
        feedback: FeedbackCallback,
        retry_interval: Duration,
    ) -> std::io::Result<Self> {
        let OpenedDevice { identity, io, mode } = device;
        let settings_key = identity.settings_key();
        let user_settings = settings.load(&settings_key);
        log::debug!("Loaded settings for {identity} from '{settings_key}': {user_settings:?}");

        let driver = Arc::new(Driver::new(io, mode));
        let worker = TransferWorker::spawn(driver.clone(), format!("usb-{}", identity.usb_id()))?;
        let translator = Translator::new(
            user_settings.deadzone,
            user_settings.remap,
            user_settings.guide_combination,
        );

        Ok(Self {
            identity,
            settings_key,
            driver,
            bus,
            settings,
            feedback,
            retry_interval,
            guide_enabled: AtomicBool::new(user_settings.guide_enabled),
            vibration_enabled: AtomicBool::new(user_settings.vibration_enabled),
            deadzone_adjust_enabled: AtomicBool::new(user_settings.deadzone_adjust_enabled),
            remap_enabled: AtomicBool::new(user_settings.remap_enabled),
            pad: Mutex::new(None),
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                worker: Some(worker),
                translator,
                last_report: [0; READ_BUFFER_SIZE],
                next_registration: None,
            }),
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Key this device's settings are stored under
    pub fn settings_key(&self) -> &str {
        &self.settings_key
    }

    /// Returns true if this session owns the physical device at the given
    /// attachment point
    pub fn is_same_device(&self, info: &UsbDeviceInfo) -> bool {
        info.same_topology(self.identity.bus_number, &self.identity.port_path)
    }

    /// Handle of the registered virtual pad, if any
    pub fn pad(&self) -> Option<PadHandle> {
        *self.pad.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn info(&self) -> SessionInfo {
        let inner = self.lock_inner();
        SessionInfo {
            identity: self.identity.clone(),
            settings_key: self.settings_key.clone(),
            pad: self.pad(),
            state: inner.state,
            mode: self.driver.mode(),
            deadzone: inner.translator.deadzone,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn toggles(&self) -> Toggles {
        Toggles {
            guide_enabled: self.guide_enabled.load(Ordering::SeqCst),
            remap_enabled: self.remap_enabled.load(Ordering::SeqCst),
            deadzone_adjust_enabled: self.deadzone_adjust_enabled.load(Ordering::SeqCst),
        }
    }

    /// Enables or disables a feature for this session
    pub fn set_toggle(&self, toggle: Toggle, enabled: bool) {
        let flag = match toggle {
            Toggle::Guide => &self.guide_enabled,
            Toggle::Vibration => &self.vibration_enabled,
            Toggle::DeadzoneAdjust => &self.deadzone_adjust_enabled,
            Toggle::Remap => &self.remap_enabled,
        };
        flag.store(enabled, Ordering::SeqCst);
    }

    /// Sets a deadzone value and persists it
    pub fn set_deadzone(&self, target: DeadzoneTarget, value: i32) {
        let value = {
            let mut inner = self.lock_inner();
            inner.translator.deadzone.set(target, value);
            inner.translator.deadzone.get(target)
        };
        self.persist_deadzone(DeadzoneChange { target, value });
    }

    /// Advances the session by one tick. Never blocks on USB I/O.
    pub fn poll(&self) -> PollOutcome {
        let mut inner = self.lock_inner();
        match inner.state {
            SessionState::Closing | SessionState::Removed => return PollOutcome::Continue,
            SessionState::Uninitialized | SessionState::AwaitingPadRegistration => {
                if !self.register_pad(&mut inner) {
                    return PollOutcome::Continue;
                }
            }
            SessionState::Active => (),
        }

        let Some(worker) = inner.worker.as_mut() else {
            return PollOutcome::Disconnected;
        };
        let (outcome, change) = match worker.try_complete() {
            Some(completion) => self.handle_completion(&mut inner, completion),
            None => (PollOutcome::Continue, None),
        };
        if outcome == PollOutcome::Continue {
            if let Some(worker) = inner.worker.as_mut() {
                worker.submit();
            }
        }
        drop(inner);

        // Settings are written without holding the session lock
        if let Some(change) = change {
            self.persist_deadzone(change);
        }
        outcome
    }

    /// Registers the virtual pad and installs its feedback subscription.
    /// Returns true once the session is active.
    fn register_pad(&self, inner: &mut Inner) -> bool {
        if let Some(next) = inner.next_registration {
            if Instant::now() < next {
                return false;
            }
        }

        let result = self.bus.register_target().and_then(|handle| {
            match self.bus.subscribe_feedback(handle, self.feedback.clone()) {
                Ok(_) => Ok(handle),
                Err(e) => {
                    if let Err(e) = self.bus.unregister_target(handle) {
                        log::debug!("Failed to release virtual pad {handle}: {e}");
                    }
                    Err(e)
                }
            }
        });

        match result {
            Ok(handle) => {
                *self.pad.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                inner.state = SessionState::Active;
                inner.next_registration = None;
                log::info!("{} is now virtual pad {handle}", self.identity);
                true
            }
            Err(e) => {
                log::debug!(
                    "Unable to register virtual pad for {}: {e}. Retrying in {:?}",
                    self.identity,
                    self.retry_interval
                );
                inner.state = SessionState::AwaitingPadRegistration;
                inner.next_registration = Some(Instant::now() + self.retry_interval);
                false
            }
        }
    }

    /// Applies the failure policy to a completed read. Control transfer
    /// devices treat any failure as removal; interrupt devices only a
    /// confirmed one.
    fn handle_completion(
        &self,
        inner: &mut Inner,
        completion: Completion,
    ) -> (PollOutcome, Option<DeadzoneChange>) {
        let polling = !self.driver.mode().is_interrupt();
        match completion {
            Completion::TimedOut => {
                if polling {
                    log::info!("{}: control transfer timed out", self.identity);
                    return (PollOutcome::Disconnected, None);
                }
                log::trace!("{}: no new input", self.identity);
                (PollOutcome::Continue, None)
            }
            Completion::Failed { error, confirmed } => {
                if polling || confirmed {
                    log::info!("{}: transfer failed: {error}", self.identity);
                    return (PollOutcome::Disconnected, None);
                }
                log::debug!("{}: transient transfer error: {error}", self.identity);
                (PollOutcome::Continue, None)
            }
            Completion::Report { data, len } => {
                inner.last_report = data;
                let len = len.min(READ_BUFFER_SIZE);
                let report = match PackedInputDataReport::from_buffer(&inner.last_report[..len]) {
                    Ok(report) => report,
                    Err(e) if polling => {
                        log::info!("{}: invalid input report: {e}", self.identity);
                        return (PollOutcome::Disconnected, None);
                    }
                    Err(e) => {
                        log::trace!("{}: dropping input report: {e}", self.identity);
                        return (PollOutcome::Continue, None);
                    }
                };
                log::trace!("{}: {report}", self.identity);

                let translation = inner
                    .translator
                    .translate(report.to_gamepad_state(), self.toggles());
                if let Some(change) = translation.deadzone_change {
                    log::info!(
                        "{}: {} deadzone set to {}",
                        self.identity,
                        change.target,
                        change.value
                    );
                }

                if let Some(handle) = self.pad() {
                    if let Err(e) = self.bus.update_state(handle, &translation.state) {
                        log::warn!("Failed to update virtual pad {handle}: {e}");
                    }
                }
                (PollOutcome::Continue, translation.deadzone_change)
            }
        }
    }

    fn persist_deadzone(&self, change: DeadzoneChange) {
        let field = SettingsField::for_deadzone(change.target);
        let result = serde_yaml::to_value(change.value)
            .map_err(SettingsError::from)
            .and_then(|value| self.settings.save_field(&self.settings_key, field, value));
        if let Err(e) = result {
            log::warn!("Failed to save '{field}' for '{}': {e}", self.settings_key);
        }
    }

    /// Writes a rumble report. Motor speeds are zeroed while vibration is
    /// disabled. Failures are logged and dropped.
    pub fn rumble(&self, large_motor: u8, small_motor: u8) {
        let (large_motor, small_motor) = if self.vibration_enabled.load(Ordering::SeqCst) {
            (large_motor, small_motor)
        } else {
            (0, 0)
        };
        if let Err(e) = self.driver.write_rumble(large_motor, small_motor) {
            log::warn!("Failed to write rumble to {}: {e}", self.identity);
        }
    }

    /// Revokes the virtual pad and stops the transfer worker. Any read still
    /// in flight is abandoned.
    pub fn close(&self) {
        let mut inner = self.lock_inner();
        if matches!(inner.state, SessionState::Closing | SessionState::Removed) {
            return;
        }
        inner.state = SessionState::Closing;

        let pad = self.pad.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = pad {
            if let Err(e) = self.bus.unsubscribe_feedback(handle) {
                log::debug!("Failed to unsubscribe feedback of {handle}: {e}");
            }
            if let Err(e) = self.bus.unregister_target(handle) {
                log::warn!("Failed to remove virtual pad {handle}: {e}");
            }
        }

        inner.worker = None;
        inner.state = SessionState::Removed;
        log::debug!("Closed session for {}", self.identity);
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}
