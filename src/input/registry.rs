//! The [Registry] owns every active [DeviceSession]. It discovers new
//! controllers, removes disconnected ones and routes rumble requests from
//! the virtual pad bus to the session that owns the pad.
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use crate::{
    config::settings::{SettingsError, SettingsField, SettingsStore},
    constants::DEFAULT_SETTINGS_KEY,
    drivers::ogxbox::catalog,
    input::{
        deadzone::DeadzoneTarget,
        notifier::ChangeNotifier,
        session::{
            DeviceSession, PollOutcome, SessionInfo, Toggle, DEFAULT_PAD_RETRY_INTERVAL,
        },
        target::{FeedbackCallback, FeedbackEvent, PadHandle, VirtualPadBus},
    },
    usb::{UsbBus, UsbDeviceInfo},
};

type Sessions = Arc<Mutex<Vec<Arc<DeviceSession>>>>;

#[derive(Clone)]
pub struct Registry {
    usb: Arc<dyn UsbBus>,
    pads: Arc<dyn VirtualPadBus>,
    settings: Arc<dyn SettingsStore>,
    notifier: Arc<dyn ChangeNotifier>,
    pad_retry_interval: Duration,
    /// The lock is only held while the set itself is read or changed, never
    /// across USB or bus calls.
    sessions: Sessions,
}

impl Registry {
    pub fn new(
        usb: Arc<dyn UsbBus>,
        pads: Arc<dyn VirtualPadBus>,
        settings: Arc<dyn SettingsStore>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            usb,
            pads,
            settings,
            notifier,
            pad_retry_interval: DEFAULT_PAD_RETRY_INTERVAL,
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets how long sessions wait before retrying a failed pad registration
    pub fn with_pad_retry_interval(mut self, interval: Duration) -> Self {
        self.pad_retry_interval = interval;
        self
    }

    fn lock_sessions(&self) -> MutexGuard<'_, Vec<Arc<DeviceSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Arc<DeviceSession>> {
        self.lock_sessions().clone()
    }

    fn contains(&self, info: &UsbDeviceInfo) -> bool {
        self.lock_sessions()
            .iter()
            .any(|session| session.is_same_device(info))
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }

    /// Opens every supported controller that has no session yet. Devices
    /// that cannot be opened are skipped and retried on the next scan.
    /// Returns the number of attached devices.
    pub fn scan(&self) -> usize {
        let devices = match self.usb.list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Unable to enumerate USB devices: {e}");
                return 0;
            }
        };

        let mut attached = 0;
        let supported = devices
            .into_iter()
            .filter(|info| catalog::is_supported(info.vendor_id, info.product_id));
        for info in supported {
            if self.contains(&info) {
                continue;
            }

            let opened = match self.usb.open(&info) {
                Ok(opened) => opened,
                Err(e) => {
                    log::debug!(
                        "Unable to open {:04X}:{:04X}: {e}",
                        info.vendor_id,
                        info.product_id
                    );
                    continue;
                }
            };
            let session = match DeviceSession::new(
                opened,
                self.pads.clone(),
                self.settings.clone(),
                self.feedback_callback(),
                self.pad_retry_interval,
            ) {
                Ok(session) => Arc::new(session),
                Err(e) => {
                    log::warn!("Unable to start session: {e}");
                    continue;
                }
            };

            {
                let mut sessions = self.lock_sessions();
                // Another scan may have won the race while the device was opened
                if sessions.iter().any(|s| s.is_same_device(&info)) {
                    drop(sessions);
                    session.close();
                    continue;
                }
                sessions.push(session.clone());
            }

            log::debug!("Added session for {}", session.identity());
            self.notifier.device_attached(session.identity());
            attached += 1;
        }

        attached
    }

    /// Polls every session and removes the ones whose device is gone.
    /// Returns the number of removed sessions.
    pub fn poll_all(&self) -> usize {
        let mut removed = 0;
        for session in self.snapshot() {
            if session.poll() == PollOutcome::Disconnected && self.remove(&session) {
                removed += 1;
            }
        }
        removed
    }

    /// Removes the given session. Returns false if it was already removed.
    fn remove(&self, session: &Arc<DeviceSession>) -> bool {
        {
            let mut sessions = self.lock_sessions();
            let Some(index) = sessions.iter().position(|s| Arc::ptr_eq(s, session)) else {
                return false;
            };
            sessions.remove(index);
        }

        session.close();
        self.notifier.device_detached(session.identity());
        true
    }

    /// Removes every session, revoking all virtual pads
    pub fn shutdown(&self) {
        let sessions: Vec<_> = self.lock_sessions().drain(..).collect();
        for session in sessions {
            session.close();
            self.notifier.device_detached(session.identity());
        }
    }

    /// Forwards a rumble request to the session owning the given pad.
    /// Returns false if no session owns it.
    pub fn dispatch_feedback(&self, handle: PadHandle, large_motor: u8, small_motor: u8) -> bool {
        dispatch(&self.sessions, handle, large_motor, small_motor)
    }

    /// Callback handed to the virtual pad bus. It does not keep the session
    /// set alive.
    fn feedback_callback(&self) -> FeedbackCallback {
        let sessions: Weak<Mutex<Vec<Arc<DeviceSession>>>> = Arc::downgrade(&self.sessions);
        Arc::new(move |event: FeedbackEvent| {
            let Some(sessions) = sessions.upgrade() else {
                return;
            };
            if !dispatch(
                &sessions,
                event.handle,
                event.large_motor,
                event.small_motor,
            ) {
                log::debug!("Dropping feedback for unknown pad {}", event.handle);
            }
        })
    }

    /// Snapshot of every session
    pub fn devices(&self) -> Vec<SessionInfo> {
        self.snapshot()
            .iter()
            .map(|session| session.info())
            .collect()
    }

    /// One line describing the active controllers
    pub fn status_summary(&self) -> String {
        let sessions = self.snapshot();
        match sessions.as_slice() {
            [] => "waiting for controller".to_string(),
            [session] => format!("active with controller {}", session.identity()),
            sessions => format!("active with {} controllers", sessions.len()),
        }
    }

    /// Flips a feature on every session and stores it as the new default
    pub fn set_toggle(&self, toggle: Toggle, enabled: bool) {
        for session in self.snapshot() {
            session.set_toggle(toggle, enabled);
        }
        let field = toggle.field();
        if let Err(e) =
            self.settings
                .save_field(DEFAULT_SETTINGS_KEY, field, serde_yaml::Value::Bool(enabled))
        {
            log::warn!("Failed to save '{field}': {e}");
        }
    }

    /// Sets a deadzone for every controller using the given settings key and
    /// persists it. The value is clamped to the target's range. Returns the
    /// number of live sessions that were updated.
    pub fn set_deadzone(&self, settings_key: &str, target: DeadzoneTarget, value: i32) -> usize {
        let sessions: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|session| session.settings_key() == settings_key)
            .collect();
        for session in sessions.iter() {
            session.set_deadzone(target, value);
        }
        if !sessions.is_empty() {
            return sessions.len();
        }

        // No controller is attached, so only the stored value changes
        let mut deadzone = self.settings.load(settings_key).deadzone;
        deadzone.set(target, value);
        let field = SettingsField::for_deadzone(target);
        let result = serde_yaml::to_value(deadzone.get(target))
            .map_err(SettingsError::from)
            .and_then(|value| self.settings.save_field(settings_key, field, value));
        if let Err(e) = result {
            log::warn!("Failed to save '{field}' for '{settings_key}': {e}");
        }
        0
    }
}

fn dispatch(
    sessions: &Mutex<Vec<Arc<DeviceSession>>>,
    handle: PadHandle,
    large_motor: u8,
    small_motor: u8,
) -> bool {
    let session = sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|session| session.pad() == Some(handle))
        .cloned();
    let Some(session) = session else {
        return false;
    };
    session.rumble(large_motor, small_motor);
    true
}
