//! Virtual pad bus. A target is a software gamepad presented to applications
//! as if it were a physical Xbox 360 controller.
use std::{fmt::Display, sync::Arc};

use super::gamepad::GamepadState;

pub mod xb360;

/// Handle identifying one registered virtual pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PadHandle(pub u32);

impl Display for PadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pad{}", self.0)
    }
}

/// Rumble request raised by an application through a virtual pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackEvent {
    pub handle: PadHandle,
    pub large_motor: u8,
    pub small_motor: u8,
}

/// Called on the bus's own thread whenever a pad's rumble changes
pub type FeedbackCallback = Arc<dyn Fn(FeedbackEvent) + Send + Sync>;

/// Errors returned by a virtual pad bus
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("system error: {0}")]
    Errno(#[from] nix::errno::Errno),
    #[error("no virtual pad with handle {0}")]
    NoSuchTarget(PadHandle),
    #[error("virtual pad bus is out of capacity")]
    OutOfCapacity,
}

/// A facility that can create virtual pads and deliver their rumble requests
pub trait VirtualPadBus: Send + Sync {
    /// Creates a new virtual pad. Failure is expected to be transient.
    fn register_target(&self) -> Result<PadHandle, TargetError>;

    /// Pushes the given state to the virtual pad
    fn update_state(&self, handle: PadHandle, state: &GamepadState) -> Result<(), TargetError>;

    /// Removes the virtual pad. No feedback is delivered for it afterwards.
    fn unregister_target(&self, handle: PadHandle) -> Result<(), TargetError>;

    /// Installs the callback receiving rumble requests for the given pad
    fn subscribe_feedback(
        &self,
        handle: PadHandle,
        callback: FeedbackCallback,
    ) -> Result<(), TargetError>;

    /// Removes the feedback callback of the given pad
    fn unsubscribe_feedback(&self, handle: PadHandle) -> Result<(), TargetError>;
}
