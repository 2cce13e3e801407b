//! Hotkey registration and global keyboard event monitoring
//!
//! The pieces compose bottom-up: [`keys`] defines key-combination
//! identity, [`CallbackRegistry`] maps combinations to handlers,
//! [`EventMonitor`] owns the system event tap and dispatches matches,
//! and [`KeyStateProbe`] answers key-state queries without the tap.

pub mod keys;
mod monitor;
mod probe;
mod registry;

pub use keys::{KeyCode, KeyCombo, Modifiers};
pub use monitor::{EventMonitor, MonitorState};
pub use probe::KeyStateProbe;
pub use registry::{CallbackRegistry, ComboMatch, Handler};

/// Errors surfaced by registration and monitor control calls.
///
/// Tap invalidation mid-session is not an error value; it surfaces as a
/// transition to [`MonitorState::Stopped`] plus a
/// [`crate::events::StopReason::TapInvalidated`] event.
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    /// Key code outside the range the keyboard layer produces
    #[error("unrecognized key code {0}")]
    InvalidKeyCode(KeyCode),

    /// Binding string that does not name a key combination
    #[error("cannot parse key binding {0:?}")]
    InvalidBinding(String),

    /// Modifier-less binding on a key the system keeps for itself
    #[error("{0} without modifiers is reserved by the OS")]
    ReservedCombo(KeyCombo),

    /// Another application already holds this combination system-wide
    #[error("key combination is already registered by another application")]
    RegistrationConflict,

    /// The system hotkey API rejected the registration
    #[error("hotkey registration failed with OS status {0}")]
    RegistrationFailed(i32),

    /// Input-monitoring permission has not been granted
    #[error("input monitoring permission not granted - check Accessibility settings")]
    PermissionDenied,

    /// This platform has no global hotkey support
    #[error("global hotkeys are not supported on this platform")]
    Unsupported,

    /// A second owner tried to acquire a process-wide OS resource
    #[error("the {0} is already owned by this process")]
    AlreadyOwned(&'static str),

    #[error("failed to spawn monitor thread: {0}")]
    ThreadSpawn(String),
}
