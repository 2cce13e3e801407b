//! OS integration seam for the event tap, the system hotkey handle, and
//! key-state queries
//!
//! The monitor and lifecycle controller talk to these traits. macOS gets
//! the real backends ([`macos`]); other platforms get stubs that report
//! [`HotkeyError::Unsupported`] so the rest of the crate behaves the same
//! everywhere.

#[cfg(any(target_os = "macos", test))]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::hotkey::keys::{KeyCode, KeyCombo, Modifiers};
use crate::hotkey::HotkeyError;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(test)]
pub(crate) mod fakes;

/// Key transition carried by a tap event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// One decoded keyboard event from the tap
#[derive(Debug, Clone, Copy)]
pub struct KeyInput {
    pub kind: KeyEventKind,
    pub key_code: KeyCode,
    pub modifiers: Modifiers,
}

/// Events a tap backend delivers to the dispatch loop, in OS order
#[derive(Debug, Clone, Copy)]
pub enum TapEvent {
    Key(KeyInput),
    /// The OS disabled the tap; this session is over
    Invalidated,
}

/// The process-wide OS event-tap resource.
///
/// `acquire` begins delivering events into the channel until `release`.
/// Backends drop their sender on release so the dispatch loop observes a
/// closed channel and drains out. `release` on a released tap is a no-op.
pub trait EventTap: Send {
    fn acquire(&mut self, events: Sender<TapEvent>) -> Result<(), HotkeyError>;
    fn release(&mut self);
}

/// The OS-level registration handle for the primary hotkey.
///
/// At most one combination is claimed at a time; callers release before
/// claiming a replacement. `release` with nothing claimed is a no-op.
pub trait HotkeyClaim: Send {
    fn claim(&mut self, combo: KeyCombo) -> Result<(), HotkeyError>;
    fn release(&mut self);
}

/// Stateless query of the current hardware keyboard state.
pub trait KeyState: Send + Sync {
    fn is_pressed(&self, key_code: KeyCode) -> bool;
}

/// Process-wide ownership marker for a scarce OS resource.
///
/// Whoever takes the slot holds the resource until it is put back;
/// a second take fails instead of double-acquiring.
#[cfg(any(target_os = "macos", test))]
pub(crate) struct ResourceSlot {
    name: &'static str,
    taken: AtomicBool,
}

#[cfg(any(target_os = "macos", test))]
impl ResourceSlot {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            taken: AtomicBool::new(false),
        }
    }

    pub(crate) fn take(&self) -> Result<(), HotkeyError> {
        if self.taken.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyOwned(self.name));
        }
        Ok(())
    }

    pub(crate) fn put_back(&self) {
        self.taken.store(false, Ordering::SeqCst);
    }
}

/// This platform's event tap. Fails when another owner in this process
/// already holds it.
#[cfg(target_os = "macos")]
pub fn native_tap() -> Result<Box<dyn EventTap>, HotkeyError> {
    Ok(Box::new(macos::NativeEventTap::take()?))
}

/// This platform's system hotkey handle.
#[cfg(target_os = "macos")]
pub fn native_claim() -> Result<Box<dyn HotkeyClaim>, HotkeyError> {
    Ok(Box::new(macos::NativeHotkeyClaim::take()?))
}

/// This platform's hardware key-state source.
#[cfg(target_os = "macos")]
pub fn native_key_state() -> Arc<dyn KeyState> {
    Arc::new(macos::NativeKeyState)
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use std::sync::mpsc::Sender;

    use tracing::warn;

    use crate::hotkey::keys::{KeyCode, KeyCombo};
    use crate::hotkey::HotkeyError;

    use super::{EventTap, HotkeyClaim, KeyState, TapEvent};

    pub(super) struct UnsupportedTap;

    impl EventTap for UnsupportedTap {
        fn acquire(&mut self, _events: Sender<TapEvent>) -> Result<(), HotkeyError> {
            warn!("global event monitoring is not available on this platform");
            Err(HotkeyError::Unsupported)
        }

        fn release(&mut self) {}
    }

    pub(super) struct UnsupportedClaim;

    impl HotkeyClaim for UnsupportedClaim {
        fn claim(&mut self, _combo: KeyCombo) -> Result<(), HotkeyError> {
            Err(HotkeyError::Unsupported)
        }

        fn release(&mut self) {}
    }

    pub(super) struct UnsupportedKeyState;

    impl KeyState for UnsupportedKeyState {
        fn is_pressed(&self, _key_code: KeyCode) -> bool {
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn native_tap() -> Result<Box<dyn EventTap>, HotkeyError> {
    Ok(Box::new(unsupported::UnsupportedTap))
}

#[cfg(not(target_os = "macos"))]
pub fn native_claim() -> Result<Box<dyn HotkeyClaim>, HotkeyError> {
    Ok(Box::new(unsupported::UnsupportedClaim))
}

#[cfg(not(target_os = "macos"))]
pub fn native_key_state() -> Arc<dyn KeyState> {
    Arc::new(unsupported::UnsupportedKeyState)
}
