//! keywatch: global hotkey registration and keyboard event monitoring
//!
//! Lets a process register system-wide keyboard shortcuts that fire
//! regardless of focus, query the instantaneous state of any key, and
//! bind additional key+modifier combinations to their own handlers.
//!
//! - [`hotkey::CallbackRegistry`] maps combinations to handlers, with one
//!   distinguished primary slot
//! - [`hotkey::EventMonitor`] owns the system event tap and dispatches
//!   exact matches in OS delivery order
//! - [`hotkey::KeyStateProbe`] answers key-state queries without the tap
//! - [`lifecycle::HotkeyController`] ties the pieces together and owns
//!   the two process-wide OS handles
//!
//! The OS integration sits behind the [`platform`] traits: macOS gets a
//! CGEventTap plus a Carbon hotkey registration; other platforms report
//! that global hotkeys are unsupported.

pub mod config;
pub mod events;
pub mod hotkey;
pub mod lifecycle;
pub mod platform;

pub use events::{HotkeyEvent, StopReason};
pub use hotkey::{
    CallbackRegistry, EventMonitor, Handler, HotkeyError, KeyCode, KeyCombo, KeyStateProbe,
    Modifiers, MonitorState,
};
pub use lifecycle::{HotkeyController, ShutdownSignal};
