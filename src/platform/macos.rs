//! macOS backends: CGEventTap monitoring, Carbon hotkey registration,
//! and hardware key-state queries
//!
//! The tap runs on a dedicated thread with its own CFRunLoop, as session
//! event taps require. Carbon and CoreGraphics symbols the wrapper crates
//! do not cover are declared directly against the system frameworks.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use crate::hotkey::keys::{KeyCode, KeyCombo, Modifiers};
use crate::hotkey::HotkeyError;

use super::{
    EventTap, HotkeyClaim, KeyEventKind, KeyInput, KeyState, ResourceSlot, TapEvent,
};

static TAP_SLOT: ResourceSlot = ResourceSlot::new("system event tap");
static CLAIM_SLOT: ResourceSlot = ResourceSlot::new("system hotkey registration");

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        control: flags.contains(CGEventFlags::CGEventFlagControl),
        option: flags.contains(CGEventFlags::CGEventFlagAlternate),
        command: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

/// Session event tap feeding decoded keyboard events to the monitor.
///
/// Owns the process-wide tap slot from construction until drop; the tap
/// itself exists only between `acquire` and `release`.
pub(super) struct NativeEventTap {
    worker: Option<TapWorker>,
}

struct TapWorker {
    run_loop: CFRunLoop,
    handle: JoinHandle<()>,
}

impl NativeEventTap {
    pub(super) fn take() -> Result<Self, HotkeyError> {
        TAP_SLOT.take()?;
        Ok(Self { worker: None })
    }
}

impl EventTap for NativeEventTap {
    fn acquire(&mut self, events: Sender<TapEvent>) -> Result<(), HotkeyError> {
        if self.worker.is_some() {
            return Ok(());
        }

        if !accessibility_trusted() {
            return Err(HotkeyError::PermissionDenied);
        }

        let (startup_tx, startup_rx) = mpsc::channel::<Result<CFRunLoop, HotkeyError>>();

        let handle = thread::Builder::new()
            .name("hotkey-tap".to_string())
            .spawn(move || run_tap_loop(events, startup_tx))
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        match startup_rx.recv() {
            Ok(Ok(run_loop)) => {
                self.worker = Some(TapWorker { run_loop, handle });
                info!("event tap created and enabled");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(HotkeyError::ThreadSpawn(
                    "tap thread exited during startup".to_string(),
                ))
            }
        }
    }

    fn release(&mut self) {
        if let Some(TapWorker { run_loop, handle }) = self.worker.take() {
            run_loop.stop();
            let _ = handle.join();
            debug!("event tap released");
        }
    }
}

impl Drop for NativeEventTap {
    fn drop(&mut self) {
        self.release();
        TAP_SLOT.put_back();
    }
}

/// Create the tap on the dedicated thread and pump its run loop until
/// `release` stops it. Dropping the tap at the end also drops the event
/// sender, which closes the dispatch channel.
fn run_tap_loop(
    events: Sender<TapEvent>,
    startup_tx: mpsc::Sender<Result<CFRunLoop, HotkeyError>>,
) {
    let run_loop = CFRunLoop::get_current();

    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown | CGEventType::KeyUp => {
                let key_code =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as KeyCode;
                let kind = if matches!(event_type, CGEventType::KeyDown) {
                    KeyEventKind::Down
                } else {
                    KeyEventKind::Up
                };
                let _ = events.send(TapEvent::Key(KeyInput {
                    kind,
                    key_code,
                    modifiers: modifiers_from_flags(event.get_flags()),
                }));
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!(?event_type, "event tap disabled by the OS");
                let _ = events.send(TapEvent::Invalidated);
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp],
        callback,
    ) {
        Ok(tap) => tap,
        Err(_) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = startup_tx.send(Err(HotkeyError::PermissionDenied));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            error!("failed to create event tap run loop source");
            let _ = startup_tx.send(Err(HotkeyError::PermissionDenied));
            return;
        }
    };

    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();

    if startup_tx.send(Ok(run_loop.clone())).is_err() {
        return;
    }

    CFRunLoop::run_current();

    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
}

/// Carbon registration handle for the primary hotkey.
///
/// Claiming reserves the combination system-wide; the matching key events
/// still arrive through the tap, so dispatch stays in the monitor.
pub(super) struct NativeHotkeyClaim {
    handle: Option<carbon::EventHotKeyRef>,
}

impl NativeHotkeyClaim {
    pub(super) fn take() -> Result<Self, HotkeyError> {
        CLAIM_SLOT.take()?;
        Ok(Self { handle: None })
    }
}

// SAFETY: EventHotKeyRef is an opaque registration token; Carbon accepts
// registration and release calls for it from any thread.
unsafe impl Send for NativeHotkeyClaim {}

impl HotkeyClaim for NativeHotkeyClaim {
    fn claim(&mut self, combo: KeyCombo) -> Result<(), HotkeyError> {
        self.release();

        let hotkey_id = carbon::EventHotKeyID {
            signature: carbon::SIGNATURE,
            id: 1,
        };
        let mut hotkey_ref: carbon::EventHotKeyRef = std::ptr::null_mut();

        let status = unsafe {
            carbon::RegisterEventHotKey(
                combo.key_code as u32,
                carbon_modifiers(combo.modifiers),
                hotkey_id,
                carbon::GetApplicationEventTarget(),
                0,
                &mut hotkey_ref,
            )
        };

        match status {
            carbon::NO_ERR if !hotkey_ref.is_null() => {
                self.handle = Some(hotkey_ref);
                debug!(%combo, "system hotkey registered");
                Ok(())
            }
            carbon::EVENT_HOTKEY_EXISTS_ERR => Err(HotkeyError::RegistrationConflict),
            carbon::PARAM_ERR => Err(HotkeyError::InvalidKeyCode(combo.key_code)),
            status => Err(HotkeyError::RegistrationFailed(status)),
        }
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            let status = unsafe { carbon::UnregisterEventHotKey(handle) };
            if status != carbon::NO_ERR {
                warn!(status, "UnregisterEventHotKey failed");
            } else {
                debug!("system hotkey released");
            }
        }
    }
}

impl Drop for NativeHotkeyClaim {
    fn drop(&mut self) {
        self.release();
        CLAIM_SLOT.put_back();
    }
}

fn carbon_modifiers(modifiers: Modifiers) -> u32 {
    let mut mask = 0;
    if modifiers.command {
        mask |= carbon::CMD_KEY;
    }
    if modifiers.shift {
        mask |= carbon::SHIFT_KEY;
    }
    if modifiers.option {
        mask |= carbon::OPTION_KEY;
    }
    if modifiers.control {
        mask |= carbon::CONTROL_KEY;
    }
    mask
}

/// Hardware key state from the combined session event source
pub(super) struct NativeKeyState;

impl KeyState for NativeKeyState {
    fn is_pressed(&self, key_code: KeyCode) -> bool {
        // SAFETY: reads the current key state for the session; no
        // pointers cross the boundary.
        unsafe { CGEventSourceKeyState(COMBINED_SESSION_STATE, key_code) }
    }
}

fn accessibility_trusted() -> bool {
    // SAFETY: takes no arguments and only reads process trust state.
    unsafe { AXIsProcessTrusted() }
}

/// kCGEventSourceStateCombinedSessionState
const COMBINED_SESSION_STATE: i32 = 0;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventSourceKeyState(state_id: i32, key_code: u16) -> bool;
}

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// Carbon Event Manager declarations for hotkey registration
mod carbon {
    use std::ffi::c_void;

    pub type EventTargetRef = *mut c_void;
    pub type EventHotKeyRef = *mut c_void;

    #[repr(C)]
    #[derive(Copy, Clone)]
    pub struct EventHotKeyID {
        pub signature: u32,
        pub id: u32,
    }

    pub const NO_ERR: i32 = 0;
    pub const PARAM_ERR: i32 = -50;
    pub const EVENT_HOTKEY_EXISTS_ERR: i32 = -9878;

    // Carbon modifier masks
    pub const CMD_KEY: u32 = 1 << 8;
    pub const SHIFT_KEY: u32 = 1 << 9;
    pub const OPTION_KEY: u32 = 1 << 11;
    pub const CONTROL_KEY: u32 = 1 << 12;

    // Hotkey signature: 'kwch'
    pub const SIGNATURE: u32 = 0x6B77_6368;

    #[link(name = "Carbon", kind = "framework")]
    extern "C" {
        pub fn RegisterEventHotKey(
            in_hot_key_code: u32,
            in_hot_key_modifiers: u32,
            in_hot_key_id: EventHotKeyID,
            in_target: EventTargetRef,
            in_options: u32,
            out_ref: *mut EventHotKeyRef,
        ) -> i32;

        pub fn UnregisterEventHotKey(in_hot_key_ref: EventHotKeyRef) -> i32;

        pub fn GetApplicationEventTarget() -> EventTargetRef;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_flag_decoding() {
        let flags = CGEventFlags::CGEventFlagCommand | CGEventFlags::CGEventFlagShift;
        let modifiers = modifiers_from_flags(flags);
        assert!(modifiers.command);
        assert!(modifiers.shift);
        assert!(!modifiers.control);
        assert!(!modifiers.option);
    }

    #[test]
    fn test_carbon_modifier_mask() {
        let mask = carbon_modifiers(Modifiers {
            command: true,
            control: true,
            ..Modifiers::NONE
        });
        assert_eq!(mask, carbon::CMD_KEY | carbon::CONTROL_KEY);
        assert_eq!(carbon_modifiers(Modifiers::NONE), 0);
    }
}
