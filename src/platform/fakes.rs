//! In-process doubles for the OS seams
//!
//! Used by unit tests across the crate: a counting tap that injects
//! synthetic events, a counting hotkey claim that can simulate a
//! combination another process owns, and a synthetic key-state table.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hotkey::keys::{KeyCode, KeyCombo};
use crate::hotkey::HotkeyError;

use super::{EventTap, HotkeyClaim, KeyEventKind, KeyInput, KeyState, TapEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counting tap double. The shared state handle injects synthetic events
/// and observes acquire/release balance.
pub(crate) struct FakeTap {
    state: Arc<FakeTapState>,
}

pub(crate) struct FakeTapState {
    acquired: AtomicUsize,
    released: AtomicUsize,
    deny_permission: AtomicBool,
    sender: Mutex<Option<Sender<TapEvent>>>,
}

impl FakeTap {
    pub(crate) fn new() -> (Self, Arc<FakeTapState>) {
        let state = Arc::new(FakeTapState {
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            deny_permission: AtomicBool::new(false),
            sender: Mutex::new(None),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl FakeTapState {
    pub(crate) fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Make the next acquire fail the way a missing permission does.
    pub(crate) fn deny_permission(&self) {
        self.deny_permission.store(true, Ordering::SeqCst);
    }

    /// Inject a key-down event. Returns false once the tap is released.
    pub(crate) fn key_down(&self, combo: KeyCombo) -> bool {
        self.send(TapEvent::Key(KeyInput {
            kind: KeyEventKind::Down,
            key_code: combo.key_code,
            modifiers: combo.modifiers,
        }))
    }

    /// Inject a key-up event.
    pub(crate) fn key_up(&self, combo: KeyCombo) -> bool {
        self.send(TapEvent::Key(KeyInput {
            kind: KeyEventKind::Up,
            key_code: combo.key_code,
            modifiers: combo.modifiers,
        }))
    }

    /// Simulate the OS disabling the tap mid-session.
    pub(crate) fn invalidate(&self) -> bool {
        self.send(TapEvent::Invalidated)
    }

    fn send(&self, event: TapEvent) -> bool {
        match lock(&self.sender).as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl EventTap for FakeTap {
    fn acquire(&mut self, events: Sender<TapEvent>) -> Result<(), HotkeyError> {
        if self.state.deny_permission.load(Ordering::SeqCst) {
            return Err(HotkeyError::PermissionDenied);
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.sender) = Some(events);
        Ok(())
    }

    fn release(&mut self) {
        if lock(&self.state.sender).take().is_some() {
            self.state.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Claim double recording the currently-claimed combo.
pub(crate) struct FakeClaim {
    state: Arc<FakeClaimState>,
}

pub(crate) struct FakeClaimState {
    claims: AtomicUsize,
    releases: AtomicUsize,
    conflicts: Mutex<HashSet<KeyCombo>>,
    current: Mutex<Option<KeyCombo>>,
}

impl FakeClaim {
    pub(crate) fn new() -> (Self, Arc<FakeClaimState>) {
        let state = Arc::new(FakeClaimState {
            claims: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            conflicts: Mutex::new(HashSet::new()),
            current: Mutex::new(None),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl FakeClaimState {
    pub(crate) fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub(crate) fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// The combo currently holding the fake OS handle.
    pub(crate) fn current(&self) -> Option<KeyCombo> {
        *lock(&self.current)
    }

    /// Pretend another process already owns this combination.
    pub(crate) fn conflict_on(&self, combo: KeyCombo) {
        lock(&self.conflicts).insert(combo);
    }
}

impl HotkeyClaim for FakeClaim {
    fn claim(&mut self, combo: KeyCombo) -> Result<(), HotkeyError> {
        if lock(&self.state.conflicts).contains(&combo) {
            return Err(HotkeyError::RegistrationConflict);
        }
        self.state.claims.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.current) = Some(combo);
        Ok(())
    }

    fn release(&mut self) {
        if lock(&self.state.current).take().is_some() {
            self.state.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Synthetic hardware key-state table.
pub(crate) struct FakeKeyState {
    pressed: Mutex<HashSet<KeyCode>>,
}

impl FakeKeyState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            pressed: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn press(&self, key_code: KeyCode) {
        lock(&self.pressed).insert(key_code);
    }

    pub(crate) fn release(&self, key_code: KeyCode) {
        lock(&self.pressed).remove(&key_code);
    }
}

impl KeyState for FakeKeyState {
    fn is_pressed(&self, key_code: KeyCode) -> bool {
        lock(&self.pressed).contains(&key_code)
    }
}
