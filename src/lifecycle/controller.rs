//! Coordination of the two stateful OS resources
//!
//! The controller owns the system hotkey registration handle and the
//! event monitor, and tears them down in a fixed order on shutdown:
//! primary registration first, then the monitor, then the registry.
//! Releasing in that order means no OS handle ever outlives the thread
//! that could still be dispatching through it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::events::HotkeyEvent;
use crate::hotkey::{
    CallbackRegistry, EventMonitor, Handler, HotkeyError, KeyCode, KeyCombo, KeyStateProbe,
    MonitorState,
};
use crate::platform::{self, EventTap, HotkeyClaim, KeyState};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Owns the hotkey subsystem: registry, monitor, system hotkey handle,
/// and key-state probe.
///
/// The native OS resources are process-wide singletons; constructing a
/// second native controller fails with [`HotkeyError::AlreadyOwned`]
/// instead of double-acquiring them. Dropping the controller runs the
/// full ordered teardown, so OS handles are released on every exit path.
pub struct HotkeyController {
    registry: Arc<CallbackRegistry>,
    monitor: EventMonitor,
    claim: Mutex<Box<dyn HotkeyClaim>>,
    probe: KeyStateProbe,
    events: broadcast::Sender<HotkeyEvent>,
}

impl HotkeyController {
    /// Controller over explicit OS seams.
    pub fn new(
        tap: Box<dyn EventTap>,
        claim: Box<dyn HotkeyClaim>,
        key_state: Arc<dyn KeyState>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let registry = Arc::new(CallbackRegistry::new());
        let monitor = EventMonitor::new(Arc::clone(&registry), tap, events.clone());
        Self {
            registry,
            monitor,
            claim: Mutex::new(claim),
            probe: KeyStateProbe::new(key_state),
            events,
        }
    }

    /// Controller over this platform's native hotkey resources.
    pub fn native() -> Result<Self, HotkeyError> {
        Ok(Self::new(
            platform::native_tap()?,
            platform::native_claim()?,
            platform::native_key_state(),
        ))
    }

    /// Subscribe to subsystem activity events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HotkeyEvent> {
        self.events.subscribe()
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Watch monitor state transitions.
    pub fn subscribe_monitor(&self) -> watch::Receiver<MonitorState> {
        self.monitor.subscribe()
    }

    /// Register the primary hotkey, replacing any existing one.
    ///
    /// The combination is claimed with the OS before it lands in the
    /// registry; it becomes active once the monitor runs. On a claim
    /// failure no primary remains registered at all.
    pub fn register_primary<F>(&self, combo: KeyCombo, handler: F) -> Result<(), HotkeyError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        combo.validate_for_primary()?;

        let mut claim = lock(&self.claim);
        claim.release();
        if let Err(e) = claim.claim(combo) {
            if self.registry.clear_primary() {
                let _ = self.events.send(HotkeyEvent::PrimaryUnregistered);
            }
            return Err(e);
        }
        drop(claim);

        let handler: Handler = Arc::new(handler);
        if let Err(e) = self.registry.set_primary(combo, handler) {
            lock(&self.claim).release();
            return Err(e);
        }

        info!(%combo, "primary hotkey registered");
        let _ = self.events.send(HotkeyEvent::PrimaryRegistered { combo });
        Ok(())
    }

    /// Release the primary hotkey. Returns false if none was set.
    ///
    /// The OS handle goes immediately; a Running monitor keeps running
    /// and secondary combos keep dispatching.
    pub fn unregister_primary(&self) -> bool {
        lock(&self.claim).release();
        let had_primary = self.registry.clear_primary();
        if had_primary {
            info!("primary hotkey unregistered");
            let _ = self.events.send(HotkeyEvent::PrimaryUnregistered);
        }
        had_primary
    }

    /// Start the event monitor. Idempotent; a
    /// [`HotkeyError::PermissionDenied`] result means the caller should
    /// re-prompt for the permission and retry.
    pub fn start(&self) -> Result<(), HotkeyError> {
        self.monitor.start()
    }

    /// Stop the event monitor. Idempotent.
    pub fn stop(&self) {
        self.monitor.stop()
    }

    /// Bind a handler to an additional combination (upsert).
    pub fn add_secondary<F>(&self, combo: KeyCombo, handler: F) -> Result<(), HotkeyError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.registry.add_secondary(combo, handler)
    }

    /// Remove a secondary binding. Returns false if it was not present.
    pub fn remove_secondary(&self, combo: KeyCombo) -> bool {
        let removed = self.registry.remove_secondary(combo);
        if removed {
            debug!(%combo, "secondary combo removed");
        }
        removed
    }

    /// Whether the key is physically depressed right now, in any monitor
    /// state.
    pub fn is_key_pressed(&self, key_code: KeyCode) -> bool {
        self.probe.is_pressed(key_code)
    }

    /// Ordered teardown: primary registration, then the monitor, then the
    /// registry. Safe to call more than once.
    pub fn shutdown(&self) {
        self.unregister_primary();
        self.monitor.stop();
        self.registry.clear();
        info!("hotkey subsystem shut down");
    }
}

impl Drop for HotkeyController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::StopReason;
    use crate::hotkey::keys::{codes, Modifiers};
    use crate::platform::fakes::{FakeClaim, FakeClaimState, FakeKeyState, FakeTap, FakeTapState};

    fn controller_with_fakes() -> (
        HotkeyController,
        Arc<FakeTapState>,
        Arc<FakeClaimState>,
        Arc<FakeKeyState>,
    ) {
        let (tap, tap_state) = FakeTap::new();
        let (claim, claim_state) = FakeClaim::new();
        let keys = FakeKeyState::new();
        let controller = HotkeyController::new(
            Box::new(tap),
            Box::new(claim),
            Arc::clone(&keys) as Arc<dyn KeyState>,
        );
        (controller, tap_state, claim_state, keys)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        (count, move || {
            counted.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn cmd_space() -> KeyCombo {
        KeyCombo::new(
            codes::SPACE,
            Modifiers {
                command: true,
                ..Modifiers::NONE
            },
        )
    }

    #[test]
    fn test_primary_end_to_end() {
        let (controller, tap, claim, _) = controller_with_fakes();
        let (count, handler) = counter();

        controller.register_primary(cmd_space(), handler).unwrap();
        assert_eq!(claim.current(), Some(cmd_space()));

        controller.start().unwrap();
        assert!(tap.key_down(cmd_space()));
        // Same key without the modifier is a different combo
        assert!(tap.key_down(KeyCombo::new(codes::SPACE, Modifiers::NONE)));
        controller.stop();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reregistering_primary_fires_latest_handler_only() {
        let (controller, tap, claim, _) = controller_with_fakes();
        let (first_count, first) = counter();
        let (second_count, second) = counter();

        controller.register_primary(cmd_space(), first).unwrap();
        controller.register_primary(cmd_space(), second).unwrap();
        // Replacement released the first claim and took a second one
        assert_eq!(claim.claim_count(), 2);
        assert_eq!(claim.release_count(), 1);

        controller.start().unwrap();
        assert!(tap.key_down(cmd_space()));
        controller.stop();

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_primary_with_none_set() {
        let (controller, _, claim, _) = controller_with_fakes();
        assert!(!controller.unregister_primary());
        assert_eq!(claim.release_count(), 0);
    }

    #[test]
    fn test_unregister_primary_keeps_monitor_running() {
        let (controller, tap, claim, _) = controller_with_fakes();
        let (primary_count, primary) = counter();
        let (secondary_count, secondary) = counter();
        let secondary_combo = KeyCombo::parse("ctrl+opt+1").unwrap();

        controller.register_primary(cmd_space(), primary).unwrap();
        controller.add_secondary(secondary_combo, secondary).unwrap();
        controller.start().unwrap();

        assert!(controller.unregister_primary());
        // OS handle released immediately, monitor untouched
        assert_eq!(claim.release_count(), 1);
        assert_eq!(controller.monitor_state(), MonitorState::Running);

        assert!(tap.key_down(cmd_space()));
        assert!(tap.key_down(secondary_combo));
        controller.stop();

        assert_eq!(primary_count.load(Ordering::SeqCst), 0);
        assert_eq!(secondary_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registration_conflict_leaves_no_primary() {
        let (controller, tap, claim, _) = controller_with_fakes();
        let (count, handler) = counter();
        claim.conflict_on(cmd_space());

        assert!(matches!(
            controller.register_primary(cmd_space(), handler),
            Err(HotkeyError::RegistrationConflict)
        ));

        controller.start().unwrap();
        assert!(tap.key_down(cmd_space()));
        controller.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_primary_leaves_existing_registration_alone() {
        let (controller, _, claim, _) = controller_with_fakes();
        let (_, first) = counter();
        let (_, second) = counter();

        controller.register_primary(cmd_space(), first).unwrap();

        let bare_space = KeyCombo::new(codes::SPACE, Modifiers::NONE);
        assert!(matches!(
            controller.register_primary(bare_space, second),
            Err(HotkeyError::ReservedCombo(_))
        ));

        // Validation failed before the existing claim was touched
        assert_eq!(claim.current(), Some(cmd_space()));
        assert_eq!(claim.release_count(), 0);
    }

    #[test]
    fn test_secondary_only_end_to_end() {
        let (controller, tap, _, _) = controller_with_fakes();
        let (count, handler) = counter();
        let combo = KeyCombo::parse("ctrl+opt+1").unwrap();

        controller.add_secondary(combo, handler).unwrap();
        controller.start().unwrap();
        assert!(tap.key_down(combo));
        controller.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Injection after the stop goes nowhere
        assert!(!tap.key_down(combo));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_key_state_probe_is_independent_of_monitor() {
        let (controller, _, _, keys) = controller_with_fakes();

        keys.press(codes::SPACE);
        assert!(controller.is_key_pressed(codes::SPACE));

        controller.start().unwrap();
        assert!(controller.is_key_pressed(codes::SPACE));
        controller.stop();

        keys.release(codes::SPACE);
        assert!(!controller.is_key_pressed(codes::SPACE));
    }

    #[test]
    fn test_shutdown_releases_everything_in_order() {
        let (controller, tap, claim, _) = controller_with_fakes();
        let (count, handler) = counter();
        let combo = KeyCombo::parse("ctrl+opt+1").unwrap();

        controller.register_primary(cmd_space(), || {}).unwrap();
        controller.add_secondary(combo, handler).unwrap();
        controller.start().unwrap();

        controller.shutdown();
        assert_eq!(claim.current(), None);
        assert_eq!(claim.release_count(), 1);
        assert_eq!(controller.monitor_state(), MonitorState::Stopped);
        assert_eq!(tap.release_count(), 1);

        // Registry is empty; nothing can fire even if events arrive
        assert!(!tap.key_down(combo));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Teardown is idempotent
        controller.shutdown();
        assert_eq!(claim.release_count(), 1);
        assert_eq!(tap.release_count(), 1);
    }

    #[test]
    fn test_monitor_watch_reports_transitions() {
        let (controller, _, _, _) = controller_with_fakes();
        let mut state_rx = controller.subscribe_monitor();
        assert_eq!(*state_rx.borrow(), MonitorState::Stopped);

        controller.start().unwrap();
        tokio_test::block_on(state_rx.changed()).unwrap();
        assert_eq!(*state_rx.borrow(), MonitorState::Running);

        controller.stop();
        tokio_test::block_on(state_rx.changed()).unwrap();
        assert_eq!(*state_rx.borrow(), MonitorState::Stopped);
    }

    #[test]
    fn test_event_stream_reflects_activity() {
        let (controller, tap, _, _) = controller_with_fakes();
        let mut events = controller.subscribe_events();
        let (_, handler) = counter();

        controller.register_primary(cmd_space(), handler).unwrap();
        controller.start().unwrap();
        assert!(tap.key_down(cmd_space()));
        controller.stop();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert!(matches!(
            seen[0],
            HotkeyEvent::PrimaryRegistered { combo } if combo == cmd_space()
        ));
        assert!(matches!(seen[1], HotkeyEvent::MonitorStarted));
        assert!(matches!(
            seen[2],
            HotkeyEvent::PrimaryFired { combo } if combo == cmd_space()
        ));
        assert!(matches!(
            seen[3],
            HotkeyEvent::MonitorStopped {
                reason: StopReason::Requested
            }
        ));
    }
}
