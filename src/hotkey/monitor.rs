//! Event monitor owning the OS event tap and the dispatch loop
//!
//! The tap backend delivers decoded keyboard events over a channel; a
//! dedicated thread drains it and dispatches exact combo matches against
//! the registry, one event at a time, in OS delivery order. Handlers run
//! synchronously on that thread, so a slow handler delays every event
//! behind it.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::events::{HotkeyEvent, StopReason};
use crate::platform::{EventTap, KeyEventKind, TapEvent};

use super::keys::KeyCombo;
use super::registry::CallbackRegistry;
use super::HotkeyError;

/// Whether the monitor currently owns the OS event tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Stopped,
    Running,
}

struct Shared {
    registry: Arc<CallbackRegistry>,
    tap: Mutex<Box<dyn EventTap>>,
    state: watch::Sender<MonitorState>,
    events: broadcast::Sender<HotkeyEvent>,
}

/// Global keyboard event monitor.
///
/// Holds the single OS event-tap resource while Running. `start` and
/// `stop` are idempotent; redundant calls are no-ops, never errors.
pub struct EventMonitor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventMonitor {
    pub fn new(
        registry: Arc<CallbackRegistry>,
        tap: Box<dyn EventTap>,
        events: broadcast::Sender<HotkeyEvent>,
    ) -> Self {
        let (state, _) = watch::channel(MonitorState::Stopped);
        Self {
            shared: Arc::new(Shared {
                registry,
                tap: Mutex::new(tap),
                state,
                events,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions, including the Stopped transition the
    /// monitor performs on its own when the OS invalidates the tap.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.shared.state.subscribe()
    }

    /// Acquire the event tap and begin dispatching.
    ///
    /// A Running monitor is left untouched. Acquisition failure (most
    /// commonly missing input-monitoring permission) leaves the monitor
    /// Stopped; the caller may retry after the permission is granted.
    pub fn start(&self) -> Result<(), HotkeyError> {
        let mut tap = lock(&self.shared.tap);
        if self.state() == MonitorState::Running {
            debug!("monitor already running");
            return Ok(());
        }

        // A worker left over from the previous session has finished;
        // reap it before spawning a fresh one.
        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.join();
        }

        let (tap_tx, tap_rx) = std::sync::mpsc::channel();
        tap.acquire(tap_tx)?;

        let shared = Arc::clone(&self.shared);
        let worker = match thread::Builder::new()
            .name("hotkey-monitor".to_string())
            .spawn(move || dispatch_loop(tap_rx, shared))
        {
            Ok(worker) => worker,
            Err(e) => {
                tap.release();
                return Err(HotkeyError::ThreadSpawn(e.to_string()));
            }
        };

        *lock(&self.worker) = Some(worker);
        self.shared.state.send_replace(MonitorState::Running);
        let _ = self.shared.events.send(HotkeyEvent::MonitorStarted);
        info!("event monitor started");
        Ok(())
    }

    /// Release the tap and end the dispatch loop.
    ///
    /// Events the OS already delivered are drained before the worker
    /// exits, so every queued match still fires. Stopping a Stopped
    /// monitor is a no-op.
    pub fn stop(&self) {
        {
            let mut tap = lock(&self.shared.tap);
            if self.state() == MonitorState::Stopped {
                return;
            }
            tap.release();
            self.shared.state.send_replace(MonitorState::Stopped);
        }

        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.join();
        }

        let _ = self.shared.events.send(HotkeyEvent::MonitorStopped {
            reason: StopReason::Requested,
        });
        info!("event monitor stopped");
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drain the tap channel, one event at a time, until it closes or the
/// OS invalidates the tap.
fn dispatch_loop(events: Receiver<TapEvent>, shared: Arc<Shared>) {
    debug!("dispatch loop started");

    while let Ok(event) = events.recv() {
        match event {
            TapEvent::Key(input) => {
                if input.kind != KeyEventKind::Down {
                    continue;
                }
                let combo = KeyCombo::new(input.key_code, input.modifiers);
                let matched = shared.registry.lookup(combo);
                if let Some(handler) = matched.primary {
                    debug!(%combo, "primary hotkey matched");
                    handler();
                    let _ = shared.events.send(HotkeyEvent::PrimaryFired { combo });
                }
                if let Some(handler) = matched.secondary {
                    debug!(%combo, "secondary combo matched");
                    handler();
                    let _ = shared.events.send(HotkeyEvent::SecondaryFired { combo });
                }
            }
            TapEvent::Invalidated => {
                // Fatal for this session: release the tap and require an
                // explicit restart rather than reacquiring in a loop.
                warn!("event tap invalidated by the OS, stopping monitor");
                lock(&shared.tap).release();
                shared.state.send_replace(MonitorState::Stopped);
                let _ = shared.events.send(HotkeyEvent::MonitorStopped {
                    reason: StopReason::TapInvalidated,
                });
                return;
            }
        }
    }

    debug!("dispatch loop ended");
}
