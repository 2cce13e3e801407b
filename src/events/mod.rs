//! Observability events emitted by the hotkey subsystem
//!
//! Broadcast to any number of subscribers; the daemon binary logs them,
//! and embedders can forward them over whatever wire they like.

use serde::{Deserialize, Serialize};

use crate::hotkey::KeyCombo;

/// Why the monitor left the Running state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A caller asked for the stop
    Requested,
    /// The OS disabled the event tap; an explicit restart is required
    TapInvalidated,
}

/// Events emitted by the monitor and the lifecycle controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HotkeyEvent {
    /// The monitor acquired the event tap and began dispatching
    MonitorStarted,

    /// The monitor released the event tap
    MonitorStopped { reason: StopReason },

    /// A primary hotkey now occupies the system registration handle
    PrimaryRegistered { combo: KeyCombo },

    /// The system registration handle was released
    PrimaryUnregistered,

    /// An observed event matched the primary slot and its handler ran
    PrimaryFired { combo: KeyCombo },

    /// An observed event matched a secondary combo and its handler ran
    SecondaryFired { combo: KeyCombo },
}

impl std::fmt::Display for HotkeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyEvent::MonitorStarted => write!(f, "MONITOR_STARTED"),
            HotkeyEvent::MonitorStopped { reason } => {
                let reason = match reason {
                    StopReason::Requested => "requested",
                    StopReason::TapInvalidated => "tap invalidated",
                };
                write!(f, "MONITOR_STOPPED ({})", reason)
            }
            HotkeyEvent::PrimaryRegistered { combo } => {
                write!(f, "PRIMARY_REGISTERED ({})", combo)
            }
            HotkeyEvent::PrimaryUnregistered => write!(f, "PRIMARY_UNREGISTERED"),
            HotkeyEvent::PrimaryFired { combo } => write!(f, "PRIMARY_FIRED ({})", combo),
            HotkeyEvent::SecondaryFired { combo } => write!(f, "SECONDARY_FIRED ({})", combo),
        }
    }
}
