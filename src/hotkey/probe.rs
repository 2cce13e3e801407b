//! On-demand hardware key-state queries
//!
//! Independent of the monitor: the probe uses a stateless OS query, not
//! the event stream, so it answers correctly whether or not the tap is
//! running.

use std::sync::Arc;

use crate::platform::{self, KeyState};

use super::keys::{KeyCode, MAX_KEY_CODE};

/// Stateless query of whether a key is physically depressed right now
pub struct KeyStateProbe {
    source: Arc<dyn KeyState>,
}

impl KeyStateProbe {
    pub fn new(source: Arc<dyn KeyState>) -> Self {
        Self { source }
    }

    /// Probe backed by this platform's hardware key state.
    pub fn native() -> Self {
        Self::new(platform::native_key_state())
    }

    /// Whether the key is currently held. Unknown key codes are never
    /// pressed rather than an error.
    pub fn is_pressed(&self, key_code: KeyCode) -> bool {
        if key_code > MAX_KEY_CODE {
            return false;
        }
        self.source.is_pressed(key_code)
    }
}
