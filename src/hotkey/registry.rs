//! Thread-safe mapping from key combinations to handlers
//!
//! One distinguished primary slot plus a map of secondary combos. Any
//! caller thread may mutate the registry while the monitor thread performs
//! lookups; handlers are cloned out of the lock before invocation, so no
//! reader ever observes a partially-constructed entry and no handler runs
//! with the lock held.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::keys::KeyCombo;
use super::HotkeyError;

/// Zero-argument callback invoked when a registered combination fires.
///
/// The registry keeps its own clone alive for as long as the entry is
/// registered, so callers are free to drop theirs.
pub type Handler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handlers matching one observed combination.
///
/// The primary slot and the secondary map are consulted independently; a
/// combo registered in both yields both handlers.
#[derive(Clone, Default)]
pub struct ComboMatch {
    pub primary: Option<Handler>,
    pub secondary: Option<Handler>,
}

impl ComboMatch {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }
}

#[derive(Default)]
struct Entries {
    primary: Option<(KeyCombo, Handler)>,
    secondary: HashMap<KeyCombo, Handler>,
}

/// Registry of key combinations bound to caller-owned handlers
#[derive(Default)]
pub struct CallbackRegistry {
    entries: RwLock<Entries>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the primary slot unconditionally.
    ///
    /// Replacing an existing primary is normal operation, never an error;
    /// only a structurally invalid combo fails.
    pub fn set_primary(&self, combo: KeyCombo, handler: Handler) -> Result<(), HotkeyError> {
        combo.validate_for_primary()?;
        let replaced = self.write().primary.replace((combo, handler)).is_some();
        debug!(%combo, replaced, "primary slot set");
        Ok(())
    }

    /// Remove the primary slot. Returns false if none was set.
    pub fn clear_primary(&self) -> bool {
        self.write().primary.take().is_some()
    }

    /// The combo currently occupying the primary slot, if any.
    pub fn primary_combo(&self) -> Option<KeyCombo> {
        self.read().primary.as_ref().map(|(combo, _)| *combo)
    }

    /// Insert or overwrite the handler for this exact combination.
    pub fn add_secondary(&self, combo: KeyCombo, handler: Handler) -> Result<(), HotkeyError> {
        combo.validate()?;
        self.write().secondary.insert(combo, handler);
        debug!(%combo, "secondary combo registered");
        Ok(())
    }

    /// Remove one secondary binding. Returns false if it was not present.
    pub fn remove_secondary(&self, combo: KeyCombo) -> bool {
        self.write().secondary.remove(&combo).is_some()
    }

    pub fn secondary_len(&self) -> usize {
        self.read().secondary.len()
    }

    /// Exact-match lookup, called by the monitor per observed event.
    pub fn lookup(&self, combo: KeyCombo) -> ComboMatch {
        let entries = self.read();
        ComboMatch {
            primary: entries
                .primary
                .as_ref()
                .filter(|(registered, _)| *registered == combo)
                .map(|(_, handler)| Arc::clone(handler)),
            secondary: entries.secondary.get(&combo).cloned(),
        }
    }

    /// Drop every registration. Used during teardown.
    pub fn clear(&self) {
        let mut entries = self.write();
        entries.primary = None;
        entries.secondary.clear();
    }
}
