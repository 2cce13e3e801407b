//! Key codes, modifier flags, and key-combination identity
//!
//! A [`KeyCombo`] pairs a virtual key code with the set of modifier keys
//! that must be held with it. Two combos are the same registry entry iff
//! both fields are equal; there is no partial or "at least these
//! modifiers" matching anywhere in the subsystem.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::HotkeyError;

/// Virtual key code identifying a physical key
pub type KeyCode = u16;

/// Highest virtual key code the keyboard layer produces
pub const MAX_KEY_CODE: KeyCode = 0x7F;

/// Virtual key codes for common non-character keys
pub mod codes {
    use super::KeyCode;

    pub const RETURN: KeyCode = 36;
    pub const TAB: KeyCode = 48;
    pub const SPACE: KeyCode = 49;
    pub const DELETE: KeyCode = 51;
    pub const ESCAPE: KeyCode = 53;
    pub const LEFT: KeyCode = 123;
    pub const RIGHT: KeyCode = 124;
    pub const DOWN: KeyCode = 125;
    pub const UP: KeyCode = 126;
}

/// Keys the OS swallows when bound without any modifier
const RESERVED_BARE: &[KeyCode] = &[
    codes::RETURN,
    codes::TAB,
    codes::SPACE,
    codes::DELETE,
    codes::ESCAPE,
    codes::LEFT,
    codes::RIGHT,
    codes::DOWN,
    codes::UP,
];

/// The set of modifier keys held during an event or required by a combo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Command/Meta key is held
    pub command: bool,
}

impl Modifiers {
    /// No modifier keys
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        option: false,
        command: false,
    };

    /// Check if no modifiers are held
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.option && !self.command
    }
}

/// A key code plus the modifiers that must accompany it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key_code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key_code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            key_code,
            modifiers,
        }
    }

    /// Reject key codes the keyboard layer never produces.
    pub fn validate(&self) -> Result<(), HotkeyError> {
        if self.key_code > MAX_KEY_CODE {
            return Err(HotkeyError::InvalidKeyCode(self.key_code));
        }
        Ok(())
    }

    /// Validation for the primary slot: additionally rejects modifier-less
    /// bindings on keys the OS reserves for itself.
    pub fn validate_for_primary(&self) -> Result<(), HotkeyError> {
        self.validate()?;
        if self.modifiers.is_empty() && RESERVED_BARE.contains(&self.key_code) {
            return Err(HotkeyError::ReservedCombo(*self));
        }
        Ok(())
    }

    /// Parse a binding like `"cmd+space"` or `"ctrl+opt+1"`.
    ///
    /// The last `+`-separated token names the key; every earlier token is a
    /// modifier (`shift`, `ctrl`, `opt`/`alt`, `cmd`).
    pub fn parse(binding: &str) -> Result<Self, HotkeyError> {
        let tokens: Vec<&str> = binding
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let Some((&key_token, modifier_tokens)) = tokens.split_last() else {
            return Err(HotkeyError::InvalidBinding(binding.to_string()));
        };

        let mut modifiers = Modifiers::NONE;
        for token in modifier_tokens {
            match token.to_ascii_lowercase().as_str() {
                "shift" => modifiers.shift = true,
                "ctrl" | "control" => modifiers.control = true,
                "opt" | "option" | "alt" => modifiers.option = true,
                "cmd" | "command" | "super" | "meta" => modifiers.command = true,
                _ => return Err(HotkeyError::InvalidBinding(binding.to_string())),
            }
        }

        let key_code = key_code_for_name(&key_token.to_ascii_lowercase())
            .ok_or_else(|| HotkeyError::InvalidBinding(binding.to_string()))?;

        Ok(Self {
            key_code,
            modifiers,
        })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.control {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.option {
            f.write_str("opt+")?;
        }
        if self.modifiers.shift {
            f.write_str("shift+")?;
        }
        if self.modifiers.command {
            f.write_str("cmd+")?;
        }
        match key_name(self.key_code) {
            Some(name) => f.write_str(name),
            None => write!(f, "key{}", self.key_code),
        }
    }
}

/// ANSI-layout name table, both parse and display directions
const KEY_NAMES: &[(KeyCode, &str)] = &[
    (0, "a"),
    (1, "s"),
    (2, "d"),
    (3, "f"),
    (4, "h"),
    (5, "g"),
    (6, "z"),
    (7, "x"),
    (8, "c"),
    (9, "v"),
    (11, "b"),
    (12, "q"),
    (13, "w"),
    (14, "e"),
    (15, "r"),
    (16, "y"),
    (17, "t"),
    (18, "1"),
    (19, "2"),
    (20, "3"),
    (21, "4"),
    (22, "6"),
    (23, "5"),
    (25, "9"),
    (26, "7"),
    (28, "8"),
    (29, "0"),
    (31, "o"),
    (32, "u"),
    (34, "i"),
    (35, "p"),
    (37, "l"),
    (38, "j"),
    (40, "k"),
    (45, "n"),
    (46, "m"),
    (codes::RETURN, "return"),
    (codes::TAB, "tab"),
    (codes::SPACE, "space"),
    (codes::DELETE, "delete"),
    (codes::ESCAPE, "escape"),
    (codes::LEFT, "left"),
    (codes::RIGHT, "right"),
    (codes::DOWN, "down"),
    (codes::UP, "up"),
];

fn key_code_for_name(name: &str) -> Option<KeyCode> {
    let canonical = match name {
        "enter" => "return",
        "esc" => "escape",
        "backspace" => "delete",
        other => other,
    };
    KEY_NAMES
        .iter()
        .find(|(_, n)| *n == canonical)
        .map(|(code, _)| *code)
}

fn key_name(code: KeyCode) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}
