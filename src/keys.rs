//! Key bindings and modifier state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Keyboard modifier state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyModifiers {
    pub const NONE: KeyModifiers = KeyModifiers { ctrl: false, shift: false, alt: false, meta: false };
    pub const CTRL: KeyModifiers = KeyModifiers { ctrl: true, shift: false, alt: false, meta: false };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// A key plus the exact set of modifiers that must be held.
///
/// Written as `Tab`, `Ctrl+z`, `Ctrl+Shift+Space`. The key part is compared
/// against the DOM `KeyboardEvent.key` value, ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyBinding {
    pub key: String,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self { key: key.into(), modifiers }
    }

    pub fn tab() -> Self {
        Self::new("Tab", KeyModifiers::NONE)
    }

    pub fn ctrl_z() -> Self {
        Self::new("z", KeyModifiers::CTRL)
    }

    pub fn matches(&self, key: &str, modifiers: KeyModifiers) -> bool {
        self.modifiers == modifiers && self.key.eq_ignore_ascii_case(key)
    }
}

impl FromStr for KeyBinding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::KeyBinding(s.to_string());
        let trimmed = s.trim();
        // "+" and "Ctrl++" bind the plus key
        let (prefix, key) = if trimmed == "+" {
            ("", "+")
        } else if let Some(prefix) = trimmed.strip_suffix("++") {
            (prefix, "+")
        } else {
            trimmed.rsplit_once('+').unwrap_or(("", trimmed))
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }

        let mut modifiers = KeyModifiers::default();
        for part in prefix.split('+').map(str::trim).filter(|_| !prefix.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                "meta" | "cmd" | "super" => modifiers.meta = true,
                _ => return Err(invalid()),
            }
        }
        Ok(Self::new(key, modifiers))
    }
}

impl TryFrom<String> for KeyBinding {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyBinding> for String {
    fn from(binding: KeyBinding) -> Self {
        binding.to_string()
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta+")?;
        }
        f.write_str(&self.key)
    }
}
