//! Configuration loading and management

use anyhow::{Context, Result};

use crate::hotkey::KeyCombo;

/// Environment variable holding the primary hotkey binding
const PRIMARY_ENV: &str = "KEYWATCH_PRIMARY";

/// Binding used when the environment does not override it
const DEFAULT_PRIMARY: &str = "cmd+space";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary hotkey to register at startup; `None` disables it
    pub primary: Option<KeyCombo>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_primary_binding(std::env::var(PRIMARY_ENV).ok().as_deref())
    }

    fn from_primary_binding(binding: Option<&str>) -> Result<Self> {
        let binding = binding.unwrap_or(DEFAULT_PRIMARY);
        let primary = match binding {
            "none" | "off" => None,
            binding => Some(
                KeyCombo::parse(binding)
                    .with_context(|| format!("invalid {} binding", PRIMARY_ENV))?,
            ),
        };
        Ok(Self { primary })
    }
}

#[cfg(test)]
mod tests {
    use crate::hotkey::keys::codes;

    use super::*;

    #[test]
    fn test_default_primary() {
        let config = Config::from_primary_binding(None).unwrap();
        let primary = config.primary.unwrap();
        assert_eq!(primary.key_code, codes::SPACE);
        assert!(primary.modifiers.command);
    }

    #[test]
    fn test_custom_primary() {
        let config = Config::from_primary_binding(Some("ctrl+opt+k")).unwrap();
        let primary = config.primary.unwrap();
        assert!(primary.modifiers.control);
        assert!(primary.modifiers.option);
    }

    #[test]
    fn test_disabled_primary() {
        let config = Config::from_primary_binding(Some("none")).unwrap();
        assert!(config.primary.is_none());
    }

    #[test]
    fn test_invalid_binding_is_an_error() {
        assert!(Config::from_primary_binding(Some("hyper+q")).is_err());
    }
}
