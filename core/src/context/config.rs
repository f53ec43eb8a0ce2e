//! Engine configuration
//!
//! This module re-exports the shared config type from buffkit-types and
//! provides platform defaults and persistence for it.

use std::path::PathBuf;

pub use buffkit_types::{DEFAULT_SLOT_CAPACITY, EngineConfig};

use super::ConfigError;

const APP_NAME: &str = "buffkit";
const CONFIG_NAME: &str = "config";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Defaults
// ─────────────────────────────────────────────────────────────────────────────

fn default_definitions_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME).join("definitions"))
        .unwrap_or_else(|| PathBuf::from("definitions"))
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineConfig Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for EngineConfig persistence
pub trait EngineConfigExt: Sized {
    /// Load the stored config, creating a default one if none exists
    fn load() -> Result<Self, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    /// Parse a config from TOML text (missing fields take defaults)
    fn from_toml_str(text: &str) -> Result<Self, ConfigError>;
    /// Directory scanned for user effect definitions
    fn definitions_dir(&self) -> PathBuf;
    fn validate(&self) -> Result<(), ConfigError>;
}

impl EngineConfigExt for EngineConfig {
    fn load() -> Result<Self, ConfigError> {
        let config: EngineConfig = confy::load(APP_NAME, CONFIG_NAME)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn definitions_dir(&self) -> PathBuf {
        self.definitions_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_definitions_dir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_capacity == 0 {
            return Err(ConfigError::ZeroSlotCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffkit_types::EffectKind;

    #[test]
    fn test_from_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            slot_capacity = 8
            detrimental_kinds = ["combat_dehancer", "suppression"]
            definitions_dir = "/srv/effects"
            "#,
        )
        .unwrap();

        assert_eq!(config.slot_capacity, 8);
        assert_eq!(
            config.detrimental_kinds,
            vec![EffectKind::CombatDehancer, EffectKind::Suppression]
        );
        assert_eq!(config.definitions_dir(), PathBuf::from("/srv/effects"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = EngineConfig::from_toml_str("slot_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroSlotCapacity));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("detrimental_kinds = [\"fear\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
