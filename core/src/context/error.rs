//! Error types for context operations

use thiserror::Error;

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("failed to parse configuration TOML")]
    Parse(#[source] toml::de::Error),

    #[error("slot capacity must be at least 1")]
    ZeroSlotCapacity,
}
