mod config;
mod error;
mod interner;

pub use config::{DEFAULT_SLOT_CAPACITY, EngineConfig, EngineConfigExt};
pub use error::ConfigError;
pub use interner::{IStr, intern, interner, lookup, resolve};
