pub mod clock;
pub mod context;
pub mod effects;
pub mod entity;
pub mod serde_defaults;

// Re-exports for convenience
pub use clock::{SimClock, TimeSource};
pub use context::{ConfigError, EngineConfig, EngineConfigExt};
pub use effects::{
    AddOutcome, ArchetypeId, DefinitionSet, Effect, EffectBuilder, EffectDefinition, EffectId,
    EffectKind, EffectQuery, EffectRegistry, EffectScript, EffectSnapshot, RegistryError,
    RegistryEvent, Slot, SourceRef, StackPolicy,
};
pub use entity::{Entity, EntityId, Position};
