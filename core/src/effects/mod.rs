//! Status effect ("buff") lifecycle and stacking
//!
//! This module provides:
//! - **Definitions**: Archetype templates (loaded from TOML)
//! - **Effects**: Runtime state of one applied effect instance
//! - **Scripts**: Per-archetype lifecycle hooks
//! - **Registry**: Per-entity slot storage that merges, expires and removes effects
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  EffectDefinition (TOML config)                  │
//! │       "slow: kind=slow, stacks_and_overlaps, 3s, max 100"        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                     instantiate(owner)
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     EffectRegistry::add                          │
//! │   same archetype active? ── yes ──▶ existing.stack(incoming)     │
//! │            │                          replace / overlap / merge  │
//! │            no                                                    │
//! │            ▼                                                     │
//! │     lowest free slot ──▶ on_activate                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                     update(now) each tick
//!                              │
//!                              ▼
//!           policy expiry: remove, or decay a stack and restart
//! ```

mod definition;
mod effect;
mod error;
pub mod loader;
mod registry;
mod script;


pub use definition::{
    ArchetypeId, DefinitionConfig, DefinitionSet, EffectDefinition, EffectKind, StackPolicy,
};
pub use effect::{
    Effect, EffectBuilder, EffectId, EffectSnapshot, EffectState, ExpiryAction, MergeAction,
    Slot, SourceRef, StackChange,
};
pub use error::{DefinitionError, EffectError, RegistryError};
pub use registry::{AddOutcome, EffectQuery, EffectRegistry, RegistryEvent};
pub use script::{EffectScript, KindImmunity, NoopScript};
