//! Error types for effect construction, registry operations and definition loading

use std::path::PathBuf;
use thiserror::Error;

use super::{ArchetypeId, EffectId};
use crate::entity::EntityId;

/// Errors when building an effect instance
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("effect {archetype} has no kind")]
    MissingKind { archetype: ArchetypeId },

    #[error("effect {archetype} has no stack policy")]
    MissingPolicy { archetype: ArchetypeId },

    #[error("effect {archetype} has no duration")]
    MissingDuration { archetype: ArchetypeId },

    #[error("effect {archetype} has invalid duration {duration}")]
    InvalidDuration { archetype: ArchetypeId, duration: f32 },

    #[error("effect {archetype} has min_stacks {min} above max_stacks {max}")]
    InvalidStackBounds {
        archetype: ArchetypeId,
        min: u32,
        max: u32,
    },

    #[error("effect {archetype} starts with {stacks} stacks, outside {min}..={max}")]
    StacksOutOfRange {
        archetype: ArchetypeId,
        stacks: u32,
        min: u32,
        max: u32,
    },
}

/// Errors from effect registry operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("no free effect slot on entity {owner} (capacity {capacity})")]
    Capacity { owner: EntityId, capacity: usize },

    #[error("effect {archetype} belongs to entity {effect_owner}, not {owner}")]
    OwnerMismatch {
        archetype: ArchetypeId,
        effect_owner: EntityId,
        owner: EntityId,
    },

    #[error("effect {archetype} was already removed and cannot be added again")]
    AlreadyRemoved { archetype: ArchetypeId },

    #[error("effect {archetype} is already active")]
    AlreadyActive { archetype: ArchetypeId },

    #[error("effect {0} is not active")]
    NotActive(EffectId),
}

/// Errors during effect definition loading
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse definition TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read definition directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid effect definition '{id}' in {path}: {reason}")]
    InvalidDefinition {
        path: PathBuf,
        id: String,
        reason: String,
    },
}
