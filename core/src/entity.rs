//! Entities that own effect registries
//!
//! Only what the effect engine needs from an entity lives here: identity,
//! a display name, a position, and the registry itself. Stats, movement and
//! combat belong to other systems.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{EngineConfig, IStr, intern, resolve};
use crate::effects::{AddOutcome, Effect, EffectId, EffectRegistry, RegistryError};

/// Runtime entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// World position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An animate entity and the effects on it
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: IStr,
    pub position: Position,
    effects: EffectRegistry,
}

impl Entity {
    pub fn new(id: EntityId, name: &str, position: Position, config: &EngineConfig) -> Self {
        Self {
            id,
            name: intern(name),
            position,
            effects: EffectRegistry::with_config(id, config),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        resolve(self.name)
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectRegistry {
        &mut self.effects
    }

    /// Add an effect to this entity's registry
    pub fn apply(&mut self, effect: Effect, now: f32) -> Result<AddOutcome, RegistryError> {
        self.effects.add(effect, now)
    }

    /// Run one update pass on this entity's effects
    pub fn update(&mut self, now: f32) -> Vec<EffectId> {
        self.effects.update(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{ArchetypeId, EffectKind, StackPolicy};

    #[test]
    fn test_entity_registry_is_owned_by_entity() {
        let config = EngineConfig::default();
        let mut target = Entity::new(EntityId(42), "Training Dummy", Position::new(3.0, 4.0), &config);
        assert_eq!(target.name(), "Training Dummy");
        assert_eq!(target.effects().owner(), EntityId(42));
        assert_eq!(target.position.distance_to(Position::default()), 5.0);

        let slow = Effect::builder(ArchetypeId::new("slow"), target.id())
            .kind(EffectKind::Slow)
            .policy(StackPolicy::StacksAndOverlaps)
            .duration(3.0)
            .caster(EntityId(7))
            .build()
            .unwrap();
        target.apply(slow, 0.0).unwrap();
        assert!(target.effects().has(EffectKind::Slow));

        let removed = target.update(3.0);
        assert_eq!(removed.len(), 1);
        assert!(target.effects().is_empty());
    }
}
