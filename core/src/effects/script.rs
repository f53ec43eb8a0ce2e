//! Per-archetype effect behavior

use super::{EffectKind, EffectSnapshot};

/// Trait for archetype behavior that reacts to an effect's lifecycle.
/// Implement this for slows, shields, auras, etc.
///
/// Every hook receives a snapshot of the instance it belongs to. Hooks never
/// see the registry, so they cannot add or remove effects while the registry
/// is in the middle of an operation.
pub trait EffectScript {
    /// Called once when the instance takes a slot in its owner's registry
    fn on_activate(&mut self, _effect: &EffectSnapshot) {}

    /// Called once when the instance leaves its owner's registry
    fn on_deactivate(&mut self, _effect: &EffectSnapshot) {}

    /// Called on every update pass with the time since the previous pass
    fn on_update(&mut self, _effect: &EffectSnapshot, _elapsed: f32) {}

    /// Called when the stored stack count changed
    fn on_stacks_changed(&mut self, _effect: &EffectSnapshot, _previous: u32, _delta: i32) {}

    /// Called on every active instance before a new effect is added to the
    /// same owner. Returning false rejects the incoming effect.
    fn allows_add(&mut self, _effect: &EffectSnapshot, _incoming: &EffectSnapshot) -> bool {
        true
    }
}

/// Script for archetypes with no behavior of their own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScript;

impl EffectScript for NoopScript {}

/// Rejects incoming effects of the listed kinds while active.
///
/// Effects the owner applies to itself are always allowed.
#[derive(Debug, Clone, Default)]
pub struct KindImmunity {
    blocked: Vec<EffectKind>,
}

impl KindImmunity {
    pub fn new(blocked: impl IntoIterator<Item = EffectKind>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }

    pub fn blocks(&self, kind: EffectKind) -> bool {
        self.blocked.contains(&kind)
    }
}

impl EffectScript for KindImmunity {
    fn allows_add(&mut self, effect: &EffectSnapshot, incoming: &EffectSnapshot) -> bool {
        incoming.caster == effect.owner || !self.blocks(incoming.kind)
    }
}
