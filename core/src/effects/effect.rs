//! Effect instances (runtime state)
//!
//! An `Effect` is one applied status effect on one entity. Callers build it,
//! hand it to the owner's `EffectRegistry`, and from then on the registry is
//! the only thing that activates, merges, or removes it.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──add──▶ Active ──remove / expire / deplete──▶ Removed
//!                   │  ▲
//!                   └──┘ stack / renew (slot unchanged)
//! ```
//!
//! Methods on `Effect` never reach back into the registry. Anything that
//! would remove the instance is reported back as a `StackChange`,
//! `MergeAction` or `ExpiryAction` for the registry to carry out.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ArchetypeId, EffectError, EffectKind, EffectScript, NoopScript, StackPolicy};
use crate::entity::EntityId;

/// Registry-assigned identifier of an effect instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable storage position inside an entity's effect registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot(pub u16);

impl Slot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ability or item instance that created an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum SourceRef {
    Spell(u64),
    Item(u64),
}

/// Where an effect is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectState {
    /// Built but never added to a registry
    Pending,
    /// Occupying a slot in its owner's registry
    Active,
    /// Removed from its registry (terminal)
    Removed,
}

/// Result of a stack count update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackChange {
    pub previous: u32,
    pub current: u32,
    pub delta: i32,
    /// The unclamped count fell below the minimum (or hit zero), so the
    /// instance must be removed
    pub depleted: bool,
}

impl StackChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// What the registry must do after an incoming instance was stacked onto an
/// existing one
#[derive(Debug)]
pub enum MergeAction {
    /// Put the incoming instance in the existing one's slot and remove the existing one
    Replace(Effect),
    /// Put the incoming instance in the existing one's slot, keeping both active
    Overlap(Effect),
    /// The existing instance absorbed the incoming one
    Merged { change: StackChange, renewed: bool },
}

/// What the registry must do after an update tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// Still running
    Continue,
    /// Duration ran out, remove the instance
    Expire,
    /// Duration ran out, one stack decayed and the timer restarted
    Decayed(StackChange),
}

/// Read-only view of an effect instance.
///
/// Passed to script hooks, and serializable for collaborators that need to
/// persist or sync active effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSnapshot {
    pub id: Option<EffectId>,
    pub archetype: ArchetypeId,
    pub kind: EffectKind,
    pub policy: StackPolicy,
    pub slot: Option<Slot>,
    pub stacks: u32,
    pub min_stacks: u32,
    pub max_stacks: u32,
    pub start_time: f32,
    pub duration: f32,
    pub owner: EntityId,
    pub caster: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    pub hidden: bool,
}

impl EffectSnapshot {
    /// Remaining duration at `now` (negative once expired)
    pub fn remaining_duration(&self, now: f32) -> f32 {
        self.duration - (now - self.start_time)
    }
}

/// A single applied status effect
pub struct Effect {
    id: Option<EffectId>,
    archetype: ArchetypeId,
    kind: EffectKind,
    policy: StackPolicy,
    /// Policy this instance imposes when merged onto an existing one
    policy_override: Option<StackPolicy>,
    state: EffectState,
    slot: Option<Slot>,

    // ─── Stacks ─────────────────────────────────────────────────────────────
    stacks: u32,
    min_stacks: u32,
    max_stacks: u32,

    // ─── Timing (simulation seconds) ────────────────────────────────────────
    duration: f32,
    start_time: f32,
    /// Time of the last update pass this instance saw (activation time before the first)
    last_update: f32,

    // ─── Relationships ──────────────────────────────────────────────────────
    owner: EntityId,
    caster: EntityId,
    source: Option<SourceRef>,

    hidden: bool,
    script: Box<dyn EffectScript>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("archetype", &self.archetype)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("slot", &self.slot)
            .field("stacks", &self.stacks)
            .field("duration", &self.duration)
            .field("start_time", &self.start_time)
            .field("owner", &self.owner)
            .field("caster", &self.caster)
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// Start building an effect of the given archetype for `owner`
    pub fn builder(archetype: ArchetypeId, owner: EntityId) -> EffectBuilder {
        EffectBuilder::new(archetype, owner)
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn id(&self) -> Option<EffectId> {
        self.id
    }

    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn policy(&self) -> StackPolicy {
        self.policy
    }

    pub fn policy_override(&self) -> Option<StackPolicy> {
        self.policy_override
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EffectState::Active
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    pub fn min_stacks(&self) -> u32 {
        self.min_stacks
    }

    pub fn max_stacks(&self) -> u32 {
        self.max_stacks
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn caster(&self) -> EntityId {
        self.caster
    }

    pub fn source(&self) -> Option<SourceRef> {
        self.source
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// `duration - (now - start_time)`; negative once expired
    pub fn remaining_duration(&self, now: f32) -> f32 {
        self.duration - (now - self.start_time)
    }

    pub fn snapshot(&self) -> EffectSnapshot {
        EffectSnapshot {
            id: self.id,
            archetype: self.archetype,
            kind: self.kind,
            policy: self.policy,
            slot: self.slot,
            stacks: self.stacks,
            min_stacks: self.min_stacks,
            max_stacks: self.max_stacks,
            start_time: self.start_time,
            duration: self.duration,
            owner: self.owner,
            caster: self.caster,
            source: self.source,
            hidden: self.hidden,
        }
    }

    // ─── Stacking ───────────────────────────────────────────────────────────

    /// Add `delta` stacks, clamped to `[min_stacks, max_stacks]`.
    ///
    /// The stack hook only fires when the stored count changed. Depletion is
    /// decided from the unclamped sum, so a `-1` on a minimum-count instance
    /// depletes it even though the stored value stays at the minimum.
    pub fn apply_stacks(&mut self, delta: i32) -> StackChange {
        let previous = self.stacks;
        let unclamped = i64::from(previous) + i64::from(delta);
        let min = i64::from(self.min_stacks);
        self.stacks = unclamped.clamp(min, i64::from(self.max_stacks)) as u32;

        if self.stacks != previous {
            let snapshot = self.snapshot();
            self.script.on_stacks_changed(&snapshot, previous, delta);
        }

        StackChange {
            previous,
            current: self.stacks,
            delta,
            depleted: unclamped < min || self.stacks == 0,
        }
    }

    /// Restart the timer with a new duration. The old remaining time is
    /// discarded, not added.
    pub fn renew(&mut self, duration: f32, now: f32) {
        self.duration = duration;
        self.start_time = now;
    }

    /// Apply stacks, then renew. The renew happens even when the stack
    /// update depleted the instance.
    pub fn apply_stacks_and_renew(&mut self, delta: i32, duration: f32, now: f32) -> StackChange {
        let change = self.apply_stacks(delta);
        self.renew(duration, now);
        change
    }

    /// Merge a reapplied instance of the same archetype into this one.
    ///
    /// The incoming instance's policy override decides the action when
    /// present; otherwise this instance's own policy does.
    pub fn stack(&mut self, incoming: Effect, now: f32) -> MergeAction {
        let policy = incoming.policy_override.unwrap_or(self.policy);
        let delta = i32::try_from(incoming.stacks).unwrap_or(i32::MAX);

        match policy {
            StackPolicy::ReplaceExisting => MergeAction::Replace(incoming),
            StackPolicy::StacksAndContinue => MergeAction::Merged {
                change: self.apply_stacks(delta),
                renewed: false,
            },
            StackPolicy::StacksAndRenews => MergeAction::Merged {
                change: self.apply_stacks_and_renew(delta, incoming.duration, now),
                renewed: true,
            },
            StackPolicy::StacksAndOverlaps => MergeAction::Overlap(incoming),
        }
    }

    /// Per-tick update. Runs the script's update hook with the time since
    /// this instance's previous update (or its activation), then applies its
    /// own policy if its time has run out.
    pub fn on_update(&mut self, now: f32) -> ExpiryAction {
        let elapsed = (now - self.last_update).max(0.0);
        self.last_update = self.last_update.max(now);

        let snapshot = self.snapshot();
        self.script.on_update(&snapshot, elapsed);

        if self.remaining_duration(now) > 0.0 {
            return ExpiryAction::Continue;
        }

        if self.policy.decays_on_expiry() {
            ExpiryAction::Decayed(self.apply_stacks_and_renew(-1, self.duration, now))
        } else {
            ExpiryAction::Expire
        }
    }

    // ─── Registry-only transitions ──────────────────────────────────────────

    /// Pending → Active. Fires the activate hook.
    pub(super) fn activate(&mut self, id: EffectId, slot: Slot, now: f32) {
        debug_assert_eq!(self.state, EffectState::Pending);
        self.id = Some(id);
        self.slot = Some(slot);
        self.state = EffectState::Active;
        self.start_time = now;
        self.last_update = now;

        let snapshot = self.snapshot();
        self.script.on_activate(&snapshot);
    }

    /// Active → Removed. Fires the deactivate hook, then clears the slot.
    pub(super) fn deactivate(&mut self) -> Option<Slot> {
        debug_assert_eq!(self.state, EffectState::Active);
        let snapshot = self.snapshot();
        self.script.on_deactivate(&snapshot);

        self.state = EffectState::Removed;
        self.slot.take()
    }

    /// Ask this instance's script whether `incoming` may be added to the owner
    pub(super) fn allows_add(&mut self, incoming: &EffectSnapshot) -> bool {
        let snapshot = self.snapshot();
        self.script.allows_add(&snapshot, incoming)
    }
}

/// Builder for `Effect`.
///
/// Kind, policy and duration are required; everything else has a default.
pub struct EffectBuilder {
    archetype: ArchetypeId,
    owner: EntityId,
    kind: Option<EffectKind>,
    policy: Option<StackPolicy>,
    policy_override: Option<StackPolicy>,
    duration: Option<f32>,
    stacks: u32,
    min_stacks: u32,
    max_stacks: u32,
    caster: Option<EntityId>,
    source: Option<SourceRef>,
    hidden: bool,
    script: Option<Box<dyn EffectScript>>,
}

impl EffectBuilder {
    pub fn new(archetype: ArchetypeId, owner: EntityId) -> Self {
        Self {
            archetype,
            owner,
            kind: None,
            policy: None,
            policy_override: None,
            duration: None,
            stacks: 1,
            min_stacks: 1,
            max_stacks: 1,
            caster: None,
            source: None,
            hidden: false,
            script: None,
        }
    }

    pub fn kind(mut self, kind: EffectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn policy(mut self, policy: StackPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Make this instance impose `policy` when merged onto an existing instance
    pub fn policy_override(mut self, policy: StackPolicy) -> Self {
        self.policy_override = Some(policy);
        self
    }

    pub fn duration(mut self, duration: f32) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Never expires on its own
    pub fn permanent(mut self) -> Self {
        self.duration = Some(f32::INFINITY);
        self
    }

    pub fn stacks(mut self, stacks: u32) -> Self {
        self.stacks = stacks;
        self
    }

    pub fn stack_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_stacks = min;
        self.max_stacks = max;
        self
    }

    pub fn caster(mut self, caster: EntityId) -> Self {
        self.caster = Some(caster);
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn script(mut self, script: impl EffectScript + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    pub fn build(self) -> Result<Effect, EffectError> {
        let archetype = self.archetype;
        let kind = self.kind.ok_or(EffectError::MissingKind { archetype })?;
        let policy = self.policy.ok_or(EffectError::MissingPolicy { archetype })?;
        let duration = self
            .duration
            .ok_or(EffectError::MissingDuration { archetype })?;

        if duration.is_nan() || duration < 0.0 {
            return Err(EffectError::InvalidDuration { archetype, duration });
        }
        if self.min_stacks > self.max_stacks {
            return Err(EffectError::InvalidStackBounds {
                archetype,
                min: self.min_stacks,
                max: self.max_stacks,
            });
        }
        if self.stacks == 0 || self.stacks < self.min_stacks || self.stacks > self.max_stacks {
            return Err(EffectError::StacksOutOfRange {
                archetype,
                stacks: self.stacks,
                min: self.min_stacks,
                max: self.max_stacks,
            });
        }

        Ok(Effect {
            id: None,
            archetype,
            kind,
            policy,
            policy_override: self.policy_override,
            state: EffectState::Pending,
            slot: None,
            stacks: self.stacks,
            min_stacks: self.min_stacks,
            max_stacks: self.max_stacks,
            duration,
            start_time: 0.0,
            last_update: 0.0,
            owner: self.owner,
            caster: self.caster.unwrap_or(self.owner),
            source: self.source,
            hidden: self.hidden,
            script: self.script.unwrap_or_else(|| Box::new(NoopScript)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slow(policy: StackPolicy, stacks: u32, max: u32, duration: f32) -> Effect {
        Effect::builder(ArchetypeId::new("slow"), EntityId(1))
            .kind(EffectKind::Slow)
            .policy(policy)
            .duration(duration)
            .stacks(stacks)
            .stack_bounds(1, max)
            .build()
            .unwrap()
    }

    #[test]
    fn test_apply_stacks_clamps() {
        let mut effect = slow(StackPolicy::StacksAndContinue, 2, 5, 3.0);

        for delta in [-100, -3, -1, 0, 1, 2, 7, 100, i32::MAX, i32::MIN] {
            effect.apply_stacks(delta);
            assert!(effect.stacks() >= 1 && effect.stacks() <= 5, "delta {delta}");
        }
    }

    #[test]
    fn test_depletion_uses_unclamped_sum() {
        let mut effect = slow(StackPolicy::StacksAndContinue, 1, 3, 3.0);

        let change = effect.apply_stacks(-1);
        assert_eq!(change.current, 1);
        assert!(!change.changed());
        assert!(change.depleted);

        let change = effect.apply_stacks(5);
        assert_eq!(change.current, 3);
        assert!(!change.depleted);
    }

    #[test]
    fn test_renew_is_not_additive() {
        let mut effect = slow(StackPolicy::StacksAndRenews, 1, 1, 3.0);
        effect.renew(3.0, 0.0);
        effect.renew(5.0, 1.0);

        assert_eq!(effect.duration(), 5.0);
        assert_eq!(effect.start_time(), 1.0);
        assert_eq!(effect.remaining_duration(1.0), 5.0);
        assert_eq!(effect.remaining_duration(7.0), -1.0);
    }

    #[test]
    fn test_renew_runs_even_when_depleted() {
        let mut effect = slow(StackPolicy::StacksAndContinue, 1, 1, 3.0);

        let change = effect.apply_stacks_and_renew(-1, 4.0, 9.0);
        assert!(change.depleted);
        assert_eq!(effect.duration(), 4.0);
        assert_eq!(effect.start_time(), 9.0);
    }

    #[test]
    fn test_stack_dispatch_uses_override() {
        let mut existing = slow(StackPolicy::StacksAndOverlaps, 1, 5, 3.0);

        let incoming = Effect::builder(ArchetypeId::new("slow"), EntityId(1))
            .kind(EffectKind::Slow)
            .policy(StackPolicy::StacksAndOverlaps)
            .policy_override(StackPolicy::StacksAndContinue)
            .duration(9.0)
            .stacks(2)
            .stack_bounds(1, 5)
            .build()
            .unwrap();

        match existing.stack(incoming, 1.0) {
            MergeAction::Merged { change, renewed } => {
                assert_eq!(change.current, 3);
                assert!(!renewed);
            }
            other => panic!("expected merge, got {other:?}"),
        }
        assert_eq!(existing.duration(), 3.0);

        let plain = slow(StackPolicy::ReplaceExisting, 1, 5, 3.0);
        assert!(matches!(existing.stack(plain, 1.0), MergeAction::Overlap(_)));
    }

    #[test]
    fn test_on_update_expiry_by_policy() {
        let mut renews = slow(StackPolicy::StacksAndRenews, 1, 1, 3.0);
        assert_eq!(renews.on_update(2.0), ExpiryAction::Continue);
        assert_eq!(renews.on_update(3.0), ExpiryAction::Expire);

        let mut continues = slow(StackPolicy::StacksAndContinue, 2, 2, 3.0);
        match continues.on_update(3.5) {
            ExpiryAction::Decayed(change) => {
                assert_eq!(change.current, 1);
                assert!(!change.depleted);
            }
            other => panic!("expected decay, got {other:?}"),
        }
        assert_eq!(continues.remaining_duration(3.5), 3.0);
    }

    #[test]
    fn test_builder_rejects_bad_input() {
        let archetype = ArchetypeId::new("slow");
        let base = || {
            Effect::builder(archetype, EntityId(1))
                .kind(EffectKind::Slow)
                .policy(StackPolicy::ReplaceExisting)
                .duration(1.0)
        };

        assert!(base().build().is_ok());
        assert_eq!(
            Effect::builder(archetype, EntityId(1))
                .kind(EffectKind::Slow)
                .duration(1.0)
                .build()
                .unwrap_err(),
            EffectError::MissingPolicy { archetype }
        );
        assert!(matches!(
            base().stack_bounds(3, 2).build(),
            Err(EffectError::InvalidStackBounds { .. })
        ));
        assert!(matches!(
            base().stack_bounds(1, 3).stacks(4).build(),
            Err(EffectError::StacksOutOfRange { .. })
        ));
        assert!(matches!(
            base().duration(f32::NAN).build(),
            Err(EffectError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_caster_defaults_to_owner() {
        let effect = slow(StackPolicy::ReplaceExisting, 1, 1, 1.0);
        assert_eq!(effect.caster(), effect.owner());
        assert_eq!(effect.state(), EffectState::Pending);
        assert_eq!(effect.slot(), None);
    }
}
