//! Per-entity effect registry
//!
//! Owns every active effect on one entity. Decides whether an added effect
//! takes a new slot or merges into an active instance of the same archetype,
//! and carries out the removals that merges, stack depletion and expiry ask for.
//!
//! All mutation happens synchronously inside the caller's invocation. Bulk
//! operations collect the matching ids first and remove afterwards, so no
//! removal ever happens while live storage is being iterated.

use hashbrown::{HashMap, HashSet};

use super::{
    ArchetypeId, Effect, EffectId, EffectKind, EffectSnapshot, ExpiryAction,
    MergeAction, RegistryError, Slot, StackChange,
};
use crate::context::EngineConfig;
use crate::entity::EntityId;

/// Largest slot table a registry can address with `Slot`
const MAX_SLOT_CAPACITY: usize = u16::MAX as usize + 1;

/// What a lookup matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectQuery {
    /// Broad category
    Kind(EffectKind),
    /// Concrete archetype
    Archetype(ArchetypeId),
}

impl EffectQuery {
    pub fn matches(&self, effect: &Effect) -> bool {
        match self {
            Self::Kind(kind) => effect.kind() == *kind,
            Self::Archetype(archetype) => effect.archetype() == *archetype,
        }
    }
}

impl From<EffectKind> for EffectQuery {
    fn from(kind: EffectKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<ArchetypeId> for EffectQuery {
    fn from(archetype: ArchetypeId) -> Self {
        Self::Archetype(archetype)
    }
}

/// How an `add` (or `replace`/`overlap`) was resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddOutcome {
    /// Took a free slot
    Inserted { id: EffectId, slot: Slot },
    /// Absorbed by the active instance `into`
    Merged { into: EffectId, change: StackChange },
    /// The merge depleted the active instance, which was removed
    Depleted { removed: EffectId },
    /// Took `removed`'s slot; `removed` is gone
    Replaced {
        id: EffectId,
        slot: Slot,
        removed: EffectId,
    },
    /// Shares a slot with the still-active `alongside`
    Overlapped {
        id: EffectId,
        slot: Slot,
        alongside: EffectId,
    },
    /// Vetoed by the active effect `by`
    Rejected { by: EffectId },
}

impl AddOutcome {
    /// Id of the newly activated instance, if one was activated
    pub fn activated(&self) -> Option<EffectId> {
        match self {
            Self::Inserted { id, .. } | Self::Replaced { id, .. } | Self::Overlapped { id, .. } => {
                Some(*id)
            }
            Self::Merged { .. } | Self::Depleted { .. } | Self::Rejected { .. } => None,
        }
    }
}

/// Something that happened inside a registry, queued for collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Activated {
        id: EffectId,
        archetype: ArchetypeId,
        slot: Slot,
    },
    Deactivated {
        id: EffectId,
        archetype: ArchetypeId,
        slot: Slot,
    },
    StacksChanged {
        id: EffectId,
        previous: u32,
        current: u32,
    },
    Renewed {
        id: EffectId,
        duration: f32,
    },
    Expired {
        id: EffectId,
    },
    Rejected {
        archetype: ArchetypeId,
        by: EffectId,
    },
}

/// Reference-counted slot occupancy.
///
/// A slot is free only when no active instance sits in it; overlapping
/// instances share their slot.
#[derive(Debug, Clone)]
struct SlotTable {
    occupants: Vec<u32>,
    capacity: usize,
}

impl SlotTable {
    fn new(capacity: usize) -> Self {
        Self {
            occupants: Vec::new(),
            capacity: capacity.min(MAX_SLOT_CAPACITY),
        }
    }

    /// Lowest slot index nobody occupies
    fn lowest_free(&self) -> Option<Slot> {
        if let Some(index) = self.occupants.iter().position(|&n| n == 0) {
            return Some(Slot(index as u16));
        }
        (self.occupants.len() < self.capacity).then(|| Slot(self.occupants.len() as u16))
    }

    fn occupy(&mut self, slot: Slot) {
        let index = slot.index();
        if index >= self.occupants.len() {
            self.occupants.resize(index + 1, 0);
        }
        self.occupants[index] += 1;
    }

    fn vacate(&mut self, slot: Slot) {
        if let Some(count) = self.occupants.get_mut(slot.index()) {
            *count = count.saturating_sub(1);
        }
        while self.occupants.last() == Some(&0) {
            self.occupants.pop();
        }
    }

    fn occupants(&self, slot: Slot) -> u32 {
        self.occupants.get(slot.index()).copied().unwrap_or(0)
    }
}

/// Active effects on one entity.
#[derive(Debug)]
pub struct EffectRegistry {
    /// Entity this registry belongs to
    owner: EntityId,

    /// Active effects in insertion order (newest last)
    effects: Vec<Effect>,

    /// Kind → active ids, in insertion order
    by_kind: HashMap<EffectKind, Vec<EffectId>>,

    slots: SlotTable,

    /// Kinds removed by `clear_negative`
    detrimental: HashSet<EffectKind>,

    next_id: u64,

    /// Queue of lifecycle events, drained by `take_events`
    events: Vec<RegistryEvent>,
}

impl EffectRegistry {
    /// Create a registry with the default engine config
    pub fn new(owner: EntityId) -> Self {
        Self::with_config(owner, &EngineConfig::default())
    }

    /// Create a registry with the given config.
    ///
    /// A `slot_capacity` of 0 is not clamped up: every insert into such a
    /// registry fails with `RegistryError::Capacity`. Capacities above the
    /// `Slot` range are capped at 65536.
    pub fn with_config(owner: EntityId, config: &EngineConfig) -> Self {
        if config.slot_capacity == 0 {
            tracing::warn!(%owner, "Effect registry created with zero slot capacity");
        }
        Self {
            owner,
            effects: Vec::new(),
            by_kind: HashMap::new(),
            slots: SlotTable::new(config.slot_capacity),
            detrimental: config.detrimental_kinds.iter().copied().collect(),
            next_id: 1,
            events: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn slot_capacity(&self) -> usize {
        self.slots.capacity
    }

    /// Number of active instances sitting in `slot`
    pub fn slot_occupants(&self, slot: Slot) -> u32 {
        self.slots.occupants(slot)
    }

    /// All active effects, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Effect> {
        self.effects.iter()
    }

    /// Active effects that are not hidden, newest first
    pub fn visible(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().rev().filter(|e| !e.is_hidden())
    }

    pub fn get_by_id(&self, id: EffectId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id() == Some(id))
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.position(id).is_some()
    }

    /// Snapshot of every active effect, oldest first
    pub fn snapshot(&self) -> Vec<EffectSnapshot> {
        self.effects.iter().map(Effect::snapshot).collect()
    }

    /// Drain the queue of lifecycle events
    pub fn take_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups (newest first)
    // ─────────────────────────────────────────────────────────────────────────

    /// Most recently added match
    pub fn get(&self, query: impl Into<EffectQuery>) -> Option<&Effect> {
        match query.into() {
            EffectQuery::Kind(kind) => self
                .by_kind
                .get(&kind)
                .and_then(|ids| ids.last())
                .and_then(|id| self.get_by_id(*id)),
            query => self.effects.iter().rev().find(|e| query.matches(e)),
        }
    }

    /// Every match, most recently added first
    pub fn get_all(&self, query: impl Into<EffectQuery>) -> Vec<&Effect> {
        let query = query.into();
        self.effects
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .collect()
    }

    pub fn has(&self, query: impl Into<EffectQuery>) -> bool {
        self.get(query).is_some()
    }

    /// Number of matches, optionally only those applied by `caster`
    pub fn count(&self, query: impl Into<EffectQuery>, caster: Option<EntityId>) -> usize {
        let query = query.into();
        self.effects
            .iter()
            .filter(|e| query.matches(e) && caster.is_none_or(|c| e.caster() == c))
            .count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Adding
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an effect.
    ///
    /// Any active effect may veto it first. If an instance of the same
    /// archetype is active, the incoming effect is stacked onto the newest
    /// such instance; otherwise it takes the lowest free slot.
    pub fn add(&mut self, effect: Effect, now: f32) -> Result<AddOutcome, RegistryError> {
        self.admit(&effect)?;
        if let Some(rejected) = self.veto(&effect) {
            return Ok(rejected);
        }

        let Some((index, existing)) = self.newest(EffectQuery::Archetype(effect.archetype()))
        else {
            return self.insert_in_free_slot(effect, now);
        };

        match self.effects[index].stack(effect, now) {
            MergeAction::Replace(incoming) => self.replace(existing, incoming, now),
            MergeAction::Overlap(incoming) => self.overlap(existing, incoming, now),
            MergeAction::Merged { change, renewed } => {
                self.record_stack_change(existing, change);
                if renewed {
                    let duration = self.effects[index].duration();
                    self.events.push(RegistryEvent::Renewed {
                        id: existing,
                        duration,
                    });
                }
                tracing::debug!(
                    owner = %self.owner,
                    id = %existing,
                    stacks = change.current,
                    renewed,
                    "Effect merged"
                );

                if change.depleted {
                    self.remove(existing);
                    return Ok(AddOutcome::Depleted { removed: existing });
                }
                Ok(AddOutcome::Merged {
                    into: existing,
                    change,
                })
            }
        }
    }

    /// Put an effect in the lowest free slot without merge matching.
    /// Active effects may still veto it.
    pub fn add_to_new_slot(&mut self, effect: Effect, now: f32) -> Result<AddOutcome, RegistryError> {
        self.admit(&effect)?;
        if let Some(rejected) = self.veto(&effect) {
            return Ok(rejected);
        }
        self.insert_in_free_slot(effect, now)
    }

    fn insert_in_free_slot(&mut self, effect: Effect, now: f32) -> Result<AddOutcome, RegistryError> {
        let slot = self.slots.lowest_free().ok_or(RegistryError::Capacity {
            owner: self.owner,
            capacity: self.slots.capacity,
        })?;
        let id = self.insert(slot, effect, now);
        Ok(AddOutcome::Inserted { id, slot })
    }

    /// Put `incoming` in `old`'s slot, then remove `old`
    pub fn replace(
        &mut self,
        old: EffectId,
        incoming: Effect,
        now: f32,
    ) -> Result<AddOutcome, RegistryError> {
        self.admit(&incoming)?;
        let slot = self.slot_of(old)?;
        let id = self.insert(slot, incoming, now);
        self.remove(old);
        Ok(AddOutcome::Replaced {
            id,
            slot,
            removed: old,
        })
    }

    /// Put `incoming` in `old`'s slot while `old` stays active
    pub fn overlap(
        &mut self,
        old: EffectId,
        incoming: Effect,
        now: f32,
    ) -> Result<AddOutcome, RegistryError> {
        self.admit(&incoming)?;
        let slot = self.slot_of(old)?;
        let id = self.insert(slot, incoming, now);
        Ok(AddOutcome::Overlapped {
            id,
            slot,
            alongside: old,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutating active effects
    // ─────────────────────────────────────────────────────────────────────────

    /// Change an active effect's stacks, removing it if they are depleted
    pub fn apply_stacks(&mut self, id: EffectId, delta: i32) -> Result<StackChange, RegistryError> {
        let index = self.position(id).ok_or(RegistryError::NotActive(id))?;
        let change = self.effects[index].apply_stacks(delta);
        self.record_stack_change(id, change);
        if change.depleted {
            self.remove(id);
        }
        Ok(change)
    }

    /// Restart an active effect's timer
    pub fn renew(&mut self, id: EffectId, duration: f32, now: f32) -> Result<(), RegistryError> {
        let index = self.position(id).ok_or(RegistryError::NotActive(id))?;
        self.effects[index].renew(duration, now);
        self.events.push(RegistryEvent::Renewed { id, duration });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removing
    // ─────────────────────────────────────────────────────────────────────────

    /// Deactivate and remove an effect, handing it back.
    ///
    /// Returns None if it is not active here; removing twice is a no-op.
    pub fn remove(&mut self, id: EffectId) -> Option<Effect> {
        let index = self.position(id)?;
        let slot = self.effects[index].deactivate();
        let effect = self.effects.remove(index);

        if let Some(ids) = self.by_kind.get_mut(&effect.kind()) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_kind.remove(&effect.kind());
            }
        }

        if let Some(slot) = slot {
            self.slots.vacate(slot);
            self.events.push(RegistryEvent::Deactivated {
                id,
                archetype: effect.archetype(),
                slot,
            });
        }

        tracing::debug!(
            owner = %self.owner,
            id = %id,
            archetype = %effect.archetype(),
            "Effect removed"
        );
        Some(effect)
    }

    /// Remove every match. Returns how many were removed.
    pub fn clear(&mut self, query: impl Into<EffectQuery>) -> usize {
        let ids = self.matching_ids(query.into());
        self.remove_all(ids)
    }

    /// Remove every effect whose kind is configured as detrimental
    pub fn clear_negative(&mut self) -> usize {
        let ids: Vec<EffectId> = self
            .effects
            .iter()
            .rev()
            .filter(|e| self.detrimental.contains(&e.kind()))
            .filter_map(Effect::id)
            .collect();
        self.remove_all(ids)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Time
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one update pass at `now`.
    ///
    /// Every effect active when the pass starts is updated once with the
    /// same `now`. Each script is told the time since that effect's own
    /// previous update, or since its activation on the first pass. Returns
    /// the ids removed during the pass.
    pub fn update(&mut self, now: f32) -> Vec<EffectId> {
        let ids: Vec<EffectId> = self.effects.iter().filter_map(Effect::id).collect();
        let mut removed = Vec::new();

        for id in ids {
            let Some(index) = self.position(id) else {
                continue;
            };

            match self.effects[index].on_update(now) {
                ExpiryAction::Continue => {}
                ExpiryAction::Expire => {
                    self.events.push(RegistryEvent::Expired { id });
                    if self.remove(id).is_some() {
                        removed.push(id);
                    }
                }
                ExpiryAction::Decayed(change) => {
                    self.record_stack_change(id, change);
                    let duration = self.effects[index].duration();
                    self.events.push(RegistryEvent::Renewed { id, duration });
                    if change.depleted {
                        self.events.push(RegistryEvent::Expired { id });
                        if self.remove(id).is_some() {
                            removed.push(id);
                        }
                    }
                }
            }
        }

        tracing::trace!(
            owner = %self.owner,
            now,
            active = self.effects.len(),
            removed = removed.len(),
            "Effect update pass"
        );
        removed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn position(&self, id: EffectId) -> Option<usize> {
        self.effects.iter().position(|e| e.id() == Some(id))
    }

    fn newest(&self, query: EffectQuery) -> Option<(usize, EffectId)> {
        self.effects
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, e)| query.matches(e))
            .find_map(|(index, e)| e.id().map(|id| (index, id)))
    }

    fn matching_ids(&self, query: EffectQuery) -> Vec<EffectId> {
        match query {
            EffectQuery::Kind(kind) => self
                .by_kind
                .get(&kind)
                .map(|ids| ids.iter().rev().copied().collect())
                .unwrap_or_default(),
            query => self
                .effects
                .iter()
                .rev()
                .filter(|e| query.matches(e))
                .filter_map(Effect::id)
                .collect(),
        }
    }

    fn slot_of(&self, id: EffectId) -> Result<Slot, RegistryError> {
        self.get_by_id(id)
            .and_then(Effect::slot)
            .ok_or(RegistryError::NotActive(id))
    }

    fn remove_all(&mut self, ids: Vec<EffectId>) -> usize {
        ids.into_iter()
            .filter(|id| self.remove(*id).is_some())
            .count()
    }

    /// Check an effect may enter this registry at all
    fn admit(&self, effect: &Effect) -> Result<(), RegistryError> {
        match effect.state() {
            super::EffectState::Pending => {}
            super::EffectState::Active => {
                return Err(RegistryError::AlreadyActive {
                    archetype: effect.archetype(),
                });
            }
            super::EffectState::Removed => {
                return Err(RegistryError::AlreadyRemoved {
                    archetype: effect.archetype(),
                });
            }
        }
        if effect.owner() != self.owner {
            return Err(RegistryError::OwnerMismatch {
                archetype: effect.archetype(),
                effect_owner: effect.owner(),
                owner: self.owner,
            });
        }
        Ok(())
    }

    /// Ask every active effect whether `incoming` may be added.
    /// Returns the rejection outcome if one of them refuses.
    fn veto(&mut self, incoming: &Effect) -> Option<AddOutcome> {
        let snapshot = incoming.snapshot();
        let by = self
            .effects
            .iter_mut()
            .find_map(|e| if e.allows_add(&snapshot) { None } else { e.id() })?;

        tracing::debug!(
            owner = %self.owner,
            archetype = %incoming.archetype(),
            by = %by,
            "Effect rejected"
        );
        self.events.push(RegistryEvent::Rejected {
            archetype: incoming.archetype(),
            by,
        });
        Some(AddOutcome::Rejected { by })
    }

    /// Activate an effect in `slot`
    fn insert(&mut self, slot: Slot, mut effect: Effect, now: f32) -> EffectId {
        let id = EffectId(self.next_id);
        self.next_id += 1;

        self.slots.occupy(slot);
        effect.activate(id, slot, now);
        self.by_kind.entry(effect.kind()).or_default().push(id);

        tracing::debug!(
            owner = %self.owner,
            id = %id,
            archetype = %effect.archetype(),
            %slot,
            stacks = effect.stacks(),
            "Effect activated"
        );
        self.events.push(RegistryEvent::Activated {
            id,
            archetype: effect.archetype(),
            slot,
        });
        self.effects.push(effect);
        id
    }

    fn record_stack_change(&mut self, id: EffectId, change: StackChange) {
        if change.changed() {
            self.events.push(RegistryEvent::StacksChanged {
                id,
                previous: change.previous,
                current: change.current,
            });
        }
    }
}
