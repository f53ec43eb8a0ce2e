//! Effect archetypes and their definitions
//!
//! Definitions are templates loaded from TOML files that describe an
//! archetype's kind, stacking policy and default numbers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use buffkit_types::{EffectKind, StackPolicy};

use super::{EffectBuilder, EffectError};
use crate::context::{IStr, intern, resolve};
use crate::entity::EntityId;

// ═══════════════════════════════════════════════════════════════════════════
// Archetype Identity
// ═══════════════════════════════════════════════════════════════════════════

/// Identity of a concrete effect archetype (e.g. "slow").
///
/// Two instances merge only when their archetypes are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(IStr);

impl ArchetypeId {
    pub fn new(name: &str) -> Self {
        Self(intern(name))
    }

    pub fn as_str(&self) -> &'static str {
        resolve(self.0)
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({:?})", self.as_str())
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for ArchetypeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ArchetypeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Effect Definitions
// ═══════════════════════════════════════════════════════════════════════════

/// Definition of an effect archetype (loaded from config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    /// Unique identifier, also the archetype name (e.g., "slow")
    pub id: String,

    /// Display name
    pub name: String,

    /// Whether this definition is currently enabled
    #[serde(default = "crate::serde_defaults::default_true")]
    pub enabled: bool,

    pub kind: EffectKind,

    pub policy: StackPolicy,

    /// Lifetime in seconds (None = permanent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f32>,

    // ─── Stacks ─────────────────────────────────────────────────────────────
    /// Stacks carried by a fresh application
    #[serde(default = "crate::serde_defaults::default_stacks")]
    pub stacks: u32,

    #[serde(default = "crate::serde_defaults::default_stacks")]
    pub min_stacks: u32,

    #[serde(default = "crate::serde_defaults::default_stacks")]
    pub max_stacks: u32,

    /// Suppressed from external presentation
    #[serde(default)]
    pub hidden: bool,
}

impl EffectDefinition {
    pub fn archetype(&self) -> ArchetypeId {
        ArchetypeId::new(&self.id)
    }

    /// Check the numbers are usable; returns the reason when they are not
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if let Some(d) = self.duration_secs
            && (d.is_nan() || d < 0.0)
        {
            return Err(format!("duration_secs must be non-negative, got {d}"));
        }
        if self.min_stacks > self.max_stacks {
            return Err(format!(
                "min_stacks {} is above max_stacks {}",
                self.min_stacks, self.max_stacks
            ));
        }
        if self.stacks == 0 || self.stacks < self.min_stacks || self.stacks > self.max_stacks {
            return Err(format!(
                "stacks {} is outside {}..={}",
                self.stacks, self.min_stacks, self.max_stacks
            ));
        }
        Ok(())
    }

    /// Start building an instance of this archetype on `owner`
    pub fn instantiate(&self, owner: EntityId) -> EffectBuilder {
        let builder = EffectBuilder::new(self.archetype(), owner)
            .kind(self.kind)
            .policy(self.policy)
            .stacks(self.stacks)
            .stack_bounds(self.min_stacks, self.max_stacks)
            .hidden(self.hidden);

        match self.duration_secs {
            Some(d) => builder.duration(d),
            None => builder.permanent(),
        }
    }

    /// Shortcut for `instantiate(owner).caster(caster).build()`
    pub fn apply_from(
        &self,
        owner: EntityId,
        caster: EntityId,
    ) -> Result<super::Effect, EffectError> {
        self.instantiate(owner).caster(caster).build()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Config File Structure
// ═══════════════════════════════════════════════════════════════════════════

/// Root structure for effect definition files (TOML)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionConfig {
    /// Effect definitions in this file
    #[serde(default, rename = "effect")]
    pub effects: Vec<EffectDefinition>,
}

/// Combined set of effect definitions
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    /// All effect definitions, keyed by ID
    pub effects: HashMap<String, EffectDefinition>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add definitions. If `overwrite` is true, replaces existing definitions with same ID.
    /// Returns IDs of duplicates that were encountered (skipped if !overwrite, replaced if overwrite).
    pub fn add_definitions(
        &mut self,
        definitions: Vec<EffectDefinition>,
        overwrite: bool,
    ) -> Vec<String> {
        let mut duplicates = Vec::new();
        for def in definitions {
            if self.effects.contains_key(&def.id) {
                tracing::warn!(id = %def.id, overwrite, "Duplicate effect definition");
                duplicates.push(def.id.clone());
                if !overwrite {
                    continue;
                }
            }
            self.effects.insert(def.id.clone(), def);
        }
        duplicates
    }

    /// Get an effect definition by ID
    pub fn get(&self, id: &str) -> Option<&EffectDefinition> {
        self.effects.get(id)
    }

    /// Get an enabled definition by ID
    pub fn get_enabled(&self, id: &str) -> Option<&EffectDefinition> {
        self.effects.get(id).filter(|def| def.enabled)
    }

    /// Get all enabled effect definitions
    pub fn enabled(&self) -> impl Iterator<Item = &EffectDefinition> {
        self.effects.values().filter(|def| def.enabled)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, policy: StackPolicy) -> EffectDefinition {
        EffectDefinition {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            kind: EffectKind::Slow,
            policy,
            duration_secs: Some(3.0),
            stacks: 1,
            min_stacks: 1,
            max_stacks: 100,
            hidden: false,
        }
    }

    #[test]
    fn test_archetype_identity() {
        assert_eq!(ArchetypeId::new("slow"), ArchetypeId::new("slow"));
        assert_ne!(ArchetypeId::new("slow"), ArchetypeId::new("haste"));
        assert_eq!(ArchetypeId::new("slow").to_string(), "slow");
    }

    #[test]
    fn test_instantiate_copies_numbers() {
        let slow = def("slow", StackPolicy::StacksAndOverlaps);
        let effect = slow.apply_from(EntityId(7), EntityId(3)).unwrap();

        assert_eq!(effect.archetype(), ArchetypeId::new("slow"));
        assert_eq!(effect.kind(), EffectKind::Slow);
        assert_eq!(effect.policy(), StackPolicy::StacksAndOverlaps);
        assert_eq!(effect.max_stacks(), 100);
        assert_eq!(effect.duration(), 3.0);
        assert_eq!(effect.owner(), EntityId(7));
        assert_eq!(effect.caster(), EntityId(3));
    }

    #[test]
    fn test_missing_duration_is_permanent() {
        let mut aura = def("aura", StackPolicy::ReplaceExisting);
        aura.duration_secs = None;
        let effect = aura.instantiate(EntityId(1)).build().unwrap();
        assert!(effect.duration().is_infinite());
        assert!(effect.remaining_duration(1.0e6) > 0.0);
    }

    #[test]
    fn test_validate() {
        let mut bad = def("slow", StackPolicy::StacksAndRenews);
        assert!(bad.validate().is_ok());

        bad.min_stacks = 5;
        bad.max_stacks = 2;
        assert!(bad.validate().is_err());

        let mut zero = def("slow", StackPolicy::StacksAndRenews);
        zero.stacks = 0;
        zero.min_stacks = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_duplicates_respect_overwrite() {
        let mut set = DefinitionSet::new();
        set.add_definitions(vec![def("slow", StackPolicy::StacksAndOverlaps)], false);

        let dupes = set.add_definitions(vec![def("slow", StackPolicy::ReplaceExisting)], false);
        assert_eq!(dupes, vec!["slow".to_string()]);
        assert_eq!(set.get("slow").unwrap().policy, StackPolicy::StacksAndOverlaps);

        set.add_definitions(vec![def("slow", StackPolicy::ReplaceExisting)], true);
        assert_eq!(set.get("slow").unwrap().policy, StackPolicy::ReplaceExisting);
        assert_eq!(set.len(), 1);
    }
}
