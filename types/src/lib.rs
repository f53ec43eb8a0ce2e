//! Shared effect and configuration types for buffkit
//!
//! This crate contains the serializable types shared between the effect
//! engine (buffkit-core) and anything that reads or writes its config files.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Effect Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Broad category of a status effect.
///
/// Used for coarse queries and bulk clearing. Merge matching between two
/// instances uses the archetype, not the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Engine bookkeeping effects, never shown to players
    Internal,
    Haste,
    Aura,
    CombatEnchancer,
    Damage,
    Shred,
    Slow,
    CombatDehancer,
    Invisibility,
    Suppression,
    Net,
    Heal,
    Stun,
    /// Charge counters (ammo, stored casts)
    AmmoStack,
    Invulnerability,
    Silence,
    Poison,
    Snare,
    Blind,
    SpellImmunity,
}

impl EffectKind {
    /// Every kind, in declaration order
    pub const ALL: [EffectKind; 20] = [
        EffectKind::Internal,
        EffectKind::Haste,
        EffectKind::Aura,
        EffectKind::CombatEnchancer,
        EffectKind::Damage,
        EffectKind::Shred,
        EffectKind::Slow,
        EffectKind::CombatDehancer,
        EffectKind::Invisibility,
        EffectKind::Suppression,
        EffectKind::Net,
        EffectKind::Heal,
        EffectKind::Stun,
        EffectKind::AmmoStack,
        EffectKind::Invulnerability,
        EffectKind::Silence,
        EffectKind::Poison,
        EffectKind::Snare,
        EffectKind::Blind,
        EffectKind::SpellImmunity,
    ];

    /// Config-file spelling of this kind (matches the serde name)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Haste => "haste",
            Self::Aura => "aura",
            Self::CombatEnchancer => "combat_enchancer",
            Self::Damage => "damage",
            Self::Shred => "shred",
            Self::Slow => "slow",
            Self::CombatDehancer => "combat_dehancer",
            Self::Invisibility => "invisibility",
            Self::Suppression => "suppression",
            Self::Net => "net",
            Self::Heal => "heal",
            Self::Stun => "stun",
            Self::AmmoStack => "ammo_stack",
            Self::Invulnerability => "invulnerability",
            Self::Silence => "silence",
            Self::Poison => "poison",
            Self::Snare => "snare",
            Self::Blind => "blind",
            Self::SpellImmunity => "spell_immunity",
        }
    }

    /// Parse the config-file spelling of a kind
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a reapplied effect combines with an active instance of the same
/// archetype, and what happens when an instance runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPolicy {
    /// The new instance fully supersedes the old one. Removed on expiry.
    ReplaceExisting,
    /// Stacks accumulate and the timer restarts with the new duration.
    /// Removed on expiry.
    StacksAndRenews,
    /// Both instances stay active and expire independently.
    StacksAndOverlaps,
    /// Stacks accumulate while the existing timer keeps running.
    /// On expiry one stack decays and the timer restarts.
    StacksAndContinue,
}

impl StackPolicy {
    pub const ALL: [StackPolicy; 4] = [
        StackPolicy::ReplaceExisting,
        StackPolicy::StacksAndRenews,
        StackPolicy::StacksAndOverlaps,
        StackPolicy::StacksAndContinue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplaceExisting => "replace_existing",
            Self::StacksAndRenews => "stacks_and_renews",
            Self::StacksAndOverlaps => "stacks_and_overlaps",
            Self::StacksAndContinue => "stacks_and_continue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// True if expiry decays a stack instead of removing the instance
    pub fn decays_on_expiry(&self) -> bool {
        matches!(self, Self::StacksAndContinue)
    }
}

impl std::fmt::Display for StackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default number of effect slots per entity
pub const DEFAULT_SLOT_CAPACITY: usize = 255;

fn default_slot_capacity() -> usize {
    DEFAULT_SLOT_CAPACITY
}

fn default_detrimental_kinds() -> Vec<EffectKind> {
    vec![
        EffectKind::CombatDehancer,
        EffectKind::Suppression,
        EffectKind::Slow,
        EffectKind::Shred,
        EffectKind::Net,
        EffectKind::Stun,
        EffectKind::Silence,
        EffectKind::Poison,
        EffectKind::Snare,
        EffectKind::Blind,
    ]
}

/// Engine-wide settings, persisted as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of distinct slots an entity's registry may hand out
    #[serde(default = "default_slot_capacity")]
    pub slot_capacity: usize,

    /// Kinds removed by a cleanse (`clear_negative`)
    #[serde(default = "default_detrimental_kinds")]
    pub detrimental_kinds: Vec<EffectKind>,

    /// Directory of user effect definitions (None = platform default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            detrimental_kinds: default_detrimental_kinds(),
            definitions_dir: None,
        }
    }
}

impl EngineConfig {
    /// Check whether a kind is treated as detrimental by cleanses
    pub fn is_detrimental(&self, kind: EffectKind) -> bool {
        self.detrimental_kinds.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        #[derive(Serialize)]
        struct Wrapper {
            kind: EffectKind,
        }
        for kind in EffectKind::ALL {
            let text = toml::to_string(&Wrapper { kind }).unwrap();
            assert_eq!(text.trim(), format!("kind = \"{}\"", kind.as_str()));
            assert_eq!(EffectKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.is_detrimental(EffectKind::CombatDehancer));
        assert!(config.is_detrimental(EffectKind::Suppression));
        assert!(!config.is_detrimental(EffectKind::Heal));
    }

    #[test]
    fn test_custom_detrimental_set() {
        let config: EngineConfig = toml::from_str(
            r#"
            slot_capacity = 16
            detrimental_kinds = ["stun", "poison"]
            "#,
        )
        .unwrap();
        assert_eq!(config.slot_capacity, 16);
        assert!(config.is_detrimental(EffectKind::Stun));
        assert!(!config.is_detrimental(EffectKind::Slow));
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrapper {
            policy: StackPolicy,
        }
        assert!(toml::from_str::<Wrapper>("policy = \"stacks_and_renews\"").is_ok());
        assert!(toml::from_str::<Wrapper>("policy = \"stack_forever\"").is_err());
    }
}
