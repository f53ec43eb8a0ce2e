use std::io::Write;
use std::path::PathBuf;

use buffkit_core::effects::KindImmunity;
use buffkit_core::{
    AddOutcome, ArchetypeId, Effect, EffectId, EffectKind, EffectQuery, EffectSnapshot,
    EngineConfigExt, Entity, EntityId, Position, RegistryEvent, StackPolicy, TimeSource,
};
use serde::Serialize;

use crate::CliContext;

/// Options for applying an effect from a definition
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest<'a> {
    pub effect: &'a str,
    pub target: i64,
    pub caster: Option<i64>,
    pub stacks: Option<u32>,
    pub duration: Option<f32>,
    pub policy: Option<&'a str>,
    /// Skip merge matching and always take a fresh slot
    pub new_slot: bool,
}

pub fn load_definitions(path: Option<&str>, ctx: &mut CliContext) -> Result<(), String> {
    let dir = path
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.config.definitions_dir());
    let count = ctx.reload_definitions(&dir)?;
    println!("loaded {count} definitions (user dir: {})", dir.display());
    Ok(())
}

pub fn list_definitions(ctx: &CliContext) -> Result<(), String> {
    let mut defs: Vec<_> = ctx.definitions.effects.values().collect();
    if defs.is_empty() {
        println!("No effect definitions loaded");
        return Ok(());
    }
    defs.sort_by(|a, b| a.id.cmp(&b.id));

    println!(
        "{:<20} {:<18} {:<22} {:>8} {:>10}",
        "Id", "Kind", "Policy", "Duration", "Stacks"
    );
    println!("{}", "-".repeat(82));
    for def in defs {
        let duration = def
            .duration_secs
            .map_or_else(|| "-".to_string(), |d| format!("{d:.1}s"));
        let mut flags = String::new();
        if !def.enabled {
            flags.push_str(" (disabled)");
        }
        if def.hidden {
            flags.push_str(" (hidden)");
        }
        if ctx.config.is_detrimental(def.kind) {
            flags.push_str(" (detrimental)");
        }
        println!(
            "{:<20} {:<18} {:<22} {:>8} {:>10}{}",
            def.id,
            def.kind,
            def.policy,
            duration,
            format!("{}/{}..{}", def.stacks, def.min_stacks, def.max_stacks),
            flags
        );
    }
    Ok(())
}

pub fn spawn(name: &str, x: f32, y: f32, ctx: &mut CliContext) -> Result<(), String> {
    let id = ctx.spawn(name, Position::new(x, y));
    println!("spawned {name} as entity {id}");
    Ok(())
}

pub fn apply(request: &ApplyRequest<'_>, ctx: &mut CliContext) -> Result<(), String> {
    let def = ctx
        .definitions
        .get_enabled(request.effect)
        .ok_or_else(|| format!("error: unknown or disabled effect '{}'\n", request.effect))?;

    let target = EntityId(request.target);
    let caster = request.caster.map_or(target, EntityId);
    ctx.entity(caster)?;

    let mut builder = def.instantiate(target).caster(caster);
    if let Some(stacks) = request.stacks {
        builder = builder.stacks(stacks);
    }
    if let Some(duration) = request.duration {
        builder = builder.duration(duration);
    }
    if let Some(name) = request.policy {
        builder = builder.policy_override(parse_policy(name)?);
    }
    if def.kind == EffectKind::SpellImmunity {
        builder = builder.script(KindImmunity::new(ctx.config.detrimental_kinds.clone()));
    }
    let effect = builder.build().map_err(|e| format!("error: {e}\n"))?;

    let now = ctx.clock.now();
    let entity = ctx.entity_mut(target)?;
    let outcome = if request.new_slot {
        entity.effects_mut().add_to_new_slot(effect, now)
    } else {
        entity.apply(effect, now)
    }
    .map_err(|e| format!("error: {e}\n"))?;

    println!("{}", describe_outcome(&outcome));
    print_events(entity);
    Ok(())
}

pub fn advance(seconds: f32, ctx: &mut CliContext) -> Result<(), String> {
    if seconds.is_nan() || seconds < 0.0 {
        return Err(format!("error: cannot advance by {seconds}\n"));
    }
    let now = ctx.clock.advance(seconds);

    let mut removed = 0;
    for entity in ctx.entities_mut() {
        removed += entity.update(now).len();
        print_events(entity);
    }
    println!("[{}] {removed} effects expired", ctx.clock.format_time());
    Ok(())
}

pub fn show(target: Option<i64>, all: bool, ctx: &CliContext) -> Result<(), String> {
    let now = ctx.clock.now();
    println!("time {}", ctx.clock.format_time());

    match target {
        Some(id) => print_entity(ctx.entity(EntityId(id))?, all, now),
        None => {
            let mut any = false;
            for entity in ctx.entities() {
                print_entity(entity, all, now);
                any = true;
            }
            if !any {
                println!("No entities spawned");
            }
        }
    }
    Ok(())
}

pub fn remove(target: i64, id: u64, ctx: &mut CliContext) -> Result<(), String> {
    let entity = ctx.entity_mut(EntityId(target))?;
    match entity.effects_mut().remove(EffectId(id)) {
        Some(effect) => println!("removed {} {}", effect.archetype(), EffectId(id)),
        None => println!("{} is not active on entity {target}", EffectId(id)),
    }
    print_events(entity);
    Ok(())
}

pub fn clear(
    target: i64,
    kind: Option<&str>,
    effect: Option<&str>,
    ctx: &mut CliContext,
) -> Result<(), String> {
    let query = parse_query(kind, effect)?;
    let entity = ctx.entity_mut(EntityId(target))?;
    let removed = entity.effects_mut().clear(query);
    println!("removed {removed} effects");
    print_events(entity);
    Ok(())
}

pub fn cleanse(target: i64, ctx: &mut CliContext) -> Result<(), String> {
    let entity = ctx.entity_mut(EntityId(target))?;
    let removed = entity.effects_mut().clear_negative();
    println!("cleansed {removed} detrimental effects");
    print_events(entity);
    Ok(())
}

pub fn count(
    target: i64,
    kind: Option<&str>,
    effect: Option<&str>,
    caster: Option<i64>,
    ctx: &CliContext,
) -> Result<(), String> {
    let query = parse_query(kind, effect)?;
    let entity = ctx.entity(EntityId(target))?;
    let n = entity.effects().count(query, caster.map(EntityId));
    println!("{n}");
    Ok(())
}

/// TOML document written by the `snapshot` command
#[derive(Serialize)]
struct SnapshotFile<'a> {
    entity: EntityId,
    name: &'a str,
    time: f32,
    #[serde(rename = "effect")]
    effects: Vec<EffectSnapshot>,
}

pub fn snapshot(target: i64, ctx: &CliContext) -> Result<(), String> {
    let entity = ctx.entity(EntityId(target))?;
    let file = SnapshotFile {
        entity: entity.id(),
        name: entity.name(),
        time: ctx.clock.now(),
        effects: entity.effects().snapshot(),
    };
    let text = toml::to_string_pretty(&file).map_err(|e| format!("error: {e}\n"))?;
    println!("{text}");
    Ok(())
}

pub fn show_settings(ctx: &CliContext) -> Result<(), String> {
    let text = toml::to_string_pretty(&ctx.config).map_err(|e| format!("error: {e}\n"))?;
    println!("{text}");
    println!("# definitions dir: {}", ctx.config.definitions_dir().display());
    Ok(())
}

pub fn exit() -> Result<(), String> {
    write!(std::io::stdout(), "quitting...").map_err(|e| e.to_string())?;
    std::io::stdout().flush().map_err(|e| e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_policy(name: &str) -> Result<StackPolicy, String> {
    StackPolicy::from_name(name).ok_or_else(|| {
        let known: Vec<_> = StackPolicy::ALL.iter().map(|p| p.as_str()).collect();
        format!("error: unknown policy '{name}' (expected one of {})\n", known.join(", "))
    })
}

fn parse_query(kind: Option<&str>, effect: Option<&str>) -> Result<EffectQuery, String> {
    match (kind, effect) {
        (Some(kind), None) => EffectKind::from_name(kind)
            .map(EffectQuery::Kind)
            .ok_or_else(|| format!("error: unknown kind '{kind}'\n")),
        (None, Some(effect)) => Ok(EffectQuery::Archetype(ArchetypeId::new(effect))),
        _ => Err("error: pass exactly one of --kind or --effect\n".to_string()),
    }
}

fn print_entity(entity: &Entity, all: bool, now: f32) {
    let position = entity.position;
    println!(
        "\nentity {} {} at ({:.1}, {:.1})",
        entity.id(),
        entity.name(),
        position.x,
        position.y
    );

    let effects: Vec<&Effect> = if all {
        entity.effects().iter().rev().collect()
    } else {
        entity.effects().visible().collect()
    };
    if effects.is_empty() {
        println!("  no effects");
        return;
    }

    println!(
        "  {:<5} {:<6} {:<20} {:<18} {:<22} {:>6} {:>9}",
        "Slot", "Id", "Effect", "Kind", "Policy", "Stacks", "Remaining"
    );
    for effect in effects {
        let slot = effect.slot().map_or_else(|| "-".to_string(), |s| s.to_string());
        let id = effect.id().map_or_else(|| "-".to_string(), |id| id.to_string());
        let remaining = effect.remaining_duration(now);
        let remaining = if remaining.is_finite() {
            format!("{remaining:.2}s")
        } else {
            "-".to_string()
        };
        println!(
            "  {:<5} {:<6} {:<20} {:<18} {:<22} {:>6} {:>9}",
            slot,
            id,
            effect.archetype(),
            effect.kind(),
            effect.policy(),
            effect.stacks(),
            remaining
        );
    }
}

fn describe_outcome(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Inserted { id, slot } => format!("added {id} in slot {slot}"),
        AddOutcome::Merged { into, change } => format!(
            "merged into {into}: stacks {} -> {}",
            change.previous, change.current
        ),
        AddOutcome::Depleted { removed } => format!("merge depleted {removed}, removed"),
        AddOutcome::Replaced { id, slot, removed } => {
            format!("added {id} in slot {slot}, replacing {removed}")
        }
        AddOutcome::Overlapped { id, slot, alongside } => {
            format!("added {id} in slot {slot} alongside {alongside}")
        }
        AddOutcome::Rejected { by } => format!("rejected by {by}"),
    }
}

fn describe_event(event: &RegistryEvent) -> String {
    match event {
        RegistryEvent::Activated { id, archetype, slot } => {
            format!("{id} {archetype} activated in slot {slot}")
        }
        RegistryEvent::Deactivated { id, archetype, slot } => {
            format!("{id} {archetype} left slot {slot}")
        }
        RegistryEvent::StacksChanged {
            id,
            previous,
            current,
        } => format!("{id} stacks {previous} -> {current}"),
        RegistryEvent::Renewed { id, duration } => format!("{id} renewed for {duration:.2}s"),
        RegistryEvent::Expired { id } => format!("{id} expired"),
        RegistryEvent::Rejected { archetype, by } => format!("{archetype} rejected by {by}"),
    }
}

fn print_events(entity: &mut Entity) {
    let owner = entity.id();
    for event in entity.effects_mut().take_events() {
        tracing::debug!(%owner, ?event, "Registry event");
        println!("  [{owner}] {}", describe_event(&event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffkit_core::effects::loader;
    use buffkit_core::{DefinitionSet, EngineConfig};

    fn sandbox() -> CliContext {
        let mut definitions = DefinitionSet::new();
        definitions.add_definitions(loader::bundled_definitions().unwrap(), false);
        let mut ctx = CliContext::with_parts(EngineConfig::default(), definitions);
        ctx.spawn("Target", Position::new(0.0, 0.0));
        ctx.spawn("Caster", Position::new(5.0, 0.0));
        ctx
    }

    fn apply_slow(ctx: &mut CliContext) {
        let request = ApplyRequest {
            effect: "slow",
            target: 1,
            caster: Some(2),
            ..Default::default()
        };
        apply(&request, ctx).unwrap();
    }

    #[test]
    fn test_apply_and_expire() {
        let mut ctx = sandbox();
        apply_slow(&mut ctx);
        apply_slow(&mut ctx);

        let slow = ArchetypeId::new("slow");
        assert_eq!(ctx.entity(EntityId(1)).unwrap().effects().count(slow, None), 2);

        advance(3.0, &mut ctx).unwrap();
        assert!(ctx.entity(EntityId(1)).unwrap().effects().is_empty());
        // Events were drained while printing
        assert!(
            ctx.entity_mut(EntityId(1))
                .unwrap()
                .effects_mut()
                .take_events()
                .is_empty()
        );
    }

    #[test]
    fn test_spell_shield_blocks_detrimental() {
        let mut ctx = sandbox();
        let shield = ApplyRequest {
            effect: "spell_shield",
            target: 1,
            ..Default::default()
        };
        apply(&shield, &mut ctx).unwrap();
        apply_slow(&mut ctx);

        assert!(!ctx.entity(EntityId(1)).unwrap().effects().has(EffectKind::Slow));
    }

    #[test]
    fn test_bad_input_is_reported() {
        let mut ctx = sandbox();
        let unknown = ApplyRequest {
            effect: "not_an_effect",
            target: 1,
            ..Default::default()
        };
        assert!(apply(&unknown, &mut ctx).is_err());

        let bad_policy = ApplyRequest {
            effect: "slow",
            target: 1,
            policy: Some("sometimes"),
            ..Default::default()
        };
        assert!(apply(&bad_policy, &mut ctx).is_err());

        assert!(advance(-1.0, &mut ctx).is_err());
        assert!(cleanse(99, &mut ctx).is_err());
        assert!(count(1, Some("slow"), Some("slow"), None, &ctx).is_err());
    }

    #[test]
    fn test_cleanse_and_snapshot() {
        let mut ctx = sandbox();
        apply_slow(&mut ctx);
        let haste = ApplyRequest {
            effect: "haste",
            target: 1,
            ..Default::default()
        };
        apply(&haste, &mut ctx).unwrap();

        cleanse(1, &mut ctx).unwrap();
        let effects = ctx.entity(EntityId(1)).unwrap().effects();
        assert!(!effects.has(EffectKind::Slow));
        assert!(effects.has(EffectKind::Haste));

        snapshot(1, &ctx).unwrap();
    }
}
