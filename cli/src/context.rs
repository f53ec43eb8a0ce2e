use std::collections::BTreeMap;
use std::path::Path;

use buffkit_core::effects::loader;
use buffkit_core::{
    DefinitionSet, EngineConfig, EngineConfigExt, Entity, EntityId, Position, SimClock,
};

/// Holds all state for the CLI sandbox.
/// This is a lightweight container - logic lives in buffkit-core.
pub struct CliContext {
    pub config: EngineConfig,
    pub clock: SimClock,
    pub definitions: DefinitionSet,
    entities: BTreeMap<EntityId, Entity>,
    next_entity: i64,
}

impl CliContext {
    /// Load the stored config and definitions, falling back to defaults
    pub fn new() -> Self {
        let config = EngineConfig::load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Failed to load config, using defaults");
            EngineConfig::default()
        });

        let definitions = loader::load_definition_set(&config.definitions_dir())
            .or_else(|err| {
                tracing::warn!(error = %err, "Failed to load user definitions, using bundled only");
                loader::bundled_definitions().map(|defs| {
                    let mut set = DefinitionSet::new();
                    set.add_definitions(defs, false);
                    set
                })
            })
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "Bundled definitions are invalid");
                DefinitionSet::new()
            });

        tracing::info!(definitions = definitions.len(), "Sandbox ready");
        Self::with_parts(config, definitions)
    }

    pub fn with_parts(config: EngineConfig, definitions: DefinitionSet) -> Self {
        Self {
            config,
            clock: SimClock::new(),
            definitions,
            entities: BTreeMap::new(),
            next_entity: 1,
        }
    }

    /// Replace the definition set with bundled definitions plus those in `dir`
    pub fn reload_definitions(&mut self, dir: &Path) -> Result<usize, String> {
        let set = loader::load_definition_set(dir).map_err(|e| error_chain(&e))?;
        self.definitions = set;
        Ok(self.definitions.len())
    }

    /// Create an entity with the next free id
    pub fn spawn(&mut self, name: &str, position: Position) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities
            .insert(id, Entity::new(id, name, position, &self.config));
        id
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity, String> {
        self.entities
            .get(&id)
            .ok_or_else(|| format!("error: no entity {id}\n"))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, String> {
        self.entities
            .get_mut(&id)
            .ok_or_else(|| format!("error: no entity {id}\n"))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }
}

/// Format an error with its source chain on one line
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = format!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    message.push('\n');
    message
}

impl Default for CliContext {
    fn default() -> Self {
        Self::new()
    }
}
