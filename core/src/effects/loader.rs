//! Effect definition loading
//!
//! Load effect archetype definitions from TOML files. Each file holds any
//! number of `[[effect]]` tables:
//!
//! ```toml
//! [[effect]]
//! id = "slow"
//! name = "Slow"
//! kind = "slow"
//! policy = "stacks_and_overlaps"
//! duration_secs = 3.0
//! max_stacks = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::{DefinitionConfig, DefinitionError, DefinitionSet, EffectDefinition};

/// Definitions bundled with the engine
const BUNDLED_DEFINITIONS: &str = include_str!("../../definitions/core.toml");

/// Parse definitions from TOML text. `path` is only used in error messages.
pub fn load_definitions_from_str(
    text: &str,
    path: &Path,
) -> Result<Vec<EffectDefinition>, DefinitionError> {
    let config: DefinitionConfig =
        toml::from_str(text).map_err(|source| DefinitionError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;

    for def in &config.effects {
        def.validate()
            .map_err(|reason| DefinitionError::InvalidDefinition {
                path: path.to_path_buf(),
                id: def.id.clone(),
                reason,
            })?;
    }

    Ok(config.effects)
}

/// Load definitions from a single TOML file
pub fn load_definitions_from_file(path: &Path) -> Result<Vec<EffectDefinition>, DefinitionError> {
    let text = fs::read_to_string(path).map_err(|source| DefinitionError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    load_definitions_from_str(&text, path)
}

/// Load all definitions from a directory (recursive).
/// A missing directory yields no definitions.
pub fn load_definitions_from_dir(dir: &Path) -> Result<Vec<EffectDefinition>, DefinitionError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_toml_files(dir, &mut files)?;
    // Stable order so duplicate handling doesn't depend on the filesystem
    files.sort();

    let mut definitions = Vec::new();
    for path in files {
        let loaded = load_definitions_from_file(&path)?;
        tracing::debug!(path = %path.display(), count = loaded.len(), "Loaded effect definitions");
        definitions.extend(loaded);
    }
    Ok(definitions)
}

fn collect_toml_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), DefinitionError> {
    let entries = fs::read_dir(dir).map_err(|source| DefinitionError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let path = entry
            .map_err(|source| DefinitionError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_toml_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    Ok(())
}

/// Definitions shipped with the engine
pub fn bundled_definitions() -> Result<Vec<EffectDefinition>, DefinitionError> {
    load_definitions_from_str(BUNDLED_DEFINITIONS, Path::new("<bundled>/core.toml"))
}

/// Build a definition set from the bundled definitions plus a user directory.
/// User definitions replace bundled ones with the same id.
pub fn load_definition_set(user_dir: &Path) -> Result<DefinitionSet, DefinitionError> {
    let mut set = DefinitionSet::new();
    set.add_definitions(bundled_definitions()?, false);

    let overridden = set.add_definitions(load_definitions_from_dir(user_dir)?, true);
    if !overridden.is_empty() {
        tracing::info!(?overridden, "User definitions replaced bundled effects");
    }
    Ok(set)
}
