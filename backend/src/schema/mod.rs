//! Property type registry access.
//!
//! A [`PropertyTypeProvider`] answers "which properties exist for this target".
//! Import jobs resolve it once into a [`SchemaSnapshot`] that every line of the
//! job reads, so a long import does not hit the registry per field and per line.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SchemaError, SchemaResult};
use crate::models::PropertyType;

/// Source of property type definitions.
pub trait PropertyTypeProvider: Send + Sync {
    /// All property types registered for `target` (e.g. `"profiles"`).
    fn property_types(&self, target: &str) -> SchemaResult<Vec<PropertyType>>;
}

/// Property types held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPropertyTypes {
    types: Vec<PropertyType>,
}

impl InMemoryPropertyTypes {
    pub fn new(types: Vec<PropertyType>) -> Self {
        Self { types }
    }
}

impl PropertyTypeProvider for InMemoryPropertyTypes {
    fn property_types(&self, target: &str) -> SchemaResult<Vec<PropertyType>> {
        Ok(self
            .types
            .iter()
            .filter(|t| matches_target(t, target))
            .cloned()
            .collect())
    }
}

/// Property types loaded from `*.json` files in a directory.
///
/// Each file holds one definition or an array of them. Files are re-read on
/// every call.
#[derive(Debug, Clone)]
pub struct FilePropertyTypes {
    dir: PathBuf,
}

impl FilePropertyTypes {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn load_file(path: &Path) -> SchemaResult<Vec<PropertyType>> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| invalid(path, e))?;

        if value.is_array() {
            serde_json::from_value(value).map_err(|e| invalid(path, e))
        } else {
            serde_json::from_value(value)
                .map(|t| vec![t])
                .map_err(|e| invalid(path, e))
        }
    }
}

fn invalid(path: &Path, e: serde_json::Error) -> SchemaError {
    SchemaError::InvalidDefinition {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl PropertyTypeProvider for FilePropertyTypes {
    fn property_types(&self, target: &str) -> SchemaResult<Vec<PropertyType>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let mut types = Vec::new();
        for path in paths {
            types.extend(
                Self::load_file(&path)?
                    .into_iter()
                    .filter(|t| matches_target(t, target)),
            );
        }
        Ok(types)
    }
}

/// Definitions without a target are treated as profile properties.
fn matches_target(property_type: &PropertyType, target: &str) -> bool {
    match property_type.target.as_deref() {
        Some(t) => t == target,
        None => target == crate::models::PROFILES_TARGET,
    }
}

/// Immutable property-id -> property type view for one import job.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    types: HashMap<String, PropertyType>,
}

impl SchemaSnapshot {
    /// Resolve every property type of `target` once.
    pub fn resolve(provider: &dyn PropertyTypeProvider, target: &str) -> SchemaResult<Self> {
        Ok(Self::from_types(provider.property_types(target)?))
    }

    /// Later definitions of the same id replace earlier ones.
    pub fn from_types(types: impl IntoIterator<Item = PropertyType>) -> Self {
        Self {
            types: types
                .into_iter()
                .map(|t| (t.item_id.clone(), t))
                .collect(),
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&PropertyType> {
        self.types.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
