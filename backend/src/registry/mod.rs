//! Import configuration registry.
//!
//! Stores import job definitions on disk so recurring jobs can be run by id.
//! Every stored definition also tracks how its last runs went.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ImportConfiguration;
use crate::error::{RegistryError, RegistryResult};
use crate::transform::pipeline::ImportReport;

/// Directory where configurations are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".profile-router/configs";

/// A stored configuration with run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfiguration {
    pub id: String,
    pub name: String,
    pub configuration: ImportConfiguration,
    pub created_at: String,
    pub last_run: Option<String>,
    pub run_count: u32,
    /// Summary of the most recent run.
    pub last_status: Option<String>,
}

/// Registry of import configurations
pub struct ConfigRegistry {
    registry_dir: PathBuf,
    configurations: HashMap<String, StoredConfiguration>,
}

impl ConfigRegistry {
    /// Create a registry, loading existing definitions from disk
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            configurations: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Unreadable files are skipped.
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredConfiguration>(&content) {
                        self.configurations.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All stored configurations, sorted by name
    pub fn list(&self) -> Vec<&StoredConfiguration> {
        let mut all: Vec<_> = self.configurations.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, id: &str) -> Option<&StoredConfiguration> {
        self.configurations.get(id)
    }

    /// Like [`get`](Self::get) but fails when the id is unknown.
    pub fn require(&self, id: &str) -> RegistryResult<&StoredConfiguration> {
        self.get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Save a configuration, keyed by its item id.
    pub fn save(&mut self, configuration: ImportConfiguration) -> RegistryResult<String> {
        configuration.validate()?;
        fs::create_dir_all(&self.registry_dir)?;

        let id = slugify(&configuration.item_id);
        let name = if configuration.name.is_empty() {
            id.clone()
        } else {
            configuration.name.clone()
        };
        let stored = StoredConfiguration {
            id: id.clone(),
            name,
            configuration,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_run: None,
            run_count: 0,
            last_status: None,
        };

        self.write(&stored)?;
        self.configurations.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a configuration from a JSON file
    ///
    /// The file name is used as item id and name when the definition has none.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let raw: serde_json::Value = serde_json::from_str(&content)?;
        let mut configuration = ImportConfiguration::from_value(&raw)?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("imported");
        if raw.get("itemId").is_none() {
            configuration.item_id = stem.to_string();
        }
        if let Some(name) = name {
            configuration.name = name.to_string();
        } else if configuration.name.is_empty() {
            configuration.name = stem.to_string();
        }

        self.save(configuration)
    }

    /// Record the outcome of a run
    pub fn record_run(&mut self, id: &str, report: &ImportReport) -> RegistryResult<()> {
        let stored = self
            .configurations
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        stored.last_run = Some(chrono::Utc::now().to_rfc3339());
        stored.run_count += 1;
        stored.last_status = Some(report.summary());

        let stored = stored.clone();
        self.write(&stored)
    }

    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.configurations.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn write(&self, stored: &StoredConfiguration) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// File-name safe id: lowercase alphanumerics joined by single dashes.
fn slugify(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        format!("config-{}", chrono::Utc::now().timestamp_millis())
    } else {
        slug
    }
}
