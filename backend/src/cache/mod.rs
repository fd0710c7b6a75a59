//! Mapping Registry - remember approved column mappings
//!
//! Approved mappings are saved to disk, one JSON file each, and offered again
//! when a spreadsheet with a similar header row comes back. A stored mapping
//! is only ever a suggestion: the reviewer still approves the final one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::mapping::{header_key, suggest_mapping_for};
use crate::models::{FieldMapping, MappingPurpose};

/// Directory where mappings are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".reconcile/mappings";

/// Minimum share of stored columns that must be present in a file.
const COMPATIBILITY_THRESHOLD: f64 = 0.5;

/// A stored mapping with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMapping {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    #[serde(default)]
    pub purpose: MappingPurpose,
    /// The approved mapping
    pub mapping: FieldMapping,
    /// Spreadsheet headers this mapping was approved for
    pub columns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub use_count: u32,
}

/// Registry of approved mappings
pub struct MappingRegistry {
    registry_dir: PathBuf,
    mappings: HashMap<String, StoredMapping>,
}

impl MappingRegistry {
    /// Open the registry in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Open a registry in `dir`, loading whatever is already there
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            mappings: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Unreadable or malformed files are skipped
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredMapping>(&content) {
                        self.mappings.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All stored mappings, most recently created first
    pub fn list(&self) -> Vec<&StoredMapping> {
        let mut all: Vec<_> = self.mappings.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, id: &str) -> Option<&StoredMapping> {
        self.mappings.get(id)
    }

    /// Stored mappings of `purpose` sharing more than half their columns with
    /// `headers`, best score first (ties: most used first)
    pub fn find_compatible(
        &self,
        headers: &[String],
        purpose: MappingPurpose,
    ) -> Vec<(&StoredMapping, f64)> {
        let mut compatible: Vec<_> = self
            .mappings
            .values()
            .filter(|m| m.purpose == purpose)
            .filter_map(|m| {
                let score = compatibility(&m.columns, headers);
                (score > COMPATIBILITY_THRESHOLD).then_some((m, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        compatible
    }

    /// Synonym suggestion for `headers`, overlaid with the best compatible
    /// stored mapping. Only headers present in the file are taken over.
    ///
    /// Returns the id of the stored mapping used, if any.
    pub fn suggest_with_registry(
        &self,
        headers: &[String],
        purpose: MappingPurpose,
    ) -> (FieldMapping, Option<String>) {
        let suggested = suggest_mapping_for(headers, purpose);

        let Some((stored, _)) = self.find_compatible(headers, purpose).into_iter().next() else {
            return (suggested, None);
        };

        let overlay: FieldMapping = headers
            .iter()
            .filter_map(|h| {
                let key = header_key(h);
                stored
                    .mapping
                    .iter()
                    .find(|(stored_header, _)| header_key(stored_header) == key)
                    .map(|(_, field)| (h.clone(), field))
            })
            .collect();

        (suggested.with_overrides(&overlay), Some(stored.id.clone()))
    }

    /// Persist an approved mapping; returns its new id
    pub fn save(
        &mut self,
        mapping: FieldMapping,
        name: &str,
        purpose: MappingPurpose,
        columns: Vec<String>,
    ) -> RegistryResult<String> {
        if mapping.is_empty() {
            return Err(RegistryError::InvalidMapping("mapping has no column".into()));
        }
        fs::create_dir_all(&self.registry_dir)?;

        let id = generate_id(name);
        let stored = StoredMapping {
            id: id.clone(),
            name: name.to_string(),
            purpose,
            mapping,
            columns,
            created_at: Utc::now(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.mappings.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a mapping from a JSON file holding a bare `{header: field}` object
    pub fn import(
        &mut self,
        path: &Path,
        name: Option<&str>,
        purpose: MappingPurpose,
    ) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let mapping: FieldMapping = serde_json::from_str(&content)
            .map_err(|e| RegistryError::InvalidMapping(e.to_string()))?;

        let mapping_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });
        let columns = mapping.headers().map(str::to_string).collect();

        self.save(mapping, mapping_name, purpose, columns)
    }

    /// Record one more use of a stored mapping
    pub fn record_use(&mut self, id: &str) -> RegistryResult<()> {
        let stored = self
            .mappings
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        stored.last_used = Some(Utc::now());
        stored.use_count += 1;

        let snapshot = stored.clone();
        self.write(&snapshot)
    }

    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.mappings.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredMapping) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of `stored` columns found in `headers`, compared by header key
fn compatibility(stored: &[String], headers: &[String]) -> f64 {
    if stored.is_empty() {
        return 0.0;
    }

    let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    let hits = stored
        .iter()
        .filter(|col| keys.contains(&header_key(col)))
        .count();

    hits as f64 / stored.len() as f64
}

/// Slug of `name` plus a millisecond timestamp
fn generate_id(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "mapping".to_string() } else { slug };

    format!("{}-{}", slug, Utc::now().timestamp_millis())
}
