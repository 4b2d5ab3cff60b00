//! Profile Registry - Store and reuse master column mappings
//!
//! Master sheets from different plants name their columns differently. A
//! profile is a named [`MasterSchema`] saved to disk; the registry matches a
//! new master's headers against the stored profiles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::master::MasterSchema;
use crate::models::MasterTable;

/// Directory where profiles are stored (relative to current dir)
pub const DEFAULT_PROFILE_DIR: &str = ".ctqflow/profiles";

/// Minimum fraction of expected columns a master must carry to match
const COMPATIBILITY_THRESHOLD: f64 = 0.5;

/// A stored profile with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// The column mapping
    pub schema: MasterSchema,
    /// Master headers this profile expects (before renaming)
    pub master_columns: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this profile was used
    pub last_used: Option<String>,
    /// Number of times used
    pub use_count: u32,
}

/// Registry for managing master profiles
pub struct ProfileRegistry {
    /// Directory where profiles are stored
    registry_dir: PathBuf,
    /// Loaded profiles (id -> profile)
    profiles: HashMap<String, StoredProfile>,
}

impl ProfileRegistry {
    /// Create a registry in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_PROFILE_DIR)
    }

    /// Create a registry with a custom directory, loading existing profiles
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            profiles: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all profiles; unreadable files are skipped.
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(profile) = serde_json::from_str::<StoredProfile>(&content) {
                        self.profiles.insert(profile.id.clone(), profile);
                    }
                }
            }
        }
    }

    /// All stored profiles, most used first
    pub fn list(&self) -> Vec<&StoredProfile> {
        let mut profiles: Vec<_> = self.profiles.values().collect();
        profiles.sort_by(|a, b| b.use_count.cmp(&a.use_count).then_with(|| a.name.cmp(&b.name)));
        profiles
    }

    /// Get a profile by ID
    pub fn get(&self, id: &str) -> RegistryResult<&StoredProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Profiles matching a master's headers, best first.
    ///
    /// Sorted by compatibility score, then use count.
    pub fn find_compatible(&self, master_headers: &[String]) -> Vec<(&StoredProfile, f64)> {
        let mut compatible: Vec<_> = self
            .profiles
            .values()
            .filter_map(|p| {
                let score = compatibility(&p.master_columns, master_headers);
                (score > COMPATIBILITY_THRESHOLD).then_some((p, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });

        compatible
    }

    /// Stored profile to use for a master that `schema` cannot join.
    ///
    /// `None` when `schema` already yields every join column, or when no
    /// compatible profile does.
    pub fn suggest(&self, master: &MasterTable, schema: &MasterSchema) -> Option<&StoredProfile> {
        if MasterSchema::check_join_columns(&schema.apply(master)).is_ok() {
            return None;
        }
        self.find_compatible(&master.headers)
            .into_iter()
            .map(|(profile, _)| profile)
            .find(|profile| MasterSchema::check_join_columns(&profile.schema.apply(master)).is_ok())
    }

    /// Save a schema as a new profile
    pub fn save(&mut self, schema: MasterSchema, name: &str) -> RegistryResult<String> {
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidProfile("profile name is empty".to_string()));
        }
        fs::create_dir_all(&self.registry_dir)?;

        let id = generate_id(name);
        let stored = StoredProfile {
            id: id.clone(),
            name: name.trim().to_string(),
            master_columns: schema.expected_source_columns(),
            schema,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.profiles.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a schema from a JSON file
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let schema = MasterSchema::from_json(&content)
            .map_err(|e| RegistryError::InvalidProfile(format!("{}: {}", path.display(), e)))?;

        let profile_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });

        self.save(schema, profile_name)
    }

    /// Bump the use counter and last-used time
    pub fn record_use(&mut self, id: &str) -> RegistryResult<()> {
        let profile = self
            .profiles
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        profile.last_used = Some(chrono::Utc::now().to_rfc3339());
        profile.use_count += 1;

        let snapshot = profile.clone();
        self.write(&snapshot)
    }

    /// Delete a profile from the registry
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.profiles.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_of(id))?;
        Ok(())
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, profile: &StoredProfile) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(profile)?;
        fs::write(self.path_of(&profile.id), content)?;
        Ok(())
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of `expected` columns present in `headers`, case-insensitive
fn compatibility(expected: &[String], headers: &[String]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }

    let headers_lower: Vec<String> = headers.iter().map(|c| c.trim().to_lowercase()).collect();
    let match_count = expected
        .iter()
        .filter(|col| headers_lower.contains(&col.trim().to_lowercase()))
        .count();

    match_count as f64 / expected.len() as f64
}

/// Slug of `name` plus a millisecond timestamp
fn generate_id(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let timestamp = chrono::Utc::now().timestamp_millis();
    format!("{}-{}", slug, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compatibility_score() {
        let expected = strings(&["관리번호", "부품", "Part No"]);
        let headers = strings(&["관리번호", "부품", "USL"]);
        let score = compatibility(&expected, &headers);
        assert!((score - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_case_insensitive_match() {
        let expected = strings(&["part no", "USL"]);
        let headers = strings(&["Part No ", "usl"]);
        assert!((compatibility(&expected, &headers) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_save_reload_and_delete() {
        let dir = tempdir().unwrap();
        let mut registry = ProfileRegistry::with_dir(dir.path());
        let id = registry.save(MasterSchema::default(), "Changwon plant").unwrap();
        assert!(id.starts_with("changwon-plant-"));

        let reloaded = ProfileRegistry::with_dir(dir.path());
        let profile = reloaded.get(&id).unwrap();
        assert_eq!(profile.schema, MasterSchema::default());
        assert!(profile.master_columns.contains(&"부품".to_string()));

        let mut registry = reloaded;
        registry.delete(&id).unwrap();
        assert!(matches!(registry.get(&id), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.delete(&id), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_find_compatible_with_default_headers() {
        let dir = tempdir().unwrap();
        let mut registry = ProfileRegistry::with_dir(dir.path());
        let id = registry.save(MasterSchema::default(), "default").unwrap();

        let headers = strings(&[
            "관리번호", "1차 업체명", "지역명", "2차 업체명", "모델명", "부품", "공정CTQ/CTP 관리 항목명", "Part No", "USL",
        ]);
        let found = registry.find_compatible(&headers);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.id, id);
        assert!((found[0].1 - 1.0).abs() < 1e-9);

        assert!(registry.find_compatible(&strings(&["Name", "Value"])).is_empty());
    }

    #[test]
    fn test_more_used_profile_ranks_first() {
        let dir = tempdir().unwrap();
        let mut registry = ProfileRegistry::with_dir(dir.path());
        let a = registry.save(MasterSchema::default(), "a").unwrap();
        let b = registry.save(MasterSchema::default(), "b").unwrap();
        registry.record_use(&b).unwrap();

        let headers = MasterSchema::default().expected_source_columns();
        let found = registry.find_compatible(&headers);
        assert_eq!(found[0].0.id, b);
        assert_eq!(found[1].0.id, a);

        let reloaded = ProfileRegistry::with_dir(dir.path());
        assert_eq!(reloaded.get(&b).unwrap().use_count, 1);
    }

    fn ulsan_schema() -> MasterSchema {
        MasterSchema::from_json(
            r#"{"sheet": "Spec", "renames": {"Part": "부품명", "Item": "CTQ/P 관리항목명", "Vendor": "2차업체명"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_suggest_profile_for_renamed_master() {
        let dir = tempdir().unwrap();
        let mut registry = ProfileRegistry::with_dir(dir.path());
        let id = registry.save(ulsan_schema(), "ulsan").unwrap();

        let headers = strings(&["관리번호", "1차 업체명", "지역명", "Vendor", "모델명", "Part", "Item", "Part No", "USL"]);
        let master = MasterTable::new(headers, vec![]);
        let suggested = registry.suggest(&master, &MasterSchema::default()).unwrap();
        assert_eq!(suggested.id, id);

        // A master the default schema already joins needs no profile.
        let default_master = MasterTable::new(MasterSchema::default().expected_source_columns(), vec![]);
        assert!(registry.suggest(&default_master, &MasterSchema::default()).is_none());

        // Too few shared headers.
        let unrelated = MasterTable::new(strings(&["Code", "Name"]), vec![]);
        assert!(registry.suggest(&unrelated, &MasterSchema::default()).is_none());
    }

    #[test]
    fn test_import_rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let mut registry = ProfileRegistry::with_dir(dir.path().join("profiles"));
        assert!(matches!(registry.import(&path, None), Err(RegistryError::InvalidProfile(_))));
    }

    #[test]
    fn test_import_uses_file_stem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ulsan.json");
        fs::write(&path, r#"{"sheet": "Spec", "renames": {"Part": "부품명"}}"#).unwrap();

        let mut registry = ProfileRegistry::with_dir(dir.path().join("profiles"));
        let id = registry.import(&path, None).unwrap();
        let profile = registry.get(&id).unwrap();
        assert_eq!(profile.name, "ulsan");
        assert_eq!(profile.schema.sheet, "Spec");
    }
}
