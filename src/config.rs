//! # Build Configuration
//!
//! Every path the build touches lives in [`BuildConfig`], which is handed
//! to the session explicitly. Environment variables override the
//! root-derived defaults; CLI flags override both.

use crate::error::{KitDbError, KitDbResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Query file stem holding the `kits` table definition
pub const TABLE_KITS: &str = "table_kits";
/// Query file stem holding the `authors` table definition
pub const TABLE_AUTHORS: &str = "table_authors";

/// What the session does with already-executed inserts when a build fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Keep every document loaded before the failure
    #[default]
    Commit,
    /// Roll back the whole load phase
    Atomic,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory of `*.sql` table definitions
    pub queries_dir: PathBuf,
    /// Root scanned for `kit.json` and `info.json`
    pub kit_root: PathBuf,
    /// SQLite file produced by the build
    pub artifact_path: PathBuf,
    /// Manifest written after a successful build
    pub manifest_path: PathBuf,
    pub commit_policy: CommitPolicy,
    /// Release string recorded in the manifest; defaults to the build date
    pub release: Option<String>,
}

impl BuildConfig {
    /// Default layout: `root/queries`, `root/kits`, `root/kits.db`, `root/manifest.json`
    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            queries_dir: root.join("queries"),
            kit_root: root.join("kits"),
            artifact_path: root.join("kits.db"),
            manifest_path: root.join("manifest.json"),
            commit_policy: CommitPolicy::default(),
            release: None,
        }
    }

    /// Environment variable overrides
    pub fn apply_env(mut self) -> Self {
        if let Ok(dir) = env::var("KITDB_QUERIES") {
            self.queries_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("KITDB_KITS") {
            self.kit_root = PathBuf::from(dir);
        }
        if let Ok(db) = env::var("KITDB_DATABASE") {
            self.artifact_path = PathBuf::from(db);
        }
        if let Ok(manifest) = env::var("KITDB_MANIFEST") {
            self.manifest_path = PathBuf::from(manifest);
        }
        if env::var("KITDB_ATOMIC").is_ok() {
            self.commit_policy = CommitPolicy::Atomic;
        }
        if let Ok(release) = env::var("KITDB_RELEASE") {
            self.release = Some(release);
        }
        self
    }

    /// File name of the artifact, as recorded in the manifest
    pub fn artifact_file_name(&self) -> KitDbResult<String> {
        self.artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                KitDbError::Config(format!(
                    "Artifact path '{}' has no file name",
                    self.artifact_path.display()
                ))
            })
    }

    /// Loads every `*.sql` file in the queries directory, keyed by file stem
    pub fn load_queries(&self) -> KitDbResult<HashMap<String, String>> {
        let entries = fs::read_dir(&self.queries_dir).map_err(|e| {
            KitDbError::Config(format!(
                "Cannot read queries directory '{}': {}",
                self.queries_dir.display(),
                e
            ))
        })?;

        let mut queries = HashMap::new();
        for entry in entries {
            let path = entry
                .map_err(|e| KitDbError::Config(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            let text = fs::read_to_string(&path).map_err(|e| {
                KitDbError::Config(format!("Cannot read query '{}': {}", path.display(), e))
            })?;
            debug!("Loaded query '{}'", stem);
            queries.insert(stem, text);
        }

        Ok(queries)
    }

    /// Returns the `kits` and `authors` definitions
    pub fn table_definitions(&self) -> KitDbResult<(String, String)> {
        let mut queries = self.load_queries()?;
        let mut take = |key: &str| {
            queries.remove(key).ok_or_else(|| {
                KitDbError::Config(format!(
                    "Missing '{}.sql' in '{}'",
                    key,
                    self.queries_dir.display()
                ))
            })
        };
        let kits = take(TABLE_KITS)?;
        let authors = take(TABLE_AUTHORS)?;
        Ok((kits, authors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_root_layout() {
        let config = BuildConfig::from_root("/srv/kits");
        assert_eq!(config.queries_dir, PathBuf::from("/srv/kits/queries"));
        assert_eq!(config.kit_root, PathBuf::from("/srv/kits/kits"));
        assert_eq!(config.artifact_file_name().unwrap(), "kits.db");
        assert_eq!(config.commit_policy, CommitPolicy::Commit);
    }

    #[test]
    fn test_load_queries_by_stem() {
        let dir = tempdir().unwrap();
        let queries = dir.path().join("queries");
        fs::create_dir_all(&queries).unwrap();
        fs::write(queries.join("table_kits.sql"), "CREATE TABLE kits (name TEXT)").unwrap();
        fs::write(queries.join("table_authors.sql"), "CREATE TABLE authors (name TEXT)").unwrap();
        fs::write(queries.join("notes.txt"), "ignored").unwrap();

        let config = BuildConfig::from_root(dir.path());
        let loaded = config.load_queries().unwrap();
        assert_eq!(loaded.len(), 2);

        let (kits, authors) = config.table_definitions().unwrap();
        assert!(kits.contains("kits"));
        assert!(authors.contains("authors"));
    }

    #[test]
    fn test_missing_definition() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("queries")).unwrap();
        fs::write(dir.path().join("queries/table_kits.sql"), "CREATE TABLE kits (a TEXT)").unwrap();

        let config = BuildConfig::from_root(dir.path());
        let err = config.table_definitions().unwrap_err();
        assert!(err.to_string().contains("table_authors"));

        let missing = BuildConfig::from_root(dir.path().join("nowhere"));
        assert!(matches!(missing.load_queries(), Err(KitDbError::Config(_))));
    }
}
