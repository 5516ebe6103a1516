//! # Build Driver
//!
//! Finds the documents under the kit root, loads every kit and then every
//! author through one [`BuildSession`], and writes the manifest once the
//! session has closed cleanly.

use crate::config::BuildConfig;
use crate::db::BuildSession;
use crate::error::{KitDbError, KitDbResult};
use chrono::Utc;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of a kit document
pub const KIT_FILE: &str = "kit.json";
/// File name of an author document
pub const AUTHOR_FILE: &str = "info.json";

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Manifest published next to the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub database: String,
}

/// Summary of a finished build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub kits: usize,
    pub authors: usize,
    pub artifact_path: PathBuf,
    pub artifact_size: u64,
    pub manifest: Manifest,
}

/// Recursively collects files named `file_name` under `root`, sorted by path
///
/// Hidden directories and ignore files are not filtered; every matching
/// document under the root is part of the build.
pub fn discover(root: &Path, file_name: &str) -> KitDbResult<Vec<PathBuf>> {
    if !root.is_dir() {
        debug!("Kit root {} does not exist; nothing to load", root.display());
        return Ok(Vec::new());
    }

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.hidden(false);

    let mut found = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|e| {
            KitDbError::Config(format!("Cannot walk '{}': {}", root.display(), e))
        })?;
        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
        if is_file && entry.file_name() == file_name {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

/// Formats a byte count with binary units, e.g. `1536` -> `"1.50 KB"`
pub fn readable_size(size: u64, decimals: usize) -> String {
    let mut value = size as f64;
    for unit in &SIZE_UNITS[..SIZE_UNITS.len() - 1] {
        if value < 1024.0 {
            return format!("{:.*} {}", decimals, value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.*} {}", decimals, value, SIZE_UNITS[SIZE_UNITS.len() - 1])
}

fn default_release() -> String {
    Utc::now().format("%Y.%m.%d").to_string()
}

/// Writes the manifest as pretty JSON
pub fn write_manifest(path: &Path, manifest: &Manifest) -> KitDbResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            KitDbError::ArtifactAccess(format!("Failed to create '{}': {}", parent.display(), e))
        })?;
    }
    let text = serde_json::to_string_pretty(manifest)?;
    fs::write(path, text).map_err(|e| {
        KitDbError::ArtifactAccess(format!("Failed to write '{}': {}", path.display(), e))
    })
}

/// Runs a full build: recreate the artifact, load kits then authors, write the manifest
pub fn build(config: &BuildConfig) -> KitDbResult<BuildReport> {
    let (kits_sql, authors_sql) = config.table_definitions()?;
    let database = config.artifact_file_name()?;

    let kit_files = discover(&config.kit_root, KIT_FILE)?;
    let author_files = discover(&config.kit_root, AUTHOR_FILE)?;
    info!(
        "Found {} kits and {} authors under {}",
        kit_files.len(),
        author_files.len(),
        config.kit_root.display()
    );

    let mut session = BuildSession::open(config, &kits_sql, &authors_sql)?;
    for path in &kit_files {
        session.load_kit(path)?;
    }
    for path in &author_files {
        session.load_author(path)?;
    }
    let (kits, authors) = session.loaded();
    session.close()?;

    let artifact_size = fs::metadata(&config.artifact_path)
        .map(|m| m.len())
        .map_err(|e| KitDbError::ArtifactAccess(e.to_string()))?;
    info!(
        "Built {} ({})",
        config.artifact_path.display(),
        readable_size(artifact_size, 2)
    );

    let manifest = Manifest {
        version: config.release.clone().unwrap_or_else(default_release),
        database,
    };
    write_manifest(&config.manifest_path, &manifest)?;
    info!("Wrote manifest {} (version {})", config.manifest_path.display(), manifest.version);

    Ok(BuildReport {
        kits,
        authors,
        artifact_path: config.artifact_path.clone(),
        artifact_size,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommitPolicy;
    use crate::loader::BANNER_FILE;
    use rusqlite::Connection;
    use serde_json::json;
    use tempfile::tempdir;

    const KITS_SQL: &str = "CREATE TABLE kits (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    tags TEXT,
    featured BOOLEAN,
    has_banner BOOLEAN NOT NULL
);";
    const AUTHORS_SQL: &str = "CREATE TABLE authors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    kits_made INTEGER
);";

    fn project(root: &Path) -> BuildConfig {
        let queries = root.join("queries");
        fs::create_dir_all(&queries).unwrap();
        fs::write(queries.join("table_kits.sql"), KITS_SQL).unwrap();
        fs::write(queries.join("table_authors.sql"), AUTHORS_SQL).unwrap();

        let mut config = BuildConfig::from_root(root);
        config.release = Some("1.2.3".to_string());
        config
    }

    fn write_doc(root: &Path, rel: &str, value: serde_json::Value) {
        let path = root.join("kits").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, value.to_string()).unwrap();
    }

    #[test]
    fn test_readable_size() {
        assert_eq!(readable_size(0, 2), "0.00 B");
        assert_eq!(readable_size(1023, 0), "1023 B");
        assert_eq!(readable_size(1536, 2), "1.50 KB");
        assert_eq!(readable_size(5 * 1024 * 1024, 1), "5.0 MB");
        assert_eq!(readable_size(u64::MAX, 2), "16384.00 PB");
    }

    #[test]
    fn test_discover_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        write_doc(dir.path(), "zeta/kit.json", json!({}));
        write_doc(dir.path(), "alpha/deep/kit.json", json!({}));
        write_doc(dir.path(), "alpha/info.json", json!({}));
        write_doc(dir.path(), "alpha/kit.json.bak", json!({}));

        let kits = discover(&dir.path().join("kits"), KIT_FILE).unwrap();
        assert_eq!(kits.len(), 2);
        assert!(kits[0].ends_with("alpha/deep/kit.json"));
        assert!(kits[1].ends_with("zeta/kit.json"));

        assert!(discover(&dir.path().join("missing"), KIT_FILE).unwrap().is_empty());
    }

    #[test]
    fn test_discover_ignores_nothing() {
        let dir = tempdir().unwrap();
        write_doc(dir.path(), ".drafts/kit.json", json!({}));
        write_doc(dir.path(), "skipped/kit.json", json!({}));
        fs::write(dir.path().join("kits/.gitignore"), "skipped/\n").unwrap();
        fs::write(dir.path().join("kits/.ignore"), ".drafts/\n").unwrap();

        let kits = discover(&dir.path().join("kits"), KIT_FILE).unwrap();
        assert_eq!(kits.len(), 2);
        assert!(kits[0].ends_with(".drafts/kit.json"));
        assert!(kits[1].ends_with("skipped/kit.json"));
    }

    #[test]
    fn test_build_with_no_documents() {
        let dir = tempdir().unwrap();
        let config = project(dir.path());

        let report = build(&config).unwrap();
        assert_eq!((report.kits, report.authors), (0, 0));
        assert!(report.artifact_size > 0);

        let conn = Connection::open(&config.artifact_path).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["authors", "kits"]);

        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(&config.manifest_path).unwrap()).unwrap();
        assert_eq!(
            manifest,
            Manifest {
                version: "1.2.3".to_string(),
                database: "kits.db".to_string(),
            }
        );
    }

    #[test]
    fn test_build_loads_kits_and_authors() {
        let dir = tempdir().unwrap();
        let config = project(dir.path());
        write_doc(
            dir.path(),
            "ada/demo/kit.json",
            json!({"name": "Demo Kit", "tags": ["a", "b"], "featured": true}),
        );
        fs::write(dir.path().join("kits/ada/demo").join(BANNER_FILE), b"png").unwrap();
        write_doc(dir.path(), "ada/plain/kit.json", json!({"name": "Plain"}));
        write_doc(dir.path(), "ada/info.json", json!({"name": "Ada", "kits_made": 2}));

        let report = build(&config).unwrap();
        assert_eq!((report.kits, report.authors), (2, 1));

        let conn = Connection::open(&config.artifact_path).unwrap();
        let demo: (String, Option<String>, Option<i64>, i64) = conn
            .query_row(
                "SELECT name, tags, featured, has_banner FROM kits WHERE name = 'Demo Kit'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(
            demo,
            ("Demo Kit".to_string(), Some("[\"a\", \"b\"]".to_string()), Some(1), 1)
        );

        let plain: (Option<String>, i64) = conn
            .query_row(
                "SELECT tags, has_banner FROM kits WHERE name = 'Plain'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(plain, (None, 0));

        let made: i64 = conn
            .query_row("SELECT kits_made FROM authors", [], |r| r.get(0))
            .unwrap();
        assert_eq!(made, 2);
    }

    #[test]
    fn test_failed_build_writes_no_manifest() {
        let dir = tempdir().unwrap();
        let mut config = project(dir.path());
        config.commit_policy = CommitPolicy::Commit;
        write_doc(dir.path(), "a/kit.json", json!({"name": "Fine"}));
        write_doc(dir.path(), "b/kit.json", json!({"tags": []}));

        let err = build(&config).unwrap_err();
        match err {
            KitDbError::MissingRequiredField { field, .. } => assert_eq!(field, "name"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!config.manifest_path.exists());

        let conn = Connection::open(&config.artifact_path).unwrap();
        let kits: i64 = conn
            .query_row("SELECT COUNT(*) FROM kits", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kits, 1);
    }
}
