//! # Database Module (Build Session)
//!
//! Owns the single SQLite connection of a build. Opening a session always
//! starts from a fresh artifact file: any existing file is deleted, the
//! storage pragmas are applied, and both tables are created from their
//! definitions.
//!
//! Inserts run inside one transaction. [`BuildSession::close`] commits it
//! and closes the connection. A session dropped while still open (an error
//! unwound past it) finishes the transaction according to its
//! [`CommitPolicy`] before the connection goes away.

use crate::config::{BuildConfig, CommitPolicy};
use crate::error::{KitDbError, KitDbResult};
use crate::inference::{parse_table_definition, TableSchema};
use crate::loader::{load_document, read_document};
use crate::statement::InsertStatement;
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Storage pragmas applied before the tables are created
const STORAGE_PRAGMAS: &str = "PRAGMA page_size = 1024; VACUUM;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// A table ready for loading: its schema and cached insert
#[derive(Debug, Clone)]
pub struct LoadTarget {
    pub schema: TableSchema,
    pub statement: InsertStatement,
}

impl LoadTarget {
    fn from_definition(definition: &str) -> KitDbResult<Self> {
        let schema = parse_table_definition(definition)?;
        let statement = InsertStatement::build(&schema)?;
        Ok(Self { schema, statement })
    }
}

/// The build session: manages the artifact connection
pub struct BuildSession {
    conn: Option<Connection>,
    state: SessionState,
    path: PathBuf,
    policy: CommitPolicy,
    kits: LoadTarget,
    authors: LoadTarget,
    kits_loaded: usize,
    authors_loaded: usize,
}

impl BuildSession {
    /// Recreates the artifact and opens a session on it
    ///
    /// # Arguments
    /// * `config` - Artifact path and commit policy
    /// * `kits_sql` - `CREATE TABLE` text for the kits table
    /// * `authors_sql` - `CREATE TABLE` text for the authors table
    pub fn open(config: &BuildConfig, kits_sql: &str, authors_sql: &str) -> KitDbResult<Self> {
        let kits = LoadTarget::from_definition(kits_sql)?;
        let authors = LoadTarget::from_definition(authors_sql)?;

        let path = config.artifact_path.clone();
        Self::reset_artifact(&path)?;

        info!("Creating artifact at: {}", path.display());
        let conn = Connection::open(&path).map_err(|e| {
            KitDbError::ArtifactAccess(format!("Failed to open '{}': {}", path.display(), e))
        })?;

        Self::initialize_pragmas(&conn)?;

        conn.execute_batch(kits_sql)?;
        conn.execute_batch(authors_sql)?;
        debug!(
            "Created tables '{}' ({} columns) and '{}' ({} columns)",
            kits.schema.name,
            kits.schema.len(),
            authors.schema.name,
            authors.schema.len()
        );

        conn.execute_batch("BEGIN")?;

        Ok(Self {
            conn: Some(conn),
            state: SessionState::Open,
            path,
            policy: config.commit_policy,
            kits,
            authors,
            kits_loaded: 0,
            authors_loaded: 0,
        })
    }

    /// Deletes a stale artifact and makes sure its directory exists
    fn reset_artifact(path: &Path) -> KitDbResult<()> {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed previous artifact {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(KitDbError::ArtifactAccess(format!(
                    "Failed to delete '{}': {}",
                    path.display(),
                    e
                )))
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                KitDbError::ArtifactAccess(format!(
                    "Failed to create '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn initialize_pragmas(conn: &Connection) -> KitDbResult<()> {
        debug!("Setting up storage pragmas...");
        conn.execute_batch(STORAGE_PRAGMAS)
            .map_err(|e| KitDbError::ArtifactAccess(format!("Failed to set pragmas: {}", e)))
    }

    fn conn(&self) -> KitDbResult<&Connection> {
        match (&self.conn, self.state) {
            (Some(conn), SessionState::Open) => Ok(conn),
            _ => Err(KitDbError::ArtifactAccess(format!(
                "Session on '{}' is not open",
                self.path.display()
            ))),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kits_schema(&self) -> &TableSchema {
        &self.kits.schema
    }

    pub fn authors_schema(&self) -> &TableSchema {
        &self.authors.schema
    }

    /// Number of (kit, author) documents loaded so far
    pub fn loaded(&self) -> (usize, usize) {
        (self.kits_loaded, self.authors_loaded)
    }

    /// Loads one `kit.json` document
    pub fn load_kit(&mut self, path: &Path) -> KitDbResult<()> {
        let document = read_document(path)?;
        load_document(
            self.conn()?,
            &self.kits.schema,
            &self.kits.statement,
            &document,
            path,
        )?;
        self.kits_loaded += 1;
        Ok(())
    }

    /// Loads one `info.json` document
    pub fn load_author(&mut self, path: &Path) -> KitDbResult<()> {
        let document = read_document(path)?;
        load_document(
            self.conn()?,
            &self.authors.schema,
            &self.authors.statement,
            &document,
            path,
        )?;
        self.authors_loaded += 1;
        Ok(())
    }

    /// Commits all pending writes and closes the connection
    pub fn close(mut self) -> KitDbResult<()> {
        self.finish(true)
    }

    fn finish(&mut self, success: bool) -> KitDbResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.state = SessionState::Closed;

        let end = if success || self.policy == CommitPolicy::Commit {
            "COMMIT"
        } else {
            "ROLLBACK"
        };
        if !conn.is_autocommit() {
            conn.execute_batch(end)?;
        }

        conn.close().map_err(|(_, e)| {
            KitDbError::ArtifactAccess(format!("Failed to close artifact: {}", e))
        })?;

        info!(
            "Closed artifact {} ({}: {} kits, {} authors)",
            self.path.display(),
            end,
            self.kits_loaded,
            self.authors_loaded
        );
        Ok(())
    }
}

impl Drop for BuildSession {
    fn drop(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        warn!(
            "Build session on {} ended early; finishing with {:?} policy",
            self.path.display(),
            self.policy
        );
        if let Err(e) = self.finish(false) {
            warn!("Failed to finish build session: {}", e);
        }
    }
}
