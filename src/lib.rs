//! # kitdb
//!
//! Builds a queryable SQLite artifact from a tree of `kit.json` and
//! `info.json` documents. Each table's columns, types and NOT NULL
//! constraints are read from its `CREATE TABLE` text, and every document
//! is validated and coerced against them before it is inserted.
//!
//! ## Core Components
//!
//! - **Inference**: parses table definitions into ordered column descriptors
//! - **Statement**: builds the positional `INSERT` for a table
//! - **Coerce**: turns JSON values into SQLite storage values
//! - **Loader**: maps one document onto a row and inserts it
//! - **Db**: the build session owning the artifact connection
//! - **Build**: document discovery, load sequencing and the manifest

pub mod build;
pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod loader;
pub mod statement;

pub use config::{BuildConfig, CommitPolicy};
pub use error::{KitDbError, KitDbResult};
