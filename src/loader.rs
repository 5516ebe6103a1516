//! # Document Loader
//!
//! Maps one JSON document onto a table's insert statement. The row is
//! built completely in memory first, so a document that fails validation
//! never reaches the database.

use crate::coerce::{coerce, SqlValue};
use crate::error::{KitDbError, KitDbResult};
use crate::inference::TableSchema;
use crate::statement::InsertStatement;
use rusqlite::Connection;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Derived column recording whether a banner image sits next to the document
pub const BANNER_COLUMN: &str = "has_banner";
/// File name of the companion banner image
pub const BANNER_FILE: &str = "banner.png";

/// Reads and parses a document file; the top level must be a JSON object
pub fn read_document(path: &Path) -> KitDbResult<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| KitDbError::invalid_document(path, e.to_string()))?;
    let document: Value = serde_json::from_str(&text)
        .map_err(|e| KitDbError::invalid_document(path, e.to_string()))?;

    if !document.is_object() {
        return Err(KitDbError::invalid_document(path, "top level is not a JSON object"));
    }
    Ok(document)
}

fn has_banner(path: &Path) -> bool {
    path.parent()
        .map(|dir| dir.join(BANNER_FILE).is_file())
        .unwrap_or(false)
}

/// Builds the row for `document`, aligned with `schema` column order
///
/// A `null` field counts as absent.
pub fn build_row(schema: &TableSchema, document: &Value, path: &Path) -> KitDbResult<Vec<SqlValue>> {
    let fields = document
        .as_object()
        .ok_or_else(|| KitDbError::invalid_document(path, "top level is not a JSON object"))?;

    let mut row = Vec::with_capacity(schema.len());
    for column in &schema.columns {
        if column.name == BANNER_COLUMN {
            row.push(coerce(&Value::Bool(has_banner(path)), column)?);
            continue;
        }

        match fields.get(&column.name).filter(|v| !v.is_null()) {
            Some(value) => row.push(coerce(value, column)?),
            None if column.required => {
                return Err(KitDbError::MissingRequiredField {
                    table: schema.name.clone(),
                    field: column.name.clone(),
                    document: path.display().to_string(),
                });
            }
            None => row.push(SqlValue::Null),
        }
    }

    Ok(row)
}

/// Validates, coerces and inserts one document
pub fn load_document(
    conn: &Connection,
    schema: &TableSchema,
    statement: &InsertStatement,
    document: &Value,
    path: &Path,
) -> KitDbResult<()> {
    let row = build_row(schema, document, path)?;
    if row.len() != statement.arity() {
        return Err(KitDbError::Internal(anyhow::anyhow!(
            "Row for '{}' has {} values but the statement binds {}",
            statement.table(),
            row.len(),
            statement.arity()
        )));
    }

    let mut stmt = conn.prepare_cached(statement.sql())?;
    stmt.execute(rusqlite::params_from_iter(row.iter()))?;

    debug!("Loaded {} into '{}'", path.display(), statement.table());
    Ok(())
}
