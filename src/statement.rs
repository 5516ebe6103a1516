//! # Statement Builder
//!
//! Builds the parameterized `INSERT` for a table schema. Placeholders are
//! numbered and follow descriptor order one-to-one; a row is bound by
//! position, so a reordered column list would put values in the wrong
//! columns without any error from SQLite.
//!
//! Table and column names are always emitted as double-quoted identifiers,
//! so keyword names such as `key` or `order` bind like any other column.

use crate::error::{KitDbError, KitDbResult};
use crate::inference::TableSchema;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUOTED_IDENTIFIER_REGEX: Regex = Regex::new(r#""((?:[^"]|"")*)""#).unwrap();
}

/// Validates that a name can be used as a quoted table/column identifier
///
/// # Rules
/// - 1-128 characters
/// - No control characters
pub fn validate_identifier(name: &str) -> KitDbResult<()> {
    if name.is_empty() || name.chars().count() > 128 {
        return Err(KitDbError::InvalidIdentifier(format!(
            "Identifier '{}' must be 1-128 characters",
            name
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(KitDbError::InvalidIdentifier(format!(
            "Identifier {:?} contains control characters",
            name
        )));
    }

    Ok(())
}

/// Wraps a name in double quotes, doubling any embedded quote
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A cached `INSERT` bound to one table's column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    sql: String,
    arity: usize,
}

impl InsertStatement {
    /// Builds `INSERT INTO <table> (<c1>, ...) VALUES (?1, ...)`
    pub fn build(schema: &TableSchema) -> KitDbResult<Self> {
        validate_identifier(&schema.name)?;
        for column in &schema.columns {
            validate_identifier(&column.name)?;
        }

        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&schema.name),
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(Self {
            table: schema.name.clone(),
            sql,
            arity: columns.len(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of placeholders, equal to the schema's column count
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Reads the column list back out of the generated SQL
    ///
    /// The first quoted identifier is the table; placeholders are never quoted.
    pub fn column_names(&self) -> Vec<String> {
        QUOTED_IDENTIFIER_REGEX
            .captures_iter(&self.sql)
            .skip(1)
            .map(|cap| cap[1].replace("\"\"", "\""))
            .collect()
    }
}
