//! # Value Coercer
//!
//! Converts JSON document values into what SQLite stores for a column.
//!
//! | JSON value       | Column type       | Stored as                 |
//! |------------------|-------------------|---------------------------|
//! | Boolean          | any               | INTEGER 1 / 0             |
//! | Array / Object   | text, structured  | TEXT (serialized JSON)    |
//! | String           | text              | TEXT                      |
//! | Integer (i64)    | integer           | INTEGER                   |
//! | 0 / 1            | boolean           | INTEGER                   |
//! | Number           | real              | REAL                      |
//! | JSON text        | structured        | TEXT (unchanged)          |
//!
//! Every other combination is a [`KitDbError::ValueType`].

use std::io;

use crate::error::{KitDbError, KitDbResult};
use crate::inference::{ColumnDescriptor, SemanticType};
use serde::Serialize;
use serde_json::Value;

/// SQL Value wrapper for parameters
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// The JSON value this storage value reads back as
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};

        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Writes `", "` between items and `": "` after keys
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Serializes a value as single-line JSON with spaced separators
pub fn to_json_text(value: &Value) -> KitDbResult<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| KitDbError::Internal(e.into()))
}

/// Coerces a document value into the storage value for `column`
///
/// Booleans are checked first so they never fall through to the numeric
/// rules.
pub fn coerce(value: &Value, column: &ColumnDescriptor) -> KitDbResult<SqlValue> {
    if let Value::Bool(b) = value {
        return Ok(SqlValue::Integer(i64::from(*b)));
    }

    let is_container = matches!(value, Value::Array(_) | Value::Object(_));
    if is_container && column.semantic_type == SemanticType::Text {
        return Ok(SqlValue::Text(to_json_text(value)?));
    }

    let coerced = match (column.semantic_type, value) {
        (SemanticType::Text, Value::String(s)) => Some(SqlValue::Text(s.clone())),
        (SemanticType::Integer, Value::Number(n)) => n.as_i64().map(SqlValue::Integer),
        (SemanticType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(i @ (0 | 1)) => Some(SqlValue::Integer(i)),
            _ => None,
        },
        (SemanticType::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real),
        (SemanticType::Structured, Value::Array(_) | Value::Object(_)) => {
            Some(SqlValue::Text(to_json_text(value)?))
        }
        (SemanticType::Structured, Value::String(s)) if is_json_container(s) => {
            Some(SqlValue::Text(s.clone()))
        }
        _ => None,
    };

    coerced.ok_or_else(|| KitDbError::ValueType {
        column: column.name.clone(),
        value: value.to_string(),
        expected: column.semantic_type.as_str(),
    })
}

fn is_json_container(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Array(_) | Value::Object(_))
    )
}
