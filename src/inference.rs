//! # Inference Engine (Schema Descriptors)
//!
//! Reads `CREATE TABLE` text and derives the ordered column descriptors
//! every document of that table is validated against.
//!
//! ## Type Mapping
//!
//! | Declared type                              | Semantic type |
//! |--------------------------------------------|---------------|
//! | TEXT, VARCHAR, CHAR, CHARACTER, CLOB, STRING | Text        |
//! | INTEGER, INT, BIGINT, SMALLINT, TINYINT, MEDIUMINT | Integer |
//! | BOOLEAN, BOOL                              | Boolean       |
//! | JSON, JSONB                                | Structured    |
//! | REAL, FLOAT, DOUBLE, NUMERIC, DECIMAL      | Real          |
//! | anything else / missing                    | Text          |
//!
//! Column order in the output is the declaration order. The insert
//! statement binds placeholders positionally against it, so nothing
//! downstream may reorder the descriptors.

use crate::error::{KitDbError, KitDbResult};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Name of the surrogate key column, never part of a descriptor list
pub const SURROGATE_KEY: &str = "id";

lazy_static! {
    static ref CREATE_TABLE_REGEX: Regex = Regex::new(
        r#"(?i)CREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?["`\[]?([A-Za-z_][A-Za-z0-9_]*)["`\]]?"#
    )
    .unwrap();
    static ref NOT_NULL_REGEX: Regex = Regex::new(r"(?i)\bNOT\s+NULL\b").unwrap();
    static ref TABLE_CONSTRAINT_REGEX: Regex =
        Regex::new(r"(?i)^(?:PRIMARY\s+KEY|UNIQUE|FOREIGN\s+KEY|CHECK|CONSTRAINT)\b").unwrap();
}

/// Abstract value category a column accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Text,
    Integer,
    Boolean,
    Structured,
    Real,
}

impl SemanticType {
    /// Maps a declared storage type token to its semantic type.
    /// Unrecognized tokens fall back to `Text`.
    pub fn from_declared(declared: &str) -> Self {
        let base = declared
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => {
                SemanticType::Integer
            }
            "BOOLEAN" | "BOOL" => SemanticType::Boolean,
            "JSON" | "JSONB" => SemanticType::Structured,
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => SemanticType::Real,
            _ => SemanticType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::Integer => "integer",
            SemanticType::Boolean => "boolean",
            SemanticType::Structured => "structured",
            SemanticType::Real => "real",
        }
    }
}

/// One non-key column of a table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub required: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType, required: bool) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            required,
        }
    }
}

/// Ordered column descriptors for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Parses a `CREATE TABLE` statement into a [`TableSchema`]
///
/// Accepts one column per line as well as single-line definitions.
/// Comments and table constraints are skipped, and so is the `id` column.
pub fn parse_table_definition(definition: &str) -> KitDbResult<TableSchema> {
    let stripped = strip_comments(definition);

    let header = CREATE_TABLE_REGEX
        .captures(&stripped)
        .ok_or_else(|| KitDbError::Schema("No CREATE TABLE header found".to_string()))?;
    let table = header[1].to_string();
    let header_end = header.get(0).map(|m| m.end()).unwrap_or_default();

    let body = column_body(&stripped[header_end..]).ok_or_else(|| {
        KitDbError::Schema(format!("Table '{}' has no column list", table))
    })?;

    let columns: Vec<ColumnDescriptor> = split_top_level(body)
        .into_iter()
        .filter_map(parse_column_entry)
        .filter(|col| !col.name.eq_ignore_ascii_case(SURROGATE_KEY))
        .collect();

    if columns.is_empty() {
        return Err(KitDbError::Schema(format!(
            "Table '{}' declares no columns besides '{}'",
            table, SURROGATE_KEY
        )));
    }

    debug!("Parsed table '{}' with {} columns", table, columns.len());
    Ok(TableSchema {
        name: table,
        columns,
    })
}

/// Tracks quoted regions (`'..'`, `".."`, `` `..` ``, `[..]`).
/// Returns true when `c` opens, closes or sits inside one.
fn in_quoted(quote: &mut Option<char>, c: char) -> bool {
    match *quote {
        Some(close) => {
            if c == close {
                *quote = None;
            }
            true
        }
        None => match c {
            '\'' | '"' | '`' => {
                *quote = Some(c);
                true
            }
            '[' => {
                *quote = Some(']');
                true
            }
            _ => false,
        },
    }
}

/// Removes `--` and `/* */` comments that are not inside quoted text
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quoted(&mut quote, c) {
            out.push(c);
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('-', Some('-')) => {
                while chars.next_if(|&n| n != '\n').is_some() {}
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Returns the text between the first `(` and its matching `)`
fn column_body(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    let mut quote = None;
    for (i, c) in text[open..].char_indices() {
        if in_quoted(&mut quote, c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas that are outside parentheses and quoted text
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        if in_quoted(&mut quote, c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_column_entry(entry: &str) -> Option<ColumnDescriptor> {
    if TABLE_CONSTRAINT_REGEX.is_match(entry) {
        return None;
    }

    let mut tokens = entry.split_whitespace();
    let name = tokens
        .next()?
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string();
    if name.is_empty() {
        return None;
    }

    let semantic_type = tokens
        .next()
        .map(SemanticType::from_declared)
        .unwrap_or(SemanticType::Text);

    Some(ColumnDescriptor {
        name,
        semantic_type,
        required: NOT_NULL_REGEX.is_match(entry),
    })
}
