//! # Annotation Module
//!
//! Parser for the per-field annotation mini-language carried by `#[orm("...")]`.
//!
//! An annotation is a list of semicolon-separated clauses. Each clause is either
//! a bare `key` or a `key:value` pair; keys are case-insensitive:
//!
//! ```text
//! primaryKey;autoIncrement;column:user_name;size:100;not null;default:'pending';uniqueIndex:uix_internal
//! ```
//!
//! A lone `-` excludes the field from the schema. Unknown keys are reported with
//! `log::warn!` and otherwise ignored.

/// Attributes parsed from one field annotation.
///
/// Numeric clauses (`size`, `precision`, `scale`) are kept raw here and
/// validated when the schema parser resolves the field, so errors can name
/// the record and field they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub ignored: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub column: Option<String>,
    pub sql_type: Option<String>,
    pub size: Option<String>,
    pub precision: Option<String>,
    pub scale: Option<String>,
    pub not_null: bool,
    pub null: bool,
    pub unique: bool,
    pub default_value: Option<String>,
    /// Non-unique index groups; `None` requests a generated name.
    pub indexes: Vec<Option<String>>,
    /// Unique index groups; `None` requests a generated name.
    pub unique_indexes: Vec<Option<String>>,
    /// Keys that were not recognised, in order of appearance.
    pub unknown: Vec<String>,
}

impl FieldTag {
    /// Parses an annotation string.
    ///
    /// Never fails: malformed numeric values surface later, unknown keys are
    /// collected in [`FieldTag::unknown`].
    pub fn parse(tag: &str) -> Self {
        let mut parsed = FieldTag::default();
        if tag.trim() == "-" {
            parsed.ignored = true;
            return parsed;
        }

        for clause in tag.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }

            let (key, value) = match clause.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
                None => (clause, None),
            };
            let value = value.filter(|v| !v.is_empty());

            match normalize_key(key).as_str() {
                "-" => parsed.ignored = true,
                "primarykey" => parsed.primary_key = true,
                "autoincrement" => parsed.auto_increment = true,
                "column" => parsed.column = value,
                "type" => parsed.sql_type = value,
                "size" => parsed.size = value,
                "precision" => parsed.precision = value,
                "scale" => parsed.scale = value,
                "not null" => parsed.not_null = true,
                "null" => parsed.null = true,
                "unique" => parsed.unique = true,
                "default" => parsed.default_value = value,
                "index" => parsed.indexes.push(value),
                "uniqueindex" => parsed.unique_indexes.push(value),
                _ => parsed.unknown.push(key.to_string()),
            }
        }

        parsed
    }
}

/// Lowercases a key and collapses inner whitespace, so `NOT   NULL` matches `not null`.
fn normalize_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// Parses a numeric annotation value.
pub(crate) fn parse_number(key: &str, raw: &Option<String>) -> Result<Option<u32>, String> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| format!("`{key}` expects a non-negative integer, got `{value}`")),
    }
}
