//! Table, column and index naming.
//!
//! The default strategy converts record names to pluralised snake_case table
//! names (`UserProfile` → `user_profiles`) and field names to snake_case
//! column names. The `r#` prefix of raw identifiers is stripped.

use std::fmt::Debug;

use heck::ToSnakeCase;

/// Longest index name emitted; the smallest identifier limit among supported databases.
pub const MAX_INDEX_NAME_LEN: usize = 63;

/// Maps logical record and field names to database identifiers.
pub trait NamingStrategy: Send + Sync + Debug {
    /// Table name for a record type name.
    fn table_name(&self, record: &str) -> String;

    /// Column name for a logical field name.
    fn column_name(&self, field: &str) -> String;

    /// Generated name for an index that was declared without one.
    ///
    /// `prefix` is `idx` for plain and `uix` for unique indexes. The result is
    /// truncated to [`MAX_INDEX_NAME_LEN`] bytes.
    fn index_name(&self, prefix: &str, table: &str, column: &str) -> String {
        let mut name = format!("{prefix}_{table}_{column}");
        if name.len() > MAX_INDEX_NAME_LEN {
            let mut cut = MAX_INDEX_NAME_LEN;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            name.truncate(cut);
        }
        name
    }
}

/// Default strategy: snake_case columns, pluralised snake_case tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnakeCasePlural;

impl NamingStrategy for SnakeCasePlural {
    fn table_name(&self, record: &str) -> String {
        let snake = strip_raw(record).to_snake_case();
        match snake.rsplit_once('_') {
            Some((head, last)) => format!("{head}_{}", pluralize(last)),
            None => pluralize(&snake),
        }
    }

    fn column_name(&self, field: &str) -> String {
        strip_raw(field).to_snake_case()
    }
}

fn strip_raw(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

const UNCOUNTABLE: &[&str] = &["data", "equipment", "information", "metadata", "news", "series", "species"];

/// English pluralisation of a single lowercase word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return (*plural).to_string();
    }

    let ends_with_consonant_y = word.ends_with('y')
        && word.len() > 1
        && !matches!(word.as_bytes()[word.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u');

    if ends_with_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}
