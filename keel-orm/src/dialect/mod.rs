//! # Dialect Module
//!
//! Everything that differs between database products lives behind the
//! [`Dialect`] trait: identifier quoting, placeholder syntax, column type
//! mapping, row-limit rendering and the migration-history statements. The
//! query builder, condition builder and migrator are written once against it.
//!
//! Dialects are looked up by name in a [`DialectRegistry`]. A registry is an
//! ordinary value owned by whoever builds the [`Database`](crate::Database);
//! [`DialectRegistry::with_defaults`] knows PostgreSQL, MySQL/MariaDB and SQLite.

mod mysql;
mod postgres;
mod sqlite;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::{Error, Field, Value, ValueKind, temporal};

// ============================================================================
// Dialect Trait
// ============================================================================

/// Syntax capabilities of one database product.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Registry name, e.g. `"postgres"`.
    fn name(&self) -> &'static str;

    /// Character used to quote identifiers.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote(&self, identifier: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(identifier.len() + 2);
        out.push(q);
        for c in identifier.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Parameter marker for the 1-based position `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Cast appended to a placeholder for values bound as text.
    fn bind_cast(&self, _kind: ValueKind) -> &'static str {
        ""
    }

    /// Column type of a field without an explicit `type:` override.
    fn base_type(&self, field: &Field) -> Result<String, Error>;

    /// Type used for an auto-increment key, when the product spells it as a type.
    fn serial_type(&self, _field: &Field) -> Option<&'static str> {
        None
    }

    /// Key clause appended after the column type (`PRIMARY KEY`, `AUTO_INCREMENT`, ...).
    fn key_clause(&self, field: &Field) -> Result<String, Error> {
        Ok(if field.inline_primary_key { " PRIMARY KEY".to_string() } else { String::new() })
    }

    /// Full column type and constraint fragment for `CREATE TABLE`.
    ///
    /// An explicit `type:` override is used verbatim; constraint clauses are
    /// still appended.
    fn column_type(&self, field: &Field) -> Result<String, Error> {
        if field.auto_increment && !field.kind.is_integer() {
            return Err(unsupported(field, format!("autoIncrement requires an integer field, found {:?}", field.kind)));
        }

        let mut sql = match (&field.sql_type, field.auto_increment) {
            (Some(explicit), _) => explicit.clone(),
            (None, true) => match self.serial_type(field) {
                Some(serial) => serial.to_string(),
                None => self.base_type(field)?,
            },
            (None, false) => self.base_type(field)?,
        };

        sql.push_str(&self.key_clause(field)?);
        if field.is_required && !field.inline_primary_key {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_expression(field, default));
        }
        Ok(sql)
    }

    /// Default expression as written into `CREATE TABLE`.
    fn default_expression(&self, _field: &Field, expression: &str) -> String {
        expression.to_string()
    }

    /// Expression selecting a column so the `Any` driver can decode it.
    fn select_column(&self, field: &Field) -> String {
        self.quote(&field.column)
    }

    /// `RETURNING` clause for the generated key, if the product needs one to report it.
    fn returning(&self, _column: &str) -> Option<String> {
        None
    }

    /// Whether indexes must be declared inside `CREATE TABLE`.
    fn inline_indexes(&self) -> bool {
        false
    }

    /// Literal accepted as "no limit" by `LIMIT`.
    fn unbounded_limit(&self) -> &'static str;

    /// `LIMIT` / `OFFSET` suffix. An offset without a limit gets an unbounded limit.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (None, Some(offset)) => format!(" LIMIT {} OFFSET {offset}", self.unbounded_limit()),
        }
    }

    /// Text representation used when binding temporal values.
    fn format_temporal(&self, value: &Value) -> Option<String> {
        temporal::iso_text(value)
    }

    /// Insert statement for a row whose every column takes its default.
    fn insert_default_values(&self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", self.quote(table))
    }

    // ------------------------------------------------------------------------
    // Migration history
    // ------------------------------------------------------------------------

    fn create_history_table(&self, table: &str) -> String;

    fn list_applied(&self, table: &str) -> String {
        format!("SELECT {id} FROM {} ORDER BY {id}", self.quote(table), id = self.quote("id"))
    }

    fn insert_applied(&self, table: &str) -> String {
        format!("INSERT INTO {} ({}) VALUES ({})", self.quote(table), self.quote("id"), self.placeholder(1))
    }

    fn delete_applied(&self, table: &str) -> String {
        format!("DELETE FROM {} WHERE {} = {}", self.quote(table), self.quote("id"), self.placeholder(1))
    }
}

pub(crate) fn unsupported(field: &Field, message: String) -> Error {
    Error::UnsupportedType { record: String::new(), field: field.name.clone(), message }
}

/// `VARCHAR(n)` when a size is set, otherwise the product's unbounded text type.
pub(crate) fn text_type(field: &Field, unbounded: &str) -> String {
    match field.size {
        Some(size) => format!("VARCHAR({size})"),
        None => unbounded.to_string(),
    }
}

/// `NAME(p[,s])` for fields declaring a precision.
pub(crate) fn decimal_type(name: &str, field: &Field) -> Option<String> {
    match (field.precision, field.scale) {
        (Some(p), Some(s)) => Some(format!("{name}({p},{s})")),
        (Some(p), None) => Some(format!("{name}({p})")),
        _ => None,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Factory producing a dialect instance.
pub type DialectFactory = Box<dyn Fn() -> Arc<dyn Dialect> + Send + Sync>;

/// Name → dialect factory map. Each name may be registered once.
pub struct DialectRegistry {
    factories: RwLock<HashMap<String, DialectFactory>>,
}

impl fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectRegistry").field("names", &self.names()).finish()
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DialectRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// A registry holding the built-in dialects under their common URL schemes.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let builtin: [(&str, fn() -> Arc<dyn Dialect>); 5] = [
            ("postgres", || Arc::new(PostgresDialect)),
            ("postgresql", || Arc::new(PostgresDialect)),
            ("mysql", || Arc::new(MySqlDialect)),
            ("mariadb", || Arc::new(MySqlDialect)),
            ("sqlite", || Arc::new(SqliteDialect)),
        ];
        let mut factories = registry.factories.write().unwrap_or_else(|p| p.into_inner());
        for (name, factory) in builtin {
            factories.insert(name.to_string(), Box::new(factory));
        }
        drop(factories);
        registry
    }

    /// Registers a dialect factory. Names are case-insensitive.
    ///
    /// Registering a name twice is a configuration error.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<(), Error>
    where
        F: Fn() -> Arc<dyn Dialect> + Send + Sync + 'static,
    {
        let key = name.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(Error::Configuration("dialect name must not be empty".to_string()));
        }
        let mut factories = self.factories.write().unwrap_or_else(|p| p.into_inner());
        if factories.contains_key(&key) {
            return Err(Error::Configuration(format!("dialect `{key}` is already registered")));
        }
        factories.insert(key, Box::new(factory));
        Ok(())
    }

    /// Instantiates the dialect registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Dialect>, Error> {
        let key = name.trim().to_ascii_lowercase();
        let factories = self.factories.read().unwrap_or_else(|p| p.into_inner());
        factories
            .get(&key)
            .map(|factory| factory())
            .ok_or_else(|| Error::Configuration(format!("no dialect registered for `{key}`")))
    }

    /// Resolves the dialect from a connection URL's scheme (`postgres://...`, `sqlite::memory:`).
    pub fn resolve_url(&self, url: &str) -> Result<Arc<dyn Dialect>, Error> {
        let (scheme, _) = url
            .split_once(':')
            .ok_or_else(|| Error::Configuration(format!("connection URL `{url}` has no scheme")))?;
        self.resolve(scheme)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(|p| p.into_inner());
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A plain required field, for dialect tests.
    pub(crate) fn field(name: &str, kind: ValueKind) -> Field {
        Field {
            name: name.to_string(),
            kind,
            column: name.to_string(),
            position: 0,
            is_primary_key: false,
            auto_increment: false,
            is_required: true,
            nullable: false,
            unique: false,
            size: None,
            precision: None,
            scale: None,
            default_value: None,
            sql_type: None,
            indexes: Vec::new(),
            unique_indexes: Vec::new(),
            inline_primary_key: false,
        }
    }

    pub(crate) fn serial_key() -> Field {
        Field { is_primary_key: true, auto_increment: true, inline_primary_key: true, ..field("id", ValueKind::BigInt) }
    }

    #[test]
    fn test_registry_defaults() {
        let registry = DialectRegistry::with_defaults();
        assert_eq!(registry.resolve("postgres").unwrap().name(), "postgres");
        assert_eq!(registry.resolve("PostgreSQL").unwrap().name(), "postgres");
        assert_eq!(registry.resolve("mariadb").unwrap().name(), "mysql");
        assert_eq!(registry.resolve_url("sqlite::memory:").unwrap().name(), "sqlite");
        assert_eq!(registry.resolve_url("mysql://root@localhost/app").unwrap().name(), "mysql");
        assert!(matches!(registry.resolve("oracle"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = DialectRegistry::new();
        registry.register("lite", || Arc::new(SqliteDialect)).unwrap();
        let err = registry.register("LITE", || Arc::new(SqliteDialect)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(registry.names(), vec!["lite".to_string()]);
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(PostgresDialect.quote("user"), "\"user\"");
        assert_eq!(PostgresDialect.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySqlDialect.quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_constraints_are_appended_to_override() {
        let f = Field {
            sql_type: Some("CITEXT".to_string()),
            default_value: Some("'anon'".to_string()),
            ..field("handle", ValueKind::Text)
        };
        assert_eq!(PostgresDialect.column_type(&f).unwrap(), "CITEXT NOT NULL DEFAULT 'anon'");
    }

    #[test]
    fn test_unmapped_kinds_fail() {
        let other = field("payload", ValueKind::Other("serde_json::Value"));
        for dialect in [&PostgresDialect as &dyn Dialect, &MySqlDialect, &SqliteDialect] {
            assert!(matches!(dialect.column_type(&other), Err(Error::UnsupportedType { .. })));
        }

        let text_key = Field { auto_increment: true, ..field("code", ValueKind::Text) };
        assert!(PostgresDialect.column_type(&text_key).is_err());
    }

    #[test]
    fn test_limit_offset() {
        let d = SqliteDialect;
        assert_eq!(d.limit_offset(None, None), "");
        assert_eq!(d.limit_offset(Some(0), None), " LIMIT 0");
        assert_eq!(d.limit_offset(Some(10), Some(20)), " LIMIT 10 OFFSET 20");
        assert_eq!(d.limit_offset(None, Some(5)), " LIMIT -1 OFFSET 5");
        assert_eq!(PostgresDialect.limit_offset(None, Some(5)), " LIMIT ALL OFFSET 5");
    }
}
