use super::{Dialect, text_type, unsupported};
use crate::{Error, Field, ValueKind};

/// SQLite: `?` placeholders, `INTEGER PRIMARY KEY AUTOINCREMENT`.
///
/// UUIDs and temporal values are stored as `TEXT` so the `Any` driver reads
/// them back as strings. Booleans are stored as `INTEGER`; the `Any` driver
/// cannot decode a declared `BOOLEAN` column. Generated keys are read with
/// `RETURNING` (SQLite 3.35+) since the `Any` driver reports no last insert id.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn base_type(&self, field: &Field) -> Result<String, Error> {
        Ok(match field.kind {
            ValueKind::Bool | ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt => "INTEGER".to_string(),
            ValueKind::Real | ValueKind::Double => "REAL".to_string(),
            ValueKind::Text => text_type(field, "TEXT"),
            ValueKind::Blob => "BLOB".to_string(),
            ValueKind::Uuid | ValueKind::Date | ValueKind::Time | ValueKind::DateTime | ValueKind::Timestamp => {
                "TEXT".to_string()
            }
            ValueKind::Other(name) => {
                return Err(unsupported(field, format!("no SQLite type for `{name}`; add a `type:` annotation")));
            }
        })
    }

    fn serial_type(&self, _field: &Field) -> Option<&'static str> {
        Some("INTEGER")
    }

    fn key_clause(&self, field: &Field) -> Result<String, Error> {
        match (field.inline_primary_key, field.auto_increment) {
            (true, true) => Ok(" PRIMARY KEY AUTOINCREMENT".to_string()),
            (true, false) => Ok(" PRIMARY KEY".to_string()),
            (false, true) => Err(unsupported(
                field,
                "SQLite supports AUTOINCREMENT only on a single INTEGER PRIMARY KEY".to_string(),
            )),
            (false, false) => Ok(String::new()),
        }
    }

    fn returning(&self, column: &str) -> Option<String> {
        Some(format!(" RETURNING {}", self.quote(column)))
    }

    fn unbounded_limit(&self) -> &'static str {
        "-1"
    }

    fn create_history_table(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY, {} TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            self.quote(table),
            self.quote("id"),
            self.quote("applied_at"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tests::{field, serial_key};

    #[test]
    fn test_column_types() {
        let d = SqliteDialect;
        assert_eq!(d.column_type(&serial_key()).unwrap(), "INTEGER PRIMARY KEY AUTOINCREMENT");
        assert_eq!(d.column_type(&field("created", ValueKind::Timestamp)).unwrap(), "TEXT NOT NULL");

        let status = Field { default_value: Some("'pending'".to_string()), ..field("status", ValueKind::Text) };
        assert_eq!(d.column_type(&status).unwrap(), "TEXT NOT NULL DEFAULT 'pending'");
        assert_eq!(d.column_type(&field("active", ValueKind::Bool)).unwrap(), "INTEGER NOT NULL");
    }

    #[test]
    fn test_generated_key_is_returned() {
        assert_eq!(SqliteDialect.returning("id").as_deref(), Some(" RETURNING \"id\""));
    }

    #[test]
    fn test_autoincrement_outside_single_key_fails() {
        let f = Field { is_primary_key: true, auto_increment: true, ..field("id", ValueKind::BigInt) };
        assert!(matches!(SqliteDialect.column_type(&f), Err(Error::UnsupportedType { .. })));
    }

    #[test]
    fn test_history_statements() {
        let d = SqliteDialect;
        assert_eq!(d.list_applied("keel_migrations"), "SELECT \"id\" FROM \"keel_migrations\" ORDER BY \"id\"");
        assert_eq!(d.insert_applied("keel_migrations"), "INSERT INTO \"keel_migrations\" (\"id\") VALUES (?)");
    }
}
