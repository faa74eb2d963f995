use super::{Dialect, decimal_type, text_type, unsupported};
use crate::{Error, Field, ValueKind};

/// PostgreSQL: numbered `$n` placeholders, `SERIAL` keys, `RETURNING`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn bind_cast(&self, kind: ValueKind) -> &'static str {
        match kind {
            ValueKind::Uuid => "::UUID",
            ValueKind::Date => "::DATE",
            ValueKind::Time => "::TIME",
            ValueKind::DateTime => "::TIMESTAMP",
            ValueKind::Timestamp => "::TIMESTAMPTZ",
            _ => "",
        }
    }

    fn base_type(&self, field: &Field) -> Result<String, Error> {
        Ok(match field.kind {
            ValueKind::Bool => "BOOLEAN".to_string(),
            ValueKind::SmallInt => "SMALLINT".to_string(),
            ValueKind::Int => "INTEGER".to_string(),
            ValueKind::BigInt => "BIGINT".to_string(),
            ValueKind::Real => decimal_type("NUMERIC", field).unwrap_or_else(|| "REAL".to_string()),
            ValueKind::Double => decimal_type("NUMERIC", field).unwrap_or_else(|| "DOUBLE PRECISION".to_string()),
            ValueKind::Text => text_type(field, "TEXT"),
            ValueKind::Blob => "BYTEA".to_string(),
            ValueKind::Uuid => "UUID".to_string(),
            ValueKind::Date => "DATE".to_string(),
            ValueKind::Time => "TIME".to_string(),
            ValueKind::DateTime => "TIMESTAMP".to_string(),
            ValueKind::Timestamp => "TIMESTAMPTZ".to_string(),
            ValueKind::Other(name) => {
                return Err(unsupported(field, format!("no PostgreSQL type for `{name}`; add a `type:` annotation")));
            }
        })
    }

    fn serial_type(&self, field: &Field) -> Option<&'static str> {
        match field.kind {
            ValueKind::SmallInt => Some("SMALLSERIAL"),
            ValueKind::Int => Some("SERIAL"),
            ValueKind::BigInt => Some("BIGSERIAL"),
            _ => None,
        }
    }

    fn select_column(&self, field: &Field) -> String {
        let column = self.quote(&field.column);
        match field.kind {
            kind if kind.is_textual() => format!("{column}::TEXT"),
            ValueKind::Real | ValueKind::Double if field.precision.is_some() => format!("{column}::DOUBLE PRECISION"),
            ValueKind::Text if field.sql_type.is_some() => format!("{column}::TEXT"),
            _ => column,
        }
    }

    fn returning(&self, column: &str) -> Option<String> {
        Some(format!(" RETURNING {}", self.quote(column)))
    }

    fn unbounded_limit(&self) -> &'static str {
        "ALL"
    }

    fn create_history_table(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) PRIMARY KEY, {} TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            self.quote(table),
            self.quote("id"),
            self.quote("applied_at"),
        )
    }
}
