use super::{Dialect, decimal_type, unsupported};
use crate::{Error, Field, Value, ValueKind, temporal};

/// MySQL and MariaDB: backtick quoting, `?` placeholders, `AUTO_INCREMENT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn base_type(&self, field: &Field) -> Result<String, Error> {
        Ok(match field.kind {
            ValueKind::Bool => "BOOLEAN".to_string(),
            ValueKind::SmallInt => "SMALLINT".to_string(),
            ValueKind::Int => "INT".to_string(),
            ValueKind::BigInt => "BIGINT".to_string(),
            ValueKind::Real => decimal_type("DECIMAL", field).unwrap_or_else(|| "FLOAT".to_string()),
            ValueKind::Double => decimal_type("DECIMAL", field).unwrap_or_else(|| "DOUBLE".to_string()),
            // TEXT columns cannot be keys or indexed without a prefix length.
            ValueKind::Text => match field.size {
                Some(size) => format!("VARCHAR({size})"),
                None if field.is_primary_key
                    || field.unique
                    || !field.indexes.is_empty()
                    || !field.unique_indexes.is_empty() =>
                {
                    "VARCHAR(255)".to_string()
                }
                None => "TEXT".to_string(),
            },
            ValueKind::Blob => "BLOB".to_string(),
            ValueKind::Uuid => "CHAR(36)".to_string(),
            ValueKind::Date => "DATE".to_string(),
            ValueKind::Time => "TIME(6)".to_string(),
            ValueKind::DateTime | ValueKind::Timestamp => "DATETIME(6)".to_string(),
            ValueKind::Other(name) => {
                return Err(unsupported(field, format!("no MySQL type for `{name}`; add a `type:` annotation")));
            }
        })
    }

    fn key_clause(&self, field: &Field) -> Result<String, Error> {
        let mut clause = String::new();
        if field.auto_increment {
            clause.push_str(" AUTO_INCREMENT");
        }
        if field.inline_primary_key {
            clause.push_str(" PRIMARY KEY");
        }
        Ok(clause)
    }

    /// `DATETIME(6)` / `TIME(6)` columns only accept a clock default of matching precision.
    fn default_expression(&self, field: &Field, expression: &str) -> String {
        let fractional = field.sql_type.is_none()
            && matches!(field.kind, ValueKind::Time | ValueKind::DateTime | ValueKind::Timestamp);
        let clock = ["CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP()", "NOW()", "LOCALTIMESTAMP"]
            .iter()
            .any(|name| expression.trim().eq_ignore_ascii_case(name));
        if fractional && clock {
            let function = if field.kind == ValueKind::Time { "CURRENT_TIME(6)" } else { "CURRENT_TIMESTAMP(6)" };
            function.to_string()
        } else {
            expression.to_string()
        }
    }

    fn select_column(&self, field: &Field) -> String {
        let column = self.quote(&field.column);
        match field.kind {
            ValueKind::Date | ValueKind::Time | ValueKind::DateTime | ValueKind::Timestamp => {
                format!("CAST({column} AS CHAR)")
            }
            ValueKind::Real | ValueKind::Double if field.precision.is_some() => format!("CAST({column} AS DOUBLE)"),
            _ => column,
        }
    }

    fn inline_indexes(&self) -> bool {
        true
    }

    fn unbounded_limit(&self) -> &'static str {
        "18446744073709551615"
    }

    fn format_temporal(&self, value: &Value) -> Option<String> {
        temporal::mysql_text(value)
    }

    fn insert_default_values(&self, table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", self.quote(table))
    }

    fn create_history_table(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) PRIMARY KEY, {} DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP)",
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
        let d = MySqlDialect;
        assert_eq!(d.column_type(&serial_key()).unwrap(), "BIGINT AUTO_INCREMENT PRIMARY KEY");

        let email = Field { unique: true, ..field("email", ValueKind::Text) };
        assert_eq!(d.column_type(&email).unwrap(), "VARCHAR(255) NOT NULL");

        let bio = Field { is_required: false, nullable: true, ..field("bio", ValueKind::Text) };
        assert_eq!(d.column_type(&bio).unwrap(), "TEXT");

        assert_eq!(d.column_type(&field("token", ValueKind::Uuid)).unwrap(), "CHAR(36) NOT NULL");
    }

    #[test]
    fn test_clock_defaults_match_fractional_precision() {
        let d = MySqlDialect;
        let created = Field { default_value: Some("CURRENT_TIMESTAMP".to_string()), ..field("created_at", ValueKind::Timestamp) };
        assert_eq!(d.column_type(&created).unwrap(), "DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)");

        let plain = Field { sql_type: Some("DATETIME".to_string()), ..created.clone() };
        assert_eq!(d.column_type(&plain).unwrap(), "DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP");

        let attempts = Field { default_value: Some("0".to_string()), ..field("attempts", ValueKind::Int) };
        assert_eq!(d.column_type(&attempts).unwrap(), "INT NOT NULL DEFAULT 0");
    }

    #[test]
    fn test_generated_key_comes_from_last_insert_id() {
        assert_eq!(MySqlDialect.returning("id"), None);
    }

    #[test]
    fn test_placeholders_and_limits() {
        let d = MySqlDialect;
        assert_eq!(d.placeholder(7), "?");
        assert_eq!(d.limit_offset(None, Some(3)), " LIMIT 18446744073709551615 OFFSET 3");
        assert_eq!(d.insert_default_values("logs"), "INSERT INTO `logs` () VALUES ()");
    }

    #[test]
    fn test_select_casts_temporal_to_text() {
        assert_eq!(MySqlDialect.select_column(&field("born", ValueKind::Date)), "CAST(`born` AS CHAR)");
    }
}
