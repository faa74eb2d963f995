//! # Schema Module
//!
//! The annotation parser: turns a [`RecordDescriptor`] into a [`Model`] and
//! caches the result per record type.
//!
//! The cache is owned by the parser (and the parser by the
//! [`Database`](crate::Database)), so two databases never share models built
//! with different naming strategies. Concurrent parses of the same type are
//! tolerated; the first stored model wins and every caller gets that instance.

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    Error,
    annotation::{FieldTag, parse_number},
    model::{Field, Index, Model, Record, RecordDescriptor},
    naming::{NamingStrategy, SnakeCasePlural},
};

/// Parses record descriptors into models and caches them by type.
pub struct SchemaParser {
    naming: Arc<dyn NamingStrategy>,
    cache: RwLock<HashMap<TypeId, Arc<Model>>>,
}

impl fmt::Debug for SchemaParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaParser")
            .field("naming", &self.naming)
            .field("cached", &self.cached())
            .finish()
    }
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new(Arc::new(SnakeCasePlural))
    }
}

impl SchemaParser {
    pub fn new(naming: Arc<dyn NamingStrategy>) -> Self {
        Self { naming, cache: RwLock::new(HashMap::new()) }
    }

    pub fn naming(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    /// Returns the model of `T`, parsing it on first use.
    pub fn parse<T: Record>(&self) -> Result<Arc<Model>, Error> {
        let key = TypeId::of::<T>();
        if let Some(model) = self.read().get(&key) {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(self.parse_descriptor(&T::descriptor())?);
        let mut cache = self.write();
        Ok(Arc::clone(cache.entry(key).or_insert(model)))
    }

    /// Number of cached models.
    pub fn cached(&self) -> usize {
        self.read().len()
    }

    /// Builds a model from a descriptor without touching the cache.
    pub fn parse_descriptor(&self, descriptor: &RecordDescriptor) -> Result<Model, Error> {
        let record = descriptor.name;
        if record.trim().is_empty() {
            return Err(Error::InvalidRecord("record type has no name".to_string()));
        }

        let table = match descriptor.table {
            Some(table) => table.to_string(),
            None => self.naming.table_name(record),
        };

        let mut fields: Vec<Field> = Vec::with_capacity(descriptor.fields.len());
        let mut by_name = HashMap::new();
        let mut by_column: HashMap<String, usize> = HashMap::new();
        let mut indexes: Vec<Index> = Vec::new();

        for (position, field) in descriptor.fields.iter().enumerate() {
            let tag = FieldTag::parse(field.tag);
            if tag.ignored {
                continue;
            }
            for key in &tag.unknown {
                log::warn!("{record}.{}: ignoring unknown annotation key `{key}`", field.name);
            }

            let invalid = |message: String| Error::InvalidAnnotation {
                record: record.to_string(),
                field: field.name.to_string(),
                message,
            };
            let size = parse_number("size", &tag.size).map_err(invalid)?;
            let precision = parse_number("precision", &tag.precision).map_err(invalid)?;
            let scale = parse_number("scale", &tag.scale).map_err(invalid)?;

            let column = match &tag.column {
                Some(column) => column.clone(),
                None => self.naming.column_name(field.name),
            };

            let nullable = if tag.primary_key || tag.not_null {
                false
            } else if tag.null {
                true
            } else {
                field.optional
            };

            let index = fields.len();
            if let Some(&first) = by_column.get(&column) {
                return Err(Error::DuplicateColumn {
                    record: record.to_string(),
                    column,
                    first: fields[first].name.clone(),
                    second: field.name.to_string(),
                });
            }

            let mut plain = Vec::new();
            for name in &tag.indexes {
                let name = name.clone().unwrap_or_else(|| self.naming.index_name("idx", &table, &column));
                join_index(&mut indexes, record, &name, false, &column)?;
                plain.push(name);
            }
            let mut unique = Vec::new();
            if tag.unique {
                let name = self.naming.index_name("uix", &table, &column);
                join_index(&mut indexes, record, &name, true, &column)?;
                unique.push(name);
            }
            for name in &tag.unique_indexes {
                let name = name.clone().unwrap_or_else(|| self.naming.index_name("uix", &table, &column));
                join_index(&mut indexes, record, &name, true, &column)?;
                unique.push(name);
            }

            by_column.insert(column.clone(), index);
            by_name.insert(field.name.to_string(), index);
            fields.push(Field {
                name: field.name.to_string(),
                kind: field.kind,
                column,
                position,
                is_primary_key: tag.primary_key,
                auto_increment: tag.auto_increment,
                is_required: !nullable,
                nullable,
                unique: tag.unique,
                size,
                precision,
                scale,
                default_value: tag.default_value,
                sql_type: tag.sql_type,
                indexes: plain,
                unique_indexes: unique,
                inline_primary_key: false,
            });
        }

        if fields.is_empty() {
            return Err(Error::InvalidRecord(format!("{record} maps no fields")));
        }

        let primary_keys: Vec<usize> = fields.iter().enumerate().filter(|(_, f)| f.is_primary_key).map(|(i, _)| i).collect();
        if let [only] = primary_keys.as_slice() {
            fields[*only].inline_primary_key = true;
        }

        Ok(Model {
            name: record.to_string(),
            table,
            fields,
            indexes,
            hooks: descriptor.hooks,
            by_name,
            by_column,
            primary_keys,
            value_count: descriptor.fields.len(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Arc<Model>>> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Arc<Model>>> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn join_index(indexes: &mut Vec<Index>, record: &str, name: &str, unique: bool, column: &str) -> Result<(), Error> {
    match indexes.iter_mut().find(|index| index.name == name) {
        Some(index) if index.unique != unique => {
            Err(Error::IndexConflict { record: record.to_string(), index: name.to_string() })
        }
        Some(index) => {
            if !index.columns.iter().any(|c| c == column) {
                index.columns.push(column.to_string());
            }
            Ok(())
        }
        None => {
            indexes.push(Index { name: name.to_string(), unique, columns: vec![column.to_string()] });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, ValueKind, hooks::HookFlags, model::FieldDescriptor};

    fn field(name: &'static str, kind: ValueKind, optional: bool, tag: &'static str) -> FieldDescriptor {
        FieldDescriptor { name, kind, optional, tag }
    }

    fn record(name: &'static str, fields: Vec<FieldDescriptor>) -> RecordDescriptor {
        RecordDescriptor { name, table: None, fields, hooks: HookFlags::default() }
    }

    #[test]
    fn test_basic_model() {
        let parser = SchemaParser::default();
        let model = parser
            .parse_descriptor(&record(
                "UserProfile",
                vec![
                    field("id", ValueKind::BigInt, false, "primaryKey;autoIncrement"),
                    field("displayName", ValueKind::Text, false, "size:80"),
                    field("bio", ValueKind::Text, true, ""),
                    field("cache", ValueKind::Text, false, "-"),
                    field("age", ValueKind::Int, false, "column:years;null"),
                ],
            ))
            .unwrap();

        assert_eq!(model.table, "user_profiles");
        assert_eq!(model.columns().collect::<Vec<_>>(), vec!["id", "display_name", "bio", "years"]);
        assert_eq!(model.value_count(), 5);
        assert_eq!(model.field("age").unwrap().position, 4);
        assert_eq!(model.field("displayName").unwrap().size, Some(80));
        assert!(model.field("bio").unwrap().nullable);
        assert!(model.field("age").unwrap().nullable);
        assert!(model.field("cache").is_none());
        assert_eq!(model.resolve("years").unwrap().name, "age");
        assert_eq!(model.resolve("age").unwrap().column, "years");
        assert_eq!(model.auto_increment_key().unwrap().name, "id");
        assert!(model.field("id").unwrap().inline_primary_key);
    }

    #[test]
    fn test_nullability_rules() {
        let parser = SchemaParser::default();
        let model = parser
            .parse_descriptor(&record(
                "Thing",
                vec![
                    field("code", ValueKind::Text, true, "primaryKey;null"),
                    field("a", ValueKind::Text, true, "not null"),
                    field("b", ValueKind::Text, false, "null;not null"),
                    field("c", ValueKind::Text, false, ""),
                ],
            ))
            .unwrap();

        for name in ["code", "a", "b", "c"] {
            let f = model.field(name).unwrap();
            assert!(!f.nullable, "{name} should not be nullable");
            assert!(f.is_required, "{name} should be required");
        }
    }

    #[test]
    fn test_explicit_table_and_composite_key() {
        let parser = SchemaParser::default();
        let mut descriptor = record(
            "Membership",
            vec![
                field("user_id", ValueKind::BigInt, false, "primaryKey"),
                field("group_id", ValueKind::BigInt, false, "primaryKey"),
            ],
        );
        descriptor.table = Some("group_members");
        let model = parser.parse_descriptor(&descriptor).unwrap();

        assert_eq!(model.table, "group_members");
        assert_eq!(model.primary_key_count(), 2);
        assert!(model.auto_increment_key().is_none());
        assert!(model.fields.iter().all(|f| !f.inline_primary_key));
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        let parser = SchemaParser::default();
        let err = parser
            .parse_descriptor(&record(
                "User",
                vec![
                    field("email", ValueKind::Text, false, ""),
                    field("contact", ValueKind::Text, false, "column:email"),
                ],
            ))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(matches!(err, Error::DuplicateColumn { ref first, ref second, .. } if first == "email" && second == "contact"));
    }

    #[test]
    fn test_malformed_size_is_rejected() {
        let parser = SchemaParser::default();
        let err = parser
            .parse_descriptor(&record("User", vec![field("name", ValueKind::Text, false, "size:big")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAnnotation { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_index_groups() {
        let parser = SchemaParser::default();
        let model = parser
            .parse_descriptor(&record(
                "Event",
                vec![
                    field("id", ValueKind::BigInt, false, "primaryKey;autoIncrement"),
                    field("tenant", ValueKind::Text, false, "uniqueIndex:uix_tenant_slug"),
                    field("slug", ValueKind::Text, false, "uniqueIndex:uix_tenant_slug"),
                    field("kind", ValueKind::Text, false, "index"),
                    field("email", ValueKind::Text, false, "unique"),
                ],
            ))
            .unwrap();

        assert_eq!(model.indexes.len(), 3);
        assert_eq!(model.indexes[0].name, "uix_tenant_slug");
        assert!(model.indexes[0].unique);
        assert_eq!(model.indexes[0].columns, vec!["tenant", "slug"]);
        assert_eq!(model.indexes[1].name, "idx_events_kind");
        assert!(!model.indexes[1].unique);
        assert_eq!(model.indexes[2], Index { name: "uix_events_email".to_string(), unique: true, columns: vec!["email".to_string()] });
        let email = model.field("email").unwrap();
        assert!(email.unique);
        assert_eq!(email.unique_indexes, vec!["uix_events_email"]);
    }

    #[test]
    fn test_bare_unique_conflicts_with_plain_index_of_same_name() {
        let parser = SchemaParser::default();
        let err = parser
            .parse_descriptor(&record(
                "Login",
                vec![
                    field("email", ValueKind::Text, false, "unique"),
                    field("alias", ValueKind::Text, false, "index:uix_logins_email"),
                ],
            ))
            .unwrap_err();
        assert!(matches!(err, Error::IndexConflict { ref index, .. } if index == "uix_logins_email"));
    }

    #[test]
    fn test_index_conflict_is_rejected() {
        let parser = SchemaParser::default();
        let err = parser
            .parse_descriptor(&record(
                "Event",
                vec![
                    field("a", ValueKind::Text, false, "uniqueIndex:shared"),
                    field("b", ValueKind::Text, false, "index:shared"),
                ],
            ))
            .unwrap_err();
        assert!(matches!(err, Error::IndexConflict { ref index, .. } if index == "shared"));
    }

    #[test]
    fn test_invalid_records() {
        let parser = SchemaParser::default();
        assert!(matches!(parser.parse_descriptor(&record("", vec![])), Err(Error::InvalidRecord(_))));
        assert!(matches!(
            parser.parse_descriptor(&record("Empty", vec![field("x", ValueKind::Int, false, "-")])),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_equal_descriptors_yield_equal_models() {
        let parser = SchemaParser::default();
        let make = || record("Tag", vec![field("id", ValueKind::Int, false, "primaryKey"), field("label", ValueKind::Text, false, "")]);
        assert_eq!(parser.parse_descriptor(&make()).unwrap(), parser.parse_descriptor(&make()).unwrap());
    }
}
