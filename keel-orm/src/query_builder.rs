//! # Query Builder Module
//!
//! The CRUD engine. A [`QueryBuilder`] is created with `db.model::<T>()` (or
//! `tx.model::<T>()`), collects filters, ordering and row limits, and is
//! consumed by one operation.
//!
//! ## Operations
//!
//! - [`create`](QueryBuilder::create) - INSERT, write back the generated key, re-select the row
//! - [`find_by_id`](QueryBuilder::find_by_id) / [`first`](QueryBuilder::first) - one row or `Error::NotFound`
//! - [`find`](QueryBuilder::find) / [`scan`](QueryBuilder::scan) - zero or more rows
//! - [`count`](QueryBuilder::count) - `COUNT(*)` over the same filters
//! - [`updates`](QueryBuilder::updates) - UPDATE by primary key from a column → value map
//! - [`delete`](QueryBuilder::delete) - DELETE by primary key
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut user = User { id: 0, name: "Alice".into(), age: 30, email: None };
//! db.model::<User>().create(&mut user).await?;
//!
//! let older = db.model::<User>()
//!     .where_map([("age >=", 30)])
//!     .order("\"age\" DESC")
//!     .limit(10)
//!     .scan()
//!     .await?;
//!
//! db.model::<User>().updates(&mut user, Changes::from([("age".to_string(), 31.into())])).await?;
//! db.model::<User>().delete(&mut user).await?;
//! ```

use std::{marker::PhantomData, sync::Arc};

use sqlx::any::AnyRow;

use crate::{
    Error, Model, Record, Value, ValueKind,
    condition::{self, Filter, Operand},
    database::{ExecResult, Executor},
    dialect::Dialect,
    hooks::{self, Changes},
    model::Field,
    value_binding::{Statement, decode_column, decode_row},
};

/// Column names filled in by the database when left at their default.
const TIMESTAMP_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// Largest row count accepted in `LIMIT` / `OFFSET` by every supported product.
const MAX_ROWS: u64 = i64::MAX as u64;

/// A fluent builder for one CRUD operation on record type `T`, running on executor `E`.
pub struct QueryBuilder<T, E> {
    pub(crate) conn: E,
    pub(crate) model: Option<Arc<Model>>,
    pub(crate) error: Option<Error>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) order: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record, E: Executor> QueryBuilder<T, E> {
    /// Creates a builder, parsing (or fetching the cached) model of `T`.
    ///
    /// A parse failure is reported by the operation that consumes the builder.
    pub fn new(conn: E) -> Self {
        let (model, error) = match conn.schema().parse::<T>() {
            Ok(model) => (Some(model), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            conn,
            model,
            error,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    /// The parsed model, unless parsing failed.
    pub fn schema(&self) -> Option<&Model> {
        self.model.as_deref()
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Adds a condition. Conditions are ANDed.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds map-form conditions such as `("age >=", 35)` or `("name IN", vec!["a", "b"])`.
    ///
    /// A malformed entry fails the operation that consumes the builder.
    pub fn where_map<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Operand>,
    {
        for (key, operand) in entries {
            match Filter::from_key(key.as_ref(), operand) {
                Ok(filter) => self.filters.push(filter),
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        self
    }

    /// Adds an equality condition for every field of `example` holding a non-default value.
    pub fn where_record(mut self, example: &T) -> Self {
        if let Some(model) = &self.model {
            self.filters.extend(condition::example_filters(model, example));
        }
        self
    }

    /// Appends a raw `ORDER BY` term, e.g. `"\"age\" DESC"`.
    pub fn order(mut self, clause: &str) -> Self {
        self.order.push(clause.to_string());
        self
    }

    /// Sets the maximum number of rows. `limit(0)` returns no rows.
    ///
    /// Values above `i64::MAX` are clamped to it.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit.min(MAX_ROWS));
        self
    }

    /// Skips `offset` rows. Without a limit, an unbounded limit is emitted.
    ///
    /// Values above `i64::MAX` are clamped to it.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset.min(MAX_ROWS));
        self
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Inserts `record`.
    ///
    /// Auto-increment keys and `created_at` / `updated_at` columns holding
    /// their default value are left to the database. The generated key is
    /// written back and the row is re-selected so database-computed values
    /// land on `record`.
    pub async fn create(mut self, record: &mut T) -> Result<ExecResult, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();

        hooks::before_create(&model, record, &mut self.conn).await?;

        let values = record.to_values();
        let mut stmt = Statement::default();
        let mut columns = Vec::new();
        let mut binds = Vec::new();
        for field in &model.fields {
            let value = value_at(&values, field);
            let db_filled = field.auto_increment || TIMESTAMP_COLUMNS.contains(&field.column.as_str());
            if db_filled && value.is_default() {
                continue;
            }
            columns.push(dialect.quote(&field.column));
            binds.push((value.coerce(field.kind)?, field.kind));
        }

        if columns.is_empty() {
            stmt.push_sql(&dialect.insert_default_values(&model.table));
        } else {
            stmt.push_sql(&format!("INSERT INTO {} ({}) VALUES (", dialect.quote(&model.table), columns.join(", ")));
            for (i, (value, kind)) in binds.into_iter().enumerate() {
                if i > 0 {
                    stmt.push_sql(", ");
                }
                stmt.push_bind(dialect.as_ref(), value, kind);
            }
            stmt.push_sql(")");
        }

        let auto_key = model.auto_increment_key();
        let returning = auto_key.and_then(|key| dialect.returning(&key.column));
        let result = match (auto_key, returning) {
            (Some(key), Some(returning)) => {
                stmt.push_sql(&returning);
                let row = self.conn.fetch_optional(stmt).await.map_err(|e| e.in_operation("create", &model.name))?;
                let generated = match &row {
                    Some(row) => decode_column(row, 0, key.kind)?.as_i64(),
                    None => None,
                };
                ExecResult { rows_affected: u64::from(row.is_some()), last_insert_id: generated }
            }
            _ => self.conn.execute(stmt).await.map_err(|e| e.in_operation("create", &model.name))?,
        };

        if let (Some(key), Some(id)) = (auto_key, result.last_insert_id)
            && value_at(&values, key).is_default()
        {
            record.set_value(&key.name, Value::BigInt(id).coerce(key.kind)?)?;
        }

        self.refresh(&model, dialect.as_ref(), record).await?;
        hooks::after_create(&model, record, &mut self.conn).await;
        Ok(result)
    }

    /// Re-selects `record` by its key and copies every mapped column onto it.
    async fn refresh(&mut self, model: &Model, dialect: &dyn Dialect, record: &mut T) -> Result<(), Error> {
        let Some(filters) = key_filters(model, &record.to_values()) else {
            log::debug!("{}: key not known after insert, skipping re-select", model.name);
            return Ok(());
        };

        let stmt = select_statement(model, dialect, &filters, &[], Some(1), None)?;
        let Some(row) = self.conn.fetch_optional(stmt).await.map_err(|e| e.in_operation("create", &model.name))? else {
            return Ok(());
        };
        for (index, field) in model.fields.iter().enumerate() {
            record.set_value(&field.name, decode_column(&row, index, field.kind)?)?;
        }
        Ok(())
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Loads the row whose single primary key equals `id`.
    pub async fn find_by_id(mut self, id: impl Into<Value>) -> Result<T, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();
        let key = match model.primary_key_count() {
            1 => model.primary_keys().next(),
            _ => None,
        }
        .ok_or_else(|| Error::MissingPrimaryKey { record: model.name.clone(), operation: "find_by_id" })?;

        self.filters.push(Filter::Equals(key.column.clone(), id.into()));
        let stmt = select_statement(&model, dialect.as_ref(), &self.filters, &self.order, Some(1), None)?;
        let row = self.conn.fetch_optional(stmt).await.map_err(|e| e.in_operation("find_by_id", &model.name))?;
        match row {
            Some(row) => self.load(&model, row).await,
            None => Err(Error::NotFound { record: model.name.clone() }),
        }
    }

    /// Loads the first matching row. Without an explicit order, rows are ordered by primary key.
    pub async fn first(mut self) -> Result<T, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();
        if self.order.is_empty() {
            self.order = model.primary_keys().map(|f| format!("{} ASC", dialect.quote(&f.column))).collect();
        }

        let stmt = select_statement(&model, dialect.as_ref(), &self.filters, &self.order, Some(1), self.offset)?;
        let row = self.conn.fetch_optional(stmt).await.map_err(|e| e.in_operation("first", &model.name))?;
        match row {
            Some(row) => self.load(&model, row).await,
            None => Err(Error::NotFound { record: model.name.clone() }),
        }
    }

    /// Loads every matching row into `out`, clearing it first.
    pub async fn find(mut self, out: &mut Vec<T>) -> Result<(), Error> {
        out.clear();
        let model = self.prepare()?;
        let dialect = self.conn.dialect();

        let stmt = select_statement(&model, dialect.as_ref(), &self.filters, &self.order, self.limit, self.offset)?;
        let rows = self.conn.fetch_all(stmt).await.map_err(|e| e.in_operation("find", &model.name))?;
        out.reserve(rows.len());
        for row in rows {
            let record = self.load(&model, row).await?;
            out.push(record);
        }
        Ok(())
    }

    /// Loads every matching row.
    pub async fn scan(self) -> Result<Vec<T>, Error> {
        let mut records = Vec::new();
        self.find(&mut records).await?;
        Ok(records)
    }

    /// Counts matching rows. Order, limit and offset are ignored.
    pub async fn count(mut self) -> Result<i64, Error> {
        self.count_in_place().await
    }

    pub(crate) async fn count_in_place(&mut self) -> Result<i64, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();

        let mut stmt = Statement::new(format!("SELECT COUNT(*) FROM {}", dialect.quote(&model.table)));
        condition::push_where(&mut stmt, dialect.as_ref(), &model, &self.filters)?;
        let row = self.conn.fetch_optional(stmt).await.map_err(|e| e.in_operation("count", &model.name))?;
        match row {
            Some(row) => decode_column(&row, 0, ValueKind::BigInt)?
                .as_i64()
                .ok_or_else(|| Error::conversion("COUNT(*) did not return an integer")),
            None => Ok(0),
        }
    }

    async fn load(&mut self, model: &Model, row: AnyRow) -> Result<T, Error> {
        let mut record: T = decode_row(model, &row)?;
        hooks::after_find(model, &mut record, &mut self.conn).await;
        Ok(record)
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Updates the row identified by `record`'s primary key(s).
    ///
    /// `changes` maps column (or field) names to new values. Primary-key
    /// entries are skipped. At least one key must be non-default; the row is
    /// then matched on every key column, zero-valued ones included. On success
    /// the new values are copied onto `record`. Zero rows affected means the key matched nothing and is not an error.
    pub async fn updates(mut self, record: &mut T, mut changes: Changes) -> Result<ExecResult, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();

        let first_key = model
            .primary_keys()
            .next()
            .ok_or_else(|| Error::MissingPrimaryKey { record: model.name.clone(), operation: "updates" })?;
        let values = record.to_values();
        if model.primary_keys().all(|key| value_at(&values, key).is_default()) {
            return Err(Error::ZeroPrimaryKey {
                record: model.name.clone(),
                field: first_key.name.clone(),
                operation: "updates",
            });
        }

        let keys: Vec<Filter> =
            model.primary_keys().map(|key| Filter::Equals(key.column.clone(), value_at(&values, key))).collect();

        hooks::before_update(&model, record, &mut self.conn, &mut changes).await?;

        let mut assignments: Vec<(&Field, Value)> = Vec::new();
        for (column, value) in &changes {
            let field = model
                .resolve(column)
                .ok_or_else(|| Error::UnknownColumn { record: model.name.clone(), column: column.clone() })?;
            if field.is_primary_key {
                log::debug!("{}: skipping primary key `{}` in updates", model.name, field.column);
                continue;
            }
            assignments.push((field, value.clone().coerce(field.kind)?));
        }
        if assignments.is_empty() {
            return Err(Error::InvalidArgument(format!("updates on {} has no updatable columns", model.name)));
        }

        let mut stmt = Statement::new(format!("UPDATE {} SET ", dialect.quote(&model.table)));
        for (i, (field, value)) in assignments.iter().enumerate() {
            if i > 0 {
                stmt.push_sql(", ");
            }
            stmt.push_sql(&format!("{} = ", dialect.quote(&field.column)));
            stmt.push_bind(dialect.as_ref(), value.clone(), field.kind);
        }
        let mut filters = keys;
        filters.append(&mut self.filters);
        condition::push_where(&mut stmt, dialect.as_ref(), &model, &filters)?;

        let result = self.conn.execute(stmt).await.map_err(|e| e.in_operation("updates", &model.name))?;
        if result.rows_affected > 0 {
            for (field, value) in assignments {
                record.set_value(&field.name, value)?;
            }
        }

        hooks::after_update(&model, record, &mut self.conn, &changes).await;
        Ok(result)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Deletes the row identified by `record`'s primary key(s).
    ///
    /// Every key must hold a non-default value; a zero key is refused before
    /// any SQL is issued. Zero rows affected is not an error.
    pub async fn delete(mut self, record: &mut T) -> Result<ExecResult, Error> {
        let model = self.prepare()?;
        let dialect = self.conn.dialect();

        if model.primary_key_count() == 0 {
            return Err(Error::MissingPrimaryKey { record: model.name.clone(), operation: "delete" });
        }
        let values = record.to_values();
        let mut filters = Vec::with_capacity(model.primary_key_count());
        for key in model.primary_keys() {
            let value = value_at(&values, key);
            if value.is_default() {
                return Err(Error::ZeroPrimaryKey {
                    record: model.name.clone(),
                    field: key.name.clone(),
                    operation: "delete",
                });
            }
            filters.push(Filter::Equals(key.column.clone(), value));
        }

        hooks::before_delete(&model, record, &mut self.conn).await?;

        let mut stmt = Statement::new(format!("DELETE FROM {}", dialect.quote(&model.table)));
        filters.append(&mut self.filters);
        condition::push_where(&mut stmt, dialect.as_ref(), &model, &filters)?;
        let result = self.conn.execute(stmt).await.map_err(|e| e.in_operation("delete", &model.name))?;

        hooks::after_delete(&model, record, &mut self.conn).await;
        Ok(result)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Surfaces a deferred parse or filter error, or returns the model.
    fn prepare(&mut self) -> Result<Arc<Model>, Error> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.model
            .clone()
            .ok_or_else(|| Error::invalid_argument("query builder has no model"))
    }
}

fn value_at(values: &[Value], field: &Field) -> Value {
    values.get(field.position).cloned().unwrap_or_default()
}

/// Equality filters on every primary key, or `None` when a key is missing or default.
fn key_filters(model: &Model, values: &[Value]) -> Option<Vec<Filter>> {
    if model.primary_key_count() == 0 {
        return None;
    }
    model
        .primary_keys()
        .map(|key| {
            let value = value_at(values, key);
            (!value.is_default()).then(|| Filter::Equals(key.column.clone(), value))
        })
        .collect()
}

/// `SELECT <mapped columns> FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT .. OFFSET ..]`.
pub(crate) fn select_statement(
    model: &Model,
    dialect: &dyn Dialect,
    filters: &[Filter],
    order: &[String],
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Statement, Error> {
    let columns: Vec<String> = model.fields.iter().map(|f| dialect.select_column(f)).collect();
    let mut stmt = Statement::new(format!("SELECT {} FROM {}", columns.join(", "), dialect.quote(&model.table)));
    condition::push_where(&mut stmt, dialect, model, filters)?;
    if !order.is_empty() {
        stmt.push_sql(" ORDER BY ");
        stmt.push_sql(&order.join(", "));
    }
    stmt.push_sql(&dialect.limit_offset(limit, offset));
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SchemaParser, ValueKind,
        dialect::{MySqlDialect, PostgresDialect, SqliteDialect},
        hooks::HookFlags,
        model::{FieldDescriptor, RecordDescriptor},
    };

    fn account() -> Model {
        let field = |name, kind, optional, tag| FieldDescriptor { name, kind, optional, tag };
        SchemaParser::default()
            .parse_descriptor(&RecordDescriptor {
                name: "Account",
                table: None,
                fields: vec![
                    field("id", ValueKind::BigInt, false, "primaryKey;autoIncrement"),
                    field("owner", ValueKind::Text, false, ""),
                    field("opened", ValueKind::Date, true, ""),
                ],
                hooks: HookFlags::default(),
            })
            .unwrap()
    }

    #[test]
    fn test_select_statement_per_dialect() {
        let model = account();
        let filters = [Filter::eq("owner", "ann")];
        let order = ["\"id\" DESC".to_string()];

        let lite = select_statement(&model, &SqliteDialect, &filters, &order, Some(10), Some(20)).unwrap();
        assert_eq!(
            lite.sql,
            "SELECT \"id\", \"owner\", \"opened\" FROM \"accounts\" WHERE \"owner\" = ? ORDER BY \"id\" DESC LIMIT 10 OFFSET 20"
        );

        let pg = select_statement(&model, &PostgresDialect, &filters, &[], None, Some(5)).unwrap();
        assert_eq!(
            pg.sql,
            "SELECT \"id\", \"owner\", \"opened\"::TEXT FROM \"accounts\" WHERE \"owner\" = $1 LIMIT ALL OFFSET 5"
        );

        let my = select_statement(&model, &MySqlDialect, &[], &[], Some(0), None).unwrap();
        assert_eq!(my.sql, "SELECT `id`, `owner`, CAST(`opened` AS CHAR) FROM `accounts` LIMIT 0");
    }

    #[test]
    fn test_key_filters_require_every_key() {
        let model = account();
        assert!(key_filters(&model, &[Value::BigInt(0), Value::Text("a".into()), Value::Null]).is_none());
        let filters = key_filters(&model, &[Value::BigInt(7), Value::Text("a".into()), Value::Null]).unwrap();
        assert_eq!(filters, vec![Filter::Equals("id".into(), Value::BigInt(7))]);
    }
}
