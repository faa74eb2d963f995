//! # Value Binding Module
//!
//! Moves [`Value`]s in and out of the sqlx `Any` driver.
//!
//! ## Features
//!
//! - **Statement buffer**: [`Statement`] collects SQL text and its arguments,
//!   numbering placeholders through the active [`Dialect`]
//! - **Kind-aware binding**: NULLs are bound with the column's kind, UUIDs and
//!   temporal values travel as dialect-formatted text
//! - **Row decoding**: columns are read back by position with fallbacks across
//!   integer widths, since the `Any` driver reports the narrowest native type

use sqlx::{
    Arguments, Row, ValueRef,
    any::{AnyArguments, AnyRow},
    error::BoxDynError,
};

use crate::{Error, Model, Record, Value, ValueKind, dialect::Dialect};

// ============================================================================
// Statement
// ============================================================================

/// SQL text plus its positional arguments and their declared kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<(Value, ValueKind)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), args: Vec::new() }
    }

    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a placeholder (and its dialect cast) and records the argument.
    pub fn push_bind(&mut self, dialect: &dyn Dialect, value: Value, kind: ValueKind) -> &mut Self {
        self.args.push((value, kind));
        self.sql.push_str(&dialect.placeholder(self.args.len()));
        self.sql.push_str(dialect.bind_cast(kind));
        self
    }

    /// Builds the sqlx argument buffer.
    pub(crate) fn arguments<'q>(&self, dialect: &dyn Dialect) -> Result<AnyArguments<'q>, Error> {
        let mut args = AnyArguments::default();
        for (value, kind) in &self.args {
            args.bind_value(value.clone(), *kind, dialect)?;
        }
        Ok(args)
    }
}

// ============================================================================
// Value Binding Trait
// ============================================================================

/// Extension trait for binding [`Value`]s to `AnyArguments`.
pub trait ValueBinder {
    /// Binds `value`, using `kind` to type NULLs and `dialect` to format text-bound values.
    fn bind_value(&mut self, value: Value, kind: ValueKind, dialect: &dyn Dialect) -> Result<(), Error>;

    /// Binds a typed NULL.
    fn bind_null(&mut self, kind: ValueKind) -> Result<(), BoxDynError>;
}

impl ValueBinder for AnyArguments<'_> {
    fn bind_value(&mut self, value: Value, kind: ValueKind, dialect: &dyn Dialect) -> Result<(), Error> {
        let added = match value {
            Value::Null => self.bind_null(kind),
            Value::Bool(v) => self.add(v),
            Value::SmallInt(v) => self.add(v),
            Value::Int(v) => self.add(v),
            Value::BigInt(v) => self.add(v),
            Value::Real(v) => self.add(v),
            Value::Double(v) => self.add(v),
            Value::Text(v) => self.add(v),
            Value::Blob(v) => self.add(v),
            Value::Uuid(v) => self.add(v.hyphenated().to_string()),
            temporal => {
                let text = dialect
                    .format_temporal(&temporal)
                    .ok_or_else(|| Error::Conversion(format!("cannot bind `{temporal}` as text")))?;
                self.add(text)
            }
        };
        added.map_err(|e| Error::DatabaseError(sqlx::Error::Encode(e)))
    }

    fn bind_null(&mut self, kind: ValueKind) -> Result<(), BoxDynError> {
        match kind {
            ValueKind::Bool => self.add(None::<bool>),
            ValueKind::SmallInt => self.add(None::<i16>),
            ValueKind::Int => self.add(None::<i32>),
            ValueKind::BigInt => self.add(None::<i64>),
            ValueKind::Real => self.add(None::<f32>),
            ValueKind::Double => self.add(None::<f64>),
            ValueKind::Blob => self.add(None::<Vec<u8>>),
            _ => self.add(None::<String>),
        }
    }
}

// ============================================================================
// Row Decoding
// ============================================================================

/// Decodes the column at `index` as a value of `kind`.
///
/// UUIDs and temporal values come back as `Value::Text`; the record's
/// conversion parses them.
pub(crate) fn decode_column(row: &AnyRow, index: usize, kind: ValueKind) -> Result<Value, Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        ValueKind::Bool => match row.try_get::<bool, _>(index) {
            Ok(v) => Ok(Value::Bool(v)),
            Err(_) => decode_integer(row, index),
        },
        ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt => decode_integer(row, index),
        ValueKind::Real | ValueKind::Double => decode_float(row, index),
        ValueKind::Blob => Ok(Value::Blob(row.try_get::<Vec<u8>, _>(index)?)),
        ValueKind::Text
        | ValueKind::Uuid
        | ValueKind::Date
        | ValueKind::Time
        | ValueKind::DateTime
        | ValueKind::Timestamp => match row.try_get::<String, _>(index) {
            Ok(v) => Ok(Value::Text(v)),
            Err(e) => decode_integer(row, index)
                .or_else(|_| decode_float(row, index))
                .map_err(|_| Error::DatabaseError(e)),
        },
        ValueKind::Other(_) => row
            .try_get::<String, _>(index)
            .map(Value::Text)
            .or_else(|_| decode_integer(row, index))
            .or_else(|_| decode_float(row, index))
            .or_else(|_| Ok(Value::Blob(row.try_get::<Vec<u8>, _>(index)?))),
    }
}

fn decode_integer(row: &AnyRow, index: usize) -> Result<Value, Error> {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(Value::BigInt(v));
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Ok(Value::Int(v));
    }
    if let Ok(v) = row.try_get::<i16, _>(index) {
        return Ok(Value::SmallInt(v));
    }
    Ok(Value::Bool(row.try_get::<bool, _>(index)?))
}

fn decode_float(row: &AnyRow, index: usize) -> Result<Value, Error> {
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(Value::Double(v));
    }
    if let Ok(v) = row.try_get::<f32, _>(index) {
        return Ok(Value::Real(v));
    }
    decode_integer(row, index)
}

/// Decodes a row selected with the model's column list into a record.
///
/// Column `i` of the row is the model's `i`-th mapped field; ignored fields
/// receive `Value::Null`.
pub(crate) fn decode_row<T: Record>(model: &Model, row: &AnyRow) -> Result<T, Error> {
    let mut values = vec![Value::Null; model.value_count()];
    for (index, field) in model.fields.iter().enumerate() {
        values[field.position] = decode_column(row, index, field.kind)?;
    }
    T::from_values(values)
}
