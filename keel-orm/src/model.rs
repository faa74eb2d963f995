//! # Model Module
//!
//! This module defines the `Record` trait implemented by every mapped struct
//! and the schema structures the parser produces from it.
//!
//! ## Overview
//!
//! A record type describes itself with a static [`RecordDescriptor`]: its name,
//! the logical name, value kind and optionality of each field, and the raw
//! annotation string attached to each field. The
//! [`SchemaParser`](crate::SchemaParser) turns that description into a
//! [`Model`]: resolved table and column names, constraints, primary keys and
//! index groups.
//!
//! ## Automatic Implementation
//!
//! `Record` is normally implemented with `#[derive(Record)]`:
//!
//! ```rust,ignore
//! use keel_orm::Record;
//! use chrono::{DateTime, Utc};
//!
//! #[derive(Record, Debug, Clone)]
//! struct User {
//!     #[orm("primaryKey;autoIncrement")]
//!     id: i64,
//!
//!     #[orm("size:50;uniqueIndex")]
//!     username: String,
//!
//!     email: Option<String>,
//!
//!     #[orm("default:CURRENT_TIMESTAMP")]
//!     created_at: DateTime<Utc>,
//!
//!     #[orm("-")]
//!     session_token: String,
//! }
//! ```
//!
//! ## Supported Annotation Keys
//!
//! - `primaryKey` - Marks the field as (part of) the primary key
//! - `autoIncrement` - Database-generated integer key
//! - `column:NAME` - Explicit column name
//! - `type:SQL` - Column type used verbatim in `CREATE TABLE`
//! - `size:N`, `precision:N`, `scale:N` - Length and numeric precision
//! - `not null` / `null` - Explicit nullability
//! - `unique` - Single-column unique index named `uix_<table>_<column>`
//! - `default:EXPR` - Raw SQL default expression
//! - `index[:NAME]` / `uniqueIndex[:NAME]` - Index group membership
//! - `-` - Field is not mapped

use std::collections::HashMap;

use crate::{
    Error, Value, ValueKind,
    hooks::{AfterCreate, AfterDelete, AfterFind, AfterUpdate, BeforeCreate, BeforeDelete, BeforeUpdate, HookFlags},
};

// ============================================================================
// Record Description
// ============================================================================

/// Static description of one field, emitted by `#[derive(Record)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Logical (Rust) field name, without any `r#` prefix.
    pub name: &'static str,
    /// Declared value kind.
    pub kind: ValueKind,
    /// `true` when the declared type is `Option<_>`.
    pub optional: bool,
    /// Raw annotation string, e.g. `"primaryKey;autoIncrement"`.
    pub tag: &'static str,
}

/// Static description of a record type, emitted by `#[derive(Record)]`.
///
/// The position of each entry in `fields` is the position of the field's value
/// in [`Record::to_values`] and [`Record::from_values`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub name: &'static str,
    /// Explicit table name; `None` defers to the naming strategy.
    pub table: Option<&'static str>,
    pub fields: Vec<FieldDescriptor>,
    pub hooks: HookFlags,
}

// ============================================================================
// Record Trait
// ============================================================================

/// A struct mapped to a database table.
///
/// The hook accessors return `None` unless the record implements the matching
/// capability trait and declares it in its descriptor's [`HookFlags`].
pub trait Record: Send + Sync + Sized + 'static {
    /// Describes the record's fields and annotations.
    fn descriptor() -> RecordDescriptor;

    /// Current field values, one per descriptor field, in descriptor order.
    fn to_values(&self) -> Vec<Value>;

    /// Builds a record from values in descriptor order.
    ///
    /// Values for ignored fields are `Value::Null` and must be tolerated.
    fn from_values(values: Vec<Value>) -> Result<Self, Error>;

    /// Overwrites a single field by logical name.
    fn set_value(&mut self, field: &str, value: Value) -> Result<(), Error>;

    fn as_before_create(&mut self) -> Option<&mut dyn BeforeCreate> {
        None
    }

    fn as_after_create(&mut self) -> Option<&mut dyn AfterCreate> {
        None
    }

    fn as_before_update(&mut self) -> Option<&mut dyn BeforeUpdate> {
        None
    }

    fn as_after_update(&mut self) -> Option<&mut dyn AfterUpdate> {
        None
    }

    fn as_before_delete(&mut self) -> Option<&mut dyn BeforeDelete> {
        None
    }

    fn as_after_delete(&mut self) -> Option<&mut dyn AfterDelete> {
        None
    }

    fn as_after_find(&mut self) -> Option<&mut dyn AfterFind> {
        None
    }
}

// ============================================================================
// Parsed Schema
// ============================================================================

/// One mapped field and its column-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Logical field name.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Resolved column name.
    pub column: String,
    /// Index of the field's value in [`Record::to_values`].
    pub position: usize,
    pub is_primary_key: bool,
    pub auto_increment: bool,
    /// `NOT NULL`.
    pub is_required: bool,
    pub nullable: bool,
    pub unique: bool,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Raw SQL default expression.
    pub default_value: Option<String>,
    /// Column type used verbatim instead of the dialect mapping.
    pub sql_type: Option<String>,
    /// Names of the non-unique index groups the field belongs to.
    pub indexes: Vec<String>,
    /// Names of the unique index groups the field belongs to.
    pub unique_indexes: Vec<String>,
    /// Set when this field is the model's only primary key, so the dialect
    /// emits the constraint inline.
    pub inline_primary_key: bool,
}

/// A named index grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    /// Column names in field declaration order.
    pub columns: Vec<String>,
}

/// The parsed schema of one record type. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Logical record name.
    pub name: String,
    pub table: String,
    /// Mapped fields in declaration order.
    pub fields: Vec<Field>,
    pub indexes: Vec<Index>,
    pub hooks: HookFlags,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) by_column: HashMap<String, usize>,
    pub(crate) primary_keys: Vec<usize>,
    pub(crate) value_count: usize,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.by_column.get(column).map(|&i| &self.fields[i])
    }

    /// Resolves a filter or update key: column name first, then logical name.
    pub fn resolve(&self, key: &str) -> Option<&Field> {
        self.field_by_column(key).or_else(|| self.field(key))
    }

    /// Primary-key fields in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.primary_keys.iter().map(|&i| &self.fields[i])
    }

    pub fn primary_key_count(&self) -> usize {
        self.primary_keys.len()
    }

    /// The single auto-increment primary key, if the model has exactly one key and it is generated.
    pub fn auto_increment_key(&self) -> Option<&Field> {
        match self.primary_keys.as_slice() {
            [only] if self.fields[*only].auto_increment => Some(&self.fields[*only]),
            _ => None,
        }
    }

    /// Number of values a record of this type produces (ignored fields included).
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Column names in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }
}
