//! # Error Handling Module
//!
//! This module defines the error type used throughout Keel ORM.
//! Every fallible operation in the crate returns `Result<_, Error>`.
//!
//! ## Error Families
//!
//! - **Schema**: raised while parsing a record's annotations into a [`Model`](crate::Model).
//!   The record definition itself must be fixed; these are never retried.
//! - **Usage**: wrong call shape (missing or zero primary key, unknown filter column,
//!   operator/operand mismatch). Raised before any SQL is built.
//! - **NotFound**: `find_by_id` / `first` matched no row.
//! - **Execution**: the database rejected or failed a statement. Wrapped with the
//!   operation name and record type.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use keel_orm::{Error, ErrorKind};
//!
//! match db.model::<User>().find_by_id(42).await {
//!     Ok(user) => println!("Found: {:?}", user),
//!     Err(e) if e.is_not_found() => println!("No such user"),
//!     Err(e) if e.kind() == ErrorKind::Usage => panic!("bug in caller: {e}"),
//!     Err(e) => return Err(e),
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification of an [`Error`], used by callers to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The record definition is invalid.
    Schema,
    /// The call was malformed.
    Usage,
    /// A single-row lookup matched nothing.
    NotFound,
    /// The database failed the statement.
    Execution,
    /// Value conversion, configuration and deadline failures.
    Other,
}

// ============================================================================
// Error Enum Definition
// ============================================================================

/// The main error type for Keel ORM operations.
#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------------
    // Schema errors
    // ------------------------------------------------------------------------
    /// An annotation clause carried a value that could not be interpreted,
    /// e.g. `size:abc`.
    #[error("invalid annotation on {record}.{field}: {message}")]
    InvalidAnnotation { record: String, field: String, message: String },

    /// Two fields of the same record resolved to one column name.
    #[error("duplicate column `{column}` in {record} (fields `{first}` and `{second}`)")]
    DuplicateColumn { record: String, column: String, first: String, second: String },

    /// An index name was used both as a unique and as a non-unique index.
    #[error("index `{index}` on {record} is declared both unique and non-unique")]
    IndexConflict { record: String, index: String },

    /// The dialect cannot map the field's value type to a column type.
    #[error("unsupported column type for {record}.{field}: {message}")]
    UnsupportedType { record: String, field: String, message: String },

    /// The record description itself is unusable (no name, no fields).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // ------------------------------------------------------------------------
    // Usage errors
    // ------------------------------------------------------------------------
    /// Invalid argument passed to an ORM method.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs a primary key the record does not declare.
    #[error("{record} has no usable primary key for {operation}")]
    MissingPrimaryKey { record: String, operation: &'static str },

    /// A primary-key field holds its zero/default value.
    #[error("primary key field `{field}` of {record} holds its default value; refusing to {operation}")]
    ZeroPrimaryKey { record: String, field: String, operation: &'static str },

    /// A filter or update map referenced a column the record does not map.
    #[error("unknown column `{column}` for {record}")]
    UnknownColumn { record: String, column: String },

    /// A filter operator was combined with an operand of the wrong shape.
    #[error("unsupported filter: {0}")]
    UnsupportedOperator(String),

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------
    /// A single-row lookup matched no row.
    #[error("{record}: record not found")]
    NotFound { record: String },

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------
    /// A statement issued on behalf of a CRUD operation failed.
    #[error("{operation} {record} failed: {source}")]
    Execution {
        operation: &'static str,
        record: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database error raised outside of a CRUD operation (pool, transaction control, DDL).
    ///
    /// Automatically converted from `sqlx::Error`, so `?` works on raw sqlx calls.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// The statement did not finish before the configured deadline.
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    // ------------------------------------------------------------------------
    // Other
    // ------------------------------------------------------------------------
    /// Type conversion error between a Rust value and its database representation.
    #[error("Type conversion error: {0}")]
    Conversion(String),

    /// Dialect registry or connection configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

// ============================================================================
// Helper Functions
// ============================================================================

impl Error {
    /// Creates an `InvalidArgument` error from a string slice.
    pub fn invalid_argument(msg: &str) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    /// Creates a `Conversion` error from a string slice.
    pub fn conversion(msg: &str) -> Self {
        Error::Conversion(msg.to_string())
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAnnotation { .. }
            | Error::DuplicateColumn { .. }
            | Error::IndexConflict { .. }
            | Error::UnsupportedType { .. }
            | Error::InvalidRecord(_) => ErrorKind::Schema,
            Error::InvalidArgument(_)
            | Error::MissingPrimaryKey { .. }
            | Error::ZeroPrimaryKey { .. }
            | Error::UnknownColumn { .. }
            | Error::UnsupportedOperator(_) => ErrorKind::Usage,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Execution { .. } | Error::DatabaseError(_) => ErrorKind::Execution,
            Error::Timeout(_) | Error::Conversion(_) | Error::Configuration(_) => ErrorKind::Other,
        }
    }

    /// Returns `true` when a single-row lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Attaches operation context to a raw database error.
    ///
    /// Errors of any other variant are returned unchanged.
    pub(crate) fn in_operation(self, operation: &'static str, record: &str) -> Self {
        match self {
            Error::DatabaseError(source) => Error::Execution { operation, record: record.to_string(), source },
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::NotFound { record: "User".into() }.kind(), ErrorKind::NotFound);
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::Usage);
        assert_eq!(Error::InvalidRecord("x".into()).kind(), ErrorKind::Schema);
        assert_eq!(Error::DatabaseError(sqlx::Error::RowNotFound).kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_in_operation_wraps_only_database_errors() {
        let wrapped = Error::DatabaseError(sqlx::Error::PoolClosed).in_operation("create", "User");
        assert!(matches!(wrapped, Error::Execution { operation: "create", .. }));
        assert!(wrapped.to_string().starts_with("create User failed"));

        let untouched = Error::invalid_argument("bad").in_operation("create", "User");
        assert!(matches!(untouched, Error::InvalidArgument(_)));
    }
}
