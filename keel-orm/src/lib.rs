//! # Keel ORM
//!
//! A small ORM over the sqlx `Any` driver. Structs derive [`Record`]; their
//! `#[orm("...")]` annotations are parsed once into a cached [`Model`], and a
//! [`Dialect`] chosen from the connection URL renders SQL for PostgreSQL,
//! MySQL/MariaDB or SQLite.
//!
//! ```rust,ignore
//! use keel_orm::{Database, Record};
//!
//! #[derive(Record, Debug, Default)]
//! struct User {
//!     #[orm("primaryKey;autoIncrement")]
//!     id: i64,
//!     #[orm("size:64;uniqueIndex")]
//!     name: String,
//!     age: i32,
//! }
//!
//! let db = Database::connect("sqlite::memory:").await?;
//! db.migrator().register::<User>().run().await?;
//!
//! let mut alice = User { name: "alice".into(), age: 30, ..Default::default() };
//! db.model::<User>().create(&mut alice).await?;
//! let adults = db.model::<User>().where_map([("age >=", 18)]).scan().await?;
//! ```

extern crate self as keel_orm;

pub use async_trait::async_trait;
pub use keel_orm_macro::Record;

pub mod annotation;
pub mod condition;
pub mod database;
pub mod dialect;
pub mod errors;
pub mod hooks;
pub mod migration;
pub mod model;
pub mod naming;
pub mod pagination;
pub mod query_builder;
pub mod schema;
pub mod temporal;
pub mod transaction;
pub mod value;
pub mod value_binding;

pub use condition::{Filter, Operand};
pub use database::{Database, DatabaseBuilder, ExecResult, Executor};
pub use dialect::{Dialect, DialectFactory, DialectRegistry, MySqlDialect, PostgresDialect, SqliteDialect};
pub use errors::{Error, ErrorKind};
pub use hooks::{AfterCreate, AfterDelete, AfterFind, AfterUpdate, BeforeCreate, BeforeDelete, BeforeUpdate, Changes, HookFlags};
pub use migration::{MigrationHistory, MigrationScript, Migrator};
pub use model::{Field, FieldDescriptor, Index, Model, Record, RecordDescriptor};
pub use naming::{NamingStrategy, SnakeCasePlural};
pub use pagination::{Paginated, Pagination};
pub use query_builder::QueryBuilder;
pub use schema::SchemaParser;
pub use transaction::Transaction;
pub use value::{ColumnValue, Value, ValueKind, decode_field};
pub use value_binding::Statement;
