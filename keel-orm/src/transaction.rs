//! # Transaction Module
//!
//! Groups several operations into one atomic unit of work.
//!
//! ## Features
//!
//! - **Same surface**: `tx.model::<T>()` returns the same query builder as `db.model::<T>()`
//! - **Automatic Rollback**: a transaction dropped without `commit` is rolled back
//! - **Hooks join in**: hooks triggered inside a transaction receive the transaction
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let mut tx = db.begin().await?;
//!
//! tx.model::<Account>().updates(&mut from, debit).await?;
//! tx.model::<Account>().updates(&mut to, credit).await?;
//!
//! tx.commit().await?;
//! ```

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::any::AnyRow;

use crate::{
    Error, Record,
    database::{ExecResult, Executor, with_deadline},
    dialect::Dialect,
    query_builder::QueryBuilder,
    schema::SchemaParser,
    value_binding::Statement,
};

// ============================================================================
// Transaction Struct
// ============================================================================

/// A wrapper around a sqlx transaction that shares its database's dialect and model cache.
pub struct Transaction<'a> {
    pub(crate) tx: sqlx::Transaction<'a, sqlx::Any>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) schema: Arc<SchemaParser>,
    pub(crate) statement_timeout: Option<Duration>,
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").field("dialect", &self.dialect.name()).finish()
    }
}

// ============================================================================
// Executor Implementation
// ============================================================================

#[async_trait]
impl Executor for Transaction<'_> {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    fn schema(&self) -> Arc<SchemaParser> {
        Arc::clone(&self.schema)
    }

    async fn execute(&mut self, stmt: Statement) -> Result<ExecResult, Error> {
        log::debug!("{}", stmt.sql);
        let args = stmt.arguments(self.dialect.as_ref())?;
        let query = sqlx::query_with(&stmt.sql, args);
        with_deadline(self.statement_timeout, query.execute(&mut *self.tx)).await.map(ExecResult::from)
    }

    async fn fetch_optional(&mut self, stmt: Statement) -> Result<Option<AnyRow>, Error> {
        log::debug!("{}", stmt.sql);
        let args = stmt.arguments(self.dialect.as_ref())?;
        let query = sqlx::query_with(&stmt.sql, args);
        with_deadline(self.statement_timeout, query.fetch_optional(&mut *self.tx)).await
    }

    async fn fetch_all(&mut self, stmt: Statement) -> Result<Vec<AnyRow>, Error> {
        log::debug!("{}", stmt.sql);
        let args = stmt.arguments(self.dialect.as_ref())?;
        let query = sqlx::query_with(&stmt.sql, args);
        with_deadline(self.statement_timeout, query.fetch_all(&mut *self.tx)).await
    }
}

// ============================================================================
// Transaction Implementation
// ============================================================================

impl<'a> Transaction<'a> {
    /// Starts building a query within this transaction.
    ///
    /// ```rust,ignore
    /// let mut tx = db.begin().await?;
    /// tx.model::<User>().create(&mut user).await?;
    /// tx.model::<Post>().create(&mut post).await?;
    /// tx.commit().await?;
    /// ```
    pub fn model<T: Record>(&mut self) -> QueryBuilder<T, &mut Self> {
        QueryBuilder::new(self)
    }

    /// Commits the transaction.
    pub async fn commit(self) -> Result<(), Error> {
        log::debug!("COMMIT");
        self.tx.commit().await.map_err(Error::from)
    }

    /// Rolls back the transaction.
    ///
    /// Dropping an uncommitted transaction has the same effect.
    pub async fn rollback(self) -> Result<(), Error> {
        log::debug!("ROLLBACK");
        self.tx.rollback().await.map_err(Error::from)
    }
}
