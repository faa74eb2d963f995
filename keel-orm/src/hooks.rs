//! # Hooks Module
//!
//! Lifecycle callbacks a record type may opt into. Each hook is its own narrow
//! capability trait; a record opts in by implementing the trait and listing it
//! in `#[orm(hooks(...))]`, which records the capability in the record
//! descriptor and makes the matching `Record::as_*` accessor return `Some`.
//!
//! **Listing is what enables a hook.** Implementing, say, [`BeforeCreate`]
//! without naming `before_create` in `#[orm(hooks(...))]` compiles, but the
//! hook never runs. Listing a hook whose trait is not implemented is a
//! compile error, since the generated accessor returns `Some(self)` as
//! `&mut dyn BeforeCreate`.
//!
//! Every hook receives the active executor (a [`Database`](crate::Database) or a
//! [`Transaction`](crate::Transaction)) so it can issue further statements in the
//! same unit of work.
//!
//! Before-hooks abort the operation when they fail; the error reaches the caller
//! unchanged and no SQL is issued. After-hooks run once the statement has
//! succeeded; their failures are logged and never change the result.
//!
//! ```rust,ignore
//! use keel_orm::{async_trait, BeforeCreate, Error, Executor, Record};
//!
//! #[derive(Record)]
//! #[orm(hooks(before_create))]
//! struct Article {
//!     #[orm("primaryKey;autoIncrement")]
//!     id: i64,
//!     slug: String,
//!     title: String,
//! }
//!
//! #[async_trait]
//! impl BeforeCreate for Article {
//!     async fn before_create(&mut self, _conn: &mut dyn Executor) -> Result<(), Error> {
//!         if self.slug.is_empty() {
//!             self.slug = self.title.to_lowercase().replace(' ', "-");
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{Error, Model, Record, Value, database::Executor};

/// Column → new value map handed to update hooks.
pub type Changes = BTreeMap<String, Value>;

// ============================================================================
// Capability Flags
// ============================================================================

/// Which lifecycle hooks a record type implements, fixed at parse time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookFlags {
    pub before_create: bool,
    pub after_create: bool,
    pub before_update: bool,
    pub after_update: bool,
    pub before_delete: bool,
    pub after_delete: bool,
    pub after_find: bool,
}

// ============================================================================
// Capability Traits
// ============================================================================

#[async_trait]
pub trait BeforeCreate: Send {
    async fn before_create(&mut self, conn: &mut dyn Executor) -> Result<(), Error>;
}

#[async_trait]
pub trait AfterCreate: Send {
    async fn after_create(&mut self, conn: &mut dyn Executor) -> Result<(), Error>;
}

/// Runs before an `updates` call; may edit the pending changes.
#[async_trait]
pub trait BeforeUpdate: Send {
    async fn before_update(&mut self, conn: &mut dyn Executor, changes: &mut Changes) -> Result<(), Error>;
}

#[async_trait]
pub trait AfterUpdate: Send {
    async fn after_update(&mut self, conn: &mut dyn Executor, changes: &Changes) -> Result<(), Error>;
}

#[async_trait]
pub trait BeforeDelete: Send {
    async fn before_delete(&mut self, conn: &mut dyn Executor) -> Result<(), Error>;
}

#[async_trait]
pub trait AfterDelete: Send {
    async fn after_delete(&mut self, conn: &mut dyn Executor) -> Result<(), Error>;
}

/// Runs on every record loaded by `find_by_id`, `first`, `find` and `scan`.
#[async_trait]
pub trait AfterFind: Send {
    async fn after_find(&mut self, conn: &mut dyn Executor) -> Result<(), Error>;
}

// ============================================================================
// Invoker
// ============================================================================

pub(crate) async fn before_create<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor) -> Result<(), Error> {
    if model.hooks.before_create
        && let Some(hook) = record.as_before_create()
    {
        hook.before_create(conn).await?;
    }
    Ok(())
}

pub(crate) async fn after_create<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor) {
    if model.hooks.after_create
        && let Some(hook) = record.as_after_create()
        && let Err(e) = hook.after_create(conn).await
    {
        log::warn!("after_create hook of {} failed: {e}", model.name);
    }
}

pub(crate) async fn before_update<T: Record>(
    model: &Model,
    record: &mut T,
    conn: &mut dyn Executor,
    changes: &mut Changes,
) -> Result<(), Error> {
    if model.hooks.before_update
        && let Some(hook) = record.as_before_update()
    {
        hook.before_update(conn, changes).await?;
    }
    Ok(())
}

pub(crate) async fn after_update<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor, changes: &Changes) {
    if model.hooks.after_update
        && let Some(hook) = record.as_after_update()
        && let Err(e) = hook.after_update(conn, changes).await
    {
        log::warn!("after_update hook of {} failed: {e}", model.name);
    }
}

pub(crate) async fn before_delete<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor) -> Result<(), Error> {
    if model.hooks.before_delete
        && let Some(hook) = record.as_before_delete()
    {
        hook.before_delete(conn).await?;
    }
    Ok(())
}

pub(crate) async fn after_delete<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor) {
    if model.hooks.after_delete
        && let Some(hook) = record.as_after_delete()
        && let Err(e) = hook.after_delete(conn).await
    {
        log::warn!("after_delete hook of {} failed: {e}", model.name);
    }
}

pub(crate) async fn after_find<T: Record>(model: &Model, record: &mut T, conn: &mut dyn Executor) {
    if model.hooks.after_find
        && let Some(hook) = record.as_after_find()
        && let Err(e) = hook.after_find(conn).await
    {
        log::warn!("after_find hook of {} failed: {e}", model.name);
    }
}
