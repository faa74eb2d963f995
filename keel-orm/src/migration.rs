//! # Migration Module
//!
//! AutoMigrate and migration-history bookkeeping.
//!
//! ## AutoMigrate
//!
//! [`Migrator`] creates a table for every registered record type with
//! `CREATE TABLE IF NOT EXISTS`, followed by its named indexes. It is
//! additive only: existing tables, columns and indexes are never altered or
//! dropped, so running it twice is harmless.
//!
//! ```rust,ignore
//! db.migrator()
//!     .register::<User>()
//!     .register::<Post>()
//!     .run()
//!     .await?;
//! ```
//!
//! ## Migration History
//!
//! [`MigrationHistory`] tracks which hand-written migrations have been applied,
//! in a table (`keel_migrations` by default) created through the dialect's
//! history templates. [`MigrationScript`] reads the usual marker format:
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE audit (id INTEGER PRIMARY KEY, note TEXT);
//!
//! -- +migrate Down
//! DROP TABLE audit;
//! ```
//!
//! Statements end at a line ending with `;`. A statement containing semicolons
//! of its own (a function body, a trigger) is wrapped in
//! `-- +migrate StatementBegin` / `-- +migrate StatementEnd`.

use futures::future::BoxFuture;

use crate::{
    ColumnValue, Error, Model, Record, ValueKind,
    database::{Database, Executor},
    dialect::Dialect,
    value_binding::{Statement, decode_column},
};

/// Table used by [`MigrationHistory`] unless another is chosen.
pub const DEFAULT_HISTORY_TABLE: &str = "keel_migrations";

// ============================================================================
// DDL Generation
// ============================================================================

/// `CREATE TABLE IF NOT EXISTS` for `model`, followed by its index statements.
///
/// A single primary key is declared inline by the dialect's column type; a
/// composite key gets one `PRIMARY KEY (...)` table constraint.
pub fn create_table_statements(model: &Model, dialect: &dyn Dialect) -> Result<Vec<String>, Error> {
    let mut definitions = Vec::with_capacity(model.fields.len() + 1);
    for field in &model.fields {
        let column_type = dialect.column_type(field).map_err(|e| match e {
            Error::UnsupportedType { field, message, .. } => {
                Error::UnsupportedType { record: model.name.clone(), field, message }
            }
            other => other,
        })?;
        definitions.push(format!("{} {column_type}", dialect.quote(&field.column)));
    }

    if model.primary_key_count() > 1 {
        let keys: Vec<String> = model.primary_keys().map(|f| dialect.quote(&f.column)).collect();
        definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    let mut statements = Vec::with_capacity(1 + model.indexes.len());
    if dialect.inline_indexes() {
        for index in &model.indexes {
            let columns: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
            definitions.push(format!(
                "{}INDEX {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                dialect.quote(&index.name),
                columns.join(", ")
            ));
        }
    }

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        dialect.quote(&model.table),
        definitions.join(", ")
    ));

    if !dialect.inline_indexes() {
        for index in &model.indexes {
            let columns: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
            statements.push(format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                dialect.quote(&index.name),
                dialect.quote(&model.table),
                columns.join(", ")
            ));
        }
    }

    Ok(statements)
}

impl Database {
    /// Creates the table (and indexes) of record `T` if it does not exist.
    pub async fn create_table<T: Record>(&self) -> Result<&Self, Error> {
        let model = self.schema.parse::<T>()?;
        let statements = create_table_statements(&model, self.dialect.as_ref())?;

        let mut conn = self.clone();
        for sql in statements {
            conn.execute(Statement::new(sql)).await.map_err(|e| e.in_operation("migrate", &model.name))?;
        }
        Ok(self)
    }

    /// Bookkeeping for hand-written migrations, in the default history table.
    pub fn migration_history(&self) -> MigrationHistory<'_> {
        MigrationHistory { db: self, table: DEFAULT_HISTORY_TABLE.to_string() }
    }
}

// ============================================================================
// Migrator
// ============================================================================

/// A queued AutoMigrate step.
pub type MigrationTask = Box<dyn Fn(Database) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Ordered AutoMigrate queue.
///
/// 1. Create via `Database::migrator()`
/// 2. Register records via `register::<T>()`
/// 3. Execute via `run()`; tables are created in registration order
pub struct Migrator<'a> {
    pub(crate) db: &'a Database,
    pub(crate) tasks: Vec<MigrationTask>,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, tasks: Vec::new() }
    }

    /// Queues table creation for `T`.
    pub fn register<T: Record>(mut self) -> Self {
        let task = Box::new(|db: Database| -> BoxFuture<'static, Result<(), Error>> {
            Box::pin(async move {
                db.create_table::<T>().await?;
                Ok(())
            })
        });
        self.tasks.push(task);
        self
    }

    /// Runs every queued task, stopping at the first failure.
    pub async fn run(self) -> Result<Database, Error> {
        for task in self.tasks {
            (task)(self.db.clone()).await?;
        }
        Ok(self.db.clone())
    }
}

// ============================================================================
// Migration Scripts
// ============================================================================

/// The up and down statements of one migration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationScript {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Up,
    Down,
}

impl MigrationScript {
    /// Parses a migration file. Markers are case-insensitive; an `Up` section is required.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let mut script = MigrationScript::default();
        let mut section = Section::None;
        let mut seen_up = false;
        let mut in_block = false;
        let mut buffer = String::new();

        for (number, line) in source.lines().enumerate() {
            let trimmed = line.trim();

            if let Some(directive) = marker(trimmed) {
                match directive.as_str() {
                    "up" | "down" => {
                        if in_block {
                            return Err(Error::InvalidArgument(format!(
                                "line {}: section marker inside a StatementBegin block",
                                number + 1
                            )));
                        }
                        flush(&mut script, section, &mut buffer);
                        section = if directive == "up" { Section::Up } else { Section::Down };
                        seen_up |= section == Section::Up;
                    }
                    "statementbegin" => in_block = true,
                    "statementend" => {
                        in_block = false;
                        flush(&mut script, section, &mut buffer);
                    }
                    other => {
                        return Err(Error::InvalidArgument(format!(
                            "line {}: unknown migration directive `{other}`",
                            number + 1
                        )));
                    }
                }
                continue;
            }

            if trimmed.is_empty() || (trimmed.starts_with("--") && !in_block) {
                continue;
            }
            if section == Section::None {
                return Err(Error::InvalidArgument(format!(
                    "line {}: statement before any `-- +migrate Up` / `Down` marker",
                    number + 1
                )));
            }

            buffer.push_str(line);
            buffer.push('\n');
            if !in_block && trimmed.ends_with(';') {
                flush(&mut script, section, &mut buffer);
            }
        }

        if in_block {
            return Err(Error::invalid_argument("unterminated StatementBegin block"));
        }
        flush(&mut script, section, &mut buffer);
        if !seen_up {
            return Err(Error::invalid_argument("migration has no `-- +migrate Up` section"));
        }
        Ok(script)
    }
}

/// Returns the lowercased directive of a `-- +migrate <directive>` line.
fn marker(line: &str) -> Option<String> {
    let rest = line.strip_prefix("--")?.trim_start();
    let lower = rest.to_ascii_lowercase();
    let directive = lower.strip_prefix("+migrate")?;
    Some(directive.split_whitespace().next().unwrap_or_default().to_string())
}

fn flush(script: &mut MigrationScript, section: Section, buffer: &mut String) {
    let statement = buffer.trim();
    if !statement.is_empty() {
        match section {
            Section::Up => script.up.push(statement.to_string()),
            Section::Down => script.down.push(statement.to_string()),
            Section::None => {}
        }
    }
    buffer.clear();
}

// ============================================================================
// Migration History
// ============================================================================

/// Records which migrations have been applied.
#[derive(Debug, Clone)]
pub struct MigrationHistory<'a> {
    db: &'a Database,
    table: String,
}

impl MigrationHistory<'_> {
    /// Uses `table` instead of [`DEFAULT_HISTORY_TABLE`].
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the history table if needed.
    pub async fn ensure_table(&self) -> Result<(), Error> {
        let sql = self.db.dialect.create_history_table(&self.table);
        self.db.clone().execute(Statement::new(sql)).await?;
        Ok(())
    }

    /// Identifiers of applied migrations, sorted.
    pub async fn applied(&self) -> Result<Vec<String>, Error> {
        self.ensure_table().await?;
        let sql = self.db.dialect.list_applied(&self.table);
        let rows = self.db.clone().fetch_all(Statement::new(sql)).await?;
        rows.iter()
            .map(|row| {
                decode_column(row, 0, ValueKind::Text).and_then(<String as ColumnValue>::from_value)
            })
            .collect()
    }

    /// Marks `id` as applied.
    pub async fn record(&self, id: &str) -> Result<(), Error> {
        self.ensure_table().await?;
        self.db.clone().execute(self.insert_statement(id)).await?;
        Ok(())
    }

    /// Removes `id` from the applied set.
    pub async fn forget(&self, id: &str) -> Result<(), Error> {
        self.ensure_table().await?;
        self.db.clone().execute(self.delete_statement(id)).await?;
        Ok(())
    }

    /// Runs the up statements of `script` and records `id`, in one transaction.
    ///
    /// Returns `false` without doing anything when `id` is already applied.
    pub async fn apply(&self, id: &str, script: &MigrationScript) -> Result<bool, Error> {
        if self.applied().await?.iter().any(|applied| applied == id) {
            log::debug!("migration {id} already applied");
            return Ok(false);
        }

        let mut tx = self.db.begin().await?;
        for sql in &script.up {
            tx.execute(Statement::new(sql.clone())).await?;
        }
        tx.execute(self.insert_statement(id)).await?;
        tx.commit().await?;
        log::info!("applied migration {id}");
        Ok(true)
    }

    /// Runs the down statements of `script` and forgets `id`, in one transaction.
    ///
    /// Returns `false` without doing anything when `id` is not applied.
    pub async fn revert(&self, id: &str, script: &MigrationScript) -> Result<bool, Error> {
        if !self.applied().await?.iter().any(|applied| applied == id) {
            log::debug!("migration {id} is not applied");
            return Ok(false);
        }

        let mut tx = self.db.begin().await?;
        for sql in &script.down {
            tx.execute(Statement::new(sql.clone())).await?;
        }
        tx.execute(self.delete_statement(id)).await?;
        tx.commit().await?;
        log::info!("reverted migration {id}");
        Ok(true)
    }

    fn insert_statement(&self, id: &str) -> Statement {
        let mut stmt = Statement::new(self.db.dialect.insert_applied(&self.table));
        stmt.args.push((id.into(), ValueKind::Text));
        stmt
    }

    fn delete_statement(&self, id: &str) -> Statement {
        let mut stmt = Statement::new(self.db.dialect.delete_applied(&self.table));
        stmt.args.push((id.into(), ValueKind::Text));
        stmt
    }
}
