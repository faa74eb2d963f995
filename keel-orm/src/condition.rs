//! # Condition Module
//!
//! Builds `WHERE` clauses from filter expressions.
//!
//! Filters are tagged values ([`Filter`]) carrying the operator as data. The
//! string-keyed map form (`{"age >=": 35}`) is an adapter on top:
//! [`Filter::from_key`] strips a trailing operator token from the key and
//! checks the operand shape.
//!
//! Every clause is ANDed. An empty `IN` list renders `1=0` and an empty
//! `NOT IN` list renders `1=1`.
//!
//! ```rust,ignore
//! use keel_orm::Filter;
//!
//! let adults = db.model::<User>()
//!     .filter(Filter::greater_or_equal("age", 18))
//!     .where_map([("name IN", Operand::from(vec!["Alice", "Carol"]))])
//!     .scan()
//!     .await?;
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::{Error, Model, Record, Value, ValueKind, dialect::Dialect, value_binding::Statement};

// ============================================================================
// Operand
// ============================================================================

/// Right-hand side of a map-form filter: one value or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Value),
    List(Vec<Value>),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Single(value)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Single(value.into())
    }
}

impl From<Vec<&str>> for Operand {
    fn from(values: Vec<&str>) -> Self {
        Operand::List(values.into_iter().map(Value::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Operand {
    fn from(values: [&str; N]) -> Self {
        Operand::List(values.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<u8>> for Operand {
    fn from(value: Vec<u8>) -> Self {
        Operand::Single(Value::Blob(value))
    }
}

macro_rules! impl_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(value: $t) -> Self {
                    Operand::Single(value.into())
                }
            }

            impl From<Option<$t>> for Operand {
                fn from(value: Option<$t>) -> Self {
                    Operand::Single(value.into())
                }
            }

            impl From<Vec<$t>> for Operand {
                fn from(values: Vec<$t>) -> Self {
                    Operand::List(values.into_iter().map(Value::from).collect())
                }
            }

            impl<const N: usize> From<[$t; N]> for Operand {
                fn from(values: [$t; N]) -> Self {
                    Operand::List(values.into_iter().map(Value::from).collect())
                }
            }
        )*
    };
}

impl_operand!(
    bool,
    i8,
    i16,
    i32,
    u16,
    i64,
    u32,
    f32,
    f64,
    String,
    Uuid,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>
);

// ============================================================================
// Filter
// ============================================================================

/// One condition on one column.
///
/// The column is matched against column names first, then logical field names.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equals(String, Value),
    NotEquals(String, Value),
    GreaterThan(String, Value),
    GreaterOrEqual(String, Value),
    LessThan(String, Value),
    LessOrEqual(String, Value),
    Like(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
}

/// Operator tokens recognised at the end of a map key, longest first.
const OPERATORS: &[(&str, Op)] = &[
    ("is not null", Op::IsNotNull),
    ("is null", Op::IsNull),
    ("not in", Op::NotIn),
    (">=", Op::GreaterOrEqual),
    ("<=", Op::LessOrEqual),
    ("!=", Op::NotEquals),
    ("<>", Op::NotEquals),
    (">", Op::GreaterThan),
    ("<", Op::LessThan),
    ("=", Op::Equals),
    ("like", Op::Like),
    ("in", Op::In),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals(column.into(), value.into())
    }

    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::NotEquals(column.into(), value.into())
    }

    pub fn greater_than(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::GreaterThan(column.into(), value.into())
    }

    pub fn greater_or_equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::GreaterOrEqual(column.into(), value.into())
    }

    pub fn less_than(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::LessThan(column.into(), value.into())
    }

    pub fn less_or_equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::LessOrEqual(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Filter::Like(column.into(), pattern.into())
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::NotIn(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Filter::IsNotNull(column.into())
    }

    /// The column (or logical field name) the filter applies to.
    pub fn column(&self) -> &str {
        match self {
            Filter::Equals(c, _)
            | Filter::NotEquals(c, _)
            | Filter::GreaterThan(c, _)
            | Filter::GreaterOrEqual(c, _)
            | Filter::LessThan(c, _)
            | Filter::LessOrEqual(c, _)
            | Filter::Like(c, _)
            | Filter::In(c, _)
            | Filter::NotIn(c, _)
            | Filter::IsNull(c)
            | Filter::IsNotNull(c) => c,
        }
    }

    /// Parses a map-form entry such as `("age >=", 35)` or `("email IS NULL", true)`.
    ///
    /// Operator tokens are case-insensitive and must be separated from the
    /// column by whitespace (symbolic operators may also be attached). A key
    /// without a token compares with `=`. The operand of `IS [NOT] NULL` is ignored.
    pub fn from_key(key: &str, operand: impl Into<Operand>) -> Result<Self, Error> {
        let (column, op) = split_key(key);
        if column.is_empty() {
            return Err(Error::UnsupportedOperator(format!("filter key `{key}` names no column")));
        }

        let operand = operand.into();
        let shape_error = || Error::UnsupportedOperator(format!("operand of `{key}` has the wrong shape for its operator"));

        Ok(match (op, operand) {
            (Op::IsNull, _) => Filter::IsNull(column),
            (Op::IsNotNull, _) => Filter::IsNotNull(column),
            (Op::In, Operand::List(values)) => Filter::In(column, values),
            (Op::NotIn, Operand::List(values)) => Filter::NotIn(column, values),
            (Op::In | Op::NotIn, Operand::Single(_)) => return Err(shape_error()),
            (_, Operand::List(_)) => return Err(shape_error()),
            (Op::Equals, Operand::Single(v)) => Filter::Equals(column, v),
            (Op::NotEquals, Operand::Single(v)) => Filter::NotEquals(column, v),
            (Op::GreaterThan, Operand::Single(v)) => Filter::GreaterThan(column, v),
            (Op::GreaterOrEqual, Operand::Single(v)) => Filter::GreaterOrEqual(column, v),
            (Op::LessThan, Operand::Single(v)) => Filter::LessThan(column, v),
            (Op::LessOrEqual, Operand::Single(v)) => Filter::LessOrEqual(column, v),
            (Op::Like, Operand::Single(v)) => Filter::Like(column, v),
        })
    }
}

/// Splits `"<column> [operator]"` into the column and the operator.
fn split_key(key: &str) -> (String, Op) {
    let normalized = key.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = normalized.to_ascii_lowercase();

    for (token, op) in OPERATORS {
        if !lower.ends_with(token) {
            continue;
        }
        let head = &normalized[..normalized.len() - token.len()];
        let symbolic = !token.starts_with(|c: char| c.is_ascii_alphabetic());
        if head.ends_with(' ') || (symbolic && !head.is_empty()) {
            return (head.trim_end().to_string(), *op);
        }
    }
    (normalized, Op::Equals)
}

// ============================================================================
// Rendering
// ============================================================================

/// Equality filters for every field of `example` holding a non-default value.
pub(crate) fn example_filters<T: Record>(model: &Model, example: &T) -> Vec<Filter> {
    let mut values = example.to_values();
    model
        .fields
        .iter()
        .filter_map(|field| {
            let value = std::mem::take(values.get_mut(field.position)?);
            (!value.is_default()).then(|| Filter::Equals(field.column.clone(), value))
        })
        .collect()
}

/// Appends ` WHERE ...` for `filters` to `stmt`. Nothing is appended for an empty list.
pub(crate) fn push_where(stmt: &mut Statement, dialect: &dyn Dialect, model: &Model, filters: &[Filter]) -> Result<(), Error> {
    for (i, filter) in filters.iter().enumerate() {
        stmt.push_sql(if i == 0 { " WHERE " } else { " AND " });
        push_clause(stmt, dialect, model, filter)?;
    }
    Ok(())
}

fn push_clause(stmt: &mut Statement, dialect: &dyn Dialect, model: &Model, filter: &Filter) -> Result<(), Error> {
    let field = model.resolve(filter.column()).ok_or_else(|| Error::UnknownColumn {
        record: model.name.clone(),
        column: filter.column().to_string(),
    })?;
    let column = dialect.quote(&field.column);
    let kind = field.kind;

    let (op, value) = match filter {
        Filter::Equals(_, v) => ("=", v),
        Filter::NotEquals(_, v) => ("<>", v),
        Filter::GreaterThan(_, v) => (">", v),
        Filter::GreaterOrEqual(_, v) => (">=", v),
        Filter::LessThan(_, v) => ("<", v),
        Filter::LessOrEqual(_, v) => ("<=", v),
        Filter::Like(_, v) => {
            stmt.push_sql(&format!("{column} LIKE "));
            stmt.push_bind(dialect, v.clone().coerce(ValueKind::Text)?, ValueKind::Text);
            return Ok(());
        }
        Filter::In(_, values) | Filter::NotIn(_, values) => {
            let negated = matches!(filter, Filter::NotIn(..));
            if values.is_empty() {
                stmt.push_sql(if negated { "1=1" } else { "1=0" });
                return Ok(());
            }
            stmt.push_sql(&format!("{column} {}IN (", if negated { "NOT " } else { "" }));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    stmt.push_sql(", ");
                }
                stmt.push_bind(dialect, value.clone().coerce(kind)?, kind);
            }
            stmt.push_sql(")");
            return Ok(());
        }
        Filter::IsNull(_) => {
            stmt.push_sql(&format!("{column} IS NULL"));
            return Ok(());
        }
        Filter::IsNotNull(_) => {
            stmt.push_sql(&format!("{column} IS NOT NULL"));
            return Ok(());
        }
    };

    if value.is_null() {
        return Err(Error::UnsupportedOperator(format!(
            "`{}` compared with NULL; use IS NULL / IS NOT NULL",
            filter.column()
        )));
    }
    stmt.push_sql(&format!("{column} {op} "));
    stmt.push_bind(dialect, value.clone().coerce(kind)?, kind);
    Ok(())
}
