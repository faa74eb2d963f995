//! # Value Module
//!
//! The dynamic value currency of Keel ORM. Record fields are converted into
//! [`Value`]s for binding, filter operands are expressed as [`Value`]s, and
//! rows are decoded into [`Value`]s before being handed back to the record.
//!
//! ## Supported Rust Types
//!
//! | Rust type | [`ValueKind`] |
//! |---|---|
//! | `bool` | `Bool` |
//! | `i8`, `i16`, `u8` | `SmallInt` |
//! | `i32`, `u16` | `Int` |
//! | `i64`, `u32` | `BigInt` |
//! | `f32` | `Real` |
//! | `f64` | `Double` |
//! | `String` | `Text` |
//! | `Vec<u8>` | `Blob` |
//! | `Uuid` | `Uuid` |
//! | `NaiveDate` / `NaiveTime` / `NaiveDateTime` | `Date` / `Time` / `DateTime` |
//! | `DateTime<Utc>` | `Timestamp` |
//! | `Option<T>` | kind of `T`, nullable |

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::{Error, temporal};

// ============================================================================
// Value Kind
// ============================================================================

/// The declared value type of a field, independent of any database product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Text,
    Blob,
    Uuid,
    Date,
    Time,
    DateTime,
    Timestamp,
    /// A type the engine has no mapping for. Needs an explicit `type:` annotation.
    Other(&'static str),
}

impl ValueKind {
    pub fn is_integer(self) -> bool {
        matches!(self, ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueKind::Real | ValueKind::Double)
    }

    /// Kinds that travel as text through the `Any` driver.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ValueKind::Uuid | ValueKind::Date | ValueKind::Time | ValueKind::DateTime | ValueKind::Timestamp
        )
    }
}

// ============================================================================
// Value
// ============================================================================

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for the zero/default value of the variant.
    ///
    /// Drives the "unset" checks of create, delete, updates and example-record filters.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(v) => !v,
            Value::SmallInt(v) => *v == 0,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) => *v == 0,
            Value::Real(v) => *v == 0.0,
            Value::Double(v) => *v == 0.0,
            Value::Text(v) => v.is_empty(),
            Value::Blob(v) => v.is_empty(),
            Value::Uuid(v) => v.is_nil(),
            Value::Date(v) => *v == NaiveDate::default(),
            Value::Time(v) => *v == NaiveTime::default(),
            Value::DateTime(v) => *v == NaiveDateTime::default(),
            Value::Timestamp(v) => *v == DateTime::<Utc>::default(),
        }
    }

    /// Integer view of the value, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Text(v) => v.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Converts the value into the representation expected for `kind`.
    ///
    /// `Null` stays `Null`; `Other` kinds are passed through untouched.
    pub fn coerce(self, kind: ValueKind) -> Result<Value, Error> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        Ok(match kind {
            ValueKind::Bool => Value::Bool(bool::from_value(self)?),
            ValueKind::SmallInt => Value::SmallInt(i16::from_value(self)?),
            ValueKind::Int => Value::Int(i32::from_value(self)?),
            ValueKind::BigInt => Value::BigInt(i64::from_value(self)?),
            ValueKind::Real => Value::Real(f32::from_value(self)?),
            ValueKind::Double => Value::Double(f64::from_value(self)?),
            ValueKind::Text => Value::Text(String::from_value(self)?),
            ValueKind::Blob => Value::Blob(Vec::<u8>::from_value(self)?),
            ValueKind::Uuid => Value::Uuid(Uuid::from_value(self)?),
            ValueKind::Date => Value::Date(NaiveDate::from_value(self)?),
            ValueKind::Time => Value::Time(NaiveTime::from_value(self)?),
            ValueKind::DateTime => Value::DateTime(NaiveDateTime::from_value(self)?),
            ValueKind::Timestamp => Value::Timestamp(DateTime::<Utc>::from_value(self)?),
            ValueKind::Other(_) => self,
        })
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Real(_) => "real",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::Conversion(format!("cannot convert {} value `{value}` into {expected}", value.type_name()))
}

// ============================================================================
// ColumnValue Trait
// ============================================================================

/// A Rust type that can be stored in a mapped field.
///
/// `#[derive(Record)]` uses `KIND` and `NULLABLE` to describe each field and
/// the two conversion methods to move data in and out of records.
pub trait ColumnValue: Sized {
    /// Declared kind of the column.
    const KIND: ValueKind;
    /// Whether the type can represent SQL NULL (the `Option` family).
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, Error>;
}

macro_rules! impl_integer {
    ($($t:ty => $kind:ident, $variant:ident, $wide:ty);* $(;)?) => {
        $(
            impl ColumnValue for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn to_value(&self) -> Value {
                    Value::$variant(<$wide>::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, Error> {
                    let wide = value.as_i64().ok_or_else(|| mismatch(stringify!($t), &value))?;
                    <$t>::try_from(wide)
                        .map_err(|_| Error::Conversion(format!("{wide} is out of range for {}", stringify!($t))))
                }
            }
        )*
    };
}

impl_integer! {
    i8 => SmallInt, SmallInt, i16;
    i16 => SmallInt, SmallInt, i16;
    u8 => SmallInt, SmallInt, i16;
    i32 => Int, Int, i32;
    u16 => Int, Int, i32;
    i64 => BigInt, BigInt, i64;
    u32 => BigInt, BigInt, i64;
}

impl ColumnValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(mismatch("bool", &value)),
            },
            other => other.as_i64().map(|v| v != 0).ok_or_else(|| mismatch("bool", &other)),
        }
    }
}

impl ColumnValue for f32 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Real(v) => Ok(v),
            other => other.as_f64().map(|v| v as f32).ok_or_else(|| mismatch("f32", &other)),
        }
    }
}

impl ColumnValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_f64().ok_or_else(|| mismatch("f64", &value))
    }
}

impl ColumnValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Null | Value::Blob(_) => Err(mismatch("String", &value)),
            Value::Timestamp(v) => Ok(v.to_rfc3339()),
            other => Ok(other.to_string()),
        }
    }
}

impl ColumnValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

impl ColumnValue for Uuid {
    const KIND: ValueKind = ValueKind::Uuid;

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Uuid(v) => Ok(v),
            Value::Text(v) => v
                .parse::<Uuid>()
                .map_err(|e| Error::Conversion(format!("Failed to parse UUID `{v}`: {e}"))),
            Value::Blob(v) => {
                Uuid::from_slice(&v).map_err(|e| Error::Conversion(format!("Failed to read UUID bytes: {e}")))
            }
            other => Err(mismatch("Uuid", &other)),
        }
    }
}

impl ColumnValue for NaiveDate {
    const KIND: ValueKind = ValueKind::Date;

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date()),
            Value::Timestamp(v) => Ok(v.date_naive()),
            Value::Text(v) => temporal::parse_naive_date(&v),
            other => Err(mismatch("NaiveDate", &other)),
        }
    }
}

impl ColumnValue for NaiveTime {
    const KIND: ValueKind = ValueKind::Time;

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Time(v) => Ok(v),
            Value::Text(v) => temporal::parse_naive_time(&v),
            other => Err(mismatch("NaiveTime", &other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    const KIND: ValueKind = ValueKind::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Timestamp(v) => Ok(v.naive_utc()),
            Value::Text(v) => temporal::parse_naive_datetime(&v),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl ColumnValue for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Timestamp(v) => Ok(v),
            Value::DateTime(v) => Ok(v.and_utc()),
            Value::Text(v) => temporal::parse_datetime_utc(&v),
            other => Err(mismatch("DateTime<Utc>", &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ============================================================================
// Conversions into Value
// ============================================================================

macro_rules! impl_into_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    value.to_value()
                }
            }

            impl From<Option<$t>> for Value {
                fn from(value: Option<$t>) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

impl_into_value!(
    bool,
    i8,
    i16,
    u8,
    i32,
    u16,
    i64,
    u32,
    f32,
    f64,
    String,
    Vec<u8>,
    Uuid,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

/// Reads the next field value inside a generated `from_values` / `set_value`.
///
/// A missing value is treated as `NULL`. Conversion errors name the record and field.
pub fn decode_field<T: ColumnValue>(value: Option<Value>, record: &str, field: &str) -> Result<T, Error> {
    T::from_value(value.unwrap_or_default())
        .map_err(|e| Error::Conversion(format!("{record}.{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(<i32 as ColumnValue>::KIND, ValueKind::Int);
        assert_eq!(<Option<String> as ColumnValue>::KIND, ValueKind::Text);
        assert!(<Option<String> as ColumnValue>::NULLABLE);
        assert!(!<String as ColumnValue>::NULLABLE);
        assert_eq!(<u32 as ColumnValue>::KIND, ValueKind::BigInt);
    }

    #[test]
    fn test_is_default() {
        assert!(Value::Int(0).is_default());
        assert!(!Value::Int(7).is_default());
        assert!(Value::Text(String::new()).is_default());
        assert!(Value::Uuid(Uuid::nil()).is_default());
        assert!(!Value::Uuid(Uuid::new_v4()).is_default());
        assert!(Value::Null.is_default());
        assert!(Value::Timestamp(DateTime::<Utc>::default()).is_default());
    }

    #[test]
    fn test_integer_widening_and_overflow() {
        assert_eq!(i64::from_value(Value::Int(5)).unwrap(), 5);
        assert_eq!(i16::from_value(Value::BigInt(12)).unwrap(), 12);
        assert!(i8::from_value(Value::BigInt(300)).is_err());
        assert!(u32::from_value(Value::BigInt(-1)).is_err());
    }

    #[test]
    fn test_option_round_trip() {
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(Value::BigInt(3)).unwrap(), Some(3));
        assert_eq!(Some(4i64).to_value(), Value::BigInt(4));
        assert_eq!(None::<i64>.to_value(), Value::Null);
    }

    #[test]
    fn test_text_decoding_of_uuid_and_time() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_value(Value::Text(id.to_string())).unwrap(), id);

        let ts = DateTime::<Utc>::from_value(Value::Text("2024-05-01 10:20:30".into())).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:20:30+00:00");
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Int(3).coerce(ValueKind::BigInt).unwrap(), Value::BigInt(3));
        assert_eq!(Value::Null.coerce(ValueKind::Uuid).unwrap(), Value::Null);
        assert_eq!(Value::BigInt(1).coerce(ValueKind::Bool).unwrap(), Value::Bool(true));
        assert!(Value::Text("nope".into()).coerce(ValueKind::Int).is_err());
    }

    #[test]
    fn test_decode_field_names_the_field() {
        let err = decode_field::<i32>(Some(Value::Text("x".into())), "User", "age").unwrap_err();
        assert!(err.to_string().contains("User.age"));
    }
}
