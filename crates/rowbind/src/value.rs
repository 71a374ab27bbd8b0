//! Driver-agnostic column values and the slot capability.
//!
//! A row source produces [`Value`]s from the wire; [`FromValue`] converts a
//! value into a destination field's scalar type. [`Slot`] is the object-safe
//! "settable field" capability the mapping engine hands back to a row source
//! during a scan. It is blanket-implemented for every `FromValue` type, so
//! implementing `FromValue` is all a custom scalar needs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single column value, decoupled from any concrete driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// BOOLEAN
    Bool(bool),
    /// SMALLINT
    Int16(i16),
    /// INTEGER
    Int32(i32),
    /// BIGINT
    Int64(i64),
    /// REAL
    Float32(f32),
    /// DOUBLE PRECISION
    Float64(f64),
    /// VARCHAR, TEXT, CHAR
    Text(String),
    /// BYTEA, BLOB
    Bytes(Vec<u8>),
    /// DATE
    Date(NaiveDate),
    /// TIMESTAMP without time zone
    Timestamp(NaiveDateTime),
    /// TIMESTAMP with time zone
    TimestampTz(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// JSON, JSONB
    Json(serde_json::Value),
}

impl Value {
    /// Check whether this value is SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Logical SQL type name, used in conversion diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int16(_) => "SMALLINT",
            Self::Int32(_) => "INTEGER",
            Self::Int64(_) => "BIGINT",
            Self::Float32(_) => "REAL",
            Self::Float64(_) => "DOUBLE PRECISION",
            Self::Text(_) => "TEXT",
            Self::Bytes(_) => "BYTEA",
            Self::Date(_) => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::TimestampTz(_) => "TIMESTAMPTZ",
            Self::Uuid(_) => "UUID",
            Self::Json(_) => "JSON",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Conversion failure between a wire value and a destination field type.
#[derive(Debug, Clone, Error)]
#[error("cannot convert {found} value into {expected}")]
pub struct ValueError {
    expected: &'static str,
    found: &'static str,
}

impl ValueError {
    /// Record a type mismatch for the given destination type name.
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.type_name(),
        }
    }

    /// The destination type that was requested.
    pub fn expected(&self) -> &'static str {
        self.expected
    }

    /// The SQL type of the value that was supplied.
    pub fn found(&self) -> &'static str {
        self.found
    }
}

/// Conversion from a wire [`Value`] into a concrete field type.
///
/// Widening integer conversions are accepted; everything else is strict.
/// `Option<T>` lifts any implementation to accept SQL NULL.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int16(v) => Ok(v),
            other => Err(ValueError::mismatch("i16", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int16(v) => Ok(v.into()),
            Value::Int32(v) => Ok(v),
            other => Err(ValueError::mismatch("i32", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int16(v) => Ok(v.into()),
            Value::Int32(v) => Ok(v.into()),
            Value::Int64(v) => Ok(v),
            other => Err(ValueError::mismatch("i64", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float32(v) => Ok(v),
            other => Err(ValueError::mismatch("f32", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float32(v) => Ok(v.into()),
            Value::Float64(v) => Ok(v),
            other => Err(ValueError::mismatch("f64", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(ValueError::mismatch("String", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(ValueError::mismatch("Vec<u8>", &other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Uuid(v) => Ok(v),
            Value::Text(ref s) => {
                Uuid::parse_str(s).map_err(|_| ValueError::mismatch("Uuid", &value))
            }
            other => Err(ValueError::mismatch("Uuid", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Json(v) => Ok(v),
            other => Err(ValueError::mismatch("serde_json::Value", &other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(v) => Ok(v),
            other => Err(ValueError::mismatch("NaiveDate", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(ValueError::mismatch("NaiveDateTime", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::TimestampTz(v) => Ok(v),
            // Naive timestamps are interpreted as UTC.
            Value::Timestamp(v) => Ok(v.and_utc()),
            other => Err(ValueError::mismatch("DateTime<Utc>", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A settable destination slot for one column of one row.
///
/// The mapping engine resolves a slot per column and hands it to the row
/// source; the row source supplies the wire value, the slot performs the
/// final conversion and assignment.
pub trait Slot {
    fn put(&mut self, value: Value) -> Result<(), ValueError>;
}

impl std::fmt::Debug for dyn Slot + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Slot")
    }
}

impl<T: FromValue> Slot for T {
    fn put(&mut self, value: Value) -> Result<(), ValueError> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_integer_conversions() {
        assert_eq!(i64::from_value(Value::Int16(7)).unwrap(), 7);
        assert_eq!(i64::from_value(Value::Int32(7)).unwrap(), 7);
        assert_eq!(i32::from_value(Value::Int16(7)).unwrap(), 7);
        assert!(i32::from_value(Value::Int64(7)).is_err());
    }

    #[test]
    fn option_lifts_null() {
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::from("x")).unwrap(),
            Some("x".to_owned())
        );
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn mismatch_reports_both_sides() {
        let err = bool::from_value(Value::Int64(1)).unwrap_err();
        assert_eq!(err.expected(), "bool");
        assert_eq!(err.found(), "BIGINT");
    }

    #[test]
    fn uuid_accepts_textual_form() {
        let id = Uuid::new_v4();
        assert_eq!(
            Uuid::from_value(Value::Text(id.to_string())).unwrap(),
            id
        );
        assert!(Uuid::from_value(Value::from("not-a-uuid")).is_err());
    }

    #[test]
    fn slot_assigns_through_from_value() {
        let mut n: i64 = 0;
        let slot: &mut dyn Slot = &mut n;
        slot.put(Value::Int32(41)).unwrap();
        assert_eq!(n, 41);
    }

    #[test]
    fn naive_timestamp_read_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let got = DateTime::<Utc>::from_value(Value::Timestamp(naive)).unwrap();
        assert_eq!(got.naive_utc(), naive);
    }
}
