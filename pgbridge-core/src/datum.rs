use serde::{Deserialize, Serialize};

/// An opaque constant payload carried by a `Const` node.
///
/// The planner never interprets these directly: only the catalog oracle's
/// type-output function turns a datum into text, keyed by the constant's
/// declared type OID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    Decimal(rust_decimal::Decimal),
    Utf8String(String),
    Binary(Vec<u8>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeWithTZ((chrono::NaiveDateTime, chrono_tz::Tz)),
    Uuid(uuid::Uuid),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        *self == Datum::Null
    }
}

impl From<&str> for Datum {
    fn from(str: &str) -> Self {
        Datum::Utf8String(str.into())
    }
}

impl From<i32> for Datum {
    fn from(val: i32) -> Self {
        Datum::Int32(val)
    }
}
