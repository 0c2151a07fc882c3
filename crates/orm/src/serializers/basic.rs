//! Built-in serializers for common Rust types

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::backends::{DatabaseValue, WireType};

use super::TypeSerializer;

/// Every built-in serializer
pub fn all() -> Vec<TypeSerializer> {
    vec![
        boolean(),
        tiny_int(),
        small_int(),
        integer(),
        big_int(),
        unsigned_small(),
        unsigned_integer(),
        unsigned_big(),
        real(),
        double(),
        character(),
        string(),
        date(),
        time(),
        timestamp(),
        timestamp_utc(),
        uuid(),
        bytes(),
        json(),
    ]
}

pub fn boolean() -> TypeSerializer {
    TypeSerializer::new::<bool, _, _>("BOOLEAN", WireType::Boolean, |v| DatabaseValue::Bool(*v), |v| v.as_bool())
}

pub fn tiny_int() -> TypeSerializer {
    TypeSerializer::new::<i8, _, _>(
        "TINYINT",
        WireType::TinyInt,
        |v| DatabaseValue::Int32(*v as i32),
        |v| v.as_i64().and_then(|i| i8::try_from(i).ok()),
    )
}

pub fn small_int() -> TypeSerializer {
    TypeSerializer::new::<i16, _, _>(
        "SMALLINT",
        WireType::SmallInt,
        |v| DatabaseValue::Int32(*v as i32),
        |v| v.as_i64().and_then(|i| i16::try_from(i).ok()),
    )
}

pub fn integer() -> TypeSerializer {
    TypeSerializer::new::<i32, _, _>(
        "INTEGER",
        WireType::Integer,
        |v| DatabaseValue::Int32(*v),
        |v| v.as_i64().and_then(|i| i32::try_from(i).ok()),
    )
}

pub fn big_int() -> TypeSerializer {
    TypeSerializer::new::<i64, _, _>("BIGINT", WireType::BigInt, |v| DatabaseValue::Int64(*v), |v| v.as_i64())
}

pub fn unsigned_small() -> TypeSerializer {
    TypeSerializer::new::<u8, _, _>(
        "SMALLINT",
        WireType::SmallInt,
        |v| DatabaseValue::Int32(*v as i32),
        |v| v.as_i64().and_then(|i| u8::try_from(i).ok()),
    )
}

pub fn unsigned_integer() -> TypeSerializer {
    TypeSerializer::new::<u32, _, _>(
        "BIGINT",
        WireType::BigInt,
        |v| DatabaseValue::Int64(*v as i64),
        |v| v.as_i64().and_then(|i| u32::try_from(i).ok()),
    )
}

pub fn unsigned_big() -> TypeSerializer {
    TypeSerializer::try_new::<u64, _, _>(
        "BIGINT",
        WireType::BigInt,
        |v| i64::try_from(*v).ok().map(DatabaseValue::Int64),
        |v| v.as_i64().and_then(|i| u64::try_from(i).ok()),
    )
}

pub fn real() -> TypeSerializer {
    TypeSerializer::new::<f32, _, _>(
        "REAL",
        WireType::Real,
        |v| DatabaseValue::Float32(*v),
        |v| v.as_f64().map(|f| f as f32),
    )
}

pub fn double() -> TypeSerializer {
    TypeSerializer::new::<f64, _, _>(
        "DOUBLE PRECISION",
        WireType::Double,
        |v| DatabaseValue::Float64(*v),
        |v| v.as_f64(),
    )
}

pub fn character() -> TypeSerializer {
    TypeSerializer::new::<char, _, _>(
        "CHAR(1)",
        WireType::Char,
        |v| DatabaseValue::String(v.to_string()),
        |v| {
            let s = v.as_str()?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        },
    )
}

pub fn string() -> TypeSerializer {
    TypeSerializer::new::<String, _, _>(
        "TEXT",
        WireType::VarChar,
        |v| DatabaseValue::String(v.clone()),
        |v| v.as_str().map(str::to_string),
    )
}

pub fn date() -> TypeSerializer {
    TypeSerializer::new::<NaiveDate, _, _>(
        "DATE",
        WireType::Date,
        |v| DatabaseValue::Date(*v),
        |v| match v {
            DatabaseValue::Date(d) => Some(*d),
            DatabaseValue::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        },
    )
}

pub fn time() -> TypeSerializer {
    TypeSerializer::new::<NaiveTime, _, _>(
        "TIME",
        WireType::Time,
        |v| DatabaseValue::Time(*v),
        |v| match v {
            DatabaseValue::Time(t) => Some(*t),
            DatabaseValue::String(s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok(),
            _ => None,
        },
    )
}

pub fn timestamp() -> TypeSerializer {
    TypeSerializer::new::<NaiveDateTime, _, _>(
        "TIMESTAMP",
        WireType::Timestamp,
        |v| DatabaseValue::NaiveDateTime(*v),
        |v| match v {
            DatabaseValue::NaiveDateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok(),
            _ => None,
        },
    )
}

pub fn timestamp_utc() -> TypeSerializer {
    TypeSerializer::new::<DateTime<Utc>, _, _>(
        "TIMESTAMP WITH TIME ZONE",
        WireType::TimestampTz,
        |v| DatabaseValue::DateTime(*v),
        |v| match v {
            DatabaseValue::DateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        },
    )
}

pub fn uuid() -> TypeSerializer {
    TypeSerializer::new::<Uuid, _, _>(
        "UUID",
        WireType::Uuid,
        |v| DatabaseValue::Uuid(*v),
        |v| match v {
            DatabaseValue::Uuid(u) => Some(*u),
            DatabaseValue::String(s) => Uuid::parse_str(s).ok(),
            DatabaseValue::Bytes(b) => Uuid::from_slice(b).ok(),
            _ => None,
        },
    )
}

pub fn bytes() -> TypeSerializer {
    TypeSerializer::new::<Vec<u8>, _, _>(
        "BLOB",
        WireType::Binary,
        |v| DatabaseValue::Bytes(v.clone()),
        |v| match v {
            DatabaseValue::Bytes(b) => Some(b.clone()),
            _ => None,
        },
    )
}

pub fn json() -> TypeSerializer {
    TypeSerializer::new::<serde_json::Value, _, _>(
        "JSON",
        WireType::Json,
        |v| DatabaseValue::Json(v.clone()),
        |v| match v {
            DatabaseValue::Json(j) => Some(j.clone()),
            DatabaseValue::String(s) => serde_json::from_str(s).ok(),
            _ => None,
        },
    )
}
