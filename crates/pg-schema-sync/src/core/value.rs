//! Dynamic SQL values for the executor port.
//!
//! Declared rows arrive as YAML/JSON values while the wire wants typed
//! parameters, and query results arrive as typed columns while the seed
//! reconciler wants comparable JSON values. This module owns both
//! directions: [`SqlValue`] carries a parameter of any supported wire type,
//! and [`row_to_values`] decodes a result row by its column types.

use bytes::BytesMut;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Wall-clock format used for driver-produced moments: `YYYY-MM-DD HH:MM:SS.sss`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One dynamically-typed SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Json(JsonValue),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::I16(v) => v.to_sql(ty, out),
            SqlValue::I32(v) => v.to_sql(ty, out),
            // Integers adapt to the column width the server asks for.
            SqlValue::I64(v) => {
                if *ty == Type::INT2 {
                    (*v as i16).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::F64(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::Json(v) => v.to_sql(ty, out),
            SqlValue::Uuid(v) => v.to_sql(ty, out),
            SqlValue::Timestamp(v) => v.to_sql(ty, out),
            SqlValue::TimestampTz(v) => v.to_sql(ty, out),
            SqlValue::Date(v) => v.to_sql(ty, out),
            SqlValue::Time(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert a declared JSON value into a parameter for a column of the given
/// catalog wire type.
///
/// The wire type decides the conversion: a declared string `"42"` becomes an
/// integer parameter for an `integer` column and stays text for a `text`
/// column. Unknown types fall back to text.
pub fn bind_for_column(data_type: &str, value: &JsonValue) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let ty = data_type.to_ascii_lowercase();
    let mismatch = |expected: &str| {
        SyncError::Config(format!(
            "cannot bind {} value to {} column",
            json_kind(value),
            expected
        ))
    };

    match ty.as_str() {
        "smallint" | "int2" => as_i64(value)
            .map(|v| SqlValue::I16(v as i16))
            .ok_or_else(|| mismatch("smallint")),
        "integer" | "int4" => as_i64(value)
            .map(|v| SqlValue::I32(v as i32))
            .ok_or_else(|| mismatch("integer")),
        "bigint" | "int8" => as_i64(value)
            .map(SqlValue::I64)
            .ok_or_else(|| mismatch("bigint")),
        "real" | "double precision" => as_f64(value)
            .map(SqlValue::F64)
            .ok_or_else(|| mismatch("float")),
        "numeric" => match value {
            JsonValue::Number(n) => Decimal::from_str(&n.to_string())
                .map(SqlValue::Decimal)
                .map_err(|e| SyncError::Config(format!("invalid numeric value {}: {}", n, e))),
            JsonValue::String(s) => Decimal::from_str(s.trim())
                .map(SqlValue::Decimal)
                .map_err(|e| SyncError::Config(format!("invalid numeric value {:?}: {}", s, e))),
            _ => Err(mismatch("numeric")),
        },
        "boolean" => match value {
            JsonValue::Bool(b) => Ok(SqlValue::Bool(*b)),
            JsonValue::Number(n) => Ok(SqlValue::Bool(n.as_i64() == Some(1))),
            JsonValue::String(s) => Ok(SqlValue::Bool(matches!(
                s.to_ascii_lowercase().as_str(),
                "true" | "t" | "1" | "yes"
            ))),
            _ => Err(mismatch("boolean")),
        },
        "json" | "jsonb" => Ok(SqlValue::Json(promote_json(value))),
        "uuid" => match value {
            JsonValue::String(s) => Uuid::parse_str(s.trim())
                .map(SqlValue::Uuid)
                .map_err(|e| SyncError::Config(format!("invalid uuid {:?}: {}", s, e))),
            _ => Err(mismatch("uuid")),
        },
        "date" => match value {
            JsonValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(SqlValue::Date)
                .map_err(|e| SyncError::Config(format!("invalid date {:?}: {}", s, e))),
            _ => Err(mismatch("date")),
        },
        "time without time zone" | "time with time zone" => match value {
            JsonValue::String(s) => parse_time(s.trim())
                .map(SqlValue::Time)
                .ok_or_else(|| SyncError::Config(format!("invalid time {:?}", s))),
            _ => Err(mismatch("time")),
        },
        "timestamp without time zone" | "timestamp with time zone" => match value {
            JsonValue::String(s) => {
                let parsed = parse_timestamp(s.trim())
                    .ok_or_else(|| SyncError::Config(format!("invalid timestamp {:?}", s)))?;
                if ty == "timestamp with time zone" {
                    Ok(SqlValue::TimestampTz(DateTime::from_naive_utc_and_offset(
                        parsed, Utc,
                    )))
                } else {
                    Ok(SqlValue::Timestamp(parsed))
                }
            }
            _ => Err(mismatch("timestamp")),
        },
        _ => Ok(match value {
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            JsonValue::Bool(b) => SqlValue::Text(b.to_string()),
            JsonValue::Number(n) => SqlValue::Text(n.to_string()),
            other => SqlValue::Text(other.to_string()),
        }),
    }
}

/// Decode one result row into `(column, value)` pairs keyed by column type.
///
/// Moments are rendered to wall-clock strings with their local components so
/// the seed normalizer can compare them against declared strings. NUMERIC
/// columns come back as their exact string form.
pub fn row_to_values(row: &Row) -> Result<Vec<(String, JsonValue)>> {
    let mut out = Vec::with_capacity(row.len());
    for (idx, col) in row.columns().iter().enumerate() {
        out.push((col.name().to_string(), decode_column(row, idx, col.type_())?));
    }
    Ok(out)
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<JsonValue> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(JsonValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| JsonValue::from(v as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| JsonValue::from(v as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(JsonValue::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| JsonValue::from(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(JsonValue::from)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)?
            .map(|v| JsonValue::String(v.to_string()))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| JsonValue::String(v.format(TIMESTAMP_FORMAT).to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?.map(|v| {
            let local = v.with_timezone(&Local).naive_local();
            JsonValue::String(local.format(TIMESTAMP_FORMAT).to_string())
        })
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| JsonValue::String(v.format("%Y-%m-%d").to_string()))
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| JsonValue::String(v.format("%H:%M:%S%.3f").to_string()))
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<Uuid>>(idx)?
            .map(|v| JsonValue::String(v.to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<JsonValue>>(idx)?
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)?.map(JsonValue::String)
    } else {
        // Last resort: many exotic types still decode as text.
        match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(JsonValue::String),
            Err(_) => {
                warn!("column {} has undecodable type {}, treating as null", idx, ty);
                None
            }
        }
    };
    Ok(value.unwrap_or(JsonValue::Null))
}

/// A declared string that looks like a JSON document is promoted to the
/// parsed form; everything else is wrapped as-is.
fn promote_json(value: &JsonValue) -> JsonValue {
    if let JsonValue::String(s) = value {
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str::<JsonValue>(s) {
                return parsed;
            }
        }
    }
    value.clone()
}

fn as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        JsonValue::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a declared timestamp string: `T` or space separator, optional
/// fractional seconds, optional trailing `Z` or `±HH[:MM]` offset (which is
/// stripped, not shifted).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let reduced = strip_timezone_suffix(s).replace('T', " ");
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&reduced, fmt) {
            return Some(dt);
        }
    }
    None
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    for fmt in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    None
}

/// Remove a trailing `Z` or `±HH[:MM]` timezone suffix from a date-time string.
pub fn strip_timezone_suffix(s: &str) -> String {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix('Z') {
        return stripped.to_string();
    }
    // An offset sign only counts after the time-of-day part, otherwise the
    // date's own dashes would match.
    if let Some(pos) = s.rfind(['+', '-']) {
        if pos > 10 && s[pos + 1..].chars().all(|c| c.is_ascii_digit() || c == ':') {
            let tail = &s[pos + 1..];
            if matches!(tail.len(), 2 | 4 | 5) {
                return s[..pos].to_string();
            }
        }
    }
    s.to_string()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
