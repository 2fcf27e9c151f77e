//! Seed value normalization.
//!
//! Declared rows come from YAML text; live values come back through the
//! driver. The two constantly disagree on wire shape: `180` vs `"180.00"`,
//! `2024-01-02T10:30:00Z` vs `2024-01-02 10:30:00.000`, a JSON document vs
//! its text serialization. Two values are equal iff their canonical forms
//! are equal.

use serde_json::{Map, Number, Value as JsonValue};

use crate::core::value::strip_timezone_suffix;

/// Reduce a value to its canonical comparable form.
///
/// * numbers and numeric strings become f64 numbers;
/// * date-time strings are reduced (timezone suffix stripped, `T` replaced
///   by a space) and compared as strings;
/// * strings holding a JSON document are promoted to the parsed form;
/// * objects and arrays are canonicalized recursively (map equality is
///   key-order independent);
/// * null, booleans and plain strings stand for themselves.
pub fn canonical(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => JsonValue::Null,
        JsonValue::Bool(b) => JsonValue::Bool(*b),
        JsonValue::Number(n) => canonical_number(n),
        JsonValue::String(s) => canonical_string(s),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(canonical).collect()),
        JsonValue::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), canonical(v));
            }
            JsonValue::Object(out)
        }
    }
}

/// Whether two values agree after canonicalization.
pub fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    canonical(a) == canonical(b)
}

fn canonical_number(n: &Number) -> JsonValue {
    match n.as_f64().and_then(Number::from_f64) {
        Some(f) => JsonValue::Number(f),
        None => JsonValue::Number(n.clone()),
    }
}

fn canonical_string(s: &str) -> JsonValue {
    let trimmed = s.trim();

    // A string holding a JSON document stands for the document. This covers
    // schemas that store JSON text in plain text columns.
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<JsonValue>(trimmed) {
            return canonical(&parsed);
        }
    }

    if looks_like_datetime(trimmed) {
        let reduced = strip_timezone_suffix(trimmed).replace('T', " ");
        return JsonValue::String(reduced);
    }

    if is_plain_number(trimmed) {
        if let Some(f) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return JsonValue::Number(f);
        }
    }

    JsonValue::String(s.to_string())
}

/// `YYYY-MM-DD[T ]HH:MM...`
fn looks_like_datetime(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 16
        && b[..4].iter().all(|c| c.is_ascii_digit())
        && b[4] == b'-'
        && b[5].is_ascii_digit()
        && b[6].is_ascii_digit()
        && b[7] == b'-'
        && b[8].is_ascii_digit()
        && b[9].is_ascii_digit()
        && (b[10] == b'T' || b[10] == b' ')
        && b[11].is_ascii_digit()
        && b[12].is_ascii_digit()
        && b[13] == b':'
}

/// `-?\d+(\.\d+)?`, the shape numeric columns come back as.
fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() {
        return false;
    }
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac = parts.next();
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac {
        None => true,
        Some(f) => !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()),
    }
}
