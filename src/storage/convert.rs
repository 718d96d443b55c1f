//! Nullable coercions over dynamic MessagePack values.
//!
//! Stored payloads and request fields arrive as untyped [`rmpv::Value`]s.
//! These helpers give a typed view of such a value, returning `None` when the
//! value is nil or cannot be represented as the requested type.
//!
//! MessagePack has two textual representations (`str` and `bin`); both are
//! accepted wherever text is expected.

use rmpv::Value;

/// Returns the value as text.
///
/// Strings and UTF-8 binaries are returned verbatim. Integers, floats and
/// booleans are formatted. Anything else (nil, arrays, maps, ext) is `None`.
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => s.as_str().map(str::to_owned),
        Value::Binary(b) => std::str::from_utf8(b).ok().map(str::to_owned),
        Value::Integer(n) => Some(n.to_string()),
        Value::F32(f) => Some(f.to_string()),
        Value::F64(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Returns the value as a signed integer.
///
/// Floats are truncated toward zero; strings and binaries must hold a base-10
/// integer.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok())),
        Value::F32(f) if f.is_finite() => Some(*f as i64),
        Value::F64(f) if f.is_finite() => Some(*f as i64),
        Value::String(_) | Value::Binary(_) => raw_str(value)?.trim().parse().ok(),
        _ => None,
    }
}

/// Returns the value as a float.
pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => n.as_f64(),
        Value::F32(f) => Some(f64::from(*f)),
        Value::F64(f) => Some(*f),
        Value::String(_) | Value::Binary(_) => raw_str(value)?.trim().parse().ok(),
        _ => None,
    }
}

/// Returns the value as a boolean.
///
/// Only `true` and `false` (in any ASCII case) are accepted from strings.
pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::String(_) => {
            let s = raw_str(value)?;
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Borrows the UTF-8 text of a `str` or `bin` value.
///
/// Unlike [`to_text`] this never formats numbers: it is the strict accessor
/// used for keys and command names.
pub fn raw_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => s.as_str(),
        Value::Binary(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}
