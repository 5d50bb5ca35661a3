//! Scalar typing
//!
//! Plain scalars are typed with the YAML 1.2 core schema. Explicit core
//! tags (`!!int`, `!!float`, ...) are applied to the scalar text after any
//! placeholder substitution.

use crate::error::{Error, Result};
use crate::value::Value;

/// Prefix shared by all YAML core tags
pub const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Type an untagged plain scalar
pub fn resolve_plain(text: &str) -> Value {
    if is_null(text) {
        return Value::Null;
    }
    if let Some(b) = parse_bool(text) {
        return Value::Bool(b);
    }
    if let Some(i) = parse_int(text) {
        return Value::Integer(i);
    }
    if let Some(f) = parse_float(text) {
        return Value::Float(f);
    }
    Value::String(text.to_string())
}

/// Apply a core tag (the part after [`CORE_TAG_PREFIX`]) to scalar text.
///
/// Returns `None` for core tags that do not describe scalars.
pub fn construct_core(name: &str, text: &str) -> Option<Result<Value>> {
    let value = match name {
        "str" | "binary" | "timestamp" => Ok(Value::String(text.to_string())),
        "null" => {
            if is_null(text) {
                Ok(Value::Null)
            } else {
                Err(invalid("null", text))
            }
        }
        "bool" => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| invalid("bool", text)),
        "int" => parse_int(text)
            .map(Value::Integer)
            .ok_or_else(|| invalid("int", text)),
        "float" => parse_float(text)
            .map(Value::Float)
            .ok_or_else(|| invalid("float", text)),
        _ => return None,
    };
    Some(value)
}

/// Apply a core tag written at the start of scalar text
///
/// `tag:yaml.org,2002:float 27017` becomes `27017.0`. Returns `None` when
/// the text does not open with a scalar core tag followed by whitespace.
pub fn construct_inline_tag(text: &str) -> Option<Result<Value>> {
    let (name, body) = text
        .strip_prefix(CORE_TAG_PREFIX)?
        .split_once(char::is_whitespace)?;
    construct_core(name, body)
}

fn invalid(kind: &str, text: &str) -> Error {
    Error::construct(format!("Invalid !!{} value: '{}'", kind, text))
}

fn is_null(text: &str) -> bool {
    matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x") {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = text.strip_prefix("0o") {
        if oct.is_empty() || !oct.chars().all(|c| ('0'..='7').contains(&c)) {
            return None;
        }
        return i64::from_str_radix(oct, 8).ok();
    }

    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let negative = text.starts_with('-');

    match unsigned {
        ".inf" | ".Inf" | ".INF" => {
            return Some(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            })
        }
        ".nan" | ".NaN" | ".NAN" if unsigned.len() == text.len() => return Some(f64::NAN),
        _ => {}
    }

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
        None => (unsigned, None),
    };

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !fraction.is_none_or(all_digits) {
        return None;
    }
    // `.5` and `1.` are valid, `.` is not
    if whole.is_empty() && fraction.is_none_or(str::is_empty) {
        return None;
    }

    if let Some(exp) = exponent {
        let exp_digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        if exp_digits.is_empty() || !all_digits(exp_digits) {
            return None;
        }
    }

    text.parse().ok()
}
