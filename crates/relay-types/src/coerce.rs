//! Coercion of untrusted JSON fields into canonical payload types.
//!
//! The producer is a scripting pipeline, so numbers sometimes arrive as
//! strings and integers sometimes arrive as `3.0`. Each helper accepts
//! the loose forms that unambiguously denote a value of the declared type
//! and rejects everything else with a [`ValidationError`] naming the
//! offending field.

use serde_json::{Map, Value};

/// Largest magnitude at which every integral `f64` maps to exactly one `i64`.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Reasons an inbound payload is rejected before touching any state.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The request body is not valid JSON.
    #[error("malformed JSON body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The request body is valid JSON but not an object.
    #[error("request body must be a JSON object")]
    NotAnObject,

    /// A required field is absent or `null`.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field is present but cannot be coerced to its declared type.
    #[error("field '{field}' must be {expected}")]
    InvalidType {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable description of the accepted type.
        expected: &'static str,
    },

    /// An array field has the wrong number of elements.
    #[error("field '{field}' must contain exactly {expected} values, got {actual}")]
    WrongLength {
        /// Name of the offending field.
        field: &'static str,
        /// Required element count.
        expected: usize,
        /// Element count received.
        actual: usize,
    },

    /// The channel name does not match any known channel.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Interpret a JSON value as the field map of a submission.
pub fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object().ok_or(ValidationError::NotAnObject)
}

/// Look up a required field. A `null` counts as absent.
pub fn require<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(value) => Ok(value),
    }
}

/// Coerce to a finite `f64`.
pub fn float(value: &Value, field: &'static str) -> Result<f64, ValidationError> {
    let invalid = ValidationError::InvalidType {
        field,
        expected: "a finite number",
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(invalid),
    }
}

/// Coerce to an `i64`.
///
/// Integral floats such as `3.0` are accepted as long as they are exactly
/// representable; `3.5` is rejected rather than truncated.
pub fn integer(value: &Value, field: &'static str) -> Result<i64, ValidationError> {
    let invalid = ValidationError::InvalidType {
        field,
        expected: "an integer",
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            n.as_f64().and_then(integral_f64).ok_or(invalid)
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_parse| invalid),
        _ => Err(invalid),
    }
}

#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT {
        Some(f as i64)
    } else {
        None
    }
}

/// Coerce to a `bool`. Accepts JSON booleans and the strings `true`/`false`.
pub fn boolean(value: &Value, field: &'static str) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ValidationError::InvalidType {
            field,
            expected: "a boolean",
        }),
    }
}

/// Coerce to a fixed-length array of finite `f64`.
pub fn float_array<const N: usize>(
    value: &Value,
    field: &'static str,
) -> Result<[f64; N], ValidationError> {
    let items = value.as_array().ok_or(ValidationError::InvalidType {
        field,
        expected: "an array of numbers",
    })?;
    if items.len() != N {
        return Err(ValidationError::WrongLength {
            field,
            expected: N,
            actual: items.len(),
        });
    }

    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = float(item, field).map_err(|_elem| ValidationError::InvalidType {
            field,
            expected: "an array of numbers",
        })?;
    }
    Ok(out)
}
