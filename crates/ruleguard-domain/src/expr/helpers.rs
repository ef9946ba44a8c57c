//! Value comparison helpers shared by the condition implementations.

use serde_json::Value;

/// Compare a configured literal against an actual document value.
///
/// The literal is coerced to the actual value's type: `equals: "5"` matches a
/// numeric `5`, `equals: true` matches the string `"true"`. String comparison
/// is case-insensitive unless the caller asks otherwise.
pub(crate) fn equal(expected: &Value, actual: &Value, case_sensitive: bool) -> bool {
    match actual {
        Value::String(actual) => match scalar_string(expected) {
            Some(expected) => string_eq(&expected, actual, case_sensitive),
            None => false,
        },
        Value::Number(actual) => match coerce_number(expected) {
            Some(expected) => actual.as_f64().is_some_and(|a| a == expected),
            None => false,
        },
        Value::Bool(actual) => match expected {
            Value::Bool(expected) => expected == actual,
            Value::String(expected) => expected.eq_ignore_ascii_case(if *actual {
                "true"
            } else {
                "false"
            }),
            _ => false,
        },
        Value::Null => expected.is_null(),
        // Arrays and objects never compare equal to a scalar literal.
        _ => false,
    }
}

fn string_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// A string rendering for scalar values only.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a value to a number, parsing strings like `"0"` or `"-1"`.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// True for null, empty strings, and empty collections.
pub(crate) fn null_or_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// A display rendering used in reasons; non-scalars render as JSON.
pub(crate) fn display(value: &Value) -> String {
    scalar_string(value).unwrap_or_else(|| value.to_string())
}
