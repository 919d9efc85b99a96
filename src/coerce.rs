//! Explicit conversions between the loosely typed values that arrive from
//! configuration and request URLs and the typed values the validator stores.
//!
//! Rules store their algorithm as a string. Callers may supply an algorithm
//! as an integer, as text, or not at all. The functions here make every
//! conversion between those forms a named step:
//!
//! | Input | [`stored_algorithm`] | [`algorithm_as_integer`] |
//! |---|---|---|
//! | absent | `""` | n/a |
//! | `3` | `"3"` | `3` |
//! | `"fit"` | `"fit"` | `0` |
//! | `"12px"` | `"12px"` | `12` |
//!
//! [`Comparable`] pairs a value with its kind so that comparisons across
//! kinds (integer vs string) are spelled out rather than implied.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// An algorithm identifier as supplied by configuration or a caller.
///
/// TOML accepts either form: `algorithm = "crop"` or `algorithm = 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlgorithmValue {
    Int(i64),
    Text(String),
}

impl From<i64> for AlgorithmValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for AlgorithmValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AlgorithmValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for AlgorithmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Convert an optional algorithm into the string form a rule stores.
///
/// An absent algorithm becomes the empty string. It is *not* a wildcard once
/// stored: a rule with `""` only matches callers that omit the algorithm or
/// ask for `""` explicitly.
pub fn stored_algorithm(algorithm: Option<&AlgorithmValue>) -> String {
    algorithm.map_or_else(String::new, |value| stored_form(value).into_owned())
}

/// Stored string form of a present algorithm. Borrows text values; only
/// integers allocate.
pub fn stored_form(algorithm: &AlgorithmValue) -> Cow<'_, str> {
    match algorithm {
        AlgorithmValue::Int(n) => Cow::Owned(n.to_string()),
        AlgorithmValue::Text(s) => Cow::Borrowed(s.as_str()),
    }
}

/// Convert an algorithm into an integer.
///
/// Integers pass through. Text uses [`integer_prefix`], so names without a
/// leading number (`"crop"`, `"fit"`) all become `0`.
pub fn algorithm_as_integer(algorithm: &AlgorithmValue) -> i64 {
    match algorithm {
        AlgorithmValue::Int(n) => *n,
        AlgorithmValue::Text(s) => integer_prefix(s),
    }
}

/// Read the leading decimal integer of `text`.
///
/// Leading whitespace is skipped, then an optional `+`/`-` sign, then digits
/// up to the first non-digit. No digits yields `0`. Values beyond `i64`
/// saturate at the bound.
pub fn integer_prefix(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// A value tagged with its kind, for identity comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparable<'a> {
    Int(i64),
    Str(&'a str),
}

/// Identity comparison: equal only when both the kind and the value match.
///
/// `Int(0)` and `Str("0")` are never identical.
pub fn identical(a: Comparable<'_>, b: Comparable<'_>) -> bool {
    match (a, b) {
        (Comparable::Int(x), Comparable::Int(y)) => x == y,
        (Comparable::Str(x), Comparable::Str(y)) => x == y,
        _ => false,
    }
}
