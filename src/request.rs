//! Parsing of requested image variants.
//!
//! Image URLs carry the requested size as `WIDTHxHEIGHT` and optionally an
//! algorithm segment. Parsing is total: malformed numbers read as their
//! leading integer (or `0`), the same way they were historically coerced,
//! and the resulting request simply fails validation if no rule allows it.
//!
//! - `"800x600"` → 800 × 600
//! - `"800X600"` → 800 × 600
//! - `"800"` → 800 × 0
//! - `"abcx10"` → 0 × 10

use crate::coerce::{AlgorithmValue, integer_prefix};
use crate::rules::RuleValidator;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("unexpected text after algorithm: '{0}'")]
    TrailingTokens(String),
}

/// A requested image variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    pub width: i64,
    pub height: i64,
    pub algorithm: Option<AlgorithmValue>,
}

/// Split `WIDTHxHEIGHT` at the first `x` or `X`. A missing side reads as `0`.
pub fn parse_size(size: &str) -> (i64, i64) {
    match size.find(['x', 'X']) {
        Some(pos) => (integer_prefix(&size[..pos]), integer_prefix(&size[pos + 1..])),
        None => (integer_prefix(size), 0),
    }
}

impl VariantRequest {
    /// Build a request from URL segments. A blank algorithm segment counts
    /// as no algorithm.
    pub fn from_segments(size: &str, algorithm: Option<&str>) -> Self {
        let (width, height) = parse_size(size);
        let algorithm = algorithm
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(AlgorithmValue::from);
        Self {
            width,
            height,
            algorithm,
        }
    }

    /// Parse one line of an audit file: `SIZE [ALGORITHM]`.
    ///
    /// Returns `Ok(None)` for blank lines and `#` comments. Anything after
    /// the algorithm is an error.
    pub fn parse_line(line: &str) -> Result<Option<Self>, RequestError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut parts = line.split_whitespace();
        let size = parts.next().unwrap_or_default();
        let algorithm = parts.next();
        let extra: Vec<&str> = parts.collect();
        if !extra.is_empty() {
            return Err(RequestError::TrailingTokens(extra.join(" ")));
        }
        Ok(Some(Self::from_segments(size, algorithm)))
    }

    pub fn is_permitted(&self, validator: &RuleValidator) -> bool {
        validator.validate(self.width, self.height, self.algorithm.as_ref())
    }
}

impl fmt::Display for VariantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.algorithm {
            Some(a) => write!(f, "{}x{} {}", self.width, self.height, a),
            None => write!(f, "{}x{}", self.width, self.height),
        }
    }
}
