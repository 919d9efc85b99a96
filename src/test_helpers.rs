//! Shared test utilities for the image-rules test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let v = validator_with(&[(800, 600, Some("fit")), (64, 64, None)]);
//! assert_decisions(&v, &[
//!     (800, 600, Some("fit"), true),
//!     (800, 600, Some("crop"), false),
//! ]);
//!
//! let (_tmp, path) = write_config("[[rules]]\nwidth = 1\nheight = 1\n");
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

use crate::coerce::AlgorithmValue;
use crate::rules::RuleValidator;

// =========================================================================
// Validator setup
// =========================================================================

/// Build an unsealed validator with the default policy from
/// `(width, height, algorithm)` triples.
pub fn validator_with(specs: &[(i64, i64, Option<&str>)]) -> RuleValidator {
    let mut v = RuleValidator::new();
    for &(w, h, a) in specs {
        v.add_rule(w, h, a.map(AlgorithmValue::from)).unwrap();
    }
    v
}

/// Assert `validate` answers for each `(width, height, algorithm, expected)`.
pub fn assert_decisions(v: &RuleValidator, cases: &[(i64, i64, Option<&str>, bool)]) {
    for &(w, h, a, expected) in cases {
        let algorithm = a.map(AlgorithmValue::from);
        assert_eq!(
            v.validate(w, h, algorithm.as_ref()),
            expected,
            "validate({w}, {h}, {a:?}) should be {expected}"
        );
    }
}

// =========================================================================
// Config fixtures
// =========================================================================

/// Write `contents` to `images.toml` in a fresh temp dir.
///
/// Keep the returned `TempDir` alive for as long as the path is used.
pub fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("images.toml");
    std::fs::write(&path, contents).unwrap();
    (tmp, path)
}
