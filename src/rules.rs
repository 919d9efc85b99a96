//! The rule validator: which (width, height, algorithm) variants may be served.
//!
//! A [`RuleValidator`] holds an ordered list of [`Rule`]s. A request is
//! permitted when at least one rule matches its width, height and, if the
//! caller names one, its algorithm. Matching is existential, so rule order
//! never changes an answer.
//!
//! ## Empty Means Unrestricted
//!
//! A validator with no rules permits everything. Adding the first rule flips
//! it to deny-unless-matched.
//!
//! ## Load, Seal, Serve
//!
//! Rules are added during startup through `&mut self`, then the validator is
//! [sealed](RuleValidator::seal) and shared read-only (usually through
//! [`RuleValidator::into_shared`]). A sealed validator rejects new rules with
//! [`ValidatorError::Sealed`].
//!
//! ## Algorithm Comparison
//!
//! See [`AlgorithmPolicy`]. The default compares stored strings with stored
//! strings. [`AlgorithmPolicy::LegacyInteger`] reproduces the historical
//! integer-vs-string identity check, under which a supplied algorithm never
//! matches.

use crate::coerce::{
    AlgorithmValue, Comparable, algorithm_as_integer, identical, stored_algorithm, stored_form,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("validator is sealed; cannot add rule {width}x{height}")]
    Sealed { width: i64, height: i64 },
}

/// A single admissible variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub width: i64,
    pub height: i64,
    /// Stored string form of the algorithm; `""` when none was given.
    pub algorithm: String,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.algorithm.is_empty() {
            write!(f, "{}x{}", self.width, self.height)
        } else {
            write!(f, "{}x{} {}", self.width, self.height, self.algorithm)
        }
    }
}

/// How a caller's algorithm is compared with a rule's stored algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmPolicy {
    /// Caller algorithm in stored string form, compared with the rule's string.
    #[default]
    Exact,
    /// Caller algorithm coerced to an integer, compared by identity with the
    /// rule's string. Never matches when the caller supplies an algorithm.
    LegacyInteger,
}

/// A requested algorithm converted once per query, ready to compare
/// against every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestedKey<'a> {
    Stored(Cow<'a, str>),
    Integer(i64),
}

impl AlgorithmPolicy {
    fn key(self, requested: &AlgorithmValue) -> RequestedKey<'_> {
        match self {
            Self::Exact => RequestedKey::Stored(stored_form(requested)),
            Self::LegacyInteger => RequestedKey::Integer(algorithm_as_integer(requested)),
        }
    }
}

impl RequestedKey<'_> {
    fn matches(&self, stored: &str) -> bool {
        match self {
            Self::Stored(wanted) => wanted.as_ref() == stored,
            Self::Integer(n) => identical(Comparable::Int(*n), Comparable::Str(stored)),
        }
    }
}

impl fmt::Display for AlgorithmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::LegacyInteger => f.write_str("legacy-integer"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    rules: Vec<Rule>,
    policy: AlgorithmPolicy,
    sealed: bool,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: AlgorithmPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Append a rule. Fails only once the validator has been sealed.
    pub fn add_rule(
        &mut self,
        width: i64,
        height: i64,
        algorithm: Option<AlgorithmValue>,
    ) -> Result<(), ValidatorError> {
        if self.sealed {
            return Err(ValidatorError::Sealed { width, height });
        }
        let rule = Rule {
            width,
            height,
            algorithm: stored_algorithm(algorithm.as_ref()),
        };
        log::debug!("Registered rule {rule}");
        self.rules.push(rule);
        Ok(())
    }

    /// Whether a variant is permitted.
    ///
    /// - No rules: always `true`.
    /// - Otherwise: `true` iff some rule matches width and height and either
    ///   `algorithm` is `None` or the policy accepts it.
    pub fn validate(&self, width: i64, height: i64, algorithm: Option<&AlgorithmValue>) -> bool {
        if self.rules.is_empty() {
            return true;
        }

        let key = algorithm.map(|a| self.policy.key(a));
        let permitted = self.rules.iter().any(|rule| {
            rule.width == width
                && rule.height == height
                && key.as_ref().is_none_or(|k| k.matches(&rule.algorithm))
        });

        if !permitted {
            log::trace!(
                "Denied {width}x{height} (algorithm: {})",
                algorithm.map_or_else(|| "-".to_string(), ToString::to_string)
            );
        }
        permitted
    }

    /// All rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn policy(&self) -> AlgorithmPolicy {
        self.policy
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// End the loading phase. Idempotent.
    pub fn seal(&mut self) {
        if !self.sealed {
            log::debug!("Sealed validator with {} rule(s)", self.rules.len());
            self.sealed = true;
        }
    }

    /// Seal and wrap for sharing across request handlers.
    pub fn into_shared(mut self) -> Arc<RuleValidator> {
        self.seal();
        Arc::new(self)
    }
}
