//! One validator per storage backend.
//!
//! Built once from [`RulesConfig`] at startup. Each validator is populated in
//! configuration order, sealed, and shared behind an `Arc`, so request
//! handlers can hold a validator without borrowing the registry.

use crate::coerce::AlgorithmValue;
use crate::config::{ConfigError, DEFAULT_STORAGE, RuleSpec, RulesConfig};
use crate::rules::{AlgorithmPolicy, RuleValidator, ValidatorError};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Arc<RuleValidator>>,
}

impl ValidatorRegistry {
    /// Validates `config` first, so a hand-built config cannot shadow the
    /// default storage.
    pub fn from_config(config: &RulesConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = config.validator.algorithm_policy;
        let default = build_validator(policy, &config.rules)?;

        let mut validators = BTreeMap::new();
        for (name, storage) in &config.storage {
            let validator = match &storage.rules {
                Some(rules) => build_validator(policy, rules)?,
                None => Arc::clone(&default),
            };
            log::debug!("Storage '{}': {} rule(s)", name, validator.len());
            validators.insert(name.clone(), validator);
        }
        validators.insert(DEFAULT_STORAGE.to_string(), default);

        Ok(Self { validators })
    }

    pub fn get(&self, storage: &str) -> Option<&Arc<RuleValidator>> {
        self.validators.get(storage)
    }

    pub fn default_validator(&self) -> &Arc<RuleValidator> {
        // Inserted unconditionally in `from_config`.
        &self.validators[DEFAULT_STORAGE]
    }

    /// Storage names in sorted order, `default` included.
    pub fn storages(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// `None` when `storage` is not configured.
    pub fn validate(
        &self,
        storage: &str,
        width: i64,
        height: i64,
        algorithm: Option<&AlgorithmValue>,
    ) -> Option<bool> {
        self.get(storage)
            .map(|v| v.validate(width, height, algorithm))
    }
}

fn build_validator(
    policy: AlgorithmPolicy,
    rules: &[RuleSpec],
) -> Result<Arc<RuleValidator>, ValidatorError> {
    let mut validator = RuleValidator::with_policy(policy);
    for rule in rules {
        validator.add_rule(rule.width, rule.height, rule.algorithm.clone())?;
    }
    Ok(validator.into_shared())
}
