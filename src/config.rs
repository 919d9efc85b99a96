//! Rule configuration module.
//!
//! Handles loading, validating, and merging `images.toml` files. Stock
//! defaults (no rules, exact algorithm matching) are overridden by each
//! config file in turn, so a shared file can be refined by a local one:
//!
//! ```text
//! images.toml         ← shared rules (overrides stock defaults)
//! images.local.toml   ← per-host override (overrides images.toml)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [validator]
//! algorithm_policy = "exact"   # or "legacy-integer"
//!
//! # Rules of the default validator. No rules = every variant allowed.
//! [[rules]]
//! width = 800
//! height = 600
//! algorithm = "fit"            # optional; text or integer
//!
//! # One validator per storage backend.
//! [storage.avatars]
//! rules = [{ width = 64, height = 64, algorithm = "crop" }]
//!
//! [processing]
//! max_processes = 4            # Audit workers (omit for auto = CPU cores)
//! ```
//!
//! ## Storage Sections
//!
//! A storage without a `rules` key shares the default validator. A storage
//! with `rules = []` gets its own empty validator, which allows everything.
//!
//! ## Merging
//!
//! Tables merge key by key. Arrays (including `rules`) are replaced whole by
//! the later file, never concatenated.
//!
//! Unknown keys are rejected to catch typos early.

use crate::coerce::AlgorithmValue;
use crate::rules::{AlgorithmPolicy, ValidatorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage name of the validator built from top-level `rules`.
pub const DEFAULT_STORAGE: &str = "default";

/// Config file read when no path is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "images.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Rule registration error: {0}")]
    Rules(#[from] ValidatorError),
}

/// Rule configuration loaded from `images.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Validator behavior shared by every storage.
    pub validator: ValidatorConfig,
    /// Rules of the default validator, in registration order.
    pub rules: Vec<RuleSpec>,
    /// Per-storage-backend rule sets, keyed by storage name.
    pub storage: BTreeMap<String, StorageConfig>,
    /// Parallel audit settings.
    pub processing: ProcessingConfig,
}

impl RulesConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rules("rules", &self.rules)?;
        for (name, storage) in &self.storage {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "storage names must not be empty".into(),
                ));
            }
            if name == DEFAULT_STORAGE {
                return Err(ConfigError::Validation(format!(
                    "storage name '{DEFAULT_STORAGE}' is reserved for top-level rules"
                )));
            }
            if let Some(rules) = &storage.rules {
                validate_rules(&format!("storage.{name}.rules"), rules)?;
            }
        }
        Ok(())
    }
}

fn validate_rules(section: &str, rules: &[RuleSpec]) -> Result<(), ConfigError> {
    for (i, rule) in rules.iter().enumerate() {
        if rule.width < 0 || rule.height < 0 {
            return Err(ConfigError::Validation(format!(
                "{section}[{i}]: width and height must be non-negative (got {}x{})",
                rule.width, rule.height
            )));
        }
    }
    Ok(())
}

/// Validator behavior settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// How requested algorithms are compared with rule algorithms.
    pub algorithm_policy: AlgorithmPolicy,
}

/// One `[[rules]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub width: i64,
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<AlgorithmValue>,
}

/// A `[storage.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// `None` shares the default validator; `Some` builds a separate one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleSpec>>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel audit workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RulesConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        log::debug!("No config at {}", path.display());
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    log::debug!("Loaded config layer {}", path.display());
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RulesConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RulesConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a single config file on top of stock defaults.
///
/// A missing file yields the stock defaults. Use this only for the implicit
/// [`DEFAULT_CONFIG_FILE`]; paths a user named go through [`load_layered`].
pub fn load_config(path: &Path) -> Result<RulesConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Load several config files in order, each overriding the previous.
///
/// Every path must exist; a missing file is [`ConfigError::NotFound`].
/// An empty list yields the stock default (no rules).
pub fn load_layered(paths: &[PathBuf]) -> Result<RulesConfig, ConfigError> {
    let mut merged: Option<toml::Value> = None;
    for path in paths {
        let layer = load_raw_config(path)?.ok_or_else(|| ConfigError::NotFound(path.clone()))?;
        merged = Some(match merged {
            Some(acc) => merge_toml(acc, layer),
            None => layer,
        });
    }
    resolve_config(stock_defaults_value()?, merged)
}

/// Returns a fully-commented stock `images.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Rules Configuration
# =========================
# All settings are optional. Values shown below are the defaults.
#
# With no rules, every requested size and algorithm is allowed.
# Once a rule exists, only variants matching some rule are allowed.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Validator
# ---------------------------------------------------------------------------
[validator]
# How a requested algorithm is compared with a rule's algorithm:
#   "exact"          - compare the names as strings
#   "legacy-integer" - historical behavior: any requested algorithm is denied
algorithm_policy = "exact"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `audit`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Rules for the default storage
# ---------------------------------------------------------------------------
# [[rules]]
# width = 800
# height = 600
# algorithm = "fit"      # optional

# ---------------------------------------------------------------------------
# Per-storage rules
# ---------------------------------------------------------------------------
# Omit `rules` to share the default storage's rules.
# [storage.avatars]
# rules = [
#     { width = 64, height = 64, algorithm = "crop" },
#     { width = 128, height = 128 },
# ]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_config;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_no_rules() {
        let config = RulesConfig::default();
        assert!(config.rules.is_empty());
        assert!(config.storage.is_empty());
        assert_eq!(config.validator.algorithm_policy, AlgorithmPolicy::Exact);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_rules_with_and_without_algorithm() {
        let toml = r#"
[[rules]]
width = 800
height = 600
algorithm = "fit"

[[rules]]
width = 64
height = 64

[[rules]]
width = 32
height = 32
algorithm = 2
"#;
        let config: RulesConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].algorithm, Some(AlgorithmValue::Text("fit".into())));
        assert_eq!(config.rules[1].algorithm, None);
        assert_eq!(config.rules[2].algorithm, Some(AlgorithmValue::Int(2)));
    }

    #[test]
    fn parse_storage_sections() {
        let toml = r#"
[storage.avatars]
rules = [{ width = 64, height = 64, algorithm = "crop" }]

[storage.banners]
"#;
        let config: RulesConfig = toml::from_str(toml).unwrap();
        let avatars = config.storage["avatars"].rules.as_ref().unwrap();
        assert_eq!(avatars[0].width, 64);
        assert_eq!(config.storage["banners"].rules, None);
    }

    #[test]
    fn parse_policy() {
        let config: RulesConfig =
            toml::from_str("[validator]\nalgorithm_policy = \"legacy-integer\"\n").unwrap();
        assert_eq!(config.validator.algorithm_policy, AlgorithmPolicy::LegacyInteger);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("images.toml")).unwrap();
        assert_eq!(config, RulesConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let (_tmp, path) = write_config(
            r#"
[[rules]]
width = 300
height = 200
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].width, 300);
        // Unspecified values should be defaults
        assert_eq!(config.validator.algorithm_policy, AlgorithmPolicy::Exact);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let (_tmp, path) = write_config("this is not valid toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_negative_dimensions() {
        let (_tmp, path) = write_config("[[rules]]\nwidth = -1\nheight = 10\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("rules[0]"));
    }

    #[test]
    fn load_config_rejects_negative_storage_dimensions() {
        let (_tmp, path) =
            write_config("[storage.thumbs]\nrules = [{ width = 1, height = -1 }]\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("storage.thumbs.rules[0]"));
    }

    #[test]
    fn load_config_rejects_reserved_storage_name() {
        let (_tmp, path) = write_config("[storage.default]\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let (_tmp, path) = write_config("[[rules]]\nwidth = 1\nheight = 1\nalgo = \"fit\"\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<RulesConfig, _> = toml::from_str("[routes]\nmask = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn float_dimension_rejected() {
        let result: Result<RulesConfig, _> =
            toml::from_str("[[rules]]\nwidth = 1.5\nheight = 1\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge / layering tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_replaces_arrays() {
        let base: toml::Value =
            toml::from_str("[[rules]]\nwidth = 1\nheight = 1\n[[rules]]\nwidth = 2\nheight = 2\n")
                .unwrap();
        let overlay: toml::Value = toml::from_str("[[rules]]\nwidth = 9\nheight = 9\n").unwrap();
        let merged = merge_toml(base, overlay);
        let rules = merged["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["width"].as_integer(), Some(9));
    }

    #[test]
    fn merge_toml_merges_storage_tables() {
        let base: toml::Value = toml::from_str("[storage.a]\n[storage.b]\n").unwrap();
        let overlay: toml::Value =
            toml::from_str("[storage.b]\nrules = [{ width = 5, height = 5 }]\n").unwrap();
        let merged = merge_toml(base, overlay);
        let storage = merged["storage"].as_table().unwrap();
        assert!(storage.contains_key("a"));
        assert!(storage["b"].get("rules").is_some());
    }

    #[test]
    fn load_layered_later_files_override() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("images.toml");
        let local = tmp.path().join("images.local.toml");
        fs::write(
            &shared,
            "[validator]\nalgorithm_policy = \"legacy-integer\"\n[[rules]]\nwidth = 1\nheight = 1\n",
        )
        .unwrap();
        fs::write(&local, "[validator]\nalgorithm_policy = \"exact\"\n").unwrap();

        let config = load_layered(&[shared, local]).unwrap();
        assert_eq!(config.validator.algorithm_policy, AlgorithmPolicy::Exact);
        // Rules from the shared file survive
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn load_layered_missing_file_is_error() {
        let (tmp, path) = write_config("[[rules]]\nwidth = 4\nheight = 3\n");
        let missing = tmp.path().join("typo-images.toml");
        let err = load_layered(&[path, missing.clone()]).unwrap_err();
        assert!(matches!(&err, ConfigError::NotFound(p) if *p == missing));
        assert!(err.to_string().contains("typo-images.toml"));
    }

    #[test]
    fn load_layered_single_missing_file_is_error() {
        let missing = PathBuf::from("/nonexistent/typo-images.toml");
        assert!(matches!(
            load_layered(&[missing]),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn load_layered_with_no_files_is_default() {
        assert_eq!(load_layered(&[]).unwrap(), RulesConfig::default());
    }

    #[test]
    fn load_layered_validates_merged_result() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.toml");
        let b = tmp.path().join("b.toml");
        fs::write(&a, "[[rules]]\nwidth = 1\nheight = 1\n").unwrap();
        fs::write(&b, "[[rules]]\nwidth = -1\nheight = 1\n").unwrap();
        assert!(matches!(
            load_layered(&[a, b]),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: RulesConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, RulesConfig::default());
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let value = stock_defaults_value().unwrap();
        assert!(value.is_table());
        assert!(value.get("validator").is_some());
    }

    // =========================================================================
    // processing tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_never_zero() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
