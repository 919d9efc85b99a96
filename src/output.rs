//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Rules
//!
//! ```text
//! Policy: exact
//!
//! default (2 rules)
//!     001 800x600 fit
//!     002 64x64
//! avatars (no rules, all variants allowed)
//! banners → default
//! ```
//!
//! ## Check
//!
//! ```text
//! avatars: 64x64 crop allowed
//! ```
//!
//! ## Audit
//!
//! ```text
//! Denied
//!     line 2: 800x600 crop
//!     line 4: 65x64
//!
//! 2 allowed, 2 denied (4 total)
//! ```

use crate::audit::AuditReport;
use crate::config::DEFAULT_STORAGE;
use crate::registry::ValidatorRegistry;
use crate::request::VariantRequest;
use std::sync::Arc;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn rule_count(n: usize) -> String {
    match n {
        0 => "no rules, all variants allowed".to_string(),
        1 => "1 rule".to_string(),
        n => format!("{n} rules"),
    }
}

/// Format every storage's rules. Storages sharing the default validator are
/// shown as a reference instead of repeating its rules.
pub fn format_rules(registry: &ValidatorRegistry) -> Vec<String> {
    let default = registry.default_validator();
    let mut lines = vec![format!("Policy: {}", default.policy()), String::new()];

    for name in registry.storages() {
        let Some(validator) = registry.get(name) else {
            continue;
        };
        if name != DEFAULT_STORAGE && Arc::ptr_eq(validator, default) {
            lines.push(format!("{name} → {DEFAULT_STORAGE}"));
            continue;
        }
        lines.push(format!("{} ({})", name, rule_count(validator.len())));
        for (i, rule) in validator.rules().iter().enumerate() {
            lines.push(format!("    {} {}", format_index(i + 1), rule));
        }
    }
    lines
}

pub fn print_rules(registry: &ValidatorRegistry) {
    for line in format_rules(registry) {
        println!("{}", line);
    }
}

pub fn format_check(storage: &str, request: &VariantRequest, permitted: bool) -> String {
    let verdict = if permitted { "allowed" } else { "denied" };
    format!("{storage}: {request} {verdict}")
}

pub fn print_check(storage: &str, request: &VariantRequest, permitted: bool) {
    println!("{}", format_check(storage, request, permitted));
}

/// Format an audit report. `line_numbers[i]` is the 1-based source line of
/// the i-th request.
pub fn format_audit(report: &AuditReport, line_numbers: &[usize]) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.denied.is_empty() {
        lines.push("Denied".to_string());
        for (i, request) in &report.denied {
            let line = line_numbers.get(*i).copied().unwrap_or(i + 1);
            lines.push(format!("    line {line}: {request}"));
        }
        lines.push(String::new());
    }
    lines.push(report.to_string());
    lines
}

pub fn print_audit(report: &AuditReport, line_numbers: &[usize]) {
    for line in format_audit(report, line_numbers) {
        println!("{}", line);
    }
}
