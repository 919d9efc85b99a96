//! # Image Rules
//!
//! Decides whether a requested image variant may be served. An image server
//! that resizes on the fly takes width, height and an optional resize
//! algorithm straight from the URL; without a whitelist anyone can ask for
//! any size and make the server render it. This crate holds that whitelist.
//!
//! ```text
//! images.toml ──load──▶ RulesConfig ──build──▶ ValidatorRegistry
//!                                                 │  (one sealed validator
//!                                                 │   per storage backend)
//! /images/800x600/fit/photo.jpg                   ▼
//!        └─ VariantRequest ────────────────▶ validate() → bool
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`rules`] | [`RuleValidator`](rules::RuleValidator): the rule list and the allow/deny query |
//! | [`coerce`] | Named conversions between integer, text and absent algorithm values |
//! | [`config`] | `images.toml` loading, layering, and validation |
//! | [`registry`] | One shared validator per storage backend |
//! | [`request`] | Parses `WIDTHxHEIGHT` and algorithm URL segments |
//! | [`audit`] | Parallel batch checking of many requests |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No Rules Means No Restriction
//!
//! A storage with no rules serves every variant. The first rule switches it
//! to deny-unless-matched. Existing installs keep working until someone
//! writes a whitelist.
//!
//! ## Seal Before Serving
//!
//! Rules are only added at startup. Validators are sealed before they are
//! shared, so every request handler sees the same immutable list and reads
//! need no lock.
//!
//! ## Exact Algorithm Matching by Default
//!
//! Historically the requested algorithm was coerced to an integer and
//! compared by identity with the stored string, which never matches. That
//! behavior is available as
//! [`AlgorithmPolicy::LegacyInteger`](rules::AlgorithmPolicy::LegacyInteger);
//! the default compares algorithm names as strings.
//!
//! ## Lenient Requests, Strict Config
//!
//! Request parsing never fails: a malformed size reads as its leading
//! integer and is then simply denied by the rules. Configuration is
//! checked up front, and negative sizes or reserved storage names are
//! errors at load time.

pub mod audit;
pub mod coerce;
pub mod config;
pub mod output;
pub mod registry;
pub mod request;
pub mod rules;

#[cfg(test)]
pub(crate) mod test_helpers;
