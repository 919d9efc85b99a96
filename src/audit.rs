//! Batch checking of variant requests.
//!
//! Replays a list of requested variants (for example sizes pulled from an
//! access log) against a validator to see which a rule change would deny.
//! Requests are checked in parallel using [rayon](https://docs.rs/rayon);
//! every worker reads the same validator without locking.

use crate::request::VariantRequest;
use crate::rules::RuleValidator;
use rayon::prelude::*;
use std::fmt;

/// Outcome of an audit run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub allowed: usize,
    /// Denied requests with their 0-based position in the input, in input order.
    pub denied: Vec<(usize, VariantRequest)>,
}

impl AuditReport {
    pub fn total(&self) -> usize {
        self.allowed + self.denied.len()
    }

    pub fn all_allowed(&self) -> bool {
        self.denied.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} allowed, {} denied ({} total)",
            self.allowed,
            self.denied.len(),
            self.total()
        )
    }
}

pub fn audit(validator: &RuleValidator, requests: &[VariantRequest]) -> AuditReport {
    let verdicts: Vec<bool> = requests
        .par_iter()
        .map(|r| r.is_permitted(validator))
        .collect();

    let mut report = AuditReport::default();
    for (i, (request, permitted)) in requests.iter().zip(verdicts).enumerate() {
        if permitted {
            report.allowed += 1;
        } else {
            report.denied.push((i, request.clone()));
        }
    }
    log::debug!("Audit: {report}");
    report
}
