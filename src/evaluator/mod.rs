//! Threshold evaluation.
//!
//! Two strategies produce the same [`Violation`] records:
//!
//! - [`evaluate_flat`] queries LowerLimit and UpperLimit trait attributes
//!   directly and compares each against its parent's reading.
//! - [`evaluate_template`] queries measured attributes of one template and
//!   resolves each reading's own limits from its direct children.
//!
//! Both issue a fixed number of store calls regardless of population size.
//! Comparisons are strict: a reading equal to its limit is not a violation.

mod flat;
mod template;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::AttributeId;

pub use flat::evaluate_flat;
pub use template::{evaluate_configured, evaluate_template};

/// Which side of the band a reading fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Reading greater than the upper limit.
    Above,
    /// Reading less than the lower limit.
    Below,
}

impl ViolationKind {
    /// Returns true if `observed` violates `limit` on this side.
    #[must_use]
    pub fn is_violated(self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Above => observed > limit,
            Self::Below => observed < limit,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "Above"),
            Self::Below => write!(f, "Below"),
        }
    }
}

/// One out-of-range reading.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub subject_name: String,
    /// The measured attribute whose reading violated the limit.
    pub attribute: AttributeId,
    pub kind: ViolationKind,
    pub observed: f64,
    pub limit: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.kind {
            ViolationKind::Above => '>',
            ViolationKind::Below => '<',
        };
        write!(
            f,
            "{}: {} ({} {op} {})",
            self.subject_name, self.kind, self.observed, self.limit
        )
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub violations: Vec<Violation>,
    /// Readings compared against at least one limit.
    pub evaluated: usize,
    /// Readings skipped: no numeric value, or no parent to compare.
    pub skipped: usize,
}

impl ViolationReport {
    #[must_use]
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub(crate) fn merge(&mut self, other: Self) {
        self.violations.extend(other.violations);
        self.evaluated += other.evaluated;
        self.skipped += other.skipped;
    }
}
