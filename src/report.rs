//! Structured validation reporting
//!
//! `prerequisite` and `space` validate combinatorial invariants (quasi-order
//! laws, the knowledge-space axioms, accessibility) that can fail in more
//! than one way at once. Rather than stopping at the first violation, the
//! validators in those modules collect every [`Check`] they perform — passed
//! or not — into a [`Report`], so a caller sees every violated invariant in
//! one pass instead of fixing them one at a time. A report never mutates the
//! value it was built from.

use std::fmt;

/// A single named assertion performed by a validator.
///
/// `reference` points at the axiom or clause name the check enforces
/// (e.g. `"S3"`, `"accessibility"`), so a failing report can be read without
/// cross-referencing source line numbers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Check {
    /// Short, stable name for the check (e.g. `"S3 union closure"`).
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Human-readable detail: empty on success, a witness/counterexample
    /// description on failure.
    pub message: String,
    /// The axiom or clause this check enforces.
    pub reference: String,
}

impl Check {
    /// A passing check with no message.
    pub fn pass(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Check {
            name: name.into(),
            passed: true,
            message: String::new(),
            reference: reference.into(),
        }
    }

    /// A failing check carrying a diagnostic message.
    pub fn fail(
        name: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Check {
            name: name.into(),
            passed: false,
            message: message.into(),
            reference: reference.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "[pass] {} ({})", self.name, self.reference)
        } else {
            write!(
                f,
                "[fail] {} ({}): {}",
                self.name, self.reference, self.message
            )
        }
    }
}

/// An aggregate of [`Check`]s produced by a single validation pass.
///
/// `is_valid` is the conjunction of every check in the report; a report is
/// built once and never mutated by the code that later reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Report {
    checks: Vec<Check>,
}

impl Report {
    /// An empty report (vacuously valid until checks are pushed).
    pub fn new() -> Self {
        Report::default()
    }

    /// Appends a check to the report.
    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// All checks performed, in the order they were run.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// The checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Whether every check in the report passed. An empty report is valid.
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Merges another report's checks into this one, preserving order.
    pub fn extend(&mut self, other: Report) {
        self.checks.extend(other.checks);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            writeln!(f, "{check}")?;
        }
        write!(
            f,
            "-- {}/{} checks passed",
            self.checks.iter().filter(|c| c.passed).count(),
            self.checks.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_valid() {
        let report = Report::new();
        assert!(report.is_valid());
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn one_failure_makes_report_invalid() {
        let mut report = Report::new();
        report.push(Check::pass("domain non-empty", "S1"));
        report.push(Check::fail("union closure", "S3", "missing union of K1, K2"));
        assert!(!report.is_valid());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.checks().len(), 2);
    }

    #[test]
    fn extend_preserves_order_and_validity() {
        let mut a = Report::new();
        a.push(Check::pass("s1", "S1"));
        let mut b = Report::new();
        b.push(Check::fail("s2", "S2", "Q not in family"));
        a.extend(b);
        assert_eq!(a.checks().len(), 2);
        assert!(!a.is_valid());
        assert_eq!(a.checks()[0].name, "s1");
        assert_eq!(a.checks()[1].name, "s2");
    }

    #[test]
    fn display_renders_checks_and_summary() {
        let mut report = Report::new();
        report.push(Check::pass("s1", "S1"));
        let rendered = format!("{report}");
        assert!(rendered.contains("[pass] s1"));
        assert!(rendered.contains("1/1 checks passed"));
    }
}
