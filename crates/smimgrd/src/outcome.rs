//! Per-device findings and the aggregate run outcome.
//!
//! Per-device and per-identity problems never stop a run. They are
//! collected here and only decide the final exit status.

use std::fmt;

use thiserror::Error;

/// Whether a finding fails the run or only warns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Failure => f.write_str("failure"),
        }
    }
}

/// A non-fatal condition observed while processing one device or identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Finding {
    #[error("{device}: parent adapter {parent} is no longer visible, not created")]
    ParentVisibilityLost { device: String, parent: String },

    #[error("{device}: port GUID could not be resolved")]
    IdentityUnresolved { device: String },

    #[error("{device}: GUID {guid} is already used by {first}, not supervised")]
    DuplicateIdentity {
        device: String,
        guid: String,
        first: String,
    },

    #[error("{device}: daemon for {guid} failed to start: {reason}")]
    DaemonStartFailed {
        device: String,
        guid: String,
        reason: String,
    },

    #[error("{device}: port {port} is {state}, expected Active")]
    PortNotActive {
        device: String,
        port: u32,
        state: String,
    },

    #[error("{device}: no ports reported")]
    NoPortsReported { device: String },

    #[error("{message}")]
    InvalidSelectionToken { message: String },

    #[error("{device}: creation failed: {output}")]
    CreationFailed { device: String, output: String },

    #[error("{device}: deletion failed: {output}")]
    DeletionFailed { device: String, output: String },

    #[error("{device}: {phase} skipped, device only exists in the simulated plan")]
    SimulatedOnly { device: String, phase: String },
}

/// Collected findings of a run, in the order they were observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    entries: Vec<(Severity, Finding)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, finding: Finding) {
        self.entries.push((Severity::Warning, finding));
    }

    pub fn fail(&mut self, finding: Finding) {
        self.entries.push((Severity::Failure, finding));
    }

    pub fn record(&mut self, severity: Severity, finding: Finding) {
        self.entries.push((severity, finding));
    }

    /// Appends every finding of `other`.
    pub fn extend(&mut self, other: Findings) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Severity, Finding)> {
        self.entries.iter()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.of(Severity::Failure)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.of(Severity::Warning)
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.entries
            .iter()
            .filter(move |(s, _)| *s == severity)
            .map(|(_, f)| f)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_and_warnings_are_separated() {
        let mut findings = Findings::new();
        findings.warn(Finding::InvalidSelectionToken {
            message: "Ignoring selection '9'".to_string(),
        });
        assert!(!findings.has_failures());

        findings.fail(Finding::NoPortsReported {
            device: "endpoint0".to_string(),
        });
        assert!(findings.has_failures());
        assert_eq!(findings.failures().count(), 1);
        assert_eq!(findings.warnings().count(), 1);
        assert_eq!(findings.iter().count(), 2);
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding::PortNotActive {
            device: "endpoint1".to_string(),
            port: 2,
            state: "Down".to_string(),
        };
        assert_eq!(finding.to_string(), "endpoint1: port 2 is Down, expected Active");
    }
}
