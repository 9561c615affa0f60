//! Port link verification.

use smi_cfgmgr_common::{Host, SmiResult};
use tracing::{info, instrument, warn};

use crate::config::SmiConfig;
use crate::inventory::Inventory;
use crate::outcome::{Finding, Findings, Severity};
use crate::types::PortStatus;

/// How a non-Active port affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortPolicy {
    /// Non-Active ports fail the run.
    #[default]
    Strict,
    /// Non-Active ports only warn.
    Lenient,
}

/// Per-device classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

/// Observed ports of one device and their classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub device: String,
    /// False when any port is not Active, and when no port was reported.
    pub all_active: bool,
    pub per_port: Vec<PortStatus>,
    pub policy: PortPolicy,
}

impl Verification {
    pub fn new(device: impl Into<String>, per_port: Vec<PortStatus>, policy: PortPolicy) -> Self {
        let all_active = !per_port.is_empty() && per_port.iter().all(|p| p.link_state.is_active());
        Self {
            device: device.into(),
            all_active,
            per_port,
            policy,
        }
    }

    /// A device without ports fails under either policy.
    pub fn verdict(&self) -> Verdict {
        if self.per_port.is_empty() {
            Verdict::Fail
        } else if self.all_active {
            Verdict::Pass
        } else {
            match self.policy {
                PortPolicy::Strict => Verdict::Fail,
                PortPolicy::Lenient => Verdict::Warn,
            }
        }
    }

    pub fn findings(&self) -> Findings {
        let mut findings = Findings::new();
        if self.per_port.is_empty() {
            findings.fail(Finding::NoPortsReported {
                device: self.device.clone(),
            });
            return findings;
        }

        let severity = match self.policy {
            PortPolicy::Strict => Severity::Failure,
            PortPolicy::Lenient => Severity::Warning,
        };
        for port in self.per_port.iter().filter(|p| !p.link_state.is_active()) {
            findings.record(
                severity,
                Finding::PortNotActive {
                    device: self.device.clone(),
                    port: port.port_number,
                    state: port.link_state.to_string(),
                },
            );
        }
        findings
    }
}

pub struct PortVerifier<'a> {
    host: &'a dyn Host,
    config: &'a SmiConfig,
}

impl<'a> PortVerifier<'a> {
    pub fn new(host: &'a dyn Host, config: &'a SmiConfig) -> Self {
        Self { host, config }
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, device: &str, policy: PortPolicy) -> SmiResult<Verification> {
        let ports = Inventory::new(self.host, self.config)
            .list_ports(device)
            .await?;
        for port in &ports {
            info!(port = port.port_number, state = %port.link_state, "Port state");
        }

        let verification = Verification::new(device, ports, policy);
        match verification.verdict() {
            Verdict::Pass => info!("All ports Active"),
            Verdict::Warn => warn!("Not all ports Active (lenient)"),
            Verdict::Fail if verification.per_port.is_empty() => warn!("No ports reported"),
            Verdict::Fail => warn!("Not all ports Active"),
        }
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkState;
    use smi_cfgmgr_test::{commands, port_report, MockHost};

    fn ports(states: &[LinkState]) -> Vec<PortStatus> {
        states
            .iter()
            .enumerate()
            .map(|(i, s)| PortStatus {
                device_name: "endpoint0".to_string(),
                port_number: i as u32 + 1,
                link_state: *s,
            })
            .collect()
    }

    #[test]
    fn test_mixed_ports_strict_vs_lenient() {
        let observed = ports(&[LinkState::Active, LinkState::Down]);

        let strict = Verification::new("endpoint0", observed.clone(), PortPolicy::Strict);
        assert!(!strict.all_active);
        assert_eq!(strict.verdict(), Verdict::Fail);
        assert!(strict.findings().has_failures());

        let lenient = Verification::new("endpoint0", observed, PortPolicy::Lenient);
        assert_eq!(lenient.verdict(), Verdict::Warn);
        assert!(!lenient.findings().has_failures());
        assert_eq!(lenient.findings().warnings().count(), 1);
    }

    #[test]
    fn test_zero_ports_fail_under_both_policies() {
        for policy in [PortPolicy::Strict, PortPolicy::Lenient] {
            let verification = Verification::new("endpoint0", Vec::new(), policy);
            assert!(!verification.all_active);
            assert_eq!(verification.verdict(), Verdict::Fail);
            assert!(verification.findings().has_failures());
        }
    }

    #[test]
    fn test_all_active_passes() {
        let verification = Verification::new(
            "endpoint0",
            ports(&[LinkState::Active, LinkState::Active]),
            PortPolicy::Strict,
        );
        assert_eq!(verification.verdict(), Verdict::Pass);
        assert!(verification.findings().is_empty());
    }

    #[tokio::test]
    async fn test_verify_queries_host() {
        let config = SmiConfig::default();
        let host = MockHost::new().respond(
            commands::query_ports("endpoint0"),
            port_report(
                "endpoint0",
                &[(1, "Active", "0x9c63c00300a1b2c3"), (2, "Initializing", "0x9c63c00300a1b2c4")],
            ),
        );
        let verification = PortVerifier::new(&host, &config)
            .verify("endpoint0", PortPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(verification.per_port.len(), 2);
        assert_eq!(verification.per_port[1].link_state, LinkState::Unknown);
        assert_eq!(verification.verdict(), Verdict::Fail);
    }
}
