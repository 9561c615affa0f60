//! SmiMgr - runs one reconcile / supervise / verify pass.

use std::collections::HashMap;

use smi_cfgmgr_common::{Host, SmiError, SmiResult};
use tracing::{error, info, warn};

use crate::config::SmiConfig;
use crate::inventory::Inventory;
use crate::operator::Operator;
use crate::outcome::{Finding, Findings, Severity};
use crate::reconcile::{DeleteMode, ReconcileReport, Reconciler, ResolvedEndpoint};
use crate::runlog::RunLog;
use crate::status::{collect_status, render_status_table, StatusRow};
use crate::supervisor::{DaemonStatus, Supervisor};
use crate::target::resolve_desired;
use crate::verify::{PortPolicy, PortVerifier, Verdict, Verification};

/// What a run should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub delete_mode: DeleteMode,
    /// Only print the status table; no phase runs.
    pub status_only: bool,
    pub supervise: bool,
    pub policy: PortPolicy,
}

/// Daemon state of one endpoint after supervision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDaemon {
    pub device: String,
    pub guid: String,
    pub status: DaemonStatus,
}

/// Everything a run observed and did.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub status: Vec<StatusRow>,
    pub report: Option<ReconcileReport>,
    pub daemons: Vec<EndpointDaemon>,
    pub verifications: Vec<Verification>,
    pub findings: Findings,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        !self.findings.has_failures()
    }

    /// Process exit status: 0 when no failure finding was recorded.
    pub fn exit_code(&self) -> u8 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

/// SMI fabric manager.
///
/// Converges SMI endpoint devices to one per qualifying adapter, keeps one
/// subnet manager daemon per endpoint GUID and checks port link state.
/// Endpoints are handled one after another; fatal conditions come back as
/// `Err`, everything else is collected in [`RunOutcome::findings`].
pub struct SmiMgr<'a> {
    host: &'a dyn Host,
    config: &'a SmiConfig,
    operator: &'a dyn Operator,
    run_log: &'a RunLog,
}

impl<'a> SmiMgr<'a> {
    pub fn new(
        host: &'a dyn Host,
        config: &'a SmiConfig,
        operator: &'a dyn Operator,
        run_log: &'a RunLog,
    ) -> Self {
        Self {
            host,
            config,
            operator,
            run_log,
        }
    }

    pub async fn run(&self, options: RunOptions) -> SmiResult<RunOutcome> {
        info!(
            dry_run = options.dry_run,
            delete_mode = ?options.delete_mode,
            supervise = options.supervise,
            policy = ?options.policy,
            "Starting SMI reconciliation run"
        );

        self.check_tools(options.supervise).await?;

        let mut outcome = RunOutcome::default();
        if options.status_only {
            outcome.status = collect_status(self.host, self.config).await?;
            self.operator.notify(&render_status_table(&outcome.status));
            return Ok(outcome);
        }

        let inventory = Inventory::new(self.host, self.config);
        let adapters = inventory.list_qualifying_adapters().await?;
        let desired = resolve_desired(
            &adapters,
            &self.config.naming,
            &self.config.inventory.adapter_model,
        )?;
        info!(
            adapters = adapters.len(),
            desired = ?desired.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "Resolved desired SMI devices"
        );

        let report = Reconciler::new(self.host, self.config, self.operator, options.dry_run)
            .reconcile(&desired, options.delete_mode)
            .await?;
        outcome.findings.extend(report.findings.clone());

        if options.supervise {
            self.supervise(&report.endpoints, options.dry_run, &mut outcome)
                .await?;
        }
        self.verify_ports(&report.endpoints, options.policy, &mut outcome)
            .await?;

        outcome.report = Some(report);
        log_summary(&outcome);
        Ok(outcome)
    }

    async fn check_tools(&self, supervise: bool) -> SmiResult<()> {
        for program in self.config.commands.required_programs(supervise) {
            if !self.host.tool_available(program).await? {
                error!(tool = %program, "Required tool not found");
                return Err(SmiError::tool_unavailable(program));
            }
        }
        Ok(())
    }

    async fn supervise(
        &self,
        endpoints: &[ResolvedEndpoint],
        dry_run: bool,
        outcome: &mut RunOutcome,
    ) -> SmiResult<()> {
        let inventory = Inventory::new(self.host, self.config);
        let supervisor = Supervisor::new(self.host, self.config, self.run_log, dry_run);
        let mut owners: HashMap<String, String> = HashMap::new();

        for endpoint in endpoints {
            let name = endpoint.device.name.as_str();
            if endpoint.simulated {
                outcome.findings.warn(Finding::SimulatedOnly {
                    device: name.to_string(),
                    phase: "daemon supervision".to_string(),
                });
                continue;
            }

            let Some(identity) = inventory.resolve_identity(name).await? else {
                let finding = Finding::IdentityUnresolved {
                    device: name.to_string(),
                };
                error!("{}", finding);
                outcome.findings.fail(finding);
                continue;
            };

            if let Some(first) = owners.get(&identity.guid) {
                let finding = Finding::DuplicateIdentity {
                    device: name.to_string(),
                    guid: identity.guid.clone(),
                    first: first.clone(),
                };
                error!("{}", finding);
                outcome.findings.fail(finding);
                continue;
            }
            owners.insert(identity.guid.clone(), name.to_string());

            let status = supervisor.ensure_daemon(&identity).await?;
            if let DaemonStatus::Failed { reason } = &status {
                let finding = Finding::DaemonStartFailed {
                    device: name.to_string(),
                    guid: identity.guid.clone(),
                    reason: reason.clone(),
                };
                error!("{}", finding);
                outcome.findings.fail(finding);
            }
            outcome.daemons.push(EndpointDaemon {
                device: name.to_string(),
                guid: identity.guid,
                status,
            });
        }
        Ok(())
    }

    async fn verify_ports(
        &self,
        endpoints: &[ResolvedEndpoint],
        policy: PortPolicy,
        outcome: &mut RunOutcome,
    ) -> SmiResult<()> {
        let verifier = PortVerifier::new(self.host, self.config);
        for endpoint in endpoints {
            let name = endpoint.device.name.as_str();
            if endpoint.simulated {
                outcome.findings.warn(Finding::SimulatedOnly {
                    device: name.to_string(),
                    phase: "port verification".to_string(),
                });
                continue;
            }
            let verification = verifier.verify(name, policy).await?;
            outcome.findings.extend(verification.findings());
            outcome.verifications.push(verification);
        }
        Ok(())
    }
}

fn log_summary(outcome: &RunOutcome) {
    if let Some(report) = &outcome.report {
        info!(
            endpoints = report.endpoints.len(),
            created = report.created.len(),
            deleted = report.deleted.len(),
            planned = report.plan.len(),
            "Reconciliation summary"
        );
    }

    if !outcome.daemons.is_empty() {
        let count = |pred: fn(&DaemonStatus) -> bool| {
            outcome.daemons.iter().filter(|d| pred(&d.status)).count()
        };
        info!(
            running = count(|s| matches!(s, DaemonStatus::Running { .. })),
            started = count(|s| matches!(s, DaemonStatus::Started(_))),
            would_start = count(|s| matches!(s, DaemonStatus::WouldStart)),
            failed = count(DaemonStatus::is_failed),
            "Supervision summary"
        );
    }

    for verification in &outcome.verifications {
        let verdict = verification.verdict();
        match verdict {
            Verdict::Pass => info!(device = %verification.device, ?verdict, "Port verification"),
            _ => warn!(device = %verification.device, ?verdict, "Port verification"),
        }
    }

    for (severity, finding) in outcome.findings.iter() {
        match severity {
            Severity::Warning => warn!("{}", finding),
            Severity::Failure => error!("{}", finding),
        }
    }

    if outcome.succeeded() {
        info!("Run succeeded");
    } else {
        error!(
            failures = outcome.findings.failures().count(),
            "Run finished with failures"
        );
    }
}
