//! Lifecycle reconciliation of SMI endpoint devices.
//!
//! A run goes through discover, optional delete, then create, strictly in
//! that order. Creation is skipped for devices that already exist, so a
//! repeated run over unchanged hardware issues no mutating command. In
//! dry-run mode every mutation is logged and skipped but still counted in
//! the plan and in the final endpoint set.

use smi_cfgmgr_common::{Host, SmiError, SmiResult};
use tracing::{error, info, instrument, warn};

use crate::config::{CommandConfig, SmiConfig};
use crate::inventory::Inventory;
use crate::operator::Operator;
use crate::outcome::{Finding, Findings};
use crate::selection::parse_selection;
use crate::types::LogicalEndpointDevice;

/// Which existing devices to delete before creating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Keep everything.
    #[default]
    None,
    /// Delete every existing device after confirmation.
    All,
    /// Delete the devices the operator picks from a numbered list.
    Select,
}

/// A mutating command the reconciler ran or would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Delete { name: String },
    Create { name: String, parent: String },
}

impl PlannedAction {
    /// The command line for this action.
    pub fn command(&self, commands: &CommandConfig) -> String {
        match self {
            PlannedAction::Delete { name } => commands.delete_endpoint(name),
            PlannedAction::Create { name, parent } => commands.create_endpoint(name, parent),
        }
    }
}

/// A member of the final endpoint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub device: LogicalEndpointDevice,
    /// Only created in the dry-run plan; absent on the host.
    pub simulated: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Final endpoint set in desired order.
    pub endpoints: Vec<ResolvedEndpoint>,
    /// Mutating actions in execution order.
    pub plan: Vec<PlannedAction>,
    pub deleted: Vec<String>,
    pub created: Vec<String>,
    pub findings: Findings,
}

impl ReconcileReport {
    /// Names of the final endpoint set.
    pub fn endpoint_names(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.device.name.as_str()).collect()
    }
}

/// Converges SMI devices on the host to a desired set.
pub struct Reconciler<'a> {
    host: &'a dyn Host,
    config: &'a SmiConfig,
    operator: &'a dyn Operator,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        host: &'a dyn Host,
        config: &'a SmiConfig,
        operator: &'a dyn Operator,
        dry_run: bool,
    ) -> Self {
        Self {
            host,
            config,
            operator,
            dry_run,
        }
    }

    fn inventory(&self) -> Inventory<'a> {
        Inventory::new(self.host, self.config)
    }

    /// Runs discover, delete and create against `desired`.
    ///
    /// Fails with [`SmiError::NoEndpointsResolved`] when the final set is
    /// empty.
    #[instrument(skip(self, desired), fields(dry_run = self.dry_run))]
    pub async fn reconcile(
        &self,
        desired: &[LogicalEndpointDevice],
        mode: DeleteMode,
    ) -> SmiResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let mut existing = self.inventory().list_existing_endpoint_devices().await?;
        info!(
            count = existing.len(),
            dry_run = self.dry_run,
            "Discovered existing SMI devices"
        );

        let doomed = self.choose_deletions(&existing, mode, &mut report.findings)?;
        for device in doomed {
            if self.delete(&device, &mut report).await? {
                existing.retain(|d| d.name != device.name);
                if !self.dry_run {
                    report.deleted.push(device.name);
                }
            }
        }

        for device in desired {
            if let Some(present) = existing.iter().find(|d| d.name == device.name) {
                if present.parent_id.is_some() && present.parent_id != device.parent_id {
                    warn!(
                        device = %device.name,
                        expected = %device.parent_or_unknown(),
                        actual = %present.parent_or_unknown(),
                        "Existing device is bound to a different parent"
                    );
                }
                info!(device = %device.name, "Already present, nothing to create");
                report.endpoints.push(ResolvedEndpoint {
                    device: device.clone(),
                    simulated: false,
                });
                continue;
            }

            if let Some(endpoint) = self.create(device, &mut report).await? {
                report.endpoints.push(endpoint);
            }
        }

        info!(
            endpoints = ?report.endpoint_names(),
            created = report.created.len(),
            deleted = report.deleted.len(),
            "Reconciliation complete"
        );

        if report.endpoints.is_empty() {
            error!("No SMI devices resolved");
            return Err(SmiError::NoEndpointsResolved);
        }
        Ok(report)
    }

    fn choose_deletions(
        &self,
        existing: &[LogicalEndpointDevice],
        mode: DeleteMode,
        findings: &mut Findings,
    ) -> SmiResult<Vec<LogicalEndpointDevice>> {
        if mode == DeleteMode::None {
            return Ok(Vec::new());
        }
        if existing.is_empty() {
            info!("No existing SMI devices to delete");
            return Ok(Vec::new());
        }

        self.operator.notify(&numbered_listing(existing));

        match mode {
            DeleteMode::None => Ok(Vec::new()),
            DeleteMode::All => {
                let prompt = format!("Delete all {} existing SMI devices?", existing.len());
                if self.operator.confirm(&prompt)? {
                    Ok(existing.to_vec())
                } else {
                    info!("Deletion declined, keeping existing SMI devices");
                    Ok(Vec::new())
                }
            }
            DeleteMode::Select => {
                let answer = self.operator.select(
                    "Devices to delete (e.g. '1 3', '2-4', 'all'; empty to skip)",
                )?;
                let selection = parse_selection(&answer, existing.len());
                for message in selection.warnings.iter() {
                    warn!("{}", message);
                    findings.warn(Finding::InvalidSelectionToken {
                        message: message.clone(),
                    });
                }
                if selection.is_empty() {
                    info!("No devices selected, skipping deletion");
                }
                Ok(selection.positions().map(|p| existing[p].clone()).collect())
            }
        }
    }

    /// Returns true if the device is gone (or would be, in dry-run).
    #[instrument(skip(self, report), fields(device = %device.name))]
    async fn delete(
        &self,
        device: &LogicalEndpointDevice,
        report: &mut ReconcileReport,
    ) -> SmiResult<bool> {
        let action = PlannedAction::Delete {
            name: device.name.clone(),
        };
        let cmd = action.command(&self.config.commands);
        report.plan.push(action);

        if self.dry_run {
            info!(command = %cmd, "Would execute");
            return Ok(true);
        }

        let result = self.host.exec(&cmd).await?;
        if result.success() {
            info!("Deleted SMI device");
            Ok(true)
        } else {
            let finding = Finding::DeletionFailed {
                device: device.name.clone(),
                output: result.combined_output(),
            };
            error!("{}", finding);
            report.findings.fail(finding);
            Ok(false)
        }
    }

    #[instrument(skip(self, report), fields(device = %device.name))]
    async fn create(
        &self,
        device: &LogicalEndpointDevice,
        report: &mut ReconcileReport,
    ) -> SmiResult<Option<ResolvedEndpoint>> {
        let parent = device.parent_or_unknown().to_string();

        let live = self.inventory().list_adapters().await?;
        if !live.iter().any(|a| a.id == parent) {
            let finding = Finding::ParentVisibilityLost {
                device: device.name.clone(),
                parent,
            };
            error!("{}", finding);
            report.findings.fail(finding);
            return Ok(None);
        }

        let action = PlannedAction::Create {
            name: device.name.clone(),
            parent,
        };
        let cmd = action.command(&self.config.commands);
        report.plan.push(action);

        if self.dry_run {
            info!(command = %cmd, "Would execute");
            return Ok(Some(ResolvedEndpoint {
                device: device.clone(),
                simulated: true,
            }));
        }

        let result = self.host.exec(&cmd).await?;
        if result.success() {
            info!("Created SMI device");
            report.created.push(device.name.clone());
            Ok(Some(ResolvedEndpoint {
                device: device.clone(),
                simulated: false,
            }))
        } else {
            let finding = Finding::CreationFailed {
                device: device.name.clone(),
                output: result.combined_output(),
            };
            error!("{}", finding);
            report.findings.fail(finding);
            Ok(None)
        }
    }
}

/// Renders the 1-based list the selection grammar refers to.
pub fn numbered_listing(devices: &[LogicalEndpointDevice]) -> String {
    devices
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{:>3}) {}", i + 1, d))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::ScriptedOperator;
    use pretty_assertions::assert_eq;
    use smi_cfgmgr_test::{adapter_inventory, commands, endpoint_listing, CommandVerifier, MockHost};

    fn desired(indices: &[u32]) -> Vec<LogicalEndpointDevice> {
        indices
            .iter()
            .map(|i| LogicalEndpointDevice::bound(format!("endpoint{}", i), format!("adapter_{}", i)))
            .collect()
    }

    fn host_with(adapters: &[&str], existing: &[(&str, Option<&str>)]) -> MockHost {
        let rows: Vec<(&str, &str)> = adapters.iter().map(|a| ("ConnectX7", *a)).collect();
        MockHost::new()
            .respond(commands::LIST_ADAPTERS, adapter_inventory(&rows))
            .respond(commands::LIST_ENDPOINTS, endpoint_listing(existing))
    }

    #[tokio::test]
    async fn test_creates_missing_devices() {
        let config = SmiConfig::default();
        let host = host_with(&["adapter_0", "adapter_1"], &[("endpoint0", Some("adapter_0"))]);
        let operator = ScriptedOperator::new();
        let reconciler = Reconciler::new(&host, &config, &operator, false);

        let report = reconciler
            .reconcile(&desired(&[0, 1]), DeleteMode::None)
            .await
            .unwrap();

        assert_eq!(report.endpoint_names(), vec!["endpoint0", "endpoint1"]);
        assert_eq!(report.created, vec!["endpoint1".to_string()]);
        let verifier = CommandVerifier::new(&host);
        verifier
            .assert_executed(&commands::create_endpoint("endpoint1", "adapter_1"))
            .unwrap();
        verifier.assert_count_with_prefix("rdma dev add", 1).unwrap();
        verifier.assert_none_with_prefix("rdma dev del").unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_requires_confirmation() {
        let config = SmiConfig::default();
        let existing = [("endpoint0", Some("adapter_0")), ("endpoint7", None)];

        let host = host_with(&["adapter_0"], &existing);
        let declined = ScriptedOperator::new().confirming(false);
        let report = Reconciler::new(&host, &config, &declined, false)
            .reconcile(&desired(&[0]), DeleteMode::All)
            .await
            .unwrap();
        assert!(report.deleted.is_empty());
        CommandVerifier::new(&host)
            .assert_none_with_prefix("rdma dev del")
            .unwrap();

        let host = host_with(&["adapter_0"], &existing);
        let confirmed = ScriptedOperator::new().confirming(true);
        let report = Reconciler::new(&host, &config, &confirmed, false)
            .reconcile(&desired(&[0]), DeleteMode::All)
            .await
            .unwrap();
        assert_eq!(report.deleted, vec!["endpoint0".to_string(), "endpoint7".to_string()]);
        assert_eq!(report.created, vec!["endpoint0".to_string()]);
        assert_eq!(
            report.plan,
            vec![
                PlannedAction::Delete { name: "endpoint0".to_string() },
                PlannedAction::Delete { name: "endpoint7".to_string() },
                PlannedAction::Create {
                    name: "endpoint0".to_string(),
                    parent: "adapter_0".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_select_deletes_chosen_indices_once() {
        let config = SmiConfig::default();
        let host = host_with(
            &["adapter_0"],
            &[("endpoint0", Some("adapter_0")), ("endpoint5", None), ("endpoint6", None)],
        );
        let operator = ScriptedOperator::new().selecting("3 2-3 9");
        let report = Reconciler::new(&host, &config, &operator, false)
            .reconcile(&desired(&[0]), DeleteMode::Select)
            .await
            .unwrap();

        assert_eq!(report.deleted, vec!["endpoint5".to_string(), "endpoint6".to_string()]);
        assert_eq!(report.findings.warnings().count(), 1);
        assert!(!report.findings.has_failures());
        CommandVerifier::new(&host)
            .assert_count_with_prefix("rdma dev del", 2)
            .unwrap();
        assert!(operator.prompts()[0].contains("1) endpoint0 (parent adapter_0)"));
        assert!(operator.prompts()[0].contains("2) endpoint5 (parent unknown)"));
    }

    #[tokio::test]
    async fn test_empty_selection_skips_deletion() {
        let config = SmiConfig::default();
        let host = host_with(&["adapter_0"], &[("endpoint0", Some("adapter_0"))]);
        let operator = ScriptedOperator::new().selecting("");
        let report = Reconciler::new(&host, &config, &operator, false)
            .reconcile(&desired(&[0]), DeleteMode::Select)
            .await
            .unwrap();
        assert!(report.plan.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_parent_is_skipped_and_reported() {
        let config = SmiConfig::default();
        let host = MockHost::new()
            .respond(commands::LIST_ENDPOINTS, "")
            .respond(
                commands::LIST_ADAPTERS,
                adapter_inventory(&[("ConnectX7", "adapter_0")]),
            );
        let operator = ScriptedOperator::new();
        let report = Reconciler::new(&host, &config, &operator, false)
            .reconcile(&desired(&[0, 1]), DeleteMode::None)
            .await
            .unwrap();

        assert_eq!(report.endpoint_names(), vec!["endpoint0"]);
        assert_eq!(
            report.findings.failures().cloned().collect::<Vec<_>>(),
            vec![Finding::ParentVisibilityLost {
                device: "endpoint1".to_string(),
                parent: "adapter_1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_creation_failure_is_recorded() {
        let config = SmiConfig::default();
        let host = host_with(&["adapter_0", "adapter_1"], &[])
            .respond_failure(
                commands::create_endpoint("endpoint1", "adapter_1"),
                1,
                "Operation not supported",
            );
        let operator = ScriptedOperator::new();
        let report = Reconciler::new(&host, &config, &operator, false)
            .reconcile(&desired(&[0, 1]), DeleteMode::None)
            .await
            .unwrap();
        assert_eq!(report.endpoint_names(), vec!["endpoint0"]);
        assert!(report.findings.has_failures());
    }

    #[tokio::test]
    async fn test_empty_final_set_is_fatal() {
        let config = SmiConfig::default();
        let host = host_with(&[], &[]);
        let operator = ScriptedOperator::new();
        let result = Reconciler::new(&host, &config, &operator, false)
            .reconcile(&desired(&[0]), DeleteMode::None)
            .await;
        assert!(matches!(result, Err(SmiError::NoEndpointsResolved)));
    }

    #[tokio::test]
    async fn test_dry_run_marks_created_as_simulated() {
        let config = SmiConfig::default();
        let host = host_with(&["adapter_0", "adapter_1"], &[("endpoint0", Some("adapter_0"))]);
        let operator = ScriptedOperator::new();
        let report = Reconciler::new(&host, &config, &operator, true)
            .reconcile(&desired(&[0, 1]), DeleteMode::None)
            .await
            .unwrap();
        assert_eq!(
            report.endpoints.iter().map(|e| e.simulated).collect::<Vec<_>>(),
            vec![false, true]
        );
        assert!(report.created.is_empty());
        CommandVerifier::new(&host).assert_read_only().unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_plans_deletions_without_reporting_them() {
        let config = SmiConfig::default();
        let host = host_with(&["adapter_0"], &[("endpoint0", Some("adapter_0")), ("endpoint7", None)]);
        let operator = ScriptedOperator::new().confirming(true);
        let report = Reconciler::new(&host, &config, &operator, true)
            .reconcile(&desired(&[0]), DeleteMode::All)
            .await
            .unwrap();

        assert!(report.deleted.is_empty());
        assert!(report.created.is_empty());
        assert_eq!(
            report.plan,
            vec![
                PlannedAction::Delete { name: "endpoint0".to_string() },
                PlannedAction::Delete { name: "endpoint7".to_string() },
                PlannedAction::Create {
                    name: "endpoint0".to_string(),
                    parent: "adapter_0".to_string()
                },
            ]
        );
        assert!(report.endpoints.iter().all(|e| e.simulated));
        CommandVerifier::new(&host).assert_read_only().unwrap();
    }
}
