//! Subnet manager daemon supervision.
//!
//! Exactly one daemon per endpoint GUID: an instance already in the
//! process table is left alone, otherwise a detached one is started and
//! the process table is re-sampled with bounded backoff until it shows
//! up. Daemons are never stopped.

use smi_cfgmgr_common::{Host, SmiResult};
use tracing::{debug, info, instrument, warn};

use crate::config::SmiConfig;
use crate::inventory::Inventory;
use crate::runlog::RunLog;
use crate::types::{EndpointIdentity, SupervisedProcess};

/// Result of ensuring a daemon for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonStatus {
    /// An instance was already running; nothing was done.
    Running { pid: u32 },
    /// A new instance was started and seen alive.
    Started(SupervisedProcess),
    /// Dry-run: a start would have been issued.
    WouldStart,
    /// The instance could not be started or did not stay up.
    Failed { reason: String },
}

impl DaemonStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, DaemonStatus::Failed { .. })
    }
}

pub struct Supervisor<'a> {
    host: &'a dyn Host,
    config: &'a SmiConfig,
    run_log: &'a RunLog,
    dry_run: bool,
}

impl<'a> Supervisor<'a> {
    pub fn new(host: &'a dyn Host, config: &'a SmiConfig, run_log: &'a RunLog, dry_run: bool) -> Self {
        Self {
            host,
            config,
            run_log,
            dry_run,
        }
    }

    #[instrument(skip(self), fields(guid = %identity.guid))]
    pub async fn ensure_daemon(&self, identity: &EndpointIdentity) -> SmiResult<DaemonStatus> {
        let inventory = Inventory::new(self.host, self.config);
        let guid = identity.guid.as_str();

        if let Some(pid) = inventory.daemon_pid(guid).await? {
            info!(pid, "Daemon already running");
            return Ok(DaemonStatus::Running { pid });
        }

        let cmd = self.config.commands.launch_daemon(guid);
        if self.dry_run {
            info!(command = %cmd, "Would execute");
            return Ok(DaemonStatus::WouldStart);
        }

        let log_path = self.run_log.daemon_log_path(guid);
        let spawned = match self.host.spawn_detached(&cmd, &log_path).await {
            Ok(pid) => pid,
            Err(e) => {
                warn!(error = %e, "Daemon could not be launched");
                return Ok(DaemonStatus::Failed {
                    reason: e.to_string(),
                });
            }
        };
        info!(pid = spawned, log = %log_path.display(), "Daemon launched, waiting for it to come up");

        let backoff = self.config.supervision.backoff();
        for (attempt, delay) in backoff.iter().enumerate() {
            self.host.sleep(*delay).await;
            if let Some(pid) = inventory.daemon_pid(guid).await? {
                info!(pid, attempt = attempt + 1, "Daemon is running");
                return Ok(DaemonStatus::Started(SupervisedProcess {
                    guid: guid.to_string(),
                    pid,
                    log_path,
                }));
            }
            debug!(attempt = attempt + 1, "Daemon not in process table yet");
        }

        Ok(DaemonStatus::Failed {
            reason: format!(
                "pid {} not running after {} checks, see {}",
                spawned,
                backoff.len(),
                log_path.display()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smi_cfgmgr_test::{commands, process_row, CommandVerifier, MockHost};
    use std::time::Duration;
    use tempfile::TempDir;

    const GUID: &str = "0x9c63c00300a1b2c3";

    fn run_log() -> (TempDir, RunLog) {
        let root = tempfile::tempdir().unwrap();
        let run_log = RunLog::create(root.path()).unwrap();
        (root, run_log)
    }

    #[tokio::test]
    async fn test_running_daemon_is_left_alone() {
        let config = SmiConfig::default();
        let host = MockHost::new().with_process_table(
            commands::PROCESS_TABLE,
            [process_row(1, "/sbin/init"), process_row(77, &format!("/usr/sbin/opensm -g {}", GUID))],
        );
        let (_root, run_log) = run_log();
        let supervisor = Supervisor::new(&host, &config, &run_log, false);

        let status = supervisor.ensure_daemon(&EndpointIdentity::new(GUID)).await.unwrap();
        assert_eq!(status, DaemonStatus::Running { pid: 77 });
        CommandVerifier::new(&host).assert_spawn_count(0).unwrap();
    }

    #[tokio::test]
    async fn test_absent_daemon_is_started_once() {
        let config = SmiConfig::default();
        let host = MockHost::new().with_process_table(commands::PROCESS_TABLE, Vec::<String>::new());
        let (_root, run_log) = run_log();
        let supervisor = Supervisor::new(&host, &config, &run_log, false);
        let identity = EndpointIdentity::new(GUID);

        let first = supervisor.ensure_daemon(&identity).await.unwrap();
        let DaemonStatus::Started(process) = first else {
            panic!("expected Started, got {:?}", first);
        };
        assert_eq!(process.guid, GUID);
        assert_eq!(process.log_path, run_log.dir().join(format!("daemon-{}.log", GUID)));
        assert_eq!(host.spawned()[0].command, commands::launch_daemon(GUID));
        assert_eq!(host.sleeps(), vec![Duration::from_millis(500)]);

        let second = supervisor.ensure_daemon(&identity).await.unwrap();
        assert_eq!(second, DaemonStatus::Running { pid: process.pid });
        CommandVerifier::new(&host).assert_spawn_count(1).unwrap();
    }

    #[tokio::test]
    async fn test_daemon_that_exits_is_failed_after_backoff() {
        let config = SmiConfig::default();
        let host = MockHost::new()
            .with_process_table(commands::PROCESS_TABLE, Vec::<String>::new())
            .daemon_dies(GUID);
        let (_root, run_log) = run_log();
        let supervisor = Supervisor::new(&host, &config, &run_log, false);

        let status = supervisor.ensure_daemon(&EndpointIdentity::new(GUID)).await.unwrap();
        assert!(status.is_failed());
        assert_eq!(host.sleeps(), config.supervision.backoff());
    }

    #[tokio::test]
    async fn test_spawn_error_is_failed() {
        let config = SmiConfig::default();
        let host = MockHost::new()
            .with_process_table(commands::PROCESS_TABLE, Vec::<String>::new())
            .spawn_fails();
        let (_root, run_log) = run_log();
        let supervisor = Supervisor::new(&host, &config, &run_log, false);
        let status = supervisor.ensure_daemon(&EndpointIdentity::new(GUID)).await.unwrap();
        assert!(status.is_failed());
    }

    #[tokio::test]
    async fn test_dry_run_checks_but_never_starts() {
        let config = SmiConfig::default();
        let host = MockHost::new().with_process_table(commands::PROCESS_TABLE, Vec::<String>::new());
        let (_root, run_log) = run_log();
        let supervisor = Supervisor::new(&host, &config, &run_log, true);

        let status = supervisor.ensure_daemon(&EndpointIdentity::new(GUID)).await.unwrap();
        assert_eq!(status, DaemonStatus::WouldStart);
        CommandVerifier::new(&host)
            .assert_executed(commands::PROCESS_TABLE)
            .unwrap();
        CommandVerifier::new(&host).assert_spawn_count(0).unwrap();
    }
}
