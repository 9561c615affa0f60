//! Host abstraction for the SMI fabric manager.
//!
//! All contact with the machine (running status commands, mutating
//! devices, launching daemons, waiting) goes through the [`Host`] trait so
//! the manager can be driven against a scripted host in tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SmiResult;
use crate::shell::{self, ExecResult};

/// Side-effecting capabilities the manager needs from the machine.
///
/// # Example
///
/// ```ignore
/// use smi_cfgmgr_common::{Host, SystemHost};
///
/// let host = SystemHost::new();
/// let result = host.exec("rdma dev show type smi").await?;
/// ```
#[async_trait]
pub trait Host: Send + Sync {
    /// Runs a command to completion and captures its output.
    async fn exec(&self, cmd: &str) -> SmiResult<ExecResult>;

    /// Starts a long-running command detached from this process, sending
    /// its output to `log_path`. Returns the pid.
    async fn spawn_detached(&self, cmd: &str, log_path: &Path) -> SmiResult<u32>;

    /// Returns true if `program` can be found.
    async fn tool_available(&self, program: &str) -> SmiResult<bool>;

    /// Blocks the control flow for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Host`] backed by the real shell and clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    /// Creates a new system host.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Host for SystemHost {
    async fn exec(&self, cmd: &str) -> SmiResult<ExecResult> {
        shell::exec(cmd).await
    }

    async fn spawn_detached(&self, cmd: &str, log_path: &Path) -> SmiResult<u32> {
        shell::spawn_detached(cmd, log_path)
    }

    async fn tool_available(&self, program: &str) -> SmiResult<bool> {
        shell::tool_available(program).await
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
