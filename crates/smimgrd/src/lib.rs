//! SMI endpoint device manager.
//!
//! This crate implements `smimgrd`, which keeps one SMI endpoint device per
//! qualifying InfiniBand adapter, supervises one subnet manager daemon per
//! endpoint GUID and checks that every endpoint port reaches Active.
//!
//! # Phases
//!
//! | Phase | Module | Mutates host |
//! |-------|--------|--------------|
//! | Tool check | [`smi_mgr`] | no |
//! | Inventory and desired set | [`inventory`], [`target`] | no |
//! | Delete / create | [`reconcile`] | yes (skipped in dry-run) |
//! | Daemon supervision | [`supervisor`] | yes (skipped in dry-run) |
//! | Port verification | [`verify`] | no |
//!
//! All state is re-derived from live queries on every run. Concurrent
//! runs against the same host are not serialised.
//!
//! # Example
//!
//! ```ignore
//! use smimgrd::{RunLog, RunOptions, SmiConfig, SmiMgr, TerminalOperator};
//! use smi_cfgmgr_common::SystemHost;
//!
//! let config = SmiConfig::default();
//! let operator = TerminalOperator::new(false);
//! let run_log = RunLog::create(&config.logging.log_root)?;
//! let mgr = SmiMgr::new(&SystemHost, &config, &operator, &run_log);
//! let outcome = mgr.run(RunOptions::default()).await?;
//! ```

pub mod config;
pub mod inventory;
pub mod operator;
pub mod outcome;
pub mod reconcile;
pub mod runlog;
pub mod selection;
pub mod smi_mgr;
pub mod status;
pub mod supervisor;
pub mod target;
pub mod types;
pub mod verify;

pub use config::SmiConfig;
pub use operator::{Operator, ScriptedOperator, TerminalOperator};
pub use outcome::{Finding, Findings, Severity};
pub use reconcile::{DeleteMode, PlannedAction, ReconcileReport, Reconciler, ResolvedEndpoint};
pub use runlog::RunLog;
pub use smi_mgr::{EndpointDaemon, RunOptions, RunOutcome, SmiMgr};
pub use supervisor::{DaemonStatus, Supervisor};
pub use types::*;
pub use verify::{PortPolicy, PortVerifier, Verdict, Verification};
