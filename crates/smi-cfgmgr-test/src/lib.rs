//! Test infrastructure for the SMI fabric manager
//!
//! Provides:
//! - [`MockHost`], a scripted [`Host`](smi_cfgmgr_common::Host) that
//!   records every command instead of touching the machine
//! - Fixtures rendering the text the inventory tools print
//! - Verification helpers over the recorded command log

pub mod fixtures;
mod mock_host;
mod verification;

pub use fixtures::*;
pub use mock_host::{MockHost, SpawnRecord};
pub use verification::*;
