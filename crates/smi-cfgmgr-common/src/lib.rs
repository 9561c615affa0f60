//! Common infrastructure for the SMI fabric manager.
//!
//! - [`shell`]: Shell command execution with proper quoting
//! - [`host`]: The [`Host`] seam through which every command runs
//! - [`error`]: Error types shared by all crates in the workspace
//!
//! # Example
//!
//! ```ignore
//! use smi_cfgmgr_common::{shell::shellquote, Host, SmiResult, SystemHost};
//!
//! async fn delete(host: &dyn Host, name: &str) -> SmiResult<()> {
//!     let cmd = format!("rdma dev del {}", shellquote(name));
//!     host.exec(&cmd).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod host;
pub mod shell;

// Re-export commonly used items at crate root
pub use error::{SmiError, SmiResult};
pub use host::{Host, SystemHost};
pub use shell::ExecResult;
