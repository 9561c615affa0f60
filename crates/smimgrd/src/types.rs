//! Records produced by the inventory queries and consumed by the manager.

use std::fmt;
use std::path::PathBuf;

/// Displayed in place of a parent adapter the listing did not report.
pub const UNKNOWN_PARENT: &str = "unknown";

/// A host adapter of the targeted hardware class. Observed only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalAdapter {
    /// RDMA device id, e.g. `adapter_0`.
    pub id: String,
    /// Device type reported by the inventory, e.g. `ConnectX7`.
    pub vendor_kind: String,
}

impl PhysicalAdapter {
    pub fn new(id: impl Into<String>, vendor_kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor_kind: vendor_kind.into(),
        }
    }
}

/// An SMI device bound to a physical adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalEndpointDevice {
    pub name: String,
    /// `None` when the listing did not report a parent.
    pub parent_id: Option<String>,
}

impl LogicalEndpointDevice {
    /// Creates a device bound to `parent`.
    pub fn bound(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent.into()),
        }
    }

    /// Creates a device whose parent is not known.
    pub fn orphan(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
        }
    }

    /// Returns the parent id, or [`UNKNOWN_PARENT`].
    pub fn parent_or_unknown(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(UNKNOWN_PARENT)
    }
}

impl fmt::Display for LogicalEndpointDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (parent {})", self.name, self.parent_or_unknown())
    }
}

/// Physical link state of a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Active,
    Down,
    /// Transitional or not reported.
    Unknown,
    /// Reported but not recognised.
    Error,
}

impl LinkState {
    /// Maps the `State:` value of a port report.
    pub fn from_report(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "active" => LinkState::Active,
            "down" | "polling" | "disabled" => LinkState::Down,
            "initializing" | "init" | "armed" | "" => LinkState::Unknown,
            _ => LinkState::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Active => "Active",
            LinkState::Down => "Down",
            LinkState::Unknown => "Unknown",
            LinkState::Error => "Error",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LinkState::Active)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of one port of an endpoint device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    pub device_name: String,
    pub port_number: u32,
    pub link_state: LinkState,
}

/// Stable hardware identity of an endpoint (its primary port GUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointIdentity {
    pub guid: String,
}

impl EndpointIdentity {
    pub fn new(guid: impl Into<String>) -> Self {
        Self { guid: guid.into() }
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.guid)
    }
}

/// A daemon instance started by this run. It is never stopped by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub guid: String,
    pub pid: u32,
    pub log_path: PathBuf,
}
