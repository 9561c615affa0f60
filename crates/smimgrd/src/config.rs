//! Configuration file support for smimgrd
//!
//! Loads and validates smimgrd configuration from TOML files.
//! Default location: /etc/smimgrd/smimgrd.toml
//!
//! Every external command the manager runs is a template in the
//! `[commands]` table. Placeholders (`{name}`, `{parent}`, `{guid}`) are
//! replaced by shell-quoted values.

use serde::{Deserialize, Serialize};
use smi_cfgmgr_common::shell::{basename, program_of, shellquote};
use smi_cfgmgr_common::{SmiError, SmiResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/smimgrd/smimgrd.toml";

/// Device naming rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prefix of physical adapter ids; the remainder is the index
    #[serde(default = "default_adapter_prefix")]
    pub adapter_prefix: String,

    /// Prefix of SMI device names; followed by the adapter index
    #[serde(default = "default_endpoint_prefix")]
    pub endpoint_prefix: String,
}

/// Inventory filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Hardware class of interest, matched as a substring of the device type
    #[serde(default = "default_adapter_model")]
    pub adapter_model: String,
}

/// External command templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_list_endpoints")]
    pub list_endpoints: String,

    #[serde(default = "default_list_adapters")]
    pub list_adapters: String,

    /// Needs `{name}` and `{parent}`
    #[serde(default = "default_create_endpoint")]
    pub create_endpoint: String,

    /// Needs `{name}`
    #[serde(default = "default_delete_endpoint")]
    pub delete_endpoint: String,

    /// Needs `{name}`
    #[serde(default = "default_query_ports")]
    pub query_ports: String,

    /// Needs `{guid}`
    #[serde(default = "default_launch_daemon")]
    pub launch_daemon: String,

    #[serde(default = "default_process_table")]
    pub process_table: String,
}

/// Daemon liveness polling after a start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisionConfig {
    /// Delay before the first liveness check in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Number of liveness checks before declaring the start failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Run log location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Parent of the per-run timestamped directories
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,
}

/// Complete smimgrd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmiConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    #[serde(default)]
    pub supervision: SupervisionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_adapter_prefix() -> String {
    "adapter_".to_string()
}

fn default_endpoint_prefix() -> String {
    "endpoint".to_string()
}

fn default_adapter_model() -> String {
    "ConnectX".to_string()
}

fn default_list_endpoints() -> String {
    "rdma dev show type smi".to_string()
}

fn default_list_adapters() -> String {
    "mst status -v".to_string()
}

fn default_create_endpoint() -> String {
    "rdma dev add {name} type SMI parent {parent}".to_string()
}

fn default_delete_endpoint() -> String {
    "rdma dev del {name}".to_string()
}

fn default_query_ports() -> String {
    "ibstat {name}".to_string()
}

fn default_launch_daemon() -> String {
    "opensm -g {guid}".to_string()
}

fn default_process_table() -> String {
    "ps -eo pid=,args=".to_string()
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    4000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_log_root() -> PathBuf {
    PathBuf::from("/var/log/smimgrd")
}

// Default implementations
impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            adapter_prefix: default_adapter_prefix(),
            endpoint_prefix: default_endpoint_prefix(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            adapter_model: default_adapter_model(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            list_endpoints: default_list_endpoints(),
            list_adapters: default_list_adapters(),
            create_endpoint: default_create_endpoint(),
            delete_endpoint: default_delete_endpoint(),
            query_ports: default_query_ports(),
            launch_daemon: default_launch_daemon(),
            process_table: default_process_table(),
        }
    }
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_root: default_log_root(),
        }
    }
}

/// Substitutes `{key}` placeholders with shell-quoted values.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |cmd, (key, value)| {
        cmd.replace(&format!("{{{}}}", key), &shellquote(value))
    })
}

impl CommandConfig {
    pub fn create_endpoint(&self, name: &str, parent: &str) -> String {
        render(&self.create_endpoint, &[("name", name), ("parent", parent)])
    }

    pub fn delete_endpoint(&self, name: &str) -> String {
        render(&self.delete_endpoint, &[("name", name)])
    }

    pub fn query_ports(&self, name: &str) -> String {
        render(&self.query_ports, &[("name", name)])
    }

    pub fn launch_daemon(&self, guid: &str) -> String {
        render(&self.launch_daemon, &[("guid", guid)])
    }

    /// Basename of the daemon program, used to recognise it in the
    /// process table.
    pub fn daemon_program(&self) -> &str {
        program_of(&self.launch_daemon).map(basename).unwrap_or_default()
    }

    /// Programs that must be installed for a run. The daemon is only
    /// needed when supervision is enabled.
    pub fn required_programs(&self, supervise: bool) -> Vec<&str> {
        let mut templates = vec![
            &self.list_endpoints,
            &self.list_adapters,
            &self.create_endpoint,
            &self.delete_endpoint,
            &self.query_ports,
        ];
        if supervise {
            templates.push(&self.launch_daemon);
            templates.push(&self.process_table);
        }

        let mut programs: Vec<&str> = Vec::new();
        for program in templates.into_iter().filter_map(|t| program_of(t)) {
            if !programs.contains(&program) {
                programs.push(program);
            }
        }
        programs
    }
}

impl SupervisionConfig {
    /// Delays between liveness checks: doubling from the initial delay,
    /// capped at the maximum, one per attempt.
    pub fn backoff(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay_ms;
        (0..self.max_attempts)
            .map(|_| {
                let current = delay.min(self.max_delay_ms);
                delay = delay.saturating_mul(2);
                Duration::from_millis(current)
            })
            .collect()
    }
}

impl SmiConfig {
    /// Load configuration from `path`; a missing file is an error
    pub fn load(path: impl AsRef<Path>) -> SmiResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            SmiError::InvalidConfig { field, message } => SmiError::InvalidConfig {
                field,
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> SmiResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SmiError::Io(e)),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> SmiResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SmiError::invalid_config("file", format!("failed to parse: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> SmiResult<()> {
        if self.naming.adapter_prefix.is_empty() {
            return Err(SmiError::invalid_config(
                "naming.adapter_prefix",
                "must not be empty",
            ));
        }
        if self.naming.endpoint_prefix.is_empty() {
            return Err(SmiError::invalid_config(
                "naming.endpoint_prefix",
                "must not be empty",
            ));
        }

        let c = &self.commands;
        let required: [(&str, &str, &[&str]); 7] = [
            ("commands.list_endpoints", c.list_endpoints.as_str(), &[]),
            ("commands.list_adapters", c.list_adapters.as_str(), &[]),
            ("commands.create_endpoint", c.create_endpoint.as_str(), &["{name}", "{parent}"]),
            ("commands.delete_endpoint", c.delete_endpoint.as_str(), &["{name}"]),
            ("commands.query_ports", c.query_ports.as_str(), &["{name}"]),
            ("commands.launch_daemon", c.launch_daemon.as_str(), &["{guid}"]),
            ("commands.process_table", c.process_table.as_str(), &[]),
        ];
        for (field, template, placeholders) in required {
            if template.trim().is_empty() {
                return Err(SmiError::invalid_config(field, "must not be empty"));
            }
            if let Some(missing) = placeholders.iter().find(|p| !template.contains(*p)) {
                return Err(SmiError::invalid_config(
                    field,
                    format!("missing placeholder {}", missing),
                ));
            }
        }

        if self.supervision.max_attempts == 0 {
            return Err(SmiError::invalid_config(
                "supervision.max_attempts",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
