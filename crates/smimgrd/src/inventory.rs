//! Inventory collection.
//!
//! Parsing is schema-on-read: each status command has a small line
//! grammar and a pure function turning its text into records. Malformed
//! or empty text yields an empty list, never an error. Errors are only
//! raised when a command cannot be run at all.

use smi_cfgmgr_common::shell::basename;
use smi_cfgmgr_common::{Host, SmiResult};
use tracing::{debug, warn};

use crate::config::SmiConfig;
use crate::types::{EndpointIdentity, LinkState, LogicalEndpointDevice, PhysicalAdapter, PortStatus};

const PARENT_KEYWORD: &str = "parent";
const NULL_GUID: &str = "0x0000000000000000";

fn is_device_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parses an endpoint device listing.
///
/// Grammar per line: `[<index>:] <name>: <attrs...> [parent <id>] <attrs...>`.
pub fn parse_endpoint_devices(text: &str) -> Vec<LogicalEndpointDevice> {
    let mut devices: Vec<LogicalEndpointDevice> = Vec::new();

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };

        let has_index = first
            .strip_suffix(':')
            .is_some_and(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()));
        let name_token = if has_index { tokens.next() } else { Some(first) };
        let Some(name) = name_token.and_then(|t| t.strip_suffix(':')) else {
            continue;
        };
        if !is_device_name(name) {
            continue;
        }

        let rest: Vec<&str> = tokens.collect();
        let parent_id = rest
            .windows(2)
            .find(|w| w[0] == PARENT_KEYWORD)
            .map(|w| w[1].to_string());

        if devices.iter().any(|d| d.name == name) {
            continue;
        }
        devices.push(LogicalEndpointDevice {
            name: name.to_string(),
            parent_id,
        });
    }

    devices
}

/// Parses an adapter inventory table, keeping first-seen order.
///
/// A row is an adapter when a column after the first starts with
/// `adapter_prefix` followed by a non-empty index. The first column,
/// minus any `(...)` suffix, is the vendor kind.
pub fn parse_adapters(text: &str, adapter_prefix: &str) -> Vec<PhysicalAdapter> {
    let mut adapters: Vec<PhysicalAdapter> = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((kind, columns)) = tokens.split_first() else {
            continue;
        };
        let Some(id) = columns
            .iter()
            .find(|t| t.len() > adapter_prefix.len() && t.starts_with(adapter_prefix))
        else {
            continue;
        };

        if adapters.iter().any(|a| a.id == *id) {
            continue;
        }
        let vendor_kind = kind.split_once('(').map_or(*kind, |(k, _)| k);
        adapters.push(PhysicalAdapter::new(*id, vendor_kind));
    }

    adapters
}

/// Keeps adapters whose vendor kind contains `model`.
pub fn qualifying_adapters(adapters: Vec<PhysicalAdapter>, model: &str) -> Vec<PhysicalAdapter> {
    adapters
        .into_iter()
        .filter(|a| a.vendor_kind.contains(model))
        .collect()
}

#[derive(Debug, Default)]
struct PortBlock {
    number: u32,
    state: Option<String>,
    guid: Option<String>,
}

fn parse_port_blocks(text: &str) -> Vec<PortBlock> {
    let mut blocks: Vec<PortBlock> = Vec::new();

    for line in text.lines().map(str::trim) {
        if let Some(guid) = line.strip_prefix("Port GUID:") {
            if let Some(block) = blocks.last_mut() {
                block.guid = Some(guid.trim().to_string());
            }
        } else if let Some(number) = line
            .strip_prefix("Port ")
            .and_then(|rest| rest.strip_suffix(':'))
            .and_then(|n| n.trim().parse::<u32>().ok())
        {
            blocks.push(PortBlock {
                number,
                ..Default::default()
            });
        } else if let Some(state) = line.strip_prefix("State:") {
            if let Some(block) = blocks.last_mut() {
                block.state = Some(state.trim().to_string());
            }
        }
    }

    blocks.sort_by_key(|b| b.number);
    blocks.dedup_by_key(|b| b.number);
    blocks
}

/// Parses a per-device port report into port states ordered by port number.
pub fn parse_port_report(device_name: &str, text: &str) -> Vec<PortStatus> {
    parse_port_blocks(text)
        .into_iter()
        .map(|block| PortStatus {
            device_name: device_name.to_string(),
            port_number: block.number,
            link_state: block
                .state
                .as_deref()
                .map(LinkState::from_report)
                .unwrap_or(LinkState::Unknown),
        })
        .collect()
}

/// Returns the GUID of the lowest-numbered port, if it is set.
pub fn parse_primary_guid(text: &str) -> Option<EndpointIdentity> {
    let guid = parse_port_blocks(text).into_iter().next()?.guid?;
    let valid = guid.len() > 2
        && !guid.eq_ignore_ascii_case(NULL_GUID)
        && guid.trim_start_matches("0x").chars().any(|c| c != '0');
    valid.then(|| EndpointIdentity::new(guid))
}

/// Finds the pid of a running `program` bound to `guid` in a process table.
///
/// Rows are `<pid> <argv...>`. A row matches when the basename of `argv[0]`
/// is `program`, or `argv[0]` is a `sh -c [exec] <program>` wrapper, and a
/// later argument equals `guid`.
pub fn find_daemon_pid(text: &str, program: &str, guid: &str) -> Option<u32> {
    text.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        let pid = tokens.next()?.parse::<u32>().ok()?;
        let argv: Vec<&str> = tokens.map(unquote).collect();
        let rest = daemon_args(&argv, program)?;
        rest.iter()
            .any(|a| a.eq_ignore_ascii_case(guid))
            .then_some(pid)
    })
}

/// Arguments following the daemon program, if `argv` runs it.
fn daemon_args<'t>(argv: &'t [&'t str], program: &str) -> Option<&'t [&'t str]> {
    let (first, rest) = argv.split_first()?;
    if basename(first) == program {
        return Some(rest);
    }
    if !matches!(basename(first), "sh" | "bash") {
        return None;
    }
    let rest = rest.strip_prefix(&["-c"])?;
    let rest = rest.strip_prefix(&["exec"]).unwrap_or(rest);
    let (wrapped, rest) = rest.split_first()?;
    (basename(wrapped) == program).then_some(rest)
}

fn unquote(arg: &str) -> &str {
    arg.trim_matches(|c: char| c == '"' || c == '\'')
}

/// Live inventory queries against a host.
pub struct Inventory<'a> {
    host: &'a dyn Host,
    config: &'a SmiConfig,
}

impl<'a> Inventory<'a> {
    pub fn new(host: &'a dyn Host, config: &'a SmiConfig) -> Self {
        Self { host, config }
    }

    /// Runs a status command; a non-zero exit is treated as no data.
    async fn query(&self, cmd: &str) -> SmiResult<String> {
        let result = self.host.exec(cmd).await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            warn!(
                command = %cmd,
                exit_code = result.exit_code,
                "Status query failed, treating as empty: {}",
                result.combined_output()
            );
            Ok(String::new())
        }
    }

    /// Lists SMI devices currently present on the host.
    pub async fn list_existing_endpoint_devices(&self) -> SmiResult<Vec<LogicalEndpointDevice>> {
        let text = self.query(&self.config.commands.list_endpoints).await?;
        let devices = parse_endpoint_devices(&text);
        debug!(count = devices.len(), "Listed existing endpoint devices");
        Ok(devices)
    }

    /// Lists every adapter the inventory reports, regardless of model.
    pub async fn list_adapters(&self) -> SmiResult<Vec<PhysicalAdapter>> {
        let text = self.query(&self.config.commands.list_adapters).await?;
        Ok(parse_adapters(&text, &self.config.naming.adapter_prefix))
    }

    /// Lists adapters of the configured hardware class, in inventory order.
    pub async fn list_qualifying_adapters(&self) -> SmiResult<Vec<PhysicalAdapter>> {
        let adapters = qualifying_adapters(
            self.list_adapters().await?,
            &self.config.inventory.adapter_model,
        );
        debug!(count = adapters.len(), "Listed qualifying adapters");
        Ok(adapters)
    }

    /// Port states of `device_name`.
    pub async fn list_ports(&self, device_name: &str) -> SmiResult<Vec<PortStatus>> {
        let text = self
            .query(&self.config.commands.query_ports(device_name))
            .await?;
        Ok(parse_port_report(device_name, &text))
    }

    /// Primary port GUID of `device_name`, or `None` when not reported.
    pub async fn resolve_identity(&self, device_name: &str) -> SmiResult<Option<EndpointIdentity>> {
        let text = self
            .query(&self.config.commands.query_ports(device_name))
            .await?;
        Ok(parse_primary_guid(&text))
    }

    /// Pid of a running daemon bound to `guid`, if any.
    pub async fn daemon_pid(&self, guid: &str) -> SmiResult<Option<u32>> {
        let text = self.query(&self.config.commands.process_table).await?;
        Ok(find_daemon_pid(
            &text,
            self.config.commands.daemon_program(),
            guid,
        ))
    }
}
