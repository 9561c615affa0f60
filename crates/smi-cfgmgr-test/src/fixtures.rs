//! Test fixtures rendering inventory tool output
//!
//! The renderers produce the text the default command templates would
//! print on a real host, and [`commands`] builds the exact command lines
//! the manager issues with its default configuration.

/// Renders an `mst status -v` style adapter inventory.
///
/// Each entry is `(device_type, rdma_id)`.
pub fn adapter_inventory(adapters: &[(&str, &str)]) -> String {
    let mut out = String::from(
        "MST modules:\n------------\n    MST PCI module is not loaded\n    \
         MST PCI configuration module loaded\nPCI devices:\n------------\n\
         DEVICE_TYPE             MST                           PCI       RDMA            NET                       NUMA\n",
    );
    for (i, (kind, id)) in adapters.iter().enumerate() {
        out.push_str(&format!(
            "{:<24}/dev/mst/mt4129_pciconf{:<9}{:02x}:00.0   {:<16}net-ibp{}s0{:<16}{}\n",
            format!("{}(rev:0)", kind),
            i,
            0x3b + i,
            id,
            i,
            "",
            i % 2
        ));
    }
    out
}

/// Renders an `rdma dev show type smi` style listing.
///
/// Each entry is `(name, parent)`; a `None` parent omits the attribute.
pub fn endpoint_listing(devices: &[(&str, Option<&str>)]) -> String {
    devices
        .iter()
        .enumerate()
        .map(|(i, (name, parent))| {
            let mut line = format!(
                "{}: {}: node_type ca fw 28.39.1002 node_guid 9c63:c003:00a1:{:04x}",
                i + 10,
                name,
                i
            );
            if let Some(parent) = parent {
                line.push_str(&format!(" parent {}", parent));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders an `ibstat <device>` style report.
///
/// Each port is `(port_number, state, port_guid)`.
pub fn port_report(device: &str, ports: &[(u32, &str, &str)]) -> String {
    let mut out = format!(
        "CA '{}'\n\tCA type: MT4129\n\tNumber of ports: {}\n\tFirmware version: 28.39.1002\n\
         \tHardware version: 0\n\tNode GUID: 0x9c63c00300a10000\n\tSystem image GUID: 0x9c63c00300a10000\n",
        device,
        ports.len()
    );
    for (port, state, guid) in ports {
        out.push_str(&format!(
            "\tPort {}:\n\t\tState: {}\n\t\tPhysical state: {}\n\t\tRate: 400\n\t\tBase lid: {}\n\
             \t\tLMC: 0\n\t\tSM lid: 1\n\t\tCapability mask: 0xa751e84a\n\t\tPort GUID: {}\n\
             \t\tLink layer: InfiniBand\n",
            port,
            state,
            if *state == "Active" { "LinkUp" } else { "Polling" },
            port,
            guid
        ));
    }
    out
}

/// Renders one `ps -eo pid=,args=` row.
pub fn process_row(pid: u32, args: &str) -> String {
    format!("{:>7} {}", pid, args)
}

/// Exact command lines issued under the default configuration.
pub mod commands {
    use smi_cfgmgr_common::shell::shellquote;

    /// Endpoint device listing.
    pub const LIST_ENDPOINTS: &str = "rdma dev show type smi";
    /// Adapter inventory.
    pub const LIST_ADAPTERS: &str = "mst status -v";
    /// Process table query.
    pub const PROCESS_TABLE: &str = "ps -eo pid=,args=";

    /// Create command for `name` bound to `parent`.
    pub fn create_endpoint(name: &str, parent: &str) -> String {
        format!(
            "rdma dev add {} type SMI parent {}",
            shellquote(name),
            shellquote(parent)
        )
    }

    /// Delete command for `name`.
    pub fn delete_endpoint(name: &str) -> String {
        format!("rdma dev del {}", shellquote(name))
    }

    /// Port query for `name`.
    pub fn query_ports(name: &str) -> String {
        format!("ibstat {}", shellquote(name))
    }

    /// Daemon launch for `guid`.
    pub fn launch_daemon(guid: &str) -> String {
        format!("opensm -g {}", shellquote(guid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_inventory_rows() {
        let text = adapter_inventory(&[("ConnectX7", "adapter_0"), ("BlueField3", "adapter_1")]);
        assert!(text.contains("ConnectX7(rev:0)"));
        assert!(text.contains("adapter_1"));
        assert!(text.lines().any(|l| l.starts_with("DEVICE_TYPE")));
    }

    #[test]
    fn test_endpoint_listing_optional_parent() {
        let text = endpoint_listing(&[("endpoint0", Some("adapter_0")), ("endpoint1", None)]);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].ends_with("parent adapter_0"));
        assert!(!lines[1].contains("parent"));
    }

    #[test]
    fn test_commands_quote_values() {
        assert_eq!(
            commands::create_endpoint("endpoint0", "adapter_0"),
            "rdma dev add \"endpoint0\" type SMI parent \"adapter_0\""
        );
        assert_eq!(commands::query_ports("endpoint3"), "ibstat \"endpoint3\"");
    }
}
