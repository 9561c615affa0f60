//! Status table of existing SMI devices.

use smi_cfgmgr_common::{Host, SmiResult};
use tabled::{settings::Style, Table, Tabled};

use crate::config::SmiConfig;
use crate::inventory::Inventory;
use crate::types::PortStatus;

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct StatusRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Device")]
    pub name: String,
    #[tabled(rename = "Parent")]
    pub parent: String,
    #[tabled(rename = "GUID")]
    pub guid: String,
    #[tabled(rename = "Ports")]
    pub ports: String,
    #[tabled(rename = "Daemon")]
    pub daemon: String,
}

fn port_summary(ports: &[PortStatus]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports
        .iter()
        .map(|p| format!("{}:{}", p.port_number, p.link_state))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One row per existing device, numbered like the deletion listing.
pub async fn collect_status(host: &dyn Host, config: &SmiConfig) -> SmiResult<Vec<StatusRow>> {
    let inventory = Inventory::new(host, config);
    let devices = inventory.list_existing_endpoint_devices().await?;

    let mut rows = Vec::with_capacity(devices.len());
    for (i, device) in devices.iter().enumerate() {
        let ports = inventory.list_ports(&device.name).await?;
        let identity = inventory.resolve_identity(&device.name).await?;
        let daemon = match &identity {
            Some(identity) => match inventory.daemon_pid(&identity.guid).await? {
                Some(pid) => format!("running (pid {})", pid),
                None => "stopped".to_string(),
            },
            None => "-".to_string(),
        };
        rows.push(StatusRow {
            index: i + 1,
            name: device.name.clone(),
            parent: device.parent_or_unknown().to_string(),
            guid: identity.map_or_else(|| "-".to_string(), |id| id.guid),
            ports: port_summary(&ports),
            daemon,
        });
    }
    Ok(rows)
}

pub fn render_status_table(rows: &[StatusRow]) -> String {
    if rows.is_empty() {
        return "No SMI devices present".to_string();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smi_cfgmgr_test::{commands, endpoint_listing, port_report, process_row, MockHost};

    const GUID: &str = "0x9c63c00300a1b2c3";

    #[tokio::test]
    async fn test_collect_status_rows() {
        let config = SmiConfig::default();
        let host = MockHost::new()
            .respond(
                commands::LIST_ENDPOINTS,
                endpoint_listing(&[("endpoint0", Some("adapter_0")), ("endpoint9", None)]),
            )
            .respond(
                commands::query_ports("endpoint0"),
                port_report("endpoint0", &[(1, "Active", GUID), (2, "Down", "0x9c63c00300a1b2c4")]),
            )
            .with_process_table(
                commands::PROCESS_TABLE,
                [process_row(812, &format!("opensm -g {}", GUID))],
            );

        let rows = collect_status(&host, &config).await.unwrap();
        assert_eq!(
            rows,
            vec![
                StatusRow {
                    index: 1,
                    name: "endpoint0".to_string(),
                    parent: "adapter_0".to_string(),
                    guid: GUID.to_string(),
                    ports: "1:Active 2:Down".to_string(),
                    daemon: "running (pid 812)".to_string(),
                },
                StatusRow {
                    index: 2,
                    name: "endpoint9".to_string(),
                    parent: "unknown".to_string(),
                    guid: "-".to_string(),
                    ports: "-".to_string(),
                    daemon: "-".to_string(),
                },
            ]
        );

        let table = render_status_table(&rows);
        assert!(table.contains("endpoint9"));
        assert!(table.contains("running (pid 812)"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_status_table(&[]), "No SMI devices present");
    }
}
