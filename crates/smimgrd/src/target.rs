//! Desired endpoint set derived from the adapter inventory.

use smi_cfgmgr_common::{SmiError, SmiResult};

use crate::config::NamingConfig;
use crate::types::{LogicalEndpointDevice, PhysicalAdapter};

/// Maps an adapter id to its endpoint device name.
///
/// `adapter_<N>` becomes `endpoint<N>`; `N` is carried through as text.
/// Returns `None` for ids that do not follow the adapter naming rule.
pub fn endpoint_name_for(adapter_id: &str, naming: &NamingConfig) -> Option<String> {
    adapter_id
        .strip_prefix(naming.adapter_prefix.as_str())
        .filter(|index| !index.is_empty())
        .map(|index| format!("{}{}", naming.endpoint_prefix, index))
}

/// Computes one endpoint device per qualifying adapter, in inventory order.
///
/// An empty inventory ends the run: nothing else can be reconciled.
pub fn resolve_desired(
    adapters: &[PhysicalAdapter],
    naming: &NamingConfig,
    adapter_model: &str,
) -> SmiResult<Vec<LogicalEndpointDevice>> {
    let mut desired: Vec<LogicalEndpointDevice> = Vec::with_capacity(adapters.len());

    for adapter in adapters {
        let Some(name) = endpoint_name_for(&adapter.id, naming) else {
            tracing::warn!(adapter = %adapter.id, "Adapter id does not follow the naming rule, skipping");
            continue;
        };
        if desired.iter().any(|d| d.name == name) {
            continue;
        }
        desired.push(LogicalEndpointDevice::bound(name, adapter.id.clone()));
    }

    if desired.is_empty() {
        return Err(SmiError::no_hardware_found(adapter_model));
    }
    Ok(desired)
}
