//! Interface resolution
//!
//! Maps an interface name to a live [`InterfaceHandle`]. The lookup is read-only and
//! happens once per run; nothing is cached and there is no wait-for-interface retry.

use crate::error::{MroutedError, Result};
use crate::table::RouteTable;
use crate::types::InterfaceHandle;
use tracing::{info, instrument, warn};

/// Resolve `name` through `table`
///
/// Fails with [`MroutedError::InterfaceNotFound`] when the kernel has no such link and
/// with [`MroutedError::Resolution`] for every other failure. A name that does not fit
/// in IFNAMSIZ cannot name any link, so it is reported as not found.
#[instrument(skip(table))]
pub fn resolve_interface<T: RouteTable>(table: &T, name: &str) -> Result<InterfaceHandle> {
    if name.is_empty() {
        return Err(MroutedError::Resolution {
            name: String::new(),
            reason: "interface name is empty".to_string(),
        });
    }

    if name.len() >= libc::IFNAMSIZ {
        return Err(MroutedError::InterfaceNotFound(name.to_string()));
    }

    let handle = table.resolve_link(name).map_err(|e| {
        if e.is_no_device() || e.is_name_too_long() {
            MroutedError::InterfaceNotFound(name.to_string())
        } else {
            MroutedError::Resolution {
                name: name.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !handle.exists() {
        return Err(MroutedError::Resolution {
            name: name.to_string(),
            reason: format!("kernel returned invalid index {}", handle.index),
        });
    }

    if !handle.admin_up {
        warn!(interface = %handle.name, "Interface is administratively down");
    }

    info!(
        interface = %handle.name,
        index = handle.index,
        mtu = ?handle.mtu,
        mac = ?handle.mac_string(),
        up = handle.admin_up,
        "Resolved interface"
    );

    Ok(handle)
}
