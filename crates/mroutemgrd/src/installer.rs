//! Route installation
//!
//! Submits a [`RouteSpec`] to the kernel and classifies the result. A duplicate route
//! (EEXIST) is reported as [`InstallOutcome::AlreadyPresent`] so repeated runs against
//! an unchanged host are idempotent.

use crate::table::RouteTable;
use crate::types::{InstallOutcome, RouteSpec};
use tracing::{info, instrument, warn};

/// Add `spec` to the kernel routing table
#[instrument(skip(table, spec), fields(route = %spec))]
pub fn install_route<T: RouteTable>(table: &T, spec: &RouteSpec) -> InstallOutcome {
    match table.add_route(spec) {
        Ok(()) => {
            info!("Route installed");
            InstallOutcome::Installed
        }
        Err(e) if e.is_exists() => {
            info!("Route already present");
            InstallOutcome::AlreadyPresent
        }
        Err(e) => {
            warn!(error = %e, errno = ?e.errno, "Kernel rejected route");
            InstallOutcome::Failed(e.to_string())
        }
    }
}
