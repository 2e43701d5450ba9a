//! Provisioning orchestration
//!
//! Runs resolve → build → install exactly once:
//!
//! ```text
//! Start → Resolving ─┬─▶ Building → Installing ─┬─▶ Done   (Installed | AlreadyPresent)
//!                    └─▶ Fatal                  └─▶ Fatal  (Failed)
//! ```
//!
//! Fatal conditions are returned as errors; the caller decides how to terminate.

use crate::error::{MroutedError, Result};
use crate::installer::install_route;
use crate::metrics::MetricsCollector;
use crate::resolver::resolve_interface;
use crate::route_spec::{MULTICAST_BLOCK, build_route_spec};
use crate::table::RouteTable;
use crate::types::{AddressBlock, InstallOutcome, InterfaceHandle, RouteClass, RouteSpec};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

const METRIC_FUNCTION: &str = "provision";

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Start,
    Resolving,
    Building,
    Installing,
    Done,
    Fatal,
}

impl ProvisionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisionState::Done | ProvisionState::Fatal)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionState::Start => "start",
            ProvisionState::Resolving => "resolving",
            ProvisionState::Building => "building",
            ProvisionState::Installing => "installing",
            ProvisionState::Done => "done",
            ProvisionState::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub interface: InterfaceHandle,
    pub route: RouteSpec,
    /// Either `Installed` or `AlreadyPresent`
    pub outcome: InstallOutcome,
}

/// Single-pass route provisioner
pub struct Provisioner<T: RouteTable> {
    table: T,
    metrics: MetricsCollector,
    destination: AddressBlock,
    class: RouteClass,
    state: ProvisionState,
}

impl<T: RouteTable> Provisioner<T> {
    /// Provisioner for the compiled-in multicast block
    pub fn new(table: T, metrics: MetricsCollector) -> Self {
        Self {
            table,
            metrics,
            destination: MULTICAST_BLOCK,
            class: RouteClass::Multicast,
            state: ProvisionState::Start,
        }
    }

    /// Override the destination block and route type
    pub fn with_destination(mut self, destination: AddressBlock, class: RouteClass) -> Self {
        self.destination = destination;
        self.class = class;
        self
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    fn transition(&mut self, next: ProvisionState) {
        debug!(from = %self.state, to = %next, "Provisioning state transition");
        self.state = next;
    }

    /// Run the sequence against `interface_name`
    ///
    /// A provisioner runs once; calling `run` again returns [`MroutedError::AlreadyRan`].
    pub fn run(&mut self, interface_name: &str) -> Result<ProvisionReport> {
        if self.state != ProvisionState::Start {
            return Err(MroutedError::AlreadyRan(self.state.to_string()));
        }

        self.transition(ProvisionState::Resolving);
        let started = Instant::now();
        let resolved = resolve_interface(&self.table, interface_name);
        self.metrics.observe(
            METRIC_FUNCTION,
            "resolve",
            "duration",
            started.elapsed().as_secs_f64(),
        );
        let interface = match resolved {
            Ok(handle) => {
                self.metrics.inc(METRIC_FUNCTION, "resolve", "count");
                handle
            }
            Err(e) => {
                self.metrics.inc(METRIC_FUNCTION, "resolve", "error");
                self.transition(ProvisionState::Fatal);
                return Err(e);
            }
        };

        self.transition(ProvisionState::Building);
        let route = build_route_spec(&interface, self.destination, self.class);
        self.metrics.inc(METRIC_FUNCTION, "build", "count");
        info!(
            route = %route,
            link_index = route.link_index(),
            destination = %route.destination(),
            class = %route.class(),
            "Built route"
        );

        self.transition(ProvisionState::Installing);
        let started = Instant::now();
        let outcome = install_route(&self.table, &route);
        self.metrics.observe(
            METRIC_FUNCTION,
            "install",
            "duration",
            started.elapsed().as_secs_f64(),
        );
        self.metrics.inc(METRIC_FUNCTION, "install", outcome.label());

        match outcome {
            InstallOutcome::Failed(reason) => {
                self.transition(ProvisionState::Fatal);
                Err(MroutedError::InstallFailed {
                    route: route.to_string(),
                    reason,
                })
            }
            outcome => {
                self.transition(ProvisionState::Done);
                info!(
                    interface = %interface.name,
                    route = %route,
                    outcome = %outcome,
                    "Provisioning complete"
                );
                Ok(ProvisionReport {
                    interface,
                    route,
                    outcome,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{KernelError, MockRouteTable};

    fn metrics() -> MetricsCollector {
        MetricsCollector::new().unwrap()
    }

    fn bridge_table(index: u32) -> MockRouteTable {
        let mut table = MockRouteTable::new();
        table
            .expect_resolve_link()
            .returning(move |name| Ok(InterfaceHandle::new(name, index)));
        table
    }

    #[test]
    fn test_run_installs_route() {
        let mut table = bridge_table(4);
        table
            .expect_add_route()
            .withf(|spec| spec.link_index() == 4 && spec.destination() == MULTICAST_BLOCK)
            .times(1)
            .returning(|_| Ok(()));

        let collector = metrics();
        let mut provisioner = Provisioner::new(table, collector.clone());
        let report = provisioner.run("br-siden").unwrap();

        assert_eq!(report.outcome, InstallOutcome::Installed);
        assert_eq!(report.route.class(), RouteClass::Multicast);
        assert_eq!(provisioner.state(), ProvisionState::Done);
        assert_eq!(collector.count("provision", "install", "installed"), 1.0);
    }

    #[test]
    fn test_run_already_present_is_done() {
        let mut table = bridge_table(4);
        table
            .expect_add_route()
            .returning(|_| Err(KernelError::from_errno(libc::EEXIST)));

        let mut provisioner = Provisioner::new(table, metrics());
        let report = provisioner.run("br-siden").unwrap();

        assert_eq!(report.outcome, InstallOutcome::AlreadyPresent);
        assert_eq!(provisioner.state(), ProvisionState::Done);
    }

    #[test]
    fn test_missing_interface_never_installs() {
        let mut table = MockRouteTable::new();
        table
            .expect_resolve_link()
            .returning(|_| Err(KernelError::from_errno(libc::ENODEV)));
        table.expect_add_route().times(0);

        let collector = metrics();
        let mut provisioner = Provisioner::new(table, collector.clone());
        let err = provisioner.run("br-siden").unwrap_err();

        assert!(matches!(err, MroutedError::InterfaceNotFound(_)));
        assert_eq!(provisioner.state(), ProvisionState::Fatal);
        assert_eq!(collector.count("provision", "resolve", "error"), 1.0);
    }

    #[test]
    fn test_install_failure_is_fatal() {
        let mut table = bridge_table(4);
        table
            .expect_add_route()
            .returning(|_| Err(KernelError::from_errno(libc::EPERM)));

        let mut provisioner = Provisioner::new(table, metrics());
        let err = provisioner.run("br-siden").unwrap_err();

        assert!(matches!(err, MroutedError::InstallFailed { .. }));
        assert_eq!(err.operation(), "install route");
        assert!(provisioner.state().is_terminal());
    }

    #[test]
    fn test_run_only_once() {
        let mut table = bridge_table(4);
        table.expect_add_route().times(1).returning(|_| Ok(()));

        let mut provisioner = Provisioner::new(table, metrics());
        provisioner.run("br-siden").unwrap();

        let err = provisioner.run("br-siden").unwrap_err();
        assert!(matches!(err, MroutedError::AlreadyRan(ref state) if state == "done"));
        assert_eq!(err.operation(), "provision");
        assert_eq!(provisioner.state(), ProvisionState::Done);
    }

    #[test]
    fn test_metrics_follow_outcomes() {
        let mut first = bridge_table(4);
        first.expect_add_route().returning(|_| Ok(()));
        let mut second = bridge_table(4);
        second
            .expect_add_route()
            .returning(|_| Err(KernelError::from_errno(libc::EEXIST)));

        let collector = metrics();
        Provisioner::new(first, collector.clone())
            .run("br-siden")
            .unwrap();
        Provisioner::new(second, collector.clone())
            .run("br-siden")
            .unwrap();

        assert_eq!(collector.count("provision", "resolve", "count"), 2.0);
        assert_eq!(collector.count("provision", "install", "installed"), 1.0);
        assert_eq!(collector.count("provision", "install", "already_present"), 1.0);
    }

    #[test]
    fn test_custom_destination() {
        let block: AddressBlock = "239.0.0.0/8".parse().unwrap();
        let mut table = bridge_table(9);
        table
            .expect_add_route()
            .withf(move |spec| spec.destination() == block)
            .returning(|_| Ok(()));

        let mut provisioner =
            Provisioner::new(table, metrics()).with_destination(block, RouteClass::Multicast);
        let report = provisioner.run("br0").unwrap();
        assert_eq!(report.route.link_index(), 9);
    }
}
