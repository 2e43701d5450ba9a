//! Integration tests for the provisioning sequence
//!
//! An in-memory routing table stands in for the kernel: it knows a set of links and
//! stores installed routes, answering with the same errno values rtnetlink would.

use mroutemgrd::{
    InstallOutcome, InterfaceHandle, KernelError, MULTICAST_BLOCK, MetricsCollector,
    MroutedError, ProvisionState, Provisioner, RouteClass, RouteSpec, RouteTable,
    build_route_spec, install_route, resolve_interface,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;

/// Routes are keyed the way the kernel keys the main table: destination and type
#[derive(Default)]
struct FakeKernel {
    links: HashMap<String, u32>,
    routes: RefCell<Vec<RouteSpec>>,
}

impl FakeKernel {
    fn with_link(name: &str, index: u32) -> Self {
        let mut kernel = Self::default();
        kernel.links.insert(name.to_string(), index);
        kernel
    }

    fn route_count(&self) -> usize {
        self.routes.borrow().len()
    }

    fn has_route(&self, spec: &RouteSpec) -> bool {
        self.routes.borrow().contains(spec)
    }
}

impl RouteTable for FakeKernel {
    fn resolve_link(&self, name: &str) -> Result<InterfaceHandle, KernelError> {
        match self.links.get(name) {
            Some(&index) => {
                let mut handle = InterfaceHandle::new(name, index);
                handle.mtu = Some(1500);
                handle.admin_up = true;
                Ok(handle)
            }
            None => Err(KernelError::from_errno(libc::ENODEV)),
        }
    }

    fn add_route(&self, spec: &RouteSpec) -> Result<(), KernelError> {
        if !self.links.values().any(|&index| index == spec.link_index()) {
            return Err(KernelError::from_errno(libc::ENODEV));
        }
        let mut routes = self.routes.borrow_mut();
        if routes
            .iter()
            .any(|r| r.destination() == spec.destination() && r.class() == spec.class())
        {
            return Err(KernelError::from_errno(libc::EEXIST));
        }
        routes.push(spec.clone());
        Ok(())
    }
}

fn metrics() -> MetricsCollector {
    MetricsCollector::new().expect("metrics registry")
}

#[test]
fn test_resolve_returns_positive_index_and_name() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let handle = resolve_interface(&kernel, "br-siden").unwrap();
    assert_eq!(handle.name, "br-siden");
    assert!(handle.index > 0);
}

#[test]
fn test_resolve_absent_interface() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let err = resolve_interface(&kernel, "br-other").unwrap_err();
    assert!(matches!(err, MroutedError::InterfaceNotFound(_)));
}

#[test]
fn test_install_makes_route_observable() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let handle = resolve_interface(&kernel, "br-siden").unwrap();
    let spec = build_route_spec(&handle, MULTICAST_BLOCK, RouteClass::Multicast);

    assert_eq!(install_route(&kernel, &spec), InstallOutcome::Installed);
    assert!(kernel.has_route(&spec));
}

#[test]
fn test_second_install_is_already_present() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let handle = resolve_interface(&kernel, "br-siden").unwrap();
    let spec = build_route_spec(&handle, MULTICAST_BLOCK, RouteClass::Multicast);

    assert_eq!(install_route(&kernel, &spec), InstallOutcome::Installed);
    assert_eq!(install_route(&kernel, &spec), InstallOutcome::AlreadyPresent);
    assert_eq!(kernel.route_count(), 1);
}

#[test]
fn test_install_with_dead_index_fails() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let ghost = InterfaceHandle::new("br-ghost", 99);
    let spec = build_route_spec(&ghost, MULTICAST_BLOCK, RouteClass::Multicast);

    let outcome = install_route(&kernel, &spec);
    assert!(matches!(outcome, InstallOutcome::Failed(_)));
    assert_eq!(kernel.route_count(), 0);
}

#[test]
fn test_dead_index_is_fatal_for_orchestrator() {
    // Link resolves, but the kernel refuses the index on install
    struct StaleLink;
    impl RouteTable for StaleLink {
        fn resolve_link(&self, name: &str) -> Result<InterfaceHandle, KernelError> {
            Ok(InterfaceHandle::new(name, 99))
        }
        fn add_route(&self, _spec: &RouteSpec) -> Result<(), KernelError> {
            Err(KernelError::from_errno(libc::ENODEV))
        }
    }

    let mut provisioner = Provisioner::new(StaleLink, metrics());
    let err = provisioner.run("br-siden").unwrap_err();
    assert!(matches!(err, MroutedError::InstallFailed { .. }));
    assert_eq!(provisioner.state(), ProvisionState::Fatal);
}

#[test]
fn test_end_to_end_runs() {
    let kernel = FakeKernel::with_link("br-siden", 4);
    let expected = build_route_spec(
        &InterfaceHandle::new("br-siden", 4),
        "232.0.0.0/8".parse().unwrap(),
        RouteClass::Multicast,
    );

    // First run installs
    let mut first = Provisioner::new(&kernel, metrics());
    let report = first.run("br-siden").unwrap();
    assert_eq!(report.route, expected);
    assert_eq!(report.route.link_index(), 4);
    assert_eq!(report.outcome, InstallOutcome::Installed);
    assert_eq!(first.state(), ProvisionState::Done);

    // Second run against the unchanged table is idempotent
    let mut second = Provisioner::new(&kernel, metrics());
    let report = second.run("br-siden").unwrap();
    assert_eq!(report.outcome, InstallOutcome::AlreadyPresent);
    assert_eq!(second.state(), ProvisionState::Done);
    assert_eq!(kernel.route_count(), 1);

    // Bridge renamed: resolution fails and nothing is installed
    let renamed = FakeKernel::with_link("br-renamed", 4);
    let mut third = Provisioner::new(&renamed, metrics());
    let err = third.run("br-siden").unwrap_err();
    assert!(matches!(err, MroutedError::InterfaceNotFound(ref name) if name == "br-siden"));
    assert_eq!(third.state(), ProvisionState::Fatal);
    assert_eq!(renamed.route_count(), 0);
}
