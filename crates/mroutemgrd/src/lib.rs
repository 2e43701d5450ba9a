//! Multicast route provisioning daemon
//!
//! Resolves a bridge interface by name and installs a single multicast route through
//! it in the kernel routing table, then (by default) keeps serving Prometheus metrics
//! until it is told to stop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │  resolver    │──▶│  route_spec  │──▶│  installer   │──▶│  Linux kernel   │
//! │ (RTM_GETLINK)│   │ (RouteSpec)  │   │(RTM_NEWROUTE)│   │  routing table  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └─────────────────┘
//!         ▲                                    │
//!         └──────────── provision ◀────────────┘
//!                (state machine, metrics)
//! ```

pub mod config;
pub mod error;
pub mod installer;
pub mod metrics;
pub mod metrics_server;
pub mod netlink;
pub mod provision;
pub mod resolver;
pub mod route_spec;
pub mod table;
pub mod types;

pub use config::{Args, Config, RunMode};
pub use error::{MroutedError, Result};
pub use installer::install_route;
pub use metrics::MetricsCollector;
pub use metrics_server::start_metrics_server;
pub use netlink::NetlinkRouteTable;
pub use provision::{ProvisionReport, ProvisionState, Provisioner};
pub use resolver::resolve_interface;
pub use route_spec::{MULTICAST_BLOCK, build_route_spec};
pub use table::{KernelError, RouteTable};
pub use types::{AddressBlock, InstallOutcome, InterfaceHandle, RouteClass, RouteSpec};
