//! Kernel routing-table primitives
//!
//! [`RouteTable`] is the narrow seam between the provisioning core and the kernel:
//! resolve a link by name and add one route. The production implementation is
//! [`crate::netlink::NetlinkRouteTable`]; tests substitute in-memory tables or mocks.

use crate::types::{InterfaceHandle, RouteSpec};
use std::fmt;

/// Error reported by the kernel or by the transport talking to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelError {
    /// Positive errno from the kernel, `None` for transport or parse failures
    pub errno: Option<i32>,
    pub message: String,
}

impl KernelError {
    /// Error carrying a kernel errno, with the message taken from the OS
    pub fn from_errno(errno: i32) -> Self {
        Self {
            errno: Some(errno),
            message: std::io::Error::from_raw_os_error(errno).to_string(),
        }
    }

    /// Error that did not come from a kernel errno
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            errno: None,
            message: message.into(),
        }
    }

    /// Kernel reported the entry already exists
    pub fn is_exists(&self) -> bool {
        self.errno == Some(libc::EEXIST)
    }

    /// Kernel reported no such device
    pub fn is_no_device(&self) -> bool {
        self.errno == Some(libc::ENODEV)
    }

    /// Kernel refused an interface name longer than IFNAMSIZ - 1
    pub fn is_name_too_long(&self) -> bool {
        self.errno == Some(libc::ERANGE)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for KernelError {}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self {
                errno: Some(errno),
                message: err.to_string(),
            },
            None => Self::transport(err.to_string()),
        }
    }
}

/// Blocking access to the kernel routing subsystem
#[cfg_attr(test, mockall::automock)]
pub trait RouteTable {
    /// Look up a link by name
    fn resolve_link(&self, name: &str) -> Result<InterfaceHandle, KernelError>;

    /// Add a route, failing with EEXIST if an identical route is present
    fn add_route(&self, spec: &RouteSpec) -> Result<(), KernelError>;
}

impl<T: RouteTable + ?Sized> RouteTable for &T {
    fn resolve_link(&self, name: &str) -> Result<InterfaceHandle, KernelError> {
        (**self).resolve_link(name)
    }

    fn add_route(&self, spec: &RouteSpec) -> Result<(), KernelError> {
        (**self).add_route(spec)
    }
}
