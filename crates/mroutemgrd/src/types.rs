//! Core types for multicast route provisioning
//!
//! Every value here is transient: it is built during a single provisioning run,
//! consumed once, and dropped. The kernel routing table is the only persistent store.

use crate::error::{MroutedError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// A live kernel network interface, as reported by `RTM_NEWLINK`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    /// Interface name (e.g., "br-siden")
    pub name: String,
    /// Kernel-assigned index, valid for the lifetime of the interface
    pub index: u32,
    /// Link MTU, when the kernel reports one
    pub mtu: Option<u32>,
    /// Hardware address, when the link has one
    pub mac: Option<Vec<u8>>,
    /// IFF_UP is set on the link
    pub admin_up: bool,
}

impl InterfaceHandle {
    /// Create a handle with only the name and index populated
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            mtu: None,
            mac: None,
            admin_up: false,
        }
    }

    /// A handle is usable downstream only if the kernel gave it a real index
    #[inline]
    pub fn exists(&self) -> bool {
        self.index > 0
    }

    /// Hardware address rendered as colon-separated hex
    pub fn mac_string(&self) -> Option<String> {
        self.mac.as_ref().map(|bytes| {
            bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":")
        })
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(index {})", self.name, self.index)
    }
}

/// A destination network in CIDR form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressBlock {
    base: IpAddr,
    prefix_len: u8,
}

impl AddressBlock {
    /// Create a block, rejecting prefix lengths longer than the address family allows
    pub fn new(base: IpAddr, prefix_len: u8) -> Result<Self> {
        let max = max_prefix_len(&base);
        if prefix_len > max {
            return Err(MroutedError::InvalidAddressBlock(format!(
                "prefix length {} exceeds {} for {}",
                prefix_len, max, base
            )));
        }
        Ok(Self { base, prefix_len })
    }

    /// Const constructor for compiled-in IPv4 blocks
    ///
    /// Panics if `prefix_len > 32`, at compile time when used in a const item. Runtime
    /// input goes through [`AddressBlock::new`].
    pub const fn v4(base: Ipv4Addr, prefix_len: u8) -> Self {
        assert!(prefix_len <= 32, "IPv4 prefix length exceeds 32");
        Self {
            base: IpAddr::V4(base),
            prefix_len,
        }
    }

    pub fn base(&self) -> IpAddr {
        self.base
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn is_ipv4(&self) -> bool {
        self.base.is_ipv4()
    }

    /// Base address lies inside 224.0.0.0/4 or ff00::/8
    pub fn is_multicast(&self) -> bool {
        self.base.is_multicast()
    }

    /// Host bits below the prefix length are all zero
    pub fn is_network_address(&self) -> bool {
        match self.base {
            IpAddr::V4(addr) => {
                let bits = u32::from(addr);
                let mask = u32::MAX
                    .checked_shl(32u32.saturating_sub(self.prefix_len.into()))
                    .unwrap_or(0);
                bits & !mask == 0
            }
            IpAddr::V6(addr) => {
                let bits = u128::from(addr);
                let mask = u128::MAX
                    .checked_shl(128u32.saturating_sub(self.prefix_len.into()))
                    .unwrap_or(0);
                bits & !mask == 0
            }
        }
    }
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix_len)
    }
}

impl FromStr for AddressBlock {
    type Err = MroutedError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.split_once('/').ok_or_else(|| {
            MroutedError::InvalidAddressBlock(format!("missing prefix length in '{}'", s))
        })?;
        let base = addr
            .parse::<IpAddr>()
            .map_err(|e| MroutedError::InvalidAddressBlock(format!("'{}': {}", addr, e)))?;
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|e| MroutedError::InvalidAddressBlock(format!("'{}': {}", prefix, e)))?;
        Self::new(base, prefix_len)
    }
}

/// Kernel route type (RTN_* values from linux/rtnetlink.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RouteClass {
    Unicast = 1,
    Local = 2,
    Broadcast = 3,
    Anycast = 4,
    Multicast = 5,
    Blackhole = 6,
    Unreachable = 7,
    Prohibit = 8,
}

impl RouteClass {
    /// Raw RTN_* value
    pub fn as_kernel(self) -> u8 {
        self as u8
    }

    /// Name as printed by iproute2
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Unicast => "unicast",
            RouteClass::Local => "local",
            RouteClass::Broadcast => "broadcast",
            RouteClass::Anycast => "anycast",
            RouteClass::Multicast => "multicast",
            RouteClass::Blackhole => "blackhole",
            RouteClass::Unreachable => "unreachable",
            RouteClass::Prohibit => "prohibit",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable route descriptor handed to the installer
///
/// Fields are private so a route descriptor cannot be altered after it is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    link_index: u32,
    destination: AddressBlock,
    class: RouteClass,
}

impl RouteSpec {
    pub(crate) fn new(link_index: u32, destination: AddressBlock, class: RouteClass) -> Self {
        Self {
            link_index,
            destination,
            class,
        }
    }

    /// Egress interface index
    pub fn link_index(&self) -> u32 {
        self.link_index
    }

    pub fn destination(&self) -> AddressBlock {
        self.destination
    }

    pub fn class(&self) -> RouteClass {
        self.class
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} dev-index {}",
            self.class, self.destination, self.link_index
        )
    }
}

/// Result of submitting a [`RouteSpec`] to the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Kernel accepted a new entry
    Installed,
    /// Kernel already holds an identical entry (EEXIST)
    AlreadyPresent,
    /// Any other kernel rejection
    Failed(String),
}

impl InstallOutcome {
    /// Installed and AlreadyPresent both leave the table in the desired state
    pub fn is_success(&self) -> bool {
        !matches!(self, InstallOutcome::Failed(_))
    }

    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            InstallOutcome::Installed => "installed",
            InstallOutcome::AlreadyPresent => "already_present",
            InstallOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}
