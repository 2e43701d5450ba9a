//! Route descriptor construction
//!
//! Building is pure: the same handle and block always give an equal [`RouteSpec`],
//! so the descriptor can be logged and compared before the kernel is touched.

use crate::types::{AddressBlock, InterfaceHandle, RouteClass, RouteSpec};
use std::net::Ipv4Addr;
use tracing::warn;

/// Source-specific multicast range routed through the bridge
pub const MULTICAST_BLOCK: AddressBlock = AddressBlock::v4(Ipv4Addr::new(232, 0, 0, 0), 8);

/// Build the route descriptor for `block` through `handle`
pub fn build_route_spec(
    handle: &InterfaceHandle,
    block: AddressBlock,
    class: RouteClass,
) -> RouteSpec {
    if !block.is_network_address() {
        warn!(block = %block, "Destination has host bits set below the prefix");
    }
    if class == RouteClass::Multicast && !block.is_multicast() {
        warn!(block = %block, "Multicast route for a non-multicast destination");
    }

    RouteSpec::new(handle.index, block, class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::IpAddr;

    #[test]
    fn test_multicast_block_constant() {
        assert_eq!(MULTICAST_BLOCK.to_string(), "232.0.0.0/8");
        assert!(MULTICAST_BLOCK.is_network_address());
        assert!(MULTICAST_BLOCK.is_multicast());
    }

    #[test]
    fn test_build_references_handle_and_block() {
        let handle = InterfaceHandle::new("br-siden", 4);
        let spec = build_route_spec(&handle, MULTICAST_BLOCK, RouteClass::Multicast);

        assert_eq!(spec.link_index(), 4);
        assert_eq!(spec.destination(), MULTICAST_BLOCK);
        assert_eq!(spec.class(), RouteClass::Multicast);
        assert_eq!(spec.to_string(), "multicast 232.0.0.0/8 dev-index 4");
    }

    #[test]
    fn test_build_is_deterministic() {
        let handle = InterfaceHandle::new("br-siden", 4);
        let first = build_route_spec(&handle, MULTICAST_BLOCK, RouteClass::Multicast);
        let second = build_route_spec(&handle, MULTICAST_BLOCK, RouteClass::Multicast);
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_keeps_prefix_unchanged() {
        let handle = InterfaceHandle::new("br0", 7);
        let block = AddressBlock::new(IpAddr::V4(Ipv4Addr::new(239, 1, 0, 0)), 16).unwrap();
        let spec = build_route_spec(&handle, block, RouteClass::Multicast);
        assert_eq!(spec.destination().prefix_len(), 16);
        assert_eq!(spec.destination().base(), block.base());
    }

    #[test]
    fn test_build_ipv6_block() {
        let handle = InterfaceHandle::new("br0", 7);
        let block: AddressBlock = "ff3e::/32".parse().unwrap();
        let spec = build_route_spec(&handle, block, RouteClass::Multicast);
        assert_eq!(spec.destination(), block);
    }
}
