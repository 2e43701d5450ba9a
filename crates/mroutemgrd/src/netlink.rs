//! rtnetlink access to the kernel routing table
//!
//! Requests are sent on a blocking `NETLINK_ROUTE` socket and replies are matched by
//! sequence number. Adding a route needs CAP_NET_ADMIN; looking up a link does not.

#[cfg(target_os = "linux")]
mod linux {
    use crate::table::{KernelError, RouteTable};
    use crate::types::{InterfaceHandle, RouteSpec};
    use netlink_packet_core::{
        NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage,
        NetlinkPayload,
    };
    use netlink_packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
    use netlink_packet_route::route::{
        RouteAddress, RouteAttribute, RouteHeader, RouteMessage, RouteProtocol, RouteScope,
        RouteType,
    };
    use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing::{debug, instrument, trace};

    /// Receive buffer size; a single link or ack reply fits comfortably
    const RECV_BUFFER_SIZE: usize = 32 * 1024;

    /// Routing table accessed over rtnetlink
    pub struct NetlinkRouteTable {
        socket: Socket,
        sequence: AtomicU32,
    }

    impl NetlinkRouteTable {
        /// Open and connect a netlink socket to the kernel
        #[instrument]
        pub fn new() -> Result<Self, KernelError> {
            let mut socket = Socket::new(NETLINK_ROUTE).map_err(|e| {
                KernelError::transport(format!("Failed to create netlink socket: {}", e))
            })?;
            socket.bind_auto().map_err(|e| {
                KernelError::transport(format!("Failed to bind netlink socket: {}", e))
            })?;
            socket.connect(&SocketAddr::new(0, 0)).map_err(|e| {
                KernelError::transport(format!("Failed to connect netlink socket: {}", e))
            })?;

            debug!("Netlink route socket connected");

            Ok(Self {
                socket,
                sequence: AtomicU32::new(1),
            })
        }

        /// Send one request and collect the replies that belong to it
        ///
        /// With `NLM_F_ACK` set the exchange ends on the kernel ack; without it, on the
        /// first reply message. A kernel error ends the exchange with that errno.
        fn request(
            &self,
            payload: RouteNetlinkMessage,
            flags: u16,
        ) -> Result<Vec<RouteNetlinkMessage>, KernelError> {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

            let mut header = NetlinkHeader::default();
            header.flags = flags;
            header.sequence_number = sequence;

            let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
            packet.finalize();

            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);

            self.socket
                .send(&buf, 0)
                .map_err(|e| KernelError::transport(format!("Failed to send request: {}", e)))?;

            let expect_ack = flags & NLM_F_ACK != 0;
            let mut replies = Vec::new();

            loop {
                let mut rx = Vec::with_capacity(RECV_BUFFER_SIZE);
                let len = self
                    .socket
                    .recv(&mut rx, 0)
                    .map_err(|e| KernelError::transport(format!("Failed to receive: {}", e)))?;

                let mut offset = 0;
                while offset < len {
                    let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&rx[offset..len])
                        .map_err(|e| {
                            KernelError::transport(format!("Failed to parse reply: {}", e))
                        })?;

                    let msg_len = msg.header.length as usize;
                    if msg_len == 0 {
                        return Err(KernelError::transport("Zero-length netlink message"));
                    }
                    // Netlink messages are 4-byte aligned
                    offset = (offset + msg_len + 3) & !3;

                    if msg.header.sequence_number != sequence {
                        trace!(
                            seq = msg.header.sequence_number,
                            expected = sequence,
                            "Skipping unrelated netlink message"
                        );
                        continue;
                    }

                    match msg.payload {
                        NetlinkPayload::Error(err) => {
                            return match err.code {
                                Some(code) => Err(KernelError::from_errno(-code.get())),
                                None => Ok(replies),
                            };
                        }
                        NetlinkPayload::Done(_) => return Ok(replies),
                        NetlinkPayload::InnerMessage(inner) => {
                            replies.push(inner);
                            if !expect_ack {
                                return Ok(replies);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    impl RouteTable for NetlinkRouteTable {
        #[instrument(skip(self))]
        fn resolve_link(&self, name: &str) -> Result<InterfaceHandle, KernelError> {
            let mut message = LinkMessage::default();
            message
                .attributes
                .push(LinkAttribute::IfName(name.to_string()));

            let replies = self.request(RouteNetlinkMessage::GetLink(message), NLM_F_REQUEST)?;

            replies
                .into_iter()
                .find_map(|reply| match reply {
                    RouteNetlinkMessage::NewLink(link) => Some(link_to_handle(link, name)),
                    _ => None,
                })
                .ok_or_else(|| KernelError::transport("No link message in reply"))
        }

        #[instrument(skip(self, spec), fields(route = %spec))]
        fn add_route(&self, spec: &RouteSpec) -> Result<(), KernelError> {
            let message = route_message(spec);
            self.request(
                RouteNetlinkMessage::NewRoute(message),
                NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
            )?;
            debug!("Kernel acknowledged route");
            Ok(())
        }
    }

    /// Build the RTM_NEWROUTE body for a spec: main table, boot protocol, universe scope
    pub(crate) fn route_message(spec: &RouteSpec) -> RouteMessage {
        let destination = spec.destination();

        let mut message = RouteMessage::default();
        message.header.address_family = match destination.base() {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        };
        message.header.destination_prefix_length = destination.prefix_len();
        message.header.table = RouteHeader::RT_TABLE_MAIN;
        message.header.protocol = RouteProtocol::Boot;
        message.header.scope = RouteScope::Universe;
        message.header.kind = RouteType::from(spec.class().as_kernel());

        let address = match destination.base() {
            IpAddr::V4(addr) => RouteAddress::Inet(addr),
            IpAddr::V6(addr) => RouteAddress::Inet6(addr),
        };
        message.attributes.push(RouteAttribute::Destination(address));
        message.attributes.push(RouteAttribute::Oif(spec.link_index()));
        message
    }

    fn link_to_handle(link: LinkMessage, requested: &str) -> InterfaceHandle {
        let mut handle = InterfaceHandle::new(requested, link.header.index);
        handle.admin_up = link.header.flags.contains(LinkFlags::Up);

        for attr in link.attributes {
            match attr {
                LinkAttribute::IfName(name) => handle.name = name,
                LinkAttribute::Mtu(mtu) => handle.mtu = Some(mtu),
                LinkAttribute::Address(mac) => handle.mac = Some(mac),
                _ => {}
            }
        }
        handle
    }

}

#[cfg(target_os = "linux")]
pub use linux::*;

/// Mock implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod mock {
    use crate::table::{KernelError, RouteTable};
    use crate::types::{InterfaceHandle, RouteSpec};

    const UNSUPPORTED: &str = "rtnetlink is only available on Linux";

    pub struct NetlinkRouteTable;

    impl NetlinkRouteTable {
        pub fn new() -> Result<Self, KernelError> {
            Ok(Self)
        }
    }

    impl RouteTable for NetlinkRouteTable {
        fn resolve_link(&self, _name: &str) -> Result<InterfaceHandle, KernelError> {
            Err(KernelError::transport(UNSUPPORTED))
        }

        fn add_route(&self, _spec: &RouteSpec) -> Result<(), KernelError> {
            Err(KernelError::transport(UNSUPPORTED))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use mock::*;
