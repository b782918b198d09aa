//! IPv6/UDP transport binding `leader_election_core::DatagramTransport` to a
//! real socket. Grounded on the teacher's `LinuxPnetInterface`
//! (`powerlink-io-linux/src/lib.rs`): a thin adapter struct implementing the
//! core crate's HAL trait, translated from a raw-Ethernet channel to a
//! non-blocking IPv6/UDP socket since this protocol's actual transport is
//! link-local multicast/unicast UDP (spec.md Sec. 1, 6), not raw frames.

use leader_election_core::{DatagramTransport, LeaderElectionError, NodeId};
use log::{trace, warn};
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::time::Duration;

/// A non-blocking IPv6/UDP socket bound to one node's link-local address,
/// joined to the all-nodes multicast group.
///
/// `scope_id` is the numeric interface index (e.g. as reported by `ip link`)
/// — required by the kernel to disambiguate a link-local address across
/// multiple interfaces, and simplest to take as a plain parameter rather than
/// pull in an extra dependency just to resolve an interface name to an
/// index.
pub struct UdpIpv6Transport {
    socket: UdpSocket,
    local_id: NodeId,
    scope_id: u32,
    port: u16,
    multicast_addr: Ipv6Addr,
}

impl UdpIpv6Transport {
    /// Binds a socket on `local_addr` (expected to be an `fe80::...`
    /// link-local address) and joins the link-local all-nodes multicast
    /// group on `scope_id` (spec.md Sec. 6: `ff02::1`, default port 3142).
    pub fn bind(local_addr: Ipv6Addr, scope_id: u32, port: u16) -> Result<Self, LeaderElectionError> {
        let bind_addr = SocketAddrV6::new(local_addr, port, 0, scope_id);
        let socket = UdpSocket::bind(bind_addr).map_err(|_| LeaderElectionError::IoError)?;
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .map_err(|_| LeaderElectionError::IoError)?;

        let multicast_addr: Ipv6Addr = leader_election_core::types::MULTICAST_ALL_NODES
            .parse()
            .expect("MULTICAST_ALL_NODES is a valid literal");
        socket
            .join_multicast_v6(&multicast_addr, scope_id)
            .map_err(|_| LeaderElectionError::IoError)?;

        let local_id = NodeId::from_full(&local_addr.to_string());

        Ok(Self {
            socket,
            local_id,
            scope_id,
            port,
            multicast_addr,
        })
    }

    fn resolve(&self, dest: &NodeId) -> Result<SocketAddrV6, LeaderElectionError> {
        let addr: Ipv6Addr = dest.full().parse().map_err(|_| LeaderElectionError::InvalidNodeId)?;
        Ok(SocketAddrV6::new(addr, self.port, 0, self.scope_id))
    }
}

impl DatagramTransport for UdpIpv6Transport {
    fn send_unicast(&mut self, dest: &NodeId, frame: &[u8]) -> Result<(), LeaderElectionError> {
        let addr = self.resolve(dest)?;
        self.socket
            .send_to(frame, addr)
            .map_err(|_| LeaderElectionError::IoError)?;
        Ok(())
    }

    fn send_multicast(&mut self, frame: &[u8]) -> Result<(), LeaderElectionError> {
        let addr = SocketAddrV6::new(self.multicast_addr, self.port, 0, self.scope_id);
        self.socket
            .send_to(frame, addr)
            .map_err(|_| LeaderElectionError::IoError)?;
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, NodeId)>, LeaderElectionError> {
        match self.socket.recv_from(buffer) {
            Ok((len, SocketAddr::V6(addr))) => {
                let id = NodeId::from_full(&addr.ip().to_string());
                trace!("recv {} bytes from {}", len, id);
                Ok(Some((len, id)))
            }
            Ok((_, SocketAddr::V4(addr))) => {
                warn!("dropping unexpected IPv4 datagram from {}", addr);
                Ok(None)
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => Ok(None),
            Err(_) => Err(LeaderElectionError::IoError),
        }
    }

    fn local_node_id(&self) -> NodeId {
        self.local_id.clone()
    }
}
