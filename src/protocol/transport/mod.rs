//! Datagram transport abstraction.
//!
//! Receivers only talk to the [`Transport`] trait, so tests can swap the
//! real socket ([`UdpTransport`]) for [`MockTransport`] and inject
//! synthetic datagrams.

use super::error::TransportError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub mod mock;
mod udp;

pub use mock::MockTransport;
pub use udp::UdpTransport;

/// Non-blocking datagram source owning at most one open endpoint.
pub trait Transport: Send + fmt::Debug {
    /// Binds the endpoint on all interfaces. Opening while already open
    /// succeeds without rebinding.
    fn open(&mut self, port: u16) -> Result<(), TransportError>;

    /// Releases the endpoint. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Port actually bound, useful after opening port `0`.
    fn local_port(&self) -> Option<u16>;

    /// Reads one datagram without blocking.
    ///
    /// Returns `Ok(None)` when nothing is queued. Datagrams longer than
    /// `buffer` are truncated.
    fn try_receive(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, SocketAddr)>, TransportError>;
}

/// True if the sender is anything other than the loopback address.
pub fn is_remote_address(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => ip != Ipv4Addr::LOCALHOST,
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => mapped != Ipv4Addr::LOCALHOST,
            None => ip != Ipv6Addr::LOCALHOST,
        },
    }
}
