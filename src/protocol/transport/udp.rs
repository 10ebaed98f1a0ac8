use super::Transport;
use crate::protocol::error::TransportError;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, info};

/// Non-blocking UDP socket bound to `0.0.0.0:port`.
#[derive(Debug, Default)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for UdpTransport {
    fn open(&mut self, port: u16) -> Result<(), TransportError> {
        if self.socket.is_some() {
            debug!("UDP transport already open, ignoring open on port {}", port);
            return Ok(());
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { port, source })?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::NonBlocking)?;

        info!(
            "UDP transport bound to {}",
            socket.local_addr().unwrap_or(addr)
        );
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            debug!("Closing UDP transport {:?}", socket.local_addr().ok());
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
            .map(|addr| addr.port())
    }

    fn try_receive(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        match socket.recv_from(buffer) {
            Ok((len, sender)) => Ok(Some((len, sender))),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            // Windows reports ICMP port-unreachable from an earlier send this way
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(TransportError::Receive(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::OpenTrackPacket;
    use std::time::{Duration, Instant};

    #[test]
    fn test_open_is_idempotent_and_close_too() {
        let mut transport = UdpTransport::new();
        transport.open(0).expect("bind ephemeral port");
        let port = transport.local_port().expect("bound port");
        assert!(port != 0);

        transport.open(0).expect("reopen is a no-op");
        assert_eq!(transport.local_port(), Some(port));

        transport.close();
        transport.close();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.try_receive(&mut [0u8; 8]),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn test_empty_socket_would_block() {
        let mut transport = UdpTransport::new();
        transport.open(0).expect("bind ephemeral port");
        let mut buffer = [0u8; 64];
        assert!(transport.try_receive(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_receives_loopback_datagram() {
        let mut transport = UdpTransport::new();
        transport.open(0).expect("bind ephemeral port");
        let port = transport.local_port().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(&OpenTrackPacket::encode(1.0, 2.0, 3.0), ("127.0.0.1", port))
            .unwrap();

        let mut buffer = [0u8; 256];
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some((len, from)) = transport.try_receive(&mut buffer).unwrap() {
                assert_eq!(len, 48);
                assert!(from.ip().is_loopback());
                break;
            }
            assert!(Instant::now() < deadline, "datagram never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let holder = UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let mut transport = UdpTransport::new();
        let err = transport.open(port).unwrap_err();
        assert!(matches!(err, TransportError::Bind { port: p, .. } if p == port));
        assert!(!transport.is_open());
    }
}
