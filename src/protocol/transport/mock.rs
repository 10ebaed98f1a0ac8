//! In-memory transport for tests and offline tools.

use super::Transport;
use crate::protocol::error::TransportError;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle to a scripted datagram queue.
///
/// Clones share state, so a test can keep one handle to inject datagrams
/// while a receiver owns another.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    queue: VecDeque<(Vec<u8>, SocketAddr)>,
    open_port: Option<u16>,
    fail_open: bool,
    open_count: usize,
    close_count: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a datagram as if sent from `sender`.
    pub fn inject(&self, data: &[u8], sender: SocketAddr) {
        self.lock().queue.push_back((data.to_vec(), sender));
    }

    /// Queues a datagram from `127.0.0.1`.
    pub fn inject_local(&self, data: &[u8]) {
        self.inject(data, SocketAddr::from((Ipv4Addr::LOCALHOST, 50000)));
    }

    /// Makes every following `open` fail until cleared.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Datagrams not yet consumed.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of successful opens that actually bound (reopen no-ops excluded).
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Number of closes that released an open endpoint.
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for MockTransport {
    fn open(&mut self, port: u16) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.open_port.is_some() {
            return Ok(());
        }
        if inner.fail_open {
            return Err(TransportError::Refused(format!("mock refused port {}", port)));
        }
        // stand-in for an ephemeral port
        inner.open_port = Some(if port == 0 { 49152 } else { port });
        inner.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.lock();
        if inner.open_port.take().is_some() {
            inner.close_count += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.lock().open_port.is_some()
    }

    fn local_port(&self) -> Option<u16> {
        self.lock().open_port
    }

    fn try_receive(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        let mut inner = self.lock();
        if inner.open_port.is_none() {
            return Err(TransportError::NotOpen);
        }

        Ok(inner.queue.pop_front().map(|(data, sender)| {
            let len = data.len().min(buffer.len());
            buffer[..len].copy_from_slice(&data[..len]);
            (len, sender)
        }))
    }
}
