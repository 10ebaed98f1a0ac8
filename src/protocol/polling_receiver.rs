//! Single-threaded receiver drained explicitly once per caller tick.
//!
//! Same semantics as [`UdpReceiver`](super::udp_receiver::UdpReceiver)
//! without a background thread, for game loops that prefer to pull data
//! themselves. Everything here must be driven from one thread.

use super::error::TransportError;
use super::packet::{OpenTrackPacket, DEFAULT_PORT};
use super::transport::{is_remote_address, Transport, UdpTransport};
use crate::pose::Pose;
use crate::processing::CenterOffsetManager;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Silence after which [`PollingUdpReceiver::is_connected`] turns false.
///
/// Twice the threaded receiver's timeout: the caller decides the poll
/// cadence and frame times can spike.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Hard cap on datagrams drained per [`PollingUdpReceiver::poll`] call.
pub const MAX_PACKETS_PER_POLL: usize = 1000;

pub const MAX_BUFFER_SIZE: usize = 256;

/// Counters for one initialize/shutdown session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReceiverStats {
    /// Valid datagrams only; malformed ones are not counted.
    pub packets_received: u64,
    pub bytes_received: u64,
    /// Wall-clock time of the last good datagram, for display and logs.
    pub last_activity: Option<DateTime<Local>>,
}

/// OpenTrack receiver with no thread of its own.
///
/// Call [`initialize`](Self::initialize) once, then [`poll`](Self::poll)
/// every frame to drain pending datagrams and keep the newest valid pose.
/// [`shutdown`](Self::shutdown) closes the socket; the receiver can be
/// initialized again afterwards.
///
/// ```no_run
/// use headtrack::protocol::PollingUdpReceiver;
///
/// let mut receiver = PollingUdpReceiver::new();
/// if receiver.initialize(4242) {
///     receiver.poll();
///     if let Some((yaw, pitch, roll)) = receiver.rotation() {
///         println!("{yaw} {pitch} {roll}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct PollingUdpReceiver {
    transport: Box<dyn Transport>,
    initialized: bool,
    latest: Option<Pose>,
    offset: CenterOffsetManager,
    last_receive: Option<Instant>,
    is_remote: bool,
    stats: ReceiverStats,
    buffer: [u8; MAX_BUFFER_SIZE],
}

impl Default for PollingUdpReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingUdpReceiver {
    pub fn new() -> Self {
        Self::with_transport(Box::new(UdpTransport::new()))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            initialized: false,
            latest: None,
            offset: CenterOffsetManager::new(),
            last_receive: None,
            is_remote: false,
            stats: ReceiverStats::default(),
            buffer: [0u8; MAX_BUFFER_SIZE],
        }
    }

    pub fn initialize_default(&mut self) -> bool {
        self.initialize(DEFAULT_PORT)
    }

    /// Opens the transport and clears all state and statistics.
    ///
    /// Returns `false` if the transport could not be opened; the error is
    /// logged. Initializing twice succeeds without touching state.
    pub fn initialize(&mut self, port: u16) -> bool {
        match self.try_initialize(port) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to initialize polling receiver on port {}: {}",
                    port, e
                );
                false
            }
        }
    }

    pub fn try_initialize(&mut self, port: u16) -> Result<(), TransportError> {
        if self.initialized {
            return Ok(());
        }

        self.transport.open(port)?;

        self.initialized = true;
        self.latest = None;
        self.offset.reset();
        self.last_receive = None;
        self.is_remote = false;
        self.stats = ReceiverStats::default();
        self.buffer.fill(0);

        info!(
            "Polling receiver initialized on port {:?}",
            self.transport.local_port()
        );
        Ok(())
    }

    /// Closes the transport and clears the pose, offset and connection
    /// state. Statistics stay readable until the next initialize.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.transport.close();
        self.initialized = false;
        self.latest = None;
        self.offset.reset();
        self.last_receive = None;
        self.is_remote = false;
        info!(
            "Polling receiver shut down after {} packets",
            self.stats.packets_received
        );
    }

    /// Drains queued datagrams, keeping only the newest valid pose.
    ///
    /// Stops at would-block or after [`MAX_PACKETS_PER_POLL`] datagrams;
    /// anything beyond the cap stays queued for the next call. Returns true
    /// if at least one datagram parsed during this call.
    pub fn poll(&mut self) -> bool {
        if !self.initialized || !self.transport.is_open() {
            return false;
        }

        let mut received_any = false;
        let mut drained = 0;

        while drained < MAX_PACKETS_PER_POLL {
            let (len, sender) = match self.transport.try_receive(&mut self.buffer) {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) => {
                    debug!("Polling receive stopped early: {}", e);
                    break;
                }
            };
            drained += 1;

            let Some(pose) = OpenTrackPacket::try_parse(&self.buffer[..len]) else {
                trace!("Ignored {} byte datagram from {}", len, sender);
                continue;
            };

            self.latest = Some(pose);
            self.is_remote = is_remote_address(&sender);
            self.stats.packets_received += 1;
            self.stats.bytes_received += len as u64;
            received_any = true;
        }

        if drained == MAX_PACKETS_PER_POLL {
            debug!("Poll hit the {} datagram cap", MAX_PACKETS_PER_POLL);
        }

        if received_any {
            self.last_receive = Some(Instant::now());
            self.stats.last_activity = Some(Local::now());
        }

        received_any
    }

    /// Latest pose with the offset applied, keeping its capture timestamp.
    pub fn pose(&self) -> Option<Pose> {
        let mut pose = self.latest?;
        self.offset
            .apply_offset(&mut pose.yaw, &mut pose.pitch, &mut pose.roll);
        Some(pose)
    }

    pub fn rotation(&self) -> Option<(f32, f32, f32)> {
        self.pose().map(|pose| pose.rotation())
    }

    pub fn raw_rotation(&self) -> Option<(f32, f32, f32)> {
        self.latest.map(|pose| pose.rotation())
    }

    /// Uses the latest pose as the new zero. No-op before any data.
    pub fn recenter(&mut self) {
        if let Some(pose) = self.latest {
            self.offset.set_center(&pose);
            debug!(
                "Recentered at ({:.2}, {:.2}, {:.2})",
                pose.yaw, pose.pitch, pose.roll
            );
        }
    }

    pub fn reset_offset(&mut self) {
        self.offset.reset();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_connected(&self) -> bool {
        if !self.initialized {
            return false;
        }
        self.last_receive
            .is_some_and(|at| at.elapsed() < CONNECTION_TIMEOUT)
    }

    pub fn is_remote_connection(&self) -> bool {
        self.is_remote
    }

    pub fn local_port(&self) -> Option<u16> {
        self.transport.local_port()
    }

    pub fn packets_received(&self) -> u64 {
        self.stats.packets_received
    }

    pub fn bytes_received(&self) -> u64 {
        self.stats.bytes_received
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

impl Drop for PollingUdpReceiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::transport::MockTransport;

    fn receiver_with_mock() -> (PollingUdpReceiver, MockTransport) {
        let mock = MockTransport::new();
        let mut receiver = PollingUdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.initialize(DEFAULT_PORT));
        (receiver, mock)
    }

    #[test]
    fn test_no_data_before_first_packet() {
        let (mut receiver, _mock) = receiver_with_mock();
        assert!(!receiver.poll());
        assert!(receiver.pose().is_none());
        assert!(receiver.rotation().is_none());
        assert!(receiver.raw_rotation().is_none());
        assert!(!receiver.is_connected());
    }

    #[test]
    fn test_poll_keeps_only_last_valid_packet() {
        let (mut receiver, mock) = receiver_with_mock();
        mock.inject_local(&OpenTrackPacket::encode(1.0, 1.0, 1.0));
        mock.inject_local(&OpenTrackPacket::encode(2.0, 2.0, 2.0));
        mock.inject_local(&OpenTrackPacket::encode(3.0, -3.0, 0.5));
        mock.inject_local(&[0u8; 10]);

        assert!(receiver.poll());
        assert_eq!(receiver.raw_rotation(), Some((3.0, -3.0, 0.5)));
        assert_eq!(receiver.packets_received(), 3);
        assert_eq!(receiver.bytes_received(), 3 * 48);
        assert!(receiver.is_connected());
        assert!(receiver.stats().last_activity.is_some());
    }

    #[test]
    fn test_malformed_only_poll_returns_false() {
        let (mut receiver, mock) = receiver_with_mock();
        mock.inject_local(&[1u8; 47]);
        mock.inject_local(&OpenTrackPacket::encode(f64::INFINITY, 0.0, 0.0));

        assert!(!receiver.poll());
        assert_eq!(receiver.packets_received(), 0);
        assert_eq!(receiver.bytes_received(), 0);
        assert!(receiver.raw_rotation().is_none());
        assert!(!receiver.is_connected());
    }

    #[test]
    fn test_poll_respects_iteration_cap() {
        let (mut receiver, mock) = receiver_with_mock();
        let packet = OpenTrackPacket::encode(5.0, 0.0, 0.0);
        for _ in 0..MAX_PACKETS_PER_POLL + 5 {
            mock.inject_local(&packet);
        }

        assert!(receiver.poll());
        assert_eq!(mock.pending(), 5);
        assert_eq!(receiver.packets_received(), MAX_PACKETS_PER_POLL as u64);

        assert!(receiver.poll());
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn test_recenter_and_reset_offset() {
        let (mut receiver, mock) = receiver_with_mock();

        receiver.recenter();
        mock.inject_local(&OpenTrackPacket::encode(10.0, 20.0, 30.0));
        receiver.poll();

        receiver.recenter();
        assert_eq!(receiver.rotation(), Some((0.0, 0.0, 0.0)));
        assert_eq!(receiver.raw_rotation(), Some((10.0, 20.0, 30.0)));

        mock.inject_local(&OpenTrackPacket::encode(15.0, 20.0, 25.0));
        receiver.poll();
        assert_eq!(receiver.rotation(), Some((5.0, 0.0, -5.0)));

        receiver.reset_offset();
        assert_eq!(receiver.rotation(), Some((15.0, 20.0, 25.0)));
    }

    #[test]
    fn test_remote_classification_follows_latest_sender() {
        let (mut receiver, mock) = receiver_with_mock();
        mock.inject(
            &OpenTrackPacket::encode(1.0, 0.0, 0.0),
            "10.1.2.3:9000".parse().unwrap(),
        );
        receiver.poll();
        assert!(receiver.is_remote_connection());

        mock.inject_local(&OpenTrackPacket::encode(1.0, 0.0, 0.0));
        receiver.poll();
        assert!(!receiver.is_remote_connection());
    }

    #[test]
    fn test_initialize_failure_and_shutdown() {
        let mock = MockTransport::new();
        mock.set_fail_open(true);
        let mut receiver = PollingUdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(!receiver.initialize(DEFAULT_PORT));
        assert!(!receiver.is_initialized());
        assert!(!receiver.poll());

        mock.set_fail_open(false);
        assert!(receiver.initialize(DEFAULT_PORT));
        receiver.shutdown();
        receiver.shutdown();
        assert!(!receiver.is_initialized());
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn test_shutdown_clears_session_state() {
        let (mut receiver, mock) = receiver_with_mock();
        mock.inject(
            &OpenTrackPacket::encode(1.0, 2.0, 3.0),
            "10.0.0.7:6000".parse().unwrap(),
        );
        assert!(receiver.poll());
        receiver.recenter();
        assert!(receiver.is_remote_connection());

        receiver.shutdown();
        assert!(receiver.raw_rotation().is_none());
        assert!(receiver.rotation().is_none());
        assert!(receiver.pose().is_none());
        assert!(!receiver.is_remote_connection());
        assert!(!receiver.is_connected());
        assert_eq!(receiver.packets_received(), 1);

        // a fresh session starts without the old center
        assert!(receiver.initialize(DEFAULT_PORT));
        mock.inject_local(&OpenTrackPacket::encode(4.0, 5.0, 6.0));
        assert!(receiver.poll());
        assert_eq!(receiver.rotation(), Some((4.0, 5.0, 6.0)));
    }

    #[test]
    fn test_reinitialize_clears_statistics() {
        let (mut receiver, mock) = receiver_with_mock();
        mock.inject_local(&OpenTrackPacket::encode(1.0, 2.0, 3.0));
        receiver.poll();
        assert_eq!(receiver.packets_received(), 1);

        receiver.shutdown();
        assert!(receiver.initialize(DEFAULT_PORT));
        assert_eq!(receiver.packets_received(), 0);
        assert!(receiver.raw_rotation().is_none());
    }
}
