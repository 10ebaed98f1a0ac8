//! Background-thread receiver with lock-free reads.
//!
//! One network thread is the only writer of the published pose, the receive
//! timestamp and the remote flag. Any number of threads may read through
//! [`UdpReceiver`] or a cloned [`RotationReader`].
//!
//! # Publication
//!
//! ```text
//! network thread                      reader thread
//! yaw/pitch/roll.store(Relaxed)       has_data.load(Acquire)
//! has_data.store(Release)      ──►    yaw/pitch/roll.load(Relaxed)
//! ```
//!
//! A reader that sees `has_data` is guaranteed that at least one complete
//! publish happened before. The three components are NOT guaranteed to come
//! from the same publish: a read racing a write can return a mix of two
//! consecutive samples. Consecutive samples differ by hundredths of a degree,
//! so the mix is accepted instead of serializing readers behind a lock. The
//! recenter offsets follow the same relaxed pattern.

use super::error::TransportError;
use super::packet::{OpenTrackPacket, DEFAULT_PORT};
use super::transport::{is_remote_address, Transport, UdpTransport};
use crate::pose::monotonic_micros;
use statum::{machine, state};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Silence after which [`UdpReceiver::is_receiving`] turns false.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_millis(500);

/// Upper bound on how long the network thread idles between receive
/// attempts, and therefore on how long `stop` waits for it.
pub const RECEIVE_WAIT: Duration = Duration::from_millis(1);

const RECEIVE_BUFFER_SIZE: usize = 256;

/// f32 stored as raw bits in an `AtomicU32`.
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    fn store(&self, val: f32, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// Latest published rotation plus the "has data" flag.
#[derive(Debug, Default)]
pub struct PublishedTrackingState {
    yaw: AtomicF32,
    pitch: AtomicF32,
    roll: AtomicF32,
    has_data: AtomicBool,
}

impl PublishedTrackingState {
    pub fn publish(&self, yaw: f32, pitch: f32, roll: f32) {
        self.yaw.store(yaw, Ordering::Relaxed);
        self.pitch.store(pitch, Ordering::Relaxed);
        self.roll.store(roll, Ordering::Relaxed);
        self.has_data.store(true, Ordering::Release);
    }

    /// `None` until the first publish. See the module docs on tearing.
    pub fn load(&self) -> Option<(f32, f32, f32)> {
        if !self.has_data.load(Ordering::Acquire) {
            return None;
        }
        Some((
            self.yaw.load(Ordering::Relaxed),
            self.pitch.load(Ordering::Relaxed),
            self.roll.load(Ordering::Relaxed),
        ))
    }

    pub fn reset(&self) {
        self.yaw.store(0.0, Ordering::Relaxed);
        self.pitch.store(0.0, Ordering::Relaxed);
        self.roll.store(0.0, Ordering::Relaxed);
        self.has_data.store(false, Ordering::Release);
    }
}

/// Everything the network thread and the readers share.
#[derive(Debug, Default)]
pub struct SharedReceiverState {
    tracking: PublishedTrackingState,
    yaw_offset: AtomicF32,
    pitch_offset: AtomicF32,
    roll_offset: AtomicF32,
    /// `monotonic_micros` of the last good datagram, 0 if none.
    last_receive_us: AtomicU64,
    is_remote: AtomicBool,
}

impl SharedReceiverState {
    fn reset(&self) {
        self.tracking.reset();
        self.yaw_offset.store(0.0, Ordering::Relaxed);
        self.pitch_offset.store(0.0, Ordering::Relaxed);
        self.roll_offset.store(0.0, Ordering::Relaxed);
        self.last_receive_us.store(0, Ordering::Relaxed);
        self.is_remote.store(false, Ordering::Relaxed);
    }
}

/// Cloneable, `Send + Sync` view on a receiver's published state.
///
/// Hand one to each consumer thread; every method is lock-free.
#[derive(Clone, Debug)]
pub struct RotationReader {
    shared: Arc<SharedReceiverState>,
}

impl RotationReader {
    /// Latest rotation minus the recenter offset.
    pub fn rotation(&self) -> Option<(f32, f32, f32)> {
        let (yaw, pitch, roll) = self.shared.tracking.load()?;
        Some((
            yaw - self.shared.yaw_offset.load(Ordering::Relaxed),
            pitch - self.shared.pitch_offset.load(Ordering::Relaxed),
            roll - self.shared.roll_offset.load(Ordering::Relaxed),
        ))
    }

    /// Latest rotation as received.
    pub fn raw_rotation(&self) -> Option<(f32, f32, f32)> {
        self.shared.tracking.load()
    }

    /// Stores the latest rotation as the new zero. No-op before any data.
    pub fn recenter(&self) {
        if let Some((yaw, pitch, roll)) = self.shared.tracking.load() {
            self.shared.yaw_offset.store(yaw, Ordering::Relaxed);
            self.shared.pitch_offset.store(pitch, Ordering::Relaxed);
            self.shared.roll_offset.store(roll, Ordering::Relaxed);
            debug!("Recentered at ({:.2}, {:.2}, {:.2})", yaw, pitch, roll);
        }
    }

    pub fn is_receiving(&self) -> bool {
        let last = self.shared.last_receive_us.load(Ordering::Acquire);
        if last == 0 {
            return false;
        }
        let elapsed_us = monotonic_micros().saturating_sub(last);
        elapsed_us < CONNECTION_TIMEOUT.as_micros() as u64
    }

    pub fn is_remote_connection(&self) -> bool {
        self.shared.is_remote.load(Ordering::Relaxed)
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Idle,
    Listening,
}

/// The network thread's side of the receiver.
#[machine]
#[derive(Debug)]
pub struct ReceiveWorker<S: WorkerState> {
    transport: Box<dyn Transport>,
    shared: Arc<SharedReceiverState>,
    stop_flag: Arc<AtomicBool>,
    datagrams_accepted: u64,
    datagrams_dropped: u64,
}

impl ReceiveWorker<Idle> {
    fn create(
        transport: Box<dyn Transport>,
        shared: Arc<SharedReceiverState>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self::new(transport, shared, stop_flag, 0, 0)
    }

    fn listen(self) -> ReceiveWorker<Listening> {
        debug!(
            "Receive worker listening on port {:?}",
            self.transport.local_port()
        );
        self.transition()
    }
}

impl ReceiveWorker<Listening> {
    /// Runs until the stop flag is set, then hands the transport back.
    fn run(mut self) -> Box<dyn Transport> {
        info!("UDP receive loop started");
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

        while !self.stop_flag.load(Ordering::Relaxed) {
            match self.transport.try_receive(&mut buffer) {
                Ok(Some((len, sender))) => self.handle_datagram(&buffer[..len], sender),
                Ok(None) => thread::sleep(RECEIVE_WAIT),
                Err(e) => {
                    // persistent errors surface as staleness, not as a failure
                    trace!("UDP receive error: {}", e);
                    thread::sleep(RECEIVE_WAIT);
                }
            }
        }

        info!(
            "UDP receive loop stopped ({} accepted, {} dropped)",
            self.datagrams_accepted, self.datagrams_dropped
        );
        self.transport
    }

    fn handle_datagram(&mut self, datagram: &[u8], sender: SocketAddr) {
        let Some(pose) = OpenTrackPacket::try_parse(datagram) else {
            self.datagrams_dropped += 1;
            trace!("Dropped {} byte datagram from {}", datagram.len(), sender);
            return;
        };

        self.shared.tracking.publish(pose.yaw, pose.pitch, pose.roll);
        self.shared
            .is_remote
            .store(is_remote_address(&sender), Ordering::Relaxed);
        self.shared
            .last_receive_us
            .store(monotonic_micros(), Ordering::Release);

        if self.datagrams_accepted == 0 {
            info!("First tracking datagram received from {}", sender);
        }
        self.datagrams_accepted += 1;
    }
}

/// Threaded OpenTrack receiver.
///
/// `Stopped -> Running -> Stopped`; a failed `start` leaves it stopped with
/// [`is_failed`](Self::is_failed) set.
#[derive(Debug)]
pub struct UdpReceiver {
    /// Present while stopped; the worker owns it while running.
    transport: Option<Box<dyn Transport>>,
    worker: Option<JoinHandle<Box<dyn Transport>>>,
    reader: RotationReader,
    stop_flag: Arc<AtomicBool>,
    bound_port: Option<u16>,
    failed: bool,
}

impl Default for UdpReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpReceiver {
    pub fn new() -> Self {
        Self::with_transport(Box::new(UdpTransport::new()))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            worker: None,
            reader: RotationReader {
                shared: Arc::new(SharedReceiverState::default()),
            },
            stop_flag: Arc::new(AtomicBool::new(false)),
            bound_port: None,
            failed: false,
        }
    }

    /// Starts on [`DEFAULT_PORT`].
    pub fn start_default(&mut self) -> bool {
        self.start(DEFAULT_PORT)
    }

    /// Opens the transport and spawns the network thread.
    ///
    /// Returns `false` if the transport could not be opened; the error is
    /// logged. Starting while running succeeds without side effects.
    pub fn start(&mut self, port: u16) -> bool {
        match self.try_start(port) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to start UDP receiver on port {}: {}", port, e);
                false
            }
        }
    }

    pub fn try_start(&mut self, port: u16) -> Result<(), TransportError> {
        if self.is_running() {
            return Ok(());
        }

        self.failed = false;
        let mut transport = self.transport.take().ok_or(TransportError::NotOpen)?;
        if let Err(e) = transport.open(port) {
            self.transport = Some(transport);
            self.failed = true;
            return Err(e);
        }

        self.bound_port = transport.local_port();
        self.stop_flag.store(false, Ordering::Release);
        let worker = ReceiveWorker::create(
            transport,
            self.reader.shared.clone(),
            self.stop_flag.clone(),
        );
        let handle = thread::Builder::new()
            .name("headtrack-udp".into())
            .spawn(move || worker.listen().run())
            .expect("Failed to spawn UDP receiver thread");

        self.worker = Some(handle);
        info!("UDP receiver started on port {}", port);
        Ok(())
    }

    /// Stops the network thread, closes the transport and clears all state.
    ///
    /// Blocks for at most about one [`RECEIVE_WAIT`].
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.stop_flag.store(true, Ordering::Release);
        match handle.join() {
            Ok(mut transport) => {
                transport.close();
                self.transport = Some(transport);
            }
            Err(_) => {
                warn!("UDP receive thread panicked; replacing transport");
                self.transport = Some(Box::new(UdpTransport::new()));
            }
        }

        self.bound_port = None;
        self.reader.shared.reset();
        info!("UDP receiver stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Port the transport is bound to while running.
    pub fn local_port(&self) -> Option<u16> {
        self.bound_port
    }

    /// A handle readers on other threads can keep.
    pub fn reader(&self) -> RotationReader {
        self.reader.clone()
    }

    pub fn rotation(&self) -> Option<(f32, f32, f32)> {
        self.reader.rotation()
    }

    pub fn raw_rotation(&self) -> Option<(f32, f32, f32)> {
        self.reader.raw_rotation()
    }

    pub fn recenter(&self) {
        self.reader.recenter()
    }

    pub fn is_receiving(&self) -> bool {
        self.reader.is_receiving()
    }

    pub fn is_remote_connection(&self) -> bool {
        self.reader.is_remote_connection()
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::transport::MockTransport;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(2);

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_published_state_flag_gates_reads() {
        let state = PublishedTrackingState::default();
        assert!(state.load().is_none());

        state.publish(1.0, 2.0, 3.0);
        assert_eq!(state.load(), Some((1.0, 2.0, 3.0)));

        state.reset();
        assert!(state.load().is_none());
    }

    #[test]
    fn test_failed_open_leaves_receiver_stopped() {
        let mock = MockTransport::new();
        mock.set_fail_open(true);
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));

        assert!(!receiver.start(4242));
        assert!(receiver.is_failed());
        assert!(!receiver.is_running());

        // the transport is kept, so a later start can succeed
        mock.set_fail_open(false);
        assert!(receiver.start(4242));
        assert!(!receiver.is_failed());
        receiver.stop();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mock = MockTransport::new();
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.start(4242));
        assert!(receiver.start(4242));
        assert_eq!(mock.open_count(), 1);
        receiver.stop();
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn test_publishes_and_recenters() {
        let mock = MockTransport::new();
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.start(4242));
        assert!(receiver.rotation().is_none());

        // recenter before any data does nothing
        receiver.recenter();

        mock.inject_local(&OpenTrackPacket::encode(10.0, -5.0, 2.0));
        assert!(wait_until(WAIT, || receiver.rotation().is_some()));
        assert_eq!(receiver.rotation(), Some((10.0, -5.0, 2.0)));
        assert!(receiver.is_receiving());
        assert!(!receiver.is_remote_connection());

        receiver.recenter();
        assert_eq!(receiver.rotation(), Some((0.0, 0.0, 0.0)));
        assert_eq!(receiver.raw_rotation(), Some((10.0, -5.0, 2.0)));

        receiver.stop();
        assert!(receiver.rotation().is_none());
        assert!(!receiver.is_receiving());
    }

    #[test]
    fn test_malformed_datagram_keeps_last_pose() {
        let mock = MockTransport::new();
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.start(4242));

        mock.inject_local(&OpenTrackPacket::encode(3.0, 4.0, 5.0));
        assert!(wait_until(WAIT, || receiver.rotation().is_some()));

        mock.inject_local(&[0u8; 12]);
        mock.inject_local(&OpenTrackPacket::encode(f64::NAN, 0.0, 0.0));
        assert!(wait_until(WAIT, || mock.pending() == 0));
        // give the worker a moment to finish the last datagram it took
        thread::sleep(Duration::from_millis(20));

        assert_eq!(receiver.rotation(), Some((3.0, 4.0, 5.0)));
        receiver.stop();
    }

    #[test]
    fn test_remote_sender_is_flagged() {
        let mock = MockTransport::new();
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.start(4242));

        mock.inject(
            &OpenTrackPacket::encode(1.0, 1.0, 1.0),
            "192.168.1.50:4242".parse().unwrap(),
        );
        assert!(wait_until(WAIT, || receiver.is_remote_connection()));
        receiver.stop();
        assert!(!receiver.is_remote_connection());
    }

    #[test]
    fn test_reader_works_from_other_threads() {
        let mock = MockTransport::new();
        let mut receiver = UdpReceiver::with_transport(Box::new(mock.clone()));
        assert!(receiver.start(4242));
        mock.inject_local(&OpenTrackPacket::encode(7.0, 8.0, 9.0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = receiver.reader();
                thread::spawn(move || {
                    wait_until(WAIT, || reader.rotation().is_some())
                })
            })
            .collect();

        for handle in readers {
            assert!(handle.join().unwrap());
        }
        receiver.stop();
    }
}
