//! OpenTrack UDP ingestion.
//!
//! ```text
//! datagram ──► Transport ──► OpenTrackPacket::try_parse ──┬─► UdpReceiver (network thread, lock-free reads)
//!                                                         └─► PollingUdpReceiver (drained by caller)
//! ```
//!
//! - [`packet`] - wire layout and parser
//! - [`transport`] - non-blocking datagram source trait, UDP and mock impls
//! - [`udp_receiver`] - background thread push model
//! - [`polling_receiver`] - single-threaded poll model
//!
//! Malformed datagrams are dropped silently and never disturb the last good
//! pose. Loss of signal is observable through `is_receiving` /
//! `is_connected`; nothing reconnects or retries, the socket just stays open.

pub mod error;
pub mod packet;
pub mod polling_receiver;
pub mod transport;
pub mod udp_receiver;

pub use error::TransportError;
pub use packet::{OpenTrackPacket, DEFAULT_PORT, MIN_PACKET_SIZE};
pub use polling_receiver::{PollingUdpReceiver, ReceiverStats};
pub use transport::{is_remote_address, MockTransport, Transport, UdpTransport};
pub use udp_receiver::{RotationReader, UdpReceiver};
