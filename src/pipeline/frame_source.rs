use crate::config::ReceiverMode;
use crate::protocol::{PollingUdpReceiver, Transport, TransportError, UdpReceiver};
use tracing::info;

/// One of the two receivers behind a single per-frame interface.
#[derive(Debug)]
pub enum FrameSource {
    Polling(PollingUdpReceiver),
    Threaded(UdpReceiver),
}

impl FrameSource {
    /// Builds the receiver for `mode` on top of `transport` and opens it.
    pub fn open(
        mode: ReceiverMode,
        transport: Box<dyn Transport>,
        port: u16,
    ) -> Result<Self, TransportError> {
        let source = match mode {
            ReceiverMode::Polling => {
                let mut receiver = PollingUdpReceiver::with_transport(transport);
                receiver.try_initialize(port)?;
                FrameSource::Polling(receiver)
            }
            ReceiverMode::Threaded => {
                let mut receiver = UdpReceiver::with_transport(transport);
                receiver.try_start(port)?;
                FrameSource::Threaded(receiver)
            }
        };
        info!("Frame source open in {:?} mode", source.mode());
        Ok(source)
    }

    pub fn mode(&self) -> ReceiverMode {
        match self {
            FrameSource::Polling(_) => ReceiverMode::Polling,
            FrameSource::Threaded(_) => ReceiverMode::Threaded,
        }
    }

    /// Drains pending datagrams. The threaded receiver does this on its own
    /// thread, so for it this only reports whether data is flowing.
    pub fn poll(&mut self) -> bool {
        match self {
            FrameSource::Polling(receiver) => receiver.poll(),
            FrameSource::Threaded(receiver) => receiver.is_receiving(),
        }
    }

    pub fn raw_rotation(&self) -> Option<(f32, f32, f32)> {
        match self {
            FrameSource::Polling(receiver) => receiver.raw_rotation(),
            FrameSource::Threaded(receiver) => receiver.raw_rotation(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            FrameSource::Polling(receiver) => receiver.is_connected(),
            FrameSource::Threaded(receiver) => receiver.is_receiving(),
        }
    }

    pub fn is_remote_connection(&self) -> bool {
        match self {
            FrameSource::Polling(receiver) => receiver.is_remote_connection(),
            FrameSource::Threaded(receiver) => receiver.is_remote_connection(),
        }
    }

    /// Valid datagrams so far; only the polling receiver counts them.
    pub fn packets_received(&self) -> Option<u64> {
        match self {
            FrameSource::Polling(receiver) => Some(receiver.packets_received()),
            FrameSource::Threaded(_) => None,
        }
    }

    pub fn local_port(&self) -> Option<u16> {
        match self {
            FrameSource::Polling(receiver) => receiver.local_port(),
            FrameSource::Threaded(receiver) => receiver.local_port(),
        }
    }

    pub fn close(&mut self) {
        match self {
            FrameSource::Polling(receiver) => receiver.shutdown(),
            FrameSource::Threaded(receiver) => receiver.stop(),
        }
    }
}
