use std::io;

/// Errors raised by a [`Transport`](super::transport::Transport).
///
/// Would-block is not an error; `try_receive` reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to switch socket to non-blocking mode: {0}")]
    NonBlocking(#[source] io::Error),

    #[error("Transport is not open")]
    NotOpen,

    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("Transport open refused: {0}")]
    Refused(String),
}
