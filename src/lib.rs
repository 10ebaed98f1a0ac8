//! Head-tracking input over the OpenTrack UDP protocol.
//!
//! ```text
//! OpenTrack ──UDP──► protocol ──► processing ──► pipeline ──► consumer
//!                   (receivers)   (offset, deadzone,  (per-frame task)
//!                                  smoothing, sensitivity)
//! ```
//!
//! - [`pose`] - pose type and per-axis settings
//! - [`math`] - deadzone and frame-rate independent smoothing
//! - [`protocol`] - wire format, transports and both receivers
//! - [`processing`] - center offset and the stateful processor
//! - [`config`] - TOML configuration
//! - [`pipeline`] - tokio frame driver tying it all together

pub mod config;
pub mod math;
pub mod pipeline;
pub mod pose;
pub mod processing;
pub mod protocol;

pub use config::TrackingConfig;
pub use pipeline::{PipelineHandle, TrackingFrame};
pub use pose::{DeadzoneSettings, Pose, SensitivitySettings};
pub use processing::TrackingProcessor;
pub use protocol::{PollingUdpReceiver, UdpReceiver};
