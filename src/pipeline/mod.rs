//! Per-frame driver that turns received datagrams into processed poses.
//!
//! ```text
//! UDP ──► FrameSource ──► TrackingProcessor ──► watch<Option<TrackingFrame>>
//!         (polling or      (offset, deadzone,
//!          threaded)        smoothing, sensitivity)
//!                 ▲
//!                 └── mpsc<PipelineCommand> (recenter, reset, config)
//! ```
//!
//! 1. [`frame_source`] - Uniform access to either receiver flavor
//! 2. [`pipeline_handle`] - Tokio task, commands and lifecycle
//!
//! The task ticks at `frame_interval_ms` (16 ms by default), the same
//! role a game loop plays for the receivers. Nothing is published until
//! the first valid datagram arrives.

pub mod frame_source;
pub mod pipeline_handle;

pub use frame_source::FrameSource;
pub use pipeline_handle::{
    PipelineCommand, PipelineError, PipelineHandle, PipelineSettings, TrackingFrame,
};
