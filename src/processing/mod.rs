//! Per-frame transform from raw tracker angles to a camera-ready pose.
//!
//! ```text
//! raw ──► center offset ──► deadzone ──► smoothing ──► sensitivity ──► Pose
//! ```
//!
//! The order matters: smoothing after the deadzone keeps rest noise from
//! leaking into the accumulator, and sensitivity last means the smoothing
//! speed is independent of the configured multipliers.

pub mod center_offset;
pub mod tracking_processor;

pub use center_offset::CenterOffsetManager;
pub use tracking_processor::TrackingProcessor;
