//! OpenTrack UDP datagram layout.
//!
//! ```text
//! offset  0        8        16       24       32       40       48
//!         ┌────────┬────────┬────────┬────────┬────────┬────────┐
//!         │  x     │  y     │  z     │  yaw   │ pitch  │  roll  │
//!         └────────┴────────┴────────┴────────┴────────┴────────┘
//!         six little-endian f64; only the rotation triple is read
//! ```

use crate::pose::Pose;

/// Default OpenTrack UDP port.
pub const DEFAULT_PORT: u16 = 4242;

/// Six doubles.
pub const MIN_PACKET_SIZE: usize = 48;

pub const YAW_OFFSET: usize = 24;
pub const PITCH_OFFSET: usize = 32;
pub const ROLL_OFFSET: usize = 40;

/// Parser for OpenTrack "UDP over network" datagrams.
pub struct OpenTrackPacket;

impl OpenTrackPacket {
    /// Parses the rotation triple out of a datagram.
    ///
    /// Returns `None` for datagrams shorter than [`MIN_PACKET_SIZE`] or when
    /// any angle is NaN or infinite. Angles are narrowed to `f32` but not
    /// wrapped into any range. The returned pose is stamped with the current
    /// monotonic time.
    pub fn try_parse(buffer: &[u8]) -> Option<Pose> {
        if buffer.len() < MIN_PACKET_SIZE {
            return None;
        }

        let yaw = read_f64_le(buffer, YAW_OFFSET)?;
        let pitch = read_f64_le(buffer, PITCH_OFFSET)?;
        let roll = read_f64_le(buffer, ROLL_OFFSET)?;

        if !(yaw.is_finite() && pitch.is_finite() && roll.is_finite()) {
            return None;
        }

        Some(Pose::new(yaw as f32, pitch as f32, roll as f32))
    }

    /// Builds a datagram in the same layout, translation fields zeroed.
    ///
    /// Used by senders in tests and tools; the receiver never encodes.
    pub fn encode(yaw: f64, pitch: f64, roll: f64) -> [u8; MIN_PACKET_SIZE] {
        let mut buffer = [0u8; MIN_PACKET_SIZE];
        buffer[YAW_OFFSET..YAW_OFFSET + 8].copy_from_slice(&yaw.to_le_bytes());
        buffer[PITCH_OFFSET..PITCH_OFFSET + 8].copy_from_slice(&pitch.to_le_bytes());
        buffer[ROLL_OFFSET..ROLL_OFFSET + 8].copy_from_slice(&roll.to_le_bytes());
        buffer
    }
}

fn read_f64_le(buffer: &[u8], offset: usize) -> Option<f64> {
    let bytes: [u8; 8] = buffer.get(offset..offset + 8)?.try_into().ok()?;
    Some(f64::from_le_bytes(bytes))
}
