//! AccelerometerFrame - datagram path decoder output

use serde::{Deserialize, Serialize};

/// Length of the ASCII MAC string at the head of a frame
pub const MAC_LEN: usize = 17;

/// Samples per axis in a raw frame
pub const SAMPLES_PER_AXIS: usize = 330;

/// Bytes per sample (i16, big-endian)
pub const SAMPLE_SIZE: usize = 2;

/// Sum of the declared layout: MAC + three axes
pub const FRAME_LAYOUT_LEN: usize = MAC_LEN + 3 * SAMPLES_PER_AXIS * SAMPLE_SIZE;

/// Total byte size of one reassembled frame (1470 + 528 on the wire).
///
/// One byte larger than `FRAME_LAYOUT_LEN`; the trailing byte is not interpreted.
pub const FRAME_SIZE: usize = 1998;

/// Decoded accelerometer frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerometerFrame {
    /// Device MAC address, 17 ASCII characters (`AA:BB:CC:DD:EE:FF`)
    pub mac: String,

    /// X axis samples, arrival order
    pub x: Vec<i16>,

    /// Y axis samples, arrival order
    pub y: Vec<i16>,

    /// Z axis samples, arrival order
    pub z: Vec<i16>,
}

impl AccelerometerFrame {
    /// Drop the first sample of every axis.
    ///
    /// Forwarded frames carry 329 samples per axis.
    pub fn drop_leading_sample(mut self) -> Self {
        for axis in [&mut self.x, &mut self.y, &mut self.z] {
            if !axis.is_empty() {
                axis.remove(0);
            }
        }
        self
    }

    /// Samples per axis (all axes have equal length when produced by the decoder)
    pub fn samples_per_axis(&self) -> usize {
        self.x.len()
    }
}
