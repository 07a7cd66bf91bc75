//! Binary frame decoder
//!
//! Layout of one reassembled frame (all integers big-endian):
//!
//! | offset | size      | field                 |
//! |--------|-----------|-----------------------|
//! | 0      | 17        | MAC, ASCII            |
//! | 17     | 330 × i16 | x                     |
//! | 677    | 330 × i16 | y                     |
//! | 1337   | 330 × i16 | z                     |
//! | 1997   | 1         | trailing, ignored     |

use bytes::{Buf, BufMut};
use contracts::{AccelerometerFrame, FRAME_LAYOUT_LEN, FRAME_SIZE, MAC_LEN, SAMPLES_PER_AXIS};
use thiserror::Error;

/// Decoder errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer length differs from the fixed frame size; nothing is decoded
    #[error("frame shape mismatch: expected {expected} bytes, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// MAC field contains non-ASCII bytes
    #[error("mac field is not ascii")]
    InvalidMac,
}

/// Decode a reassembled buffer into an accelerometer frame.
///
/// # Errors
/// - `ShapeMismatch` if `buffer.len() != FRAME_SIZE`
/// - `InvalidMac` if the MAC bytes are not ASCII
pub fn decode(buffer: &[u8]) -> Result<AccelerometerFrame, DecodeError> {
    if buffer.len() != FRAME_SIZE {
        return Err(DecodeError::ShapeMismatch {
            expected: FRAME_SIZE,
            actual: buffer.len(),
        });
    }

    let mut cursor = buffer;

    let mac_bytes = &cursor[..MAC_LEN];
    if !mac_bytes.is_ascii() {
        return Err(DecodeError::InvalidMac);
    }
    let mac = mac_bytes.iter().map(|b| *b as char).collect::<String>();
    cursor.advance(MAC_LEN);

    let x = read_axis(&mut cursor);
    let y = read_axis(&mut cursor);
    let z = read_axis(&mut cursor);

    Ok(AccelerometerFrame { mac, x, y, z })
}

/// Encode a frame into the wire layout, zero-padded to `FRAME_SIZE`.
///
/// Axes shorter than 330 samples are zero-filled, longer ones are cut.
/// Used by device simulators and tests.
pub fn encode(frame: &AccelerometerFrame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_SIZE);

    let mut mac = frame.mac.as_bytes().to_vec();
    mac.resize(MAC_LEN, b' ');
    buf.put_slice(&mac);

    for axis in [&frame.x, &frame.y, &frame.z] {
        for idx in 0..SAMPLES_PER_AXIS {
            buf.put_i16(axis.get(idx).copied().unwrap_or(0));
        }
    }

    debug_assert_eq!(buf.len(), FRAME_LAYOUT_LEN);
    buf.resize(FRAME_SIZE, 0);
    buf
}

fn read_axis(cursor: &mut &[u8]) -> Vec<i16> {
    (0..SAMPLES_PER_AXIS).map(|_| cursor.get_i16()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    fn sample_frame() -> AccelerometerFrame {
        AccelerometerFrame {
            mac: MAC.to_string(),
            x: (0..330).map(|i| i as i16).collect(),
            y: (0..330).map(|i| -(i as i16)).collect(),
            z: (0..330).map(|i| i16::MAX - i as i16).collect(),
        }
    }

    #[test]
    fn test_decode_layout() {
        let bytes = encode(&sample_frame());
        assert_eq!(bytes.len(), FRAME_SIZE);

        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.mac, MAC);
        assert_eq!(frame.x.len(), SAMPLES_PER_AXIS);
        assert_eq!(frame.x[329], 329);
        assert_eq!(frame.y[1], -1);
        assert_eq!(frame.z[0], i16::MAX);
    }

    #[test]
    fn test_decode_big_endian_offsets() {
        let mut bytes = vec![b'0'; FRAME_SIZE];
        // first x sample = 0x0102
        bytes[MAC_LEN] = 0x01;
        bytes[MAC_LEN + 1] = 0x02;
        // first y sample = -2 (0xFFFE)
        let y_offset = MAC_LEN + SAMPLES_PER_AXIS * 2;
        bytes[y_offset] = 0xFF;
        bytes[y_offset + 1] = 0xFE;
        // last z sample = 0x7FFF
        let z_last = MAC_LEN + 3 * SAMPLES_PER_AXIS * 2 - 2;
        bytes[z_last] = 0x7F;
        bytes[z_last + 1] = 0xFF;

        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.x[0], 0x0102);
        assert_eq!(frame.y[0], -2);
        assert_eq!(frame.z[329], i16::MAX);
    }

    #[test]
    fn test_decode_shape_mismatch() {
        for len in [0, 1470, FRAME_LAYOUT_LEN, FRAME_SIZE + 1] {
            let err = decode(&vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                DecodeError::ShapeMismatch {
                    expected: FRAME_SIZE,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_decode_invalid_mac() {
        let mut bytes = encode(&sample_frame());
        bytes[3] = 0xC3;
        assert_eq!(decode(&bytes).unwrap_err(), DecodeError::InvalidMac);
    }
}
