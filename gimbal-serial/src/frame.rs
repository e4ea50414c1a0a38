//! Wire framing for the serial link to the gimbal MCU (SPEC_FULL.md §4.7, §6).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// TX frame header byte.
pub const TX_HEADER: u8 = 0xAA;
/// TX frame length in bytes: header, yaw f32, pitch f32, fire u8, checksum.
pub const TX_FRAME_LEN: usize = 11;

/// RX frame header byte (bullet-speed report from the MCU).
pub const RX_HEADER: u8 = 0xBB;
/// RX frame length in bytes: header, speed f32, checksum.
pub const RX_FRAME_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short: got {got} bytes, need {need}")]
    TooShort { got: usize, need: usize },
    #[error("bad header byte: expected {expected:#04x}, got {actual:#04x}")]
    BadHeader { expected: u8, actual: u8 },
    #[error("checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    BadChecksum { expected: u8, computed: u8 },
}

fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encode a gimbal command into the 11-byte TX frame:
/// `[0xAA][yaw_f32_le][pitch_f32_le][fire_u8][xor_checksum]`.
pub fn encode_tx(yaw: f32, pitch: f32, fire: bool) -> [u8; TX_FRAME_LEN] {
    let mut buf = [0u8; TX_FRAME_LEN];
    {
        let mut w = &mut buf[..];
        w.write_u8(TX_HEADER).unwrap();
        w.write_f32::<LittleEndian>(yaw).unwrap();
        w.write_f32::<LittleEndian>(pitch).unwrap();
        w.write_u8(fire as u8).unwrap();
    }
    buf[TX_FRAME_LEN - 1] = xor_checksum(&buf[..TX_FRAME_LEN - 1]);
    buf
}

/// Decode an RX bullet-speed frame: `[0xBB][speed_f32_le][xor_checksum]`.
pub fn decode_rx(buf: &[u8]) -> Result<f32, FrameError> {
    if buf.len() < RX_FRAME_LEN {
        return Err(FrameError::TooShort {
            got: buf.len(),
            need: RX_FRAME_LEN,
        });
    }
    if buf[0] != RX_HEADER {
        return Err(FrameError::BadHeader {
            expected: RX_HEADER,
            actual: buf[0],
        });
    }
    let expected = buf[RX_FRAME_LEN - 1];
    let computed = xor_checksum(&buf[..RX_FRAME_LEN - 1]);
    if expected != computed {
        return Err(FrameError::BadChecksum { expected, computed });
    }
    let mut speed_bytes = &buf[1..5];
    Ok(speed_bytes.read_f32::<LittleEndian>().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_frame_round_trips_through_manual_decode() {
        let frame = encode_tx(0.5, -0.25, true);
        assert_eq!(frame[0], TX_HEADER);
        assert_eq!(frame.len(), TX_FRAME_LEN);
        let yaw = f32::from_le_bytes(frame[1..5].try_into().unwrap());
        let pitch = f32::from_le_bytes(frame[5..9].try_into().unwrap());
        assert_eq!(yaw, 0.5);
        assert_eq!(pitch, -0.25);
        assert_eq!(frame[9], 1);
        let checksum = xor_checksum(&frame[..TX_FRAME_LEN - 1]);
        assert_eq!(frame[10], checksum);
    }

    #[test]
    fn rx_frame_round_trips() {
        let mut buf = [0u8; RX_FRAME_LEN];
        buf[0] = RX_HEADER;
        buf[1..5].copy_from_slice(&27.5f32.to_le_bytes());
        buf[RX_FRAME_LEN - 1] = xor_checksum(&buf[..RX_FRAME_LEN - 1]);
        let speed = decode_rx(&buf).unwrap();
        assert_eq!(speed, 27.5);
    }

    #[test]
    fn rx_frame_rejects_bad_checksum() {
        let mut buf = [0u8; RX_FRAME_LEN];
        buf[0] = RX_HEADER;
        buf[1..5].copy_from_slice(&27.5f32.to_le_bytes());
        buf[RX_FRAME_LEN - 1] = 0xFF;
        assert!(matches!(decode_rx(&buf), Err(FrameError::BadChecksum { .. })));
    }

    #[test]
    fn rx_frame_rejects_wrong_header() {
        let mut buf = [0u8; RX_FRAME_LEN];
        buf[0] = 0x11;
        assert!(matches!(decode_rx(&buf), Err(FrameError::BadHeader { .. })));
    }
}
